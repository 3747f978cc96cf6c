//! 进程控制模块
//!
//! 提供缓存层依赖的调度原语：在某个通道（channel）上睡眠、唤醒某个通道上的所有睡眠者。
//! 通道只是一个地址值，通常取被等待条件变量的地址。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_utils::sync::{Parker, Unparker};

use crate::spinlock::{SpinLock, SpinLockGuard};

pub mod cpu;

pub use cpu::{cpu_id, pop_off, push_off};

/// 所有正在睡眠的内核线程。
static SLEEPERS: SpinLock<Vec<Sleeper>> = SpinLock::new(Vec::new(), "sleepers");

thread_local! {
    static PARKER: Parker = Parker::new();
}

/// 一个在 `channel` 上睡眠的内核线程。
struct Sleeper {
    channel: usize,
    /// 由 `wakeup` 置位，睡眠者据此区分真正的唤醒与残留的 unpark 令牌。
    woken: Arc<AtomicBool>,
    unparker: Unparker,
}

/// # 功能说明
/// 原子地释放条件锁并在 `channel` 上睡眠，被唤醒后返回。
/// 调用者返回后需要重新获取条件锁并再次检查等待条件。
///
/// # 流程解释
/// 1. 确认当前 CPU 只持有条件锁这一把自旋锁；
/// 2. 在持有条件锁的情况下把自己登记到睡眠者表中，
///    唤醒者必须先获得条件锁才能调用 `wakeup`，因此不会丢失唤醒；
/// 3. 释放睡眠者表与条件锁；
/// 4. 让出处理器，直到被 `wakeup` 标记为已唤醒。
///
/// # 参数
/// - `channel`: 睡眠通道；
/// - `guard`: 保护等待条件的自旋锁守卫。
///
/// # 可能的错误
/// - 若当前 CPU 持有多把自旋锁则 panic，睡眠期间不得持有任何自旋锁。
pub fn sleep<T: ?Sized>(channel: usize, guard: SpinLockGuard<'_, T>) {
    if cpu::noff() != 1 {
        panic!("sleep(): cpu hold multi locks");
    }

    let woken = Arc::new(AtomicBool::new(false));
    let unparker = PARKER.with(|p| p.unparker().clone());
    let mut sleepers = SLEEPERS.lock();
    sleepers.push(Sleeper {
        channel,
        woken: Arc::clone(&woken),
        unparker,
    });
    drop(sleepers);
    drop(guard);

    while !woken.load(Ordering::Acquire) {
        PARKER.with(|p| p.park());
    }
}

/// 唤醒所有在 `channel` 上睡眠的内核线程。
///
/// 调用者应持有与该通道对应的条件锁。
pub fn wakeup(channel: usize) {
    let mut sleepers = SLEEPERS.lock();
    sleepers.retain(|s| {
        if s.channel != channel {
            return true;
        }
        s.woken.store(true, Ordering::Release);
        s.unparker.unpark();
        false
    });
}
