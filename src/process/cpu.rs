//! 处理器状态管理，用于记录当前 CPU 的编号与中断关闭的嵌套层数
//!
//! 宿主环境下每个线程被视为独占一个 hart 的内核线程，
//! `Cpu` 状态保存在线程局部存储中，不需要额外的同步。

use core::cell::Cell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// 下一个分配给新线程的 CPU 编号
static NEXT_CPU_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CPU: Cpu = Cpu::new();
}

/// 单个 CPU（hart）的状态。
struct Cpu {
    /// 该 CPU 的编号，线程首次访问时分配，终身不变。
    id: usize,

    /// 中断关闭的嵌套深度。
    ///
    /// 每调用一次 `push_off` 计数加 1，每调用一次 `pop_off` 计数减 1。
    /// 持有自旋锁的数量与它相等。
    noff: Cell<u8>,
}

impl Cpu {
    fn new() -> Self {
        Self {
            id: NEXT_CPU_ID.fetch_add(1, Ordering::Relaxed),
            noff: Cell::new(0),
        }
    }
}

/// 当前 CPU 的编号。
#[inline]
pub fn cpu_id() -> usize {
    CPU.with(|c| c.id)
}

/// 当前 CPU 中断关闭的嵌套深度，为 0 表示没有持有任何自旋锁。
#[inline]
pub fn noff() -> u8 {
    CPU.with(|c| c.noff.get())
}

/// # 功能说明
/// 关闭当前 CPU 的中断，并记录中断关闭的嵌套次数。
/// 多次调用 `push_off()` 需要相应次数的 `pop_off()` 才能恢复中断状态。
pub fn push_off() {
    CPU.with(|c| match c.noff.get().checked_add(1) {
        Some(n) => c.noff.set(n),
        None => panic!("push_off(): too many nested locks"),
    });
}

/// # 功能说明
/// 解除之前通过 `push_off()` 关闭的中断，
/// 只有所有嵌套的关闭操作都对应调用后，才真正重新开启中断。
///
/// # 可能的错误
/// - 如果调用次数与 `push_off()` 不匹配，panic。
pub fn pop_off() {
    CPU.with(|c| match c.noff.get().checked_sub(1) {
        Some(n) => c.noff.set(n),
        None => panic!("pop_off(): count not match"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_ids_are_per_thread() {
        let here = cpu_id();
        assert_eq!(here, cpu_id());
        let there = std::thread::spawn(cpu_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn push_pop_nesting() {
        assert_eq!(noff(), 0);
        push_off();
        push_off();
        assert_eq!(noff(), 2);
        pop_off();
        pop_off();
        assert_eq!(noff(), 0);
    }

    #[test]
    #[should_panic(expected = "pop_off(): count not match")]
    fn unmatched_pop_panics() {
        pop_off();
    }
}
