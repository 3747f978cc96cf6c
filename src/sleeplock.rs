//! 睡眠锁模块
//! 提供基于进程休眠/唤醒机制的同步原语，适用于可能长时间持有的锁。
//!
//! 当锁被占用时，尝试获取锁的内核线程会进入休眠状态，避免忙等待。
//! 睡眠锁可以跨越磁盘 I/O 持有，自旋锁不可以。

use core::cell::{Cell, UnsafeCell};
use core::ops::{Deref, DerefMut, Drop};

use crate::process::{self, cpu};
use crate::spinlock::SpinLock;

/// 睡眠锁结构，提供阻塞式同步机制
///
/// 与自旋锁不同，当锁被占用时，尝试获取的内核线程会进入休眠状态，
/// 直到锁被释放后被唤醒。这避免了忙等待，适用于可能长时间持有的锁。
///
/// # 类型参数
/// - `T`: 被保护的数据类型
///
/// # 字段说明
/// - `lock`: 内部自旋锁，保护`locked`与`holder`的访问
/// - `locked`: 表示锁是否已被占用
/// - `holder`: 持有者所在 CPU 的编号（-1 表示无人持有）
/// - `name`: 锁的标识名称，用于调试
/// - `data`: 被保护的数据，通过`UnsafeCell`实现内部可变性
pub struct SleepLock<T: ?Sized> {
    lock: SpinLock<()>,
    locked: Cell<bool>,
    holder: Cell<isize>,
    name: &'static str,
    data: UnsafeCell<T>,
}

// 为SleepLock实现Sync，允许跨线程共享（要求T是Send）
// `locked` 与 `holder` 只在持有内部自旋锁时访问
unsafe impl<T: ?Sized + Send> Sync for SleepLock<T> {}

impl<T> SleepLock<T> {
    /// 创建一个新的睡眠锁实例
    ///
    /// # 参数
    /// - `data`: 需要被保护的数据
    /// - `name`: 锁的标识名称
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            lock: SpinLock::new((), "sleeplock"),
            locked: Cell::new(false),
            holder: Cell::new(-1),
            name,
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> SleepLock<T> {
    /// 获取睡眠锁（可能阻塞当前内核线程）
    ///
    /// # 功能说明
    /// 尝试获取睡眠锁。如果锁已被占用，当前线程将进入休眠状态，
    /// 直到锁被释放后被唤醒。返回守卫对象提供对数据的访问。
    ///
    /// # 流程解释
    /// 1. 确认调用者没有持有任何自旋锁
    /// 2. 获取内部自旋锁保护临界区
    /// 3. 检查`locked`状态：
    ///   - 如果已锁定：调用`sleep()`让当前线程休眠，醒来后重新检查
    ///   - 如果未锁定：设置`locked=true`，记录持有者并返回守卫
    /// 4. 释放内部自旋锁（因已设置locked状态）
    ///
    /// # 可能的错误
    /// - 持有自旋锁时调用会 panic：睡眠会让持锁的 CPU 长时间停顿。
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        if cpu::noff() != 0 {
            panic!("sleeplock {} acquire while holding spinlock", self.name);
        }

        // 获取内部自旋锁（保护locked状态）
        let mut guard = self.lock.lock();

        // 当锁已被占用时循环等待
        while self.locked.get() {
            process::sleep(self.locked.as_ptr() as usize, guard);
            // 被唤醒后重新获取内部锁
            guard = self.lock.lock();
        }

        self.locked.set(true);
        self.holder.set(cpu::cpu_id() as isize);
        drop(guard);

        SleepLockGuard {
            lock: self,
            data: unsafe { &mut *self.data.get() },
        }
    }

    /// 当前 CPU 是否持有该睡眠锁。
    pub fn holding(&self) -> bool {
        let guard = self.lock.lock();
        let r = self.locked.get() && self.holder.get() == cpu::cpu_id() as isize;
        drop(guard);
        r
    }

    /// 释放锁（内部方法，由守卫的Drop调用）
    ///
    /// # 流程解释
    /// 1. 获取内部自旋锁
    /// 2. 设置`locked=false`表示锁已释放
    /// 3. 唤醒等待该锁的线程
    /// 4. 释放内部自旋锁
    fn unlock(&self) {
        let guard = self.lock.lock();
        self.locked.set(false);
        self.holder.set(-1);
        process::wakeup(self.locked.as_ptr() as usize);
        drop(guard);
    }
}

/// 睡眠锁守卫，提供对受保护数据的访问
///
/// 当守卫存在时，表示锁已被持有。
/// 守卫离开作用域时自动释放锁，确保锁的释放。
pub struct SleepLockGuard<'a, T: ?Sized> {
    lock: &'a SleepLock<T>,
    data: &'a mut T,
}

impl<'a, T: ?Sized> SleepLockGuard<'a, T> {
    /// 当前 CPU 是否是该守卫对应睡眠锁的持有者。
    ///
    /// 守卫被转移到其他线程后返回 `false`。
    pub fn holding(&self) -> bool {
        self.lock.holding()
    }
}

impl<'a, T: ?Sized> Deref for SleepLockGuard<'a, T> {
    type Target = T;
    /// 解引用获取数据的不可变引用
    fn deref(&self) -> &T {
        &*self.data
    }
}

impl<'a, T: ?Sized> DerefMut for SleepLockGuard<'a, T> {
    /// 解引用获取数据的可变引用
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.data
    }
}

impl<'a, T: ?Sized> Drop for SleepLockGuard<'a, T> {
    /// 当守卫离开作用域时自动释放锁
    ///
    /// 通过调用关联睡眠锁的`unlock()`方法实现：
    /// 1. 标记锁为可用状态
    /// 2. 唤醒等待该锁的线程
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
