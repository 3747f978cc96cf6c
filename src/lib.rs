//! 内核块缓存
//!
//! 固定大小的磁盘块缓冲池，按块号分桶加锁，是所有内核线程并发访问磁盘块的同步点。
//! 自旋锁、睡眠锁、睡眠/唤醒以及块设备驱动以宿主环境中的实现提供。

#![warn(rust_2018_idioms)]

pub mod consts;
pub mod driver;
pub mod fs;
pub mod process;
pub mod sleeplock;
pub mod spinlock;

pub use driver::{BlockDevice, DiskError, RamDisk};
pub use fs::{Bcache, Buf, BufData, BufPin, CacheStats};
