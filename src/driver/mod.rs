//! 设备驱动模块
//!
//! 缓存层只通过 [`BlockDevice`] 访问磁盘：一次读或写一个完整的块，
//! 调用期间当前线程可能睡眠，因此调用者不得持有任何自旋锁。

use thiserror::Error;

use crate::fs::BufData;

pub mod ramdisk;

pub use ramdisk::RamDisk;

/// 块设备读写失败的原因。
///
/// 缓存层不解释这些错误，原样交给调用者决定是否重试。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    /// 块号超出设备容量
    #[error("dev {dev}: block {blockno} out of range")]
    OutOfRange { dev: u32, blockno: u32 },

    /// 该驱动不服务这个设备号
    #[error("no such device {0}")]
    NoDevice(u32),

    /// 设备报告了传输错误
    #[error("dev {dev}: i/o error on block {blockno}")]
    Io { dev: u32, blockno: u32 },
}

/// 块设备驱动需要提供的接口。
pub trait BlockDevice: Send + Sync {
    /// 把 `(dev, blockno)` 的内容读入 `data`，可能睡眠。
    fn read_block(&self, dev: u32, blockno: u32, data: &mut BufData) -> Result<(), DiskError>;

    /// 把 `data` 写到 `(dev, blockno)`，返回时数据已落盘，可能睡眠。
    fn write_block(&self, dev: u32, blockno: u32, data: &BufData) -> Result<(), DiskError>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    fn read_block(&self, dev: u32, blockno: u32, data: &mut BufData) -> Result<(), DiskError> {
        (**self).read_block(dev, blockno, data)
    }

    fn write_block(&self, dev: u32, blockno: u32, data: &BufData) -> Result<(), DiskError> {
        (**self).write_block(dev, blockno, data)
    }
}
