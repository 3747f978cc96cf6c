//! 内存盘驱动
//!
//! 用一段内存模拟单个块设备，供缓存层在没有真实磁盘的环境下运行与测试。

use std::collections::BTreeSet;

use core::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use super::{BlockDevice, DiskError};
use crate::fs::BufData;
use crate::sleeplock::SleepLock;
use crate::spinlock::SpinLock;

/// 内存盘。
///
/// 块内容由睡眠锁保护，与真实磁盘一样，读写期间调用者可能睡眠。
/// 可以对指定块注入故障，让对它的读写返回 [`DiskError::Io`]，直到清除为止。
pub struct RamDisk {
    dev: u32,
    blocks: SleepLock<Vec<BufData>>,
    faults: SpinLock<BTreeSet<u32>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl RamDisk {
    /// 创建设备号为 `dev`、容量为 `nblocks` 个块的内存盘，内容全部为零。
    pub fn new(dev: u32, nblocks: u32) -> Self {
        Self {
            dev,
            blocks: SleepLock::new(vec![BufData::new(); nblocks as usize], "ramdisk"),
            faults: SpinLock::new(BTreeSet::new(), "ramdisk.faults"),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn dev(&self) -> u32 {
        self.dev
    }

    /// 成功完成的读次数
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// 成功完成的写次数
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// 之后对 `blockno` 的读写都返回 I/O 错误。
    pub fn inject_fault(&self, blockno: u32) {
        self.faults.lock().insert(blockno);
    }

    pub fn clear_fault(&self, blockno: u32) {
        self.faults.lock().remove(&blockno);
    }

    /// 绕过缓存直接读取盘上内容，不计入读次数。
    pub fn peek(&self, blockno: u32) -> Option<BufData> {
        self.blocks.lock().get(blockno as usize).copied()
    }

    /// 绕过缓存直接写入盘上内容，不计入写次数。
    pub fn poke(&self, blockno: u32, data: &BufData) -> Result<(), DiskError> {
        let mut blocks = self.blocks.lock();
        let slot = blocks.get_mut(blockno as usize).ok_or(DiskError::OutOfRange {
            dev: self.dev,
            blockno,
        })?;
        *slot = *data;
        Ok(())
    }

    fn check(&self, dev: u32, blockno: u32) -> Result<(), DiskError> {
        if dev != self.dev {
            return Err(DiskError::NoDevice(dev));
        }
        if self.faults.lock().contains(&blockno) {
            return Err(DiskError::Io { dev, blockno });
        }
        Ok(())
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, dev: u32, blockno: u32, data: &mut BufData) -> Result<(), DiskError> {
        self.check(dev, blockno)?;
        let blocks = self.blocks.lock();
        let src = blocks
            .get(blockno as usize)
            .ok_or(DiskError::OutOfRange { dev, blockno })?;
        *data = *src;
        drop(blocks);
        self.reads.fetch_add(1, Ordering::Relaxed);
        debug!("ramdisk: read dev {} block {}", dev, blockno);
        Ok(())
    }

    fn write_block(&self, dev: u32, blockno: u32, data: &BufData) -> Result<(), DiskError> {
        self.check(dev, blockno)?;
        let mut blocks = self.blocks.lock();
        let dst = blocks
            .get_mut(blockno as usize)
            .ok_or(DiskError::OutOfRange { dev, blockno })?;
        *dst = *data;
        drop(blocks);
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!("ramdisk: write dev {} block {}", dev, blockno);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_back_written_block() {
        let disk = RamDisk::new(1, 8);
        let mut data = BufData::new();
        data[..5].copy_from_slice(b"hello");
        disk.write_block(1, 3, &data).unwrap();

        let mut out = BufData::new();
        disk.read_block(1, 3, &mut out).unwrap();
        assert_eq!(&out[..5], b"hello");
        assert_eq!(disk.reads(), 1);
        assert_eq!(disk.writes(), 1);
    }

    #[test]
    fn rejects_foreign_device_and_range() {
        let disk = RamDisk::new(1, 8);
        let mut out = BufData::new();
        assert_eq!(disk.read_block(2, 0, &mut out), Err(DiskError::NoDevice(2)));
        assert_eq!(
            disk.read_block(1, 8, &mut out),
            Err(DiskError::OutOfRange { dev: 1, blockno: 8 })
        );
        assert_eq!(disk.reads(), 0);
    }

    #[test]
    fn injected_fault_until_cleared() {
        let disk = RamDisk::new(0, 4);
        let data = BufData::new();
        disk.inject_fault(2);
        assert_eq!(
            disk.write_block(0, 2, &data),
            Err(DiskError::Io { dev: 0, blockno: 2 })
        );
        disk.clear_fault(2);
        assert!(disk.write_block(0, 2, &data).is_ok());
    }
}
