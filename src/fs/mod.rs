//! 文件系统模块
//!
//! 目前只包含块缓存层，文件系统的其余部分通过它访问磁盘块。

mod bio;

pub use bio::{Bcache, Buf, BufData, BufPin, CacheStats};
