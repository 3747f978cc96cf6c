//! 编译期常量

pub mod fs {
    /// 单个文件系统操作最多写入的块数
    pub const MAXOPBLOCKS: usize = 10;

    /// 磁盘块缓存中的缓冲块数量
    pub const NBUF: usize = MAXOPBLOCKS * 3;

    /// 缓存分桶数量（素数）
    pub const NBUCKET: usize = 13;

    /// 块大小（字节）
    pub const BSIZE: usize = 1024;
}
