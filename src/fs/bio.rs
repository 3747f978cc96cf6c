//! 缓存层
//!
//! 块缓存由 `NBUF` 个缓冲块组成，按块号散列到 `NBUCKET` 个桶中。
//! 每个桶有自己的自旋锁和一条按最近使用排序的双向链表，
//! 常见路径（命中，或本桶内有空闲块可回收）只会碰到一个桶的锁。
//! 某个桶内的缓冲块全部被引用时，才走跨桶回收的慢路径，
//! 由全局的 arena 锁串行化。
//!
//! 使用方式：
//! * 通过 `bread` 获取某个磁盘块的缓冲块，返回时已持有它的睡眠锁；
//! * 修改数据后调用 `bwrite` 写回磁盘；
//! * 用完后调用 `brelse`（或直接丢弃 `Buf`），之后不得再使用该缓冲块；
//! * 同一时刻只有一个线程能使用某个缓冲块，因此不要长时间持有。

use array_macro::array;
use crossbeam_utils::{Backoff, CachePadded};
use log::{debug, error, info, trace, warn};

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::consts::fs::{BSIZE, NBUCKET, NBUF};
use crate::driver::{BlockDevice, DiskError};
use crate::sleeplock::{SleepLock, SleepLockGuard};
use crate::spinlock::SpinLock;

/// 每个桶链接表中哨兵节点的下标，紧跟在 `NBUF` 个缓冲块之后。
const SENTINEL: usize = NBUF;

/// 不在当前桶链表中的缓冲块的前后指针取值。
const UNLINKED: usize = usize::MAX;

/// 磁盘块缓冲区缓存（Buffer Cache）。
///
/// `Bcache` 提供一个固定大小的内存缓冲区池，用于缓存磁盘块数据，
/// 以减少重复的磁盘访问，同时是多个线程并发访问同一磁盘块时唯一的同步点。
///
/// 锁分两级：
/// - 桶的自旋锁保护该桶链表的结构，以及链表中每个缓冲块的身份 `(dev, blockno)` 与引用计数；
/// - 缓冲块的睡眠锁保护块数据，可以跨越磁盘 I/O 持有。
///
/// 该结构在初始化阶段构造一次，之后以共享引用的形式传给所有使用者，从不扩容。
pub struct Bcache<D> {
    /// 散列桶，每个桶独占一条缓存行，避免不同桶的锁互相干扰。
    buckets: [CachePadded<Bucket>; NBUCKET],

    /// 跨桶迁移缓冲块时持有的全局锁。
    ///
    /// 加锁顺序固定为：请求桶 → arena → 受害桶。
    arena: SpinLock<()>,

    /// 缓冲块数组，下标即缓冲块编号。
    bufs: [BufInner; NBUF],

    disk: D,
    stats: Stats,
}

impl<D: BlockDevice> Bcache<D> {
    /// 创建缓冲区缓存，所有缓冲块按编号轮流分配给各个桶。
    pub fn new(disk: D) -> Self {
        let bcache = Self {
            buckets: array![id => CachePadded::new(Bucket::new(id)); NBUCKET],
            arena: SpinLock::new((), "bcache"),
            bufs: array![i => BufInner::new(i % NBUCKET); NBUF],
            disk,
            stats: Stats::default(),
        };
        bcache.binit();
        bcache
    }

    /// 把每个缓冲块挂到它初始所属桶的链表上。
    fn binit(&self) {
        for (index, buf) in self.bufs.iter().enumerate() {
            let bucket = &self.buckets[buf.bucket.load(Ordering::Relaxed)];
            bucket.lru.lock().push_front(index);
            bucket.idle.fetch_add(1, Ordering::Relaxed);
        }
        info!(
            "bcache: {} buffers of {} bytes in {} buckets",
            NBUF, BSIZE, NBUCKET
        );

        #[cfg(feature = "verbose_init_info")]
        for (id, bucket) in self.buckets.iter().enumerate() {
            info!(
                "bcache: bucket {} holds {} buffers",
                id,
                bucket.idle.load(Ordering::Relaxed)
            );
        }
    }

    /// 底层块设备
    pub fn device(&self) -> &D {
        &self.disk
    }

    /// 当前统计信息的快照
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// 获取指定设备与块号对应的缓冲块，返回时已持有它的睡眠锁。
    ///
    /// # 功能说明
    /// `bget` 是缓冲区缓存的底层接口，只负责找到或分配缓冲块，不涉及磁盘读写。
    /// 调用者通过 `valid` 标志判断是否需要从磁盘加载数据。
    ///
    /// # 流程解释
    /// - 计算桶号 `blockno % NBUCKET` 并锁住该桶；
    /// - 从链表头（最近使用端）向后扫描一遍：
    ///   - 命中则增加引用计数，释放桶锁后获取睡眠锁并返回；
    ///   - 扫描时记下遇到的最后一个空闲块，即最接近最久未使用端的那个；
    /// - 未命中但有空闲块时就地回收：改写身份、清除 `valid`、引用计数置 1；
    /// - 本桶没有空闲块时，保持桶锁进入 `steal` 从其他桶迁移一个空闲块。
    ///
    /// # 可能的错误
    /// - 整个缓存池都没有空闲块时 panic（`"bget: no buffers"`）。
    ///
    /// # 安全性
    /// - 身份和引用计数的修改都在桶锁内完成，同一块不会同时出现在两个被引用的缓冲块中；
    /// - 获取睡眠锁前已释放所有自旋锁。
    fn bget(&self, dev: u32, blockno: u32) -> Buf<'_, D> {
        let id = blockno as usize % NBUCKET;
        let bucket = &self.buckets[id];
        let mut lru = bucket.lru.lock();

        let index = match lru.scan(dev, blockno) {
            Scan::Cached(index) => {
                if lru.inner[index].refcnt == 0 {
                    bucket.idle.fetch_sub(1, Ordering::Relaxed);
                }
                lru.inner[index].refcnt += 1;
                drop(lru);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                trace!("bget: dev {} block {} hit buffer {}", dev, blockno, index);
                return self.lock_buf(index, dev, blockno);
            }
            Scan::Idle(index) => {
                lru.assign(index, dev, blockno);
                bucket.idle.fetch_sub(1, Ordering::Relaxed);
                self.bufs[index].valid.store(false, Ordering::Relaxed);
                drop(lru);
                trace!("bget: dev {} block {} recycled buffer {}", dev, blockno, index);
                index
            }
            Scan::Full => {
                let index = self.steal(id, &mut lru, dev, blockno);
                drop(lru);
                index
            }
        };

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.lock_buf(index, dev, blockno)
    }

    /// 从其他桶迁移一个空闲缓冲块到桶 `id`，并赋予新的身份。
    ///
    /// # 功能说明
    /// 仅在桶 `id` 内所有缓冲块都被引用时调用，调用者持有桶 `id` 的锁（即 `lru`）。
    /// 按编号线性扫描整个缓存池，找到第一个空闲块后把它从原桶摘下、挂到桶 `id` 的最近使用端。
    ///
    /// # 流程解释
    /// 1. 获取 arena 锁，串行化所有跨桶迁移；
    /// 2. 跳过已经属于桶 `id` 的缓冲块，以及空闲计数为 0 的桶；
    /// 3. 用 `try_lock` 获取受害桶的锁，失败则记为“有竞争”并继续扫描；
    /// 4. 在受害桶锁内重新确认引用计数为 0，随后摘链、挂链、更新所属桶号，
    ///    身份与引用计数随之写入桶 `id` 的链接表，最后释放受害桶锁；
    /// 5. 扫描一圈都没有找到时：若有竞争则释放 arena 锁稍后重试，否则缓存池已耗尽。
    ///
    /// # 可能的错误
    /// - 缓存池耗尽时 panic（`"bget: no buffers"`），调用者无法在不冒自锁风险的前提下等待。
    ///
    /// # 安全性
    /// - 受害桶只用 `try_lock` 获取：另一条慢路径可能正持有它作为请求桶并等待 arena 锁，
    ///   阻塞等待会形成环形等待。这样的桶内没有空闲块，跳过它不会错过候选；
    /// - 迁移期间同时持有两个桶的锁，缓冲块不会同时出现在两条链表中。
    fn steal(&self, id: usize, lru: &mut BufLru, dev: u32, blockno: u32) -> usize {
        let backoff = Backoff::new();
        loop {
            let arena = self.arena.lock();
            let mut contended = false;

            for (index, buf) in self.bufs.iter().enumerate() {
                // 所属桶号只在持有 arena 锁时改变
                let old = buf.bucket.load(Ordering::Relaxed);
                if old == id {
                    continue;
                }
                let victim = &self.buckets[old];
                if victim.idle.load(Ordering::Relaxed) == 0 {
                    continue;
                }
                let mut vlru = match victim.lru.try_lock() {
                    Some(vlru) => vlru,
                    None => {
                        contended = true;
                        continue;
                    }
                };
                if vlru.inner[index].refcnt != 0 {
                    continue;
                }

                vlru.unlink(index);
                victim.idle.fetch_sub(1, Ordering::Relaxed);
                lru.push_front(index);
                lru.assign(index, dev, blockno);
                buf.bucket.store(id, Ordering::Release);
                buf.valid.store(false, Ordering::Relaxed);
                drop(vlru);
                drop(arena);

                self.stats.steals.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "bget: dev {} block {} stole buffer {} from bucket {} into bucket {}",
                    dev, blockno, index, old, id
                );
                return index;
            }

            drop(arena);
            if !contended {
                error!(
                    "bget: dev {} block {}: all {} buffers are referenced",
                    dev, blockno, NBUF
                );
                panic!("bget: no buffers");
            }
            backoff.snooze();
        }
    }

    /// 获取缓冲块 `index` 的睡眠锁，此时不得持有任何自旋锁。
    fn lock_buf(&self, index: usize, dev: u32, blockno: u32) -> Buf<'_, D> {
        Buf {
            index,
            dev,
            blockno,
            bcache: self,
            data: Some(self.bufs[index].data.lock()),
        }
    }

    /// 从缓冲区缓存中读取指定设备与块号对应的数据。
    ///
    /// # 功能说明
    /// 对外提供的读取接口。若缓冲块尚未从磁盘加载（`valid` 为 false），
    /// 会在持有睡眠锁的情况下调用块设备读取一次，然后置 `valid`。
    ///
    /// # 返回值
    /// - `Ok(Buf)`：持有睡眠锁的缓冲块；
    /// - `Err(DiskError)`：磁盘读取失败，缓冲块已释放且保持无效，错误原样返回。
    ///
    /// # 可能的错误
    /// - 缓存池耗尽时 panic，见 `bget`。
    pub fn bread(&self, dev: u32, blockno: u32) -> Result<Buf<'_, D>, DiskError> {
        let mut b = self.bget(dev, blockno);
        let inner = &self.bufs[b.index];
        if !inner.valid.load(Ordering::Relaxed) {
            if let Err(err) = self.disk.read_block(dev, blockno, b.data_mut()) {
                warn!("bread: dev {} block {}: {}", dev, blockno, err);
                return Err(err);
            }
            self.stats.disk_reads.fetch_add(1, Ordering::Relaxed);
            inner.valid.store(true, Ordering::Relaxed);
        }
        Ok(b)
    }

    /// 释放缓冲块的一次引用（睡眠锁已由调用者释放）。
    ///
    /// 引用计数归零时把缓冲块移到所属桶链表的最近使用端，
    /// 它将是之后扫描中最后被选中回收的空闲块。
    fn brelse(&self, index: usize) {
        let id = self.bufs[index].bucket.load(Ordering::Acquire);
        let bucket = &self.buckets[id];
        let mut lru = bucket.lru.lock();
        let b = &mut lru.inner[index];
        match b.refcnt.checked_sub(1) {
            Some(n) => b.refcnt = n,
            None => panic!("brelse: refcnt"),
        }
        if b.refcnt == 0 {
            lru.unlink(index);
            lru.push_front(index);
            bucket.idle.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 增加缓冲块 `index` 的引用计数，调用者必须已经持有一次引用。
    fn bpin(&self, index: usize) {
        let id = self.bufs[index].bucket.load(Ordering::Acquire);
        let mut lru = self.buckets[id].lru.lock();
        let b = &mut lru.inner[index];
        if b.refcnt == 0 {
            panic!("bpin");
        }
        b.refcnt += 1;
    }

    /// 减少缓冲块 `index` 的引用计数，归零后它重新成为可回收的候选，链表位置不变。
    fn bunpin(&self, index: usize) {
        let id = self.bufs[index].bucket.load(Ordering::Acquire);
        let bucket = &self.buckets[id];
        let mut lru = bucket.lru.lock();
        let b = &mut lru.inner[index];
        match b.refcnt.checked_sub(1) {
            Some(n) => b.refcnt = n,
            None => panic!("bunpin"),
        }
        if b.refcnt == 0 {
            bucket.idle.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 检查各个桶的一致性，返回所有桶链表中的缓冲块总数。
    ///
    /// 每次只持有一个桶的锁，可以与其他操作并发执行；
    /// 并发执行时返回的总数只是近似值，静止状态下应等于 `NBUF`。
    ///
    /// # 检查内容
    /// - 链表前后指针互相对应；
    /// - 链表中每个缓冲块记录的所属桶号都是该桶；
    /// - 已赋予的身份都散列到该桶，且在桶内唯一；
    /// - 空闲计数等于链表中引用计数为 0 的缓冲块数。
    pub fn bcheck(&self) -> usize {
        let mut total = 0;
        for (id, bucket) in self.buckets.iter().enumerate() {
            let lru = bucket.lru.lock();
            assert_eq!(lru.id, id, "bcheck: bucket id");

            let mut members: [Option<(u32, u32)>; NBUF] = [None; NBUF];
            let mut count = 0;
            let mut idle = 0;
            let mut prev = SENTINEL;
            let mut b = lru.inner[SENTINEL].next;
            while b != SENTINEL {
                assert!(b < NBUF, "bcheck: bucket {} corrupt link", id);
                assert_eq!(lru.inner[b].prev, prev, "bcheck: bucket {} prev link", id);
                assert_eq!(
                    self.bufs[b].bucket.load(Ordering::Relaxed),
                    id,
                    "bcheck: buffer {} linked in bucket {}",
                    b,
                    id
                );
                let ctrl = &lru.inner[b];
                if let Some((dev, blockno)) = ctrl.tag {
                    assert_eq!(blockno as usize % NBUCKET, id, "bcheck: misplaced block");
                    assert!(
                        !members.iter().any(|m| *m == Some((dev, blockno))),
                        "bcheck: dev {} block {} cached twice",
                        dev,
                        blockno
                    );
                }
                members[count] = ctrl.tag;
                if ctrl.refcnt == 0 {
                    idle += 1;
                }
                count += 1;
                assert!(count <= NBUF, "bcheck: bucket {} cycle", id);
                prev = b;
                b = ctrl.next;
            }
            assert_eq!(lru.inner[SENTINEL].prev, prev, "bcheck: bucket {} tail", id);
            assert_eq!(
                bucket.idle.load(Ordering::Relaxed),
                idle,
                "bcheck: bucket {} idle count",
                id
            );
            drop(lru);
            total += count;
        }
        total
    }
}

/// 一个散列桶。
struct Bucket {
    lru: SpinLock<BufLru>,

    /// 桶内引用计数为 0 的缓冲块数量。
    ///
    /// 只在持有 `lru` 锁时修改，跨桶回收时不加锁读取，用来跳过没有候选的桶。
    idle: AtomicUsize,
}

impl Bucket {
    fn new(id: usize) -> Self {
        Self {
            lru: SpinLock::new(BufLru::new(id), "bcache.bucket"),
            idle: AtomicUsize::new(0),
        }
    }
}

/// 一次桶内扫描的结果。
enum Scan {
    /// 已缓存该块
    Cached(usize),
    /// 未缓存，可就地回收的空闲块
    Idle(usize),
    /// 未缓存，桶内没有空闲块
    Full,
}

/// 单个桶的 LRU（最近最少使用）链表控制结构。
///
/// 链接以缓冲块编号表示，`inner[i]` 记录缓冲块 `i` 的元信息，
/// 只有当前挂在本桶链表上的缓冲块对应的表项有意义。
/// `inner[SENTINEL]` 是环形链表的哨兵：`next` 一侧是最近使用端，`prev` 一侧是最久未使用端。
struct BufLru {
    id: usize,
    inner: [BufCtrl; NBUF + 1],
}

impl BufLru {
    fn new(id: usize) -> Self {
        let mut lru = Self {
            id,
            inner: array![_ => BufCtrl::new(); NBUF + 1],
        };
        lru.inner[SENTINEL].prev = SENTINEL;
        lru.inner[SENTINEL].next = SENTINEL;
        lru
    }

    /// 从最近使用端向后扫描一遍，查找 `(dev, blockno)`。
    ///
    /// 未命中时返回扫描中遇到的最后一个空闲块，链表按释放顺序排列，
    /// 所以它就是本桶中最久未使用的空闲块。
    fn scan(&self, dev: u32, blockno: u32) -> Scan {
        let mut idle = None;
        let mut b = self.inner[SENTINEL].next;
        while b != SENTINEL {
            let ctrl = &self.inner[b];
            if ctrl.tag == Some((dev, blockno)) {
                return Scan::Cached(b);
            }
            if ctrl.refcnt == 0 {
                idle = Some(b);
            }
            b = ctrl.next;
        }
        match idle {
            Some(b) => Scan::Idle(b),
            None => Scan::Full,
        }
    }

    /// 为缓冲块 `index` 赋予新的身份，引用计数置 1。
    fn assign(&mut self, index: usize, dev: u32, blockno: u32) {
        let ctrl = &mut self.inner[index];
        debug_assert_eq!(ctrl.refcnt, 0);
        ctrl.tag = Some((dev, blockno));
        ctrl.refcnt = 1;
    }

    /// 把缓冲块 `index` 插入到最近使用端。
    fn push_front(&mut self, index: usize) {
        let first = self.inner[SENTINEL].next;
        self.inner[index].prev = SENTINEL;
        self.inner[index].next = first;
        self.inner[first].prev = index;
        self.inner[SENTINEL].next = index;
    }

    /// 把缓冲块 `index` 从链表中摘下。
    fn unlink(&mut self, index: usize) {
        let BufCtrl { prev, next, .. } = self.inner[index];
        debug_assert!(prev != UNLINKED && next != UNLINKED);
        self.inner[prev].next = next;
        self.inner[next].prev = prev;
        self.inner[index].prev = UNLINKED;
        self.inner[index].next = UNLINKED;
    }
}

/// 缓冲块控制结构，记录缓冲块在某个桶中的元信息。
#[derive(Clone, Copy)]
struct BufCtrl {
    /// 缓冲块当前缓存的 `(dev, blockno)`，从未使用过的缓冲块为 `None`。
    tag: Option<(u32, u32)>,

    /// 引用计数：持有或等待睡眠锁的使用者数量，加上 pin 的数量。
    /// 为 0 时可被回收。
    refcnt: usize,

    prev: usize,
    next: usize,
}

impl BufCtrl {
    const fn new() -> Self {
        Self {
            tag: None,
            refcnt: 0,
            prev: UNLINKED,
            next: UNLINKED,
        }
    }
}

/// 缓冲块的数据部分。
struct BufInner {
    /// 当前所属的桶号。
    ///
    /// 只在持有 arena 锁以及迁移涉及的两个桶锁时修改。
    /// 持有引用的使用者可以直接读取，引用计数非 0 的缓冲块不会被迁移。
    bucket: AtomicUsize,

    /// 数据是否已从磁盘加载。
    ///
    /// 赋予新身份时在桶锁内清除，之后只在持有 `data` 睡眠锁时读写。
    valid: AtomicBool,

    /// 块数据，由睡眠锁保护，可以跨越磁盘 I/O 持有。
    data: SleepLock<BufData>,
}

impl BufInner {
    fn new(bucket: usize) -> Self {
        Self {
            bucket: AtomicUsize::new(bucket),
            valid: AtomicBool::new(false),
            data: SleepLock::new(BufData::new(), "buffer"),
        }
    }
}

/// 持有睡眠锁的缓冲块。
///
/// 由 `bread` 创建，持有期间独占块数据；
/// 离开作用域或调用 `brelse` 时释放睡眠锁并归还引用。
pub struct Buf<'a, D: BlockDevice> {
    index: usize,
    dev: u32,
    blockno: u32,
    bcache: &'a Bcache<D>,

    /// 在 `Buf` 生命周期内始终为 `Some`，`Drop` 时先取出以便先释放睡眠锁。
    data: Option<SleepLockGuard<'a, BufData>>,
}

impl<'a, D: BlockDevice> Buf<'a, D> {
    pub fn dev(&self) -> u32 {
        self.dev
    }

    pub fn read_blockno(&self) -> u32 {
        self.blockno
    }

    pub fn data(&self) -> &BufData {
        match self.data.as_ref() {
            Some(guard) => &**guard,
            None => unreachable!(),
        }
    }

    pub fn data_mut(&mut self) -> &mut BufData {
        match self.data.as_mut() {
            Some(guard) => &mut **guard,
            None => unreachable!(),
        }
    }

    /// 当前线程是否持有该缓冲块的睡眠锁。
    pub fn holding(&self) -> bool {
        self.bcache.bufs[self.index].data.holding()
    }

    /// 把缓冲块的内容同步写回磁盘。
    ///
    /// 不改变 `valid` 与链表位置。
    ///
    /// # 可能的错误
    /// - 当前线程没有持有睡眠锁时 panic（`"bwrite"`），这是调用者的逻辑错误；
    /// - 磁盘写失败时原样返回 `DiskError`。
    pub fn bwrite(&mut self) -> Result<(), DiskError> {
        if !self.holding() {
            panic!("bwrite");
        }
        self.bcache
            .disk
            .write_block(self.dev, self.blockno, self.data())?;
        self.bcache.stats.disk_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 释放缓冲块，等价于丢弃 `Buf`。
    pub fn brelse(self) {
        drop(self);
    }

    /// 将缓冲块的引用计数加一，“钉住”该块，防止其被回收。
    ///
    /// # 功能说明
    /// 返回的 `BufPin` 不持有睡眠锁，可以跨越多次 `bread`/`brelse` 保留，
    /// 期间该块始终留在缓存中，再次 `bread` 不会触发磁盘读取。
    /// `BufPin` 被 `unpin` 或丢弃时引用计数减一。
    pub fn pin(&self) -> BufPin<'a, D> {
        self.bcache.bpin(self.index);
        BufPin {
            index: self.index,
            dev: self.dev,
            blockno: self.blockno,
            bcache: self.bcache,
        }
    }
}

impl<'a, D: BlockDevice> Drop for Buf<'a, D> {
    fn drop(&mut self) {
        if !self.holding() {
            panic!("brelse");
        }
        drop(self.data.take());
        self.bcache.brelse(self.index);
    }
}

impl<'a, D: BlockDevice> fmt::Debug for Buf<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf")
            .field("index", &self.index)
            .field("dev", &self.dev)
            .field("blockno", &self.blockno)
            .finish()
    }
}

/// 对缓冲块的一次 pin 引用，不持有睡眠锁。
pub struct BufPin<'a, D: BlockDevice> {
    index: usize,
    dev: u32,
    blockno: u32,
    bcache: &'a Bcache<D>,
}

impl<'a, D: BlockDevice> BufPin<'a, D> {
    pub fn dev(&self) -> u32 {
        self.dev
    }

    pub fn read_blockno(&self) -> u32 {
        self.blockno
    }

    /// 重新获取被钉住的块，总是命中同一个缓冲块。
    pub fn bread(&self) -> Result<Buf<'a, D>, DiskError> {
        self.bcache.bread(self.dev, self.blockno)
    }

    /// 释放 pin 引用，等价于丢弃 `BufPin`。
    pub fn unpin(self) {
        drop(self);
    }
}

impl<'a, D: BlockDevice> Drop for BufPin<'a, D> {
    fn drop(&mut self) {
        self.bcache.bunpin(self.index);
    }
}

impl<'a, D: BlockDevice> fmt::Debug for BufPin<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufPin")
            .field("index", &self.index)
            .field("dev", &self.dev)
            .field("blockno", &self.blockno)
            .finish()
    }
}

/// BufData 的对齐方式应足以满足可能由此结构体转换而来的其他结构体的需求。
#[derive(Clone, Copy)]
#[repr(C, align(8))]
pub struct BufData([u8; BSIZE]);

impl BufData {
    pub const fn new() -> Self {
        Self([0; BSIZE])
    }
}

impl Default for BufData {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for BufData {
    type Target = [u8; BSIZE];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for BufData {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 命中次数
    pub hits: u64,
    /// 未命中次数（包括跨桶回收）
    pub misses: u64,
    /// 跨桶回收次数
    pub steals: u64,
    /// 磁盘读次数
    pub disk_reads: u64,
    /// 磁盘写次数
    pub disk_writes: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Stats {
    hits: AtomicU64,
    misses: AtomicU64,
    steals: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

impl Stats {
    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
        }
    }
}
