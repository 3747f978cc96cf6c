use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crossbeam_utils::thread;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use xv6_bcache::consts::fs::{NBUCKET, NBUF};
use xv6_bcache::{Bcache, BufData, RamDisk};

/// 每个块的前 4 字节写入块号，便于检查读到的是不是正确的块。
fn numbered_disk(nblocks: u32) -> RamDisk {
    let disk = RamDisk::new(0, nblocks);
    for blockno in 0..nblocks {
        let mut data = BufData::new();
        data[..4].copy_from_slice(&blockno.to_le_bytes());
        disk.poke(blockno, &data).unwrap();
    }
    disk
}

fn counter(data: &BufData) -> u32 {
    u32::from_le_bytes([data[4], data[5], data[6], data[7]])
}

#[test]
fn pool_geometry() {
    assert_eq!(NBUF, 30);
    assert_eq!(NBUCKET, 13);
}

#[test]
fn write_then_read_from_another_cpu_hits() {
    let disk = RamDisk::new(0, 32);
    let bcache = Bcache::new(&disk);

    thread::scope(|s| {
        s.spawn(|_| {
            let mut b = bcache.bread(0, 5).unwrap();
            b.data_mut()[0] = b'X';
            b.bwrite().unwrap();
            b.brelse();
        });
    })
    .unwrap();

    thread::scope(|s| {
        s.spawn(|_| {
            let b = bcache.bread(0, 5).unwrap();
            assert_eq!(b.data()[0], b'X');
            b.brelse();
        });
    })
    .unwrap();

    assert_eq!(disk.reads(), 1);
    assert_eq!(disk.writes(), 1);
    assert_eq!(disk.peek(5).unwrap()[0], b'X');
    let stats = bcache.stats();
    assert_eq!((stats.misses, stats.hits), (1, 1));
}

#[test]
fn saturated_bucket_borrows_idle_buffer() {
    let disk = numbered_disk(64);
    let bcache = Bcache::new(&disk);

    // 0 号桶的三个缓冲块都被钉住
    let pins: Vec<_> = [0u32, 13, 26]
        .iter()
        .map(|&blockno| bcache.bread(0, blockno).unwrap().pin())
        .collect();

    let b = bcache.bread(0, 39).unwrap();
    assert_eq!(&b.data()[..4], &39u32.to_le_bytes());
    b.brelse();
    assert_eq!(bcache.stats().steals, 1);
    assert_eq!(bcache.bcheck(), NBUF);

    for pin in pins {
        pin.unpin();
    }
    assert_eq!(bcache.bcheck(), NBUF);
}

#[test]
#[should_panic(expected = "bget: no buffers")]
fn saturated_pool_is_fatal() {
    let disk = RamDisk::new(0, 64);
    let bcache = Bcache::new(&disk);
    let _pins: Vec<_> = (0..NBUF as u32)
        .map(|blockno| bcache.bread(0, blockno).unwrap().pin())
        .collect();
    let _ = bcache.bread(0, 39);
}

#[test]
fn pinned_block_survives_many_cycles() {
    let disk = numbered_disk(512);
    let bcache = Bcache::new(&disk);

    let pin = {
        let mut b = bcache.bread(0, 1).unwrap();
        b.data_mut()[8] = 0x5a;
        b.pin()
    };
    for blockno in 2..512 {
        bcache.bread(0, blockno).unwrap().brelse();
    }
    let reads = disk.reads();
    let b = pin.bread().unwrap();
    assert_eq!(b.data()[8], 0x5a);
    assert_eq!(disk.reads(), reads);
    b.brelse();
    pin.unpin();
}

#[test]
fn same_block_is_never_shared() {
    let disk = RamDisk::new(0, 16);
    let bcache = Bcache::new(&disk);
    let inside = AtomicUsize::new(0);

    thread::scope(|s| {
        for t in 0..8u8 {
            let bcache = &bcache;
            let inside = &inside;
            s.spawn(move |_| {
                for _ in 0..200 {
                    let mut b = bcache.bread(0, 3).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    let first = b.data()[0];
                    assert!(b.data().iter().all(|&x| x == first), "torn block");
                    b.data_mut().fill(t);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    b.brelse();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(disk.reads(), 1);
    assert_eq!(bcache.stats().hits, 8 * 200 - 1);
}

#[test]
fn random_workload_keeps_cache_consistent() {
    const NBLOCKS: u32 = 64;
    let disk = numbered_disk(NBLOCKS);
    let bcache = Bcache::new(&disk);
    let writes: Vec<AtomicU32> = (0..NBLOCKS).map(|_| AtomicU32::new(0)).collect();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let bcache = &bcache;
        let writes = &writes;
        let done = &done;

        s.spawn(move |_| {
            while !done.load(Ordering::Acquire) {
                bcache.bcheck();
            }
        });

        let workers: Vec<_> = (0..8u64)
            .map(|seed| {
                s.spawn(move |_| {
                    let mut rng = StdRng::seed_from_u64(seed);
                    for _ in 0..2000 {
                        let blockno = rng.gen_range(0..NBLOCKS);
                        let mut b = bcache.bread(0, blockno).unwrap();
                        assert_eq!(&b.data()[..4], &blockno.to_le_bytes());
                        if rng.gen_bool(0.3) {
                            let n = counter(b.data()) + 1;
                            b.data_mut()[4..8].copy_from_slice(&n.to_le_bytes());
                            b.bwrite().unwrap();
                            writes[blockno as usize].fetch_add(1, Ordering::Relaxed);
                        }
                        b.brelse();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Release);
    })
    .unwrap();

    assert_eq!(bcache.bcheck(), NBUF);
    for blockno in 0..NBLOCKS {
        let expected = writes[blockno as usize].load(Ordering::Relaxed);
        let b = bcache.bread(0, blockno).unwrap();
        assert_eq!(counter(b.data()), expected, "block {}", blockno);
        b.brelse();
        assert_eq!(counter(&disk.peek(blockno).unwrap()), expected);
    }
}

#[test]
fn hot_buckets_migrate_without_deadlock() {
    const PER_THREAD: usize = 4;
    let disk = numbered_disk(300);
    let bcache = Bcache::new(&disk);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let bcache = &bcache;
        let done = &done;

        s.spawn(move |_| {
            while !done.load(Ordering::Acquire) {
                bcache.bcheck();
            }
        });

        // 6 个线程，每个同时持有 4 个块，最多 24 个引用，不会耗尽 30 个缓冲块
        let workers: Vec<_> = (0..6u64)
            .map(|t| {
                s.spawn(move |_| {
                    let mut rng = StdRng::seed_from_u64(0x5eed + t);
                    let bucket = (t % 2) as u32;
                    for _ in 0..300 {
                        let mut ks = index::sample(&mut rng, 20, PER_THREAD).into_vec();
                        // 按块号递增的顺序获取，避免睡眠锁之间的环形等待
                        ks.sort_unstable();
                        let held: Vec<_> = ks
                            .iter()
                            .map(|&k| {
                                let blockno = k as u32 * NBUCKET as u32 + bucket;
                                let b = bcache.bread(0, blockno).unwrap();
                                assert_eq!(&b.data()[..4], &blockno.to_le_bytes());
                                b
                            })
                            .collect();
                        drop(held);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Release);
    })
    .unwrap();

    assert_eq!(bcache.bcheck(), NBUF);
    assert!(bcache.stats().steals > 0);
}
