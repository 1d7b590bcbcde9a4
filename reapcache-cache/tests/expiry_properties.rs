use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use proptest::prelude::*;
use reapcache_cache::{ReaperState, TtlCache};
use reapcache_core::CacheConfig;

fn config(ttl_ms: u64, sweep_ms: u64) -> CacheConfig {
    CacheConfig::new()
        .ttl(Duration::from_millis(ttl_ms))
        .sweep_interval(Duration::from_millis(sweep_ms))
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

#[test]
fn scenario_present_then_expired() {
    let (cache, reaper) = TtlCache::new(config(100, 50)).unwrap();
    let t0 = Instant::now();
    cache.add("a", vec![0x01u8, 0x02]).unwrap();

    sleep_until(t0 + Duration::from_millis(30));
    assert_eq!(&cache.get("a").unwrap()[..], &[0x01, 0x02]);

    sleep_until(t0 + Duration::from_millis(160));
    // Allow a little scheduling slack on busy machines.
    let deadline = Instant::now() + Duration::from_millis(500);
    while cache.get("a").is_ok() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(cache.get("a").unwrap_err().is_miss());

    reaper.stop();
}

#[test]
fn entry_not_reaped_before_ttl() {
    let (cache, reaper) = TtlCache::new(config(400, 20)).unwrap();
    let t0 = Instant::now();
    cache.add("k", vec![9u8]).unwrap();

    // Many sweeps run before the entry turns stale.
    while t0.elapsed() < Duration::from_millis(300) {
        assert!(cache.get("k").is_ok(), "entry vanished after {:?}", t0.elapsed());
        thread::sleep(Duration::from_millis(10));
    }
    assert!(reaper.sweeps() >= 3);
}

#[test]
fn entry_gone_within_ttl_plus_interval() {
    let (cache, _reaper) = TtlCache::new(config(50, 50)).unwrap();
    cache.add("k", vec![1u8]).unwrap();
    thread::sleep(Duration::from_millis(50 + 50 + 150));
    assert!(cache.get("k").is_err());
}

#[test]
fn concurrent_writers_and_readers() {
    const WRITERS: usize = 8;
    const READERS: usize = 8;
    const KEYS_PER_WRITER: usize = 200;

    let (cache, reaper) = TtlCache::new(config(60_000, 5)).unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS + READERS));
    let hits = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for w in 0..WRITERS {
        let cache = cache.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..KEYS_PER_WRITER {
                let key = format!("w{w}/k{i}");
                cache.add(key.clone(), Bytes::from(key.into_bytes())).unwrap();
            }
        }));
    }
    for r in 0..READERS {
        let cache = cache.clone();
        let barrier = Arc::clone(&barrier);
        let hits = Arc::clone(&hits);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..KEYS_PER_WRITER {
                let key = format!("w{}/k{}", r % WRITERS, i);
                if let Ok(payload) = cache.get(&key) {
                    // A hit must carry exactly what was written for that key.
                    assert_eq!(&payload[..], key.as_bytes());
                    hits.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), WRITERS * KEYS_PER_WRITER);
    for w in 0..WRITERS {
        for i in 0..KEYS_PER_WRITER {
            let key = format!("w{w}/k{i}");
            assert_eq!(&cache.get(&key).unwrap()[..], key.as_bytes());
        }
    }
    assert!(hits.load(Ordering::Relaxed) <= READERS * KEYS_PER_WRITER);
    assert_ne!(reaper.state(), ReaperState::Stopped);
    reaper.stop();
}

#[test]
fn dropping_handle_stops_reaper() {
    let (cache, reaper) = TtlCache::new(config(10, 5)).unwrap();
    drop(reaper);
    cache.add("k", vec![1u8]).unwrap();
    thread::sleep(Duration::from_millis(60));
    assert!(cache.get("k").is_ok());
    assert_eq!(cache.reap(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a stored payload reads back byte for byte.
    #[test]
    fn prop_round_trip(key in ".*", payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let (cache, _reaper) = TtlCache::with_defaults().unwrap();
        cache.add(key.clone(), payload.clone()).unwrap();
        prop_assert_eq!(&cache.get(&key).unwrap()[..], &payload[..]);
    }

    /// Property: the last write for a key wins.
    #[test]
    fn prop_last_write_wins(
        key in "[a-z/]{0,16}",
        first in proptest::collection::vec(any::<u8>(), 0..64),
        second in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let (cache, _reaper) = TtlCache::with_defaults().unwrap();
        cache.add(key.clone(), first).unwrap();
        cache.add(key.clone(), second.clone()).unwrap();
        prop_assert_eq!(&cache.get(&key).unwrap()[..], &second[..]);
        prop_assert_eq!(cache.len(), 1);
    }

    /// Property: keys never added are misses.
    #[test]
    fn prop_unknown_key_misses(stored in "[a-m]{1,8}", probe in "[n-z]{1,8}") {
        let (cache, _reaper) = TtlCache::with_defaults().unwrap();
        cache.add(stored, vec![1u8]).unwrap();
        prop_assert!(cache.get(&probe).unwrap_err().is_miss());
    }
}
