//! Criterion benchmarks for the TTL cache: add, get hit/miss, full sweep.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use reapcache_cache::TtlCache;
use reapcache_core::CacheConfig;

fn quiet_config(ttl: Duration) -> CacheConfig {
    CacheConfig::new()
        .ttl(ttl)
        .sweep_interval(Duration::from_secs(3600))
}

fn bench_add(c: &mut Criterion) {
    let (cache, _reaper) = TtlCache::new(quiet_config(Duration::from_secs(3600))).unwrap();
    let payload = vec![0u8; 1024];
    let mut g = c.benchmark_group("add");
    g.throughput(Throughput::Elements(1));
    g.bench_function("add_1k_payload", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            cache.add(format!("key-{}", i % 10_000), payload.clone()).unwrap();
        });
    });
    g.finish();
}

fn bench_get(c: &mut Criterion) {
    let (cache, _reaper) = TtlCache::new(quiet_config(Duration::from_secs(3600))).unwrap();
    for i in 0..10_000 {
        cache.add(format!("key-{i}"), vec![1u8; 64]).unwrap();
    }
    let mut g = c.benchmark_group("get");
    g.throughput(Throughput::Elements(1));
    g.bench_function("hit", |b| {
        b.iter(|| black_box(cache.get("key-4242")).unwrap());
    });
    g.bench_function("miss", |b| {
        b.iter(|| black_box(cache.get("absent")).is_err());
    });
    g.finish();
}

fn bench_reap(c: &mut Criterion) {
    let (cache, _reaper) = TtlCache::new(quiet_config(Duration::from_millis(1))).unwrap();
    let mut g = c.benchmark_group("reap");
    g.throughput(Throughput::Elements(10_000));
    g.bench_function("reap_10k_stale", |b| {
        b.iter_batched(
            || {
                for i in 0..10_000 {
                    cache.add(format!("key-{i}"), vec![1u8; 16]).unwrap();
                }
                std::thread::sleep(Duration::from_millis(2));
            },
            |_| black_box(cache.reap()),
            BatchSize::PerIteration,
        );
    });
    g.finish();
}

criterion_group!(benches, bench_add, bench_get, bench_reap);
criterion_main!(benches);
