use chrono::Duration;
use constellation_cache::{CacheBackendExt, InMemoryCacheBackend};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn cache_set_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("in-memory cache set", |b| {
        b.to_async(&runtime).iter(|| async {
            let backend = InMemoryCacheBackend::new();
            backend.set("bench-key", black_box(42i64), Duration::seconds(60)).await.unwrap();
        });
    });
}

fn cache_get_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("in-memory cache get", |b| {
        b.to_async(&runtime).iter(|| async {
            let backend = InMemoryCacheBackend::new();
            backend.set("bench-key", 42i64, Duration::seconds(60)).await.unwrap();
            backend.get::<i64>(black_box("bench-key")).await.unwrap();
        });
    });
}

criterion_group!(benches, cache_set_benchmark, cache_get_benchmark);
criterion_main!(benches);
