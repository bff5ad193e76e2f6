//! # Keybridge Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Pending registry register + settle | < 5µs |
//! | Resolver cache hit | < 10µs |
//! | Bridge round trip over the in-memory bus | < 1ms |

use api_gateway::{
    ApiKeyResolver, BridgeConfig, CacheStore, CorrelationId, GatewayService, InMemoryCacheStore,
    PendingCallRegistry,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use merchant_registry::{InMemoryMerchantDirectory, LookupResponder};
use shared_bus::InMemoryEventBus;
use shared_types::{ApiKey, LookupReply, MerchantId, LOOKUP_REQUEST_TOPIC};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::watch;

fn bench_pending_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-registry");
    let registry = PendingCallRegistry::new();
    let merchant = MerchantId::new(42).unwrap();

    group.bench_function("register_settle", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let mut rx = registry.register(id, Duration::from_secs(1)).unwrap();
            registry.settle(&id, LookupReply::found(id.to_string(), merchant));
            black_box(rx.try_recv().is_ok())
        })
    });

    group.bench_function("register_cancel", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let _rx = registry.register(id, Duration::from_secs(1)).unwrap();
            black_box(registry.cancel(&id))
        })
    });

    group.finish();
}

fn bench_resolver_cache_hit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("resolver");

    let bus = Arc::new(InMemoryEventBus::new());
    let cache = Arc::new(InMemoryCacheStore::new());
    let gateway = rt
        .block_on(async {
            GatewayService::start(BridgeConfig::default(), Arc::clone(&bus), cache.clone())
        })
        .unwrap();
    let resolver = ApiKeyResolver::new(cache.clone(), gateway.client());

    rt.block_on(async {
        cache
            .set("merchant_api_key:abc123", "42".to_string(), Duration::from_secs(3600))
            .await
            .unwrap();
    });

    group.bench_function("cache_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(resolver.resolve_api_key("abc123").await) })
    });

    group.finish();
    rt.block_on(gateway.shutdown());
}

fn bench_bridge_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("bridge");
    group.measurement_time(Duration::from_secs(10));

    let bus = Arc::new(InMemoryEventBus::new());
    let keys: Vec<ApiKey> = (1..=100)
        .map(|i| ApiKey::parse(&format!("sk_bench_{i}")).unwrap())
        .collect();
    let directory = Arc::new(InMemoryMerchantDirectory::seeded(
        keys.iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), MerchantId::new(i as i64 + 1).unwrap())),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway = rt
        .block_on(async {
            tokio::spawn(
                LookupResponder::new(directory, Arc::clone(&bus), LOOKUP_REQUEST_TOPIC)
                    .run(shutdown_rx),
            );
            GatewayService::start(
                BridgeConfig::default(),
                Arc::clone(&bus),
                Arc::new(InMemoryCacheStore::new()),
            )
        })
        .unwrap();
    let client = gateway.client();

    group.bench_function("validate_single", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(client.validate(&keys[0]).await.is_ok()) })
    });

    for size in [10usize, 50, 100] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("validate_concurrent", size),
            &size,
            |b, &size| {
                b.to_async(&rt).iter(|| async {
                    let handles: Vec<_> = keys[..size]
                        .iter()
                        .cloned()
                        .map(|key| {
                            let client = Arc::clone(&client);
                            tokio::spawn(async move { client.validate(&key).await.is_ok() })
                        })
                        .collect();
                    let mut ok = 0u32;
                    for handle in handles {
                        if handle.await.unwrap_or(false) {
                            ok += 1;
                        }
                    }
                    black_box(ok)
                })
            },
        );
    }

    group.finish();
    let _ = shutdown_tx.send(true);
    rt.block_on(gateway.shutdown());
}

criterion_group!(
    benches,
    bench_pending_registry,
    bench_resolver_cache_hit,
    bench_bridge_round_trip
);
criterion_main!(benches);
