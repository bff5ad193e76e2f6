//! # Bridge Flows
//!
//! Gateway and merchant registry wired through the in-memory bus:
//! resolution, cache-aside behaviour and per-instance reply routing.

#[cfg(test)]
mod tests {
    use super::super::harness::{bridge_config, key, merchant, Harness};
    use api_gateway::{CacheStore, GatewayService, InMemoryCacheStore};
    use merchant_registry::{InMemoryMerchantDirectory, LookupResponder};
    use node_runtime::{parse_seed_merchants, NodeConfig, NodeRuntime};
    use shared_bus::InMemoryEventBus;
    use shared_types::{MerchantRecord, LOOKUP_REQUEST_TOPIC};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::{timeout, Instant};

    // =========================================================================
    // RESOLUTION AND CACHE-ASIDE
    // =========================================================================

    #[tokio::test]
    async fn test_known_key_resolves_then_served_from_cache() {
        let harness = Harness::start(&[("abc123", 42)], Duration::from_secs(2));

        let started = Instant::now();
        let first = harness.resolver.resolve_api_key("abc123").await;
        assert_eq!(first, Some(merchant(42)));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(harness.validator.calls(), 1);

        assert_eq!(
            harness
                .cache
                .get("merchant_api_key:abc123")
                .await
                .unwrap()
                .as_deref(),
            Some("42")
        );

        // Second call within the TTL: no bridge round trip
        let second = harness.resolver.resolve_api_key("abc123").await;
        assert_eq!(second, Some(merchant(42)));
        assert_eq!(harness.validator.calls(), 1);
        assert!(harness.gateway.registry().is_empty());

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_negative_result_not_cached() {
        let harness = Harness::start(&[], Duration::from_secs(2));

        assert_eq!(harness.resolver.resolve_api_key("newkey").await, None);
        assert!(harness.cache.is_empty());

        // Provisioned after the miss: valid on the very next call
        harness.directory.insert(
            &key("newkey"),
            MerchantRecord::active(merchant(7), "newco"),
        );
        assert_eq!(
            harness.resolver.resolve_api_key("newkey").await,
            Some(merchant(7))
        );
        assert_eq!(harness.validator.calls(), 2);

        harness.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_entry_expires_after_five_minutes() {
        let harness = Harness::start(&[("abc123", 42)], Duration::from_secs(2));

        harness.resolver.resolve_api_key("abc123").await;
        tokio::time::advance(Duration::from_secs(299)).await;
        harness.resolver.resolve_api_key("abc123").await;
        assert_eq!(harness.validator.calls(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            harness.resolver.resolve_api_key("abc123").await,
            Some(merchant(42))
        );
        assert_eq!(harness.validator.calls(), 2);

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_revocation_needs_invalidation() {
        let harness = Harness::start(&[("abc123", 42)], Duration::from_secs(2));
        harness.resolver.resolve_api_key("abc123").await;

        harness.directory.remove(&key("abc123"));
        // Still served from cache until invalidated
        assert_eq!(
            harness.resolver.resolve_api_key("abc123").await,
            Some(merchant(42))
        );

        harness.resolver.invalidate("abc123").await.unwrap();
        assert_eq!(harness.resolver.resolve_api_key("abc123").await, None);

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_keys_match_exactly() {
        let harness = Harness::start(&[("abc123", 42)], Duration::from_secs(2));

        assert_eq!(harness.resolver.resolve_api_key("abc123 ").await, None);
        assert_eq!(harness.resolver.resolve_api_key("ABC123").await, None);
        assert_eq!(
            harness.resolver.resolve_api_key("abc123").await,
            Some(merchant(42))
        );
        // Only the exact key was cached
        assert_eq!(harness.cache.len(), 1);

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_suspended_merchant_denied() {
        let harness = Harness::start(&[("abc123", 42)], Duration::from_secs(2));
        harness.directory.suspend(&key("abc123"));

        assert_eq!(harness.resolver.resolve_api_key("abc123").await, None);
        assert!(harness.cache.is_empty());

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_reports_confirmed_not_found() {
        let harness = Harness::start(&[], Duration::from_secs(2));

        let result = harness.gateway.client().validate(&key("nobody")).await;
        assert!(matches!(result, Ok(None)));

        harness.shutdown().await;
    }

    // =========================================================================
    // MULTIPLE GATEWAY INSTANCES
    // =========================================================================

    #[tokio::test]
    async fn test_instances_receive_only_their_own_replies() {
        let bus = Arc::new(InMemoryEventBus::new());
        let directory = Arc::new(InMemoryMerchantDirectory::seeded([
            (key("key-a"), merchant(1)),
            (key("key-b"), merchant(2)),
        ]));
        let (_responder_tx, responder_rx) = watch::channel(false);
        tokio::spawn(
            LookupResponder::new(directory, Arc::clone(&bus), LOOKUP_REQUEST_TOPIC)
                .run(responder_rx),
        );

        let gw_a = GatewayService::start(
            bridge_config("gw-a", Duration::from_secs(2)),
            Arc::clone(&bus),
            Arc::new(InMemoryCacheStore::new()),
        )
        .unwrap();
        let gw_b = GatewayService::start(
            bridge_config("gw-b", Duration::from_secs(2)),
            Arc::clone(&bus),
            Arc::new(InMemoryCacheStore::new()),
        )
        .unwrap();

        let resolver_a = gw_a.resolver();
        let resolver_b = gw_b.resolver();
        let mut handles = Vec::new();
        for _ in 0..20 {
            let a = Arc::clone(&resolver_a);
            let b = Arc::clone(&resolver_b);
            handles.push(tokio::spawn(async move { a.resolve_api_key("key-a").await }));
            handles.push(tokio::spawn(async move { b.resolve_api_key("key-b").await }));
        }

        for (n, handle) in handles.into_iter().enumerate() {
            let expected = if n % 2 == 0 { 1 } else { 2 };
            let resolved = timeout(Duration::from_secs(2), handle)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(resolved, Some(merchant(expected)));
        }

        // No instance ever saw a reply meant for the other
        for gw in [&gw_a, &gw_b] {
            assert_eq!(gw.registry().stats().unmatched.load(Ordering::Relaxed), 0);
            assert!(gw.registry().is_empty());
        }

        gw_a.shutdown().await;
        gw_b.shutdown().await;
    }

    // =========================================================================
    // NODE RUNTIME
    // =========================================================================

    #[tokio::test]
    async fn test_node_runtime_resolves_seeded_merchants() {
        let config = NodeConfig {
            seed_merchants: parse_seed_merchants("abc123=42,sk_live_9=9").unwrap(),
            ..Default::default()
        };
        let node = NodeRuntime::start(config).unwrap();
        let resolver = node.gateway().resolver();

        assert_eq!(resolver.resolve_api_key("abc123").await, Some(merchant(42)));
        assert_eq!(resolver.resolve_api_key("sk_live_9").await, Some(merchant(9)));
        assert_eq!(resolver.resolve_api_key("abc124").await, None);

        node.shutdown().await;
    }
}
