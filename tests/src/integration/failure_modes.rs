//! # Failure Modes
//!
//! Deadlines, broker outages, redelivery and hostile traffic on the reply
//! topic. Timing-sensitive cases run on paused time.

#[cfg(test)]
mod tests {
    use super::super::harness::{key, merchant, spawn_scripted_responder, Harness, Script};
    use api_gateway::BridgeError;
    use bytes::Bytes;
    use shared_bus::EventPublisher;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{timeout, Instant};

    fn script(entries: &[(&str, Script)]) -> HashMap<String, Script> {
        entries
            .iter()
            .map(|(k, s)| ((*k).to_string(), *s))
            .collect()
    }

    // =========================================================================
    // DEADLINES
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_silent_responder_times_out_at_deadline() {
        let harness = Harness::without_responder(Duration::from_secs(2));
        let client = harness.gateway.client();

        let started = Instant::now();
        let result = client.validate(&key("deadkey")).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(BridgeError::TimedOut { .. })));
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2100));
        assert!(harness.gateway.registry().is_empty());

        harness.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_to_deny_and_is_not_cached() {
        let harness = Harness::without_responder(Duration::from_secs(2));

        assert_eq!(harness.resolver.resolve_api_key("deadkey").await, None);
        assert!(harness.cache.is_empty());
        assert!(harness.gateway.registry().is_empty());

        harness.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_caller_releases_pending_entry() {
        let harness = Harness::without_responder(Duration::from_secs(2));

        let outer = timeout(
            Duration::from_millis(100),
            harness.resolver.resolve_api_key("deadkey"),
        )
        .await;

        assert!(outer.is_err());
        assert!(harness.gateway.registry().is_empty());
        assert_eq!(
            harness
                .gateway
                .registry()
                .stats()
                .cancelled
                .load(Ordering::Relaxed),
            1
        );

        harness.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_dropped_without_disturbing_other_calls() {
        let harness = Harness::without_responder(Duration::from_secs(1));
        let _responder = spawn_scripted_responder(
            harness.bus.clone(),
            script(&[
                ("slow", Script::found(5).after(Duration::from_millis(1500))),
                ("steady", Script::found(6).after(Duration::from_millis(1600))),
            ]),
        );
        let client = harness.gateway.client();

        let steady = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .validate_with_timeout(&key("steady"), Some(Duration::from_secs(5)))
                    .await
            })
        };

        let slow = client.validate(&key("slow")).await;
        assert!(matches!(slow, Err(BridgeError::TimedOut { .. })));

        // The slow reply lands at 1.5s, after its caller gave up
        let steady = steady.await.unwrap();
        assert_eq!(steady.unwrap(), Some(merchant(6)));

        let registry = harness.gateway.registry();
        let stats = registry.stats();
        assert_eq!(stats.unmatched.load(Ordering::Relaxed), 1);
        assert_eq!(stats.settled.load(Ordering::Relaxed), 1);
        assert!(harness.gateway.registry().is_empty());

        harness.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_longer_than_default_is_honoured() {
        let harness = Harness::without_responder(Duration::from_millis(100));
        let _responder = spawn_scripted_responder(
            harness.bus.clone(),
            script(&[("patient", Script::found(9).after(Duration::from_millis(1500)))]),
        );

        let started = Instant::now();
        let result = harness
            .gateway
            .client()
            .validate_with_timeout(&key("patient"), Some(Duration::from_secs(2)))
            .await;

        assert_eq!(result.unwrap(), Some(merchant(9)));
        assert!(started.elapsed() >= Duration::from_millis(1500));
        let registry = harness.gateway.registry();
        assert_eq!(registry.stats().expired.load(Ordering::Relaxed), 0);
        assert!(registry.is_empty());

        harness.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_call_not_blocked_by_slow_ones() {
        let harness = Harness::without_responder(Duration::from_secs(3));

        let mut entries = vec![("fast".to_string(), Script::found(1))];
        for i in 0..99 {
            entries.push((
                format!("slow-{i}"),
                Script::found(i + 2).after(Duration::from_secs(1)),
            ));
        }
        let _responder =
            spawn_scripted_responder(harness.bus.clone(), entries.into_iter().collect());

        let client = harness.gateway.client();
        let started = Instant::now();
        let mut slow = Vec::new();
        for i in 0..99 {
            let client = Arc::clone(&client);
            slow.push(tokio::spawn(async move {
                let result = client.validate(&key(&format!("slow-{i}"))).await;
                (i, result, started.elapsed())
            }));
        }

        let fast = client.validate(&key("fast")).await;
        assert_eq!(fast.unwrap(), Some(merchant(1)));
        assert!(started.elapsed() < Duration::from_millis(100));

        for handle in slow {
            let (i, result, elapsed) = handle.await.unwrap();
            assert_eq!(result.unwrap(), Some(merchant(i + 2)));
            assert!(elapsed >= Duration::from_secs(1));
        }
        assert!(harness.gateway.registry().is_empty());

        harness.shutdown().await;
    }

    // =========================================================================
    // BROKER AND RESPONDER OUTAGES
    // =========================================================================

    #[tokio::test]
    async fn test_closed_bus_fails_fast() {
        let harness = Harness::without_responder(Duration::from_secs(2));
        harness.bus.close();

        let started = Instant::now();
        let result = harness.gateway.client().validate(&key("abc123")).await;
        assert!(matches!(result, Err(BridgeError::Publish(_))));
        assert!(started.elapsed() < Duration::from_millis(500));

        assert_eq!(harness.resolver.resolve_api_key("abc123").await, None);
        assert!(harness.cache.is_empty());

        let registry = harness.gateway.registry();
        assert!(registry.is_empty());
        assert_eq!(registry.stats().publish_failed.load(Ordering::Relaxed), 2);

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_responder_outage_recovers_without_stale_denial() {
        let mut harness = Harness::start(&[("abc123", 42)], Duration::from_millis(200));

        harness.stop_responder().await;
        assert_eq!(harness.resolver.resolve_api_key("abc123").await, None);
        assert!(harness.cache.is_empty());

        harness.start_responder();
        assert_eq!(
            harness.resolver.resolve_api_key("abc123").await,
            Some(merchant(42))
        );

        harness.shutdown().await;
    }

    // =========================================================================
    // REDELIVERY AND HOSTILE TRAFFIC
    // =========================================================================

    #[tokio::test]
    async fn test_redelivered_reply_settles_once() {
        let harness = Harness::without_responder(Duration::from_secs(2));
        let _responder = spawn_scripted_responder(
            harness.bus.clone(),
            script(&[("abc123", Script::found(42).copies(3))]),
        );

        let result = harness.gateway.client().validate(&key("abc123")).await;
        assert_eq!(result.unwrap(), Some(merchant(42)));

        let registry = harness.gateway.registry();
        timeout(Duration::from_secs(1), async {
            while registry.stats().unmatched.load(Ordering::Relaxed) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("both extra copies observed");

        assert_eq!(registry.stats().settled.load(Ordering::Relaxed), 1);
        assert!(registry.is_empty());

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_garbage_on_reply_topic_does_not_stop_listener() {
        let harness = Harness::without_responder(Duration::from_secs(2));
        let reply_topic = harness.gateway.config().reply_topic();

        let payloads: [&'static [u8]; 3] = [
            b"not json",
            br#"{"correlation_id":"nope","valid":true,"merchant_id":1}"#,
            br#"{"valid":true}"#,
        ];
        for payload in payloads {
            harness
                .bus
                .publish(&reply_topic, Bytes::from_static(payload))
                .await
                .unwrap();
        }

        let _responder = spawn_scripted_responder(
            harness.bus.clone(),
            script(&[("abc123", Script::found(42))]),
        );
        assert_eq!(
            harness.resolver.resolve_api_key("abc123").await,
            Some(merchant(42))
        );

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_not_found_reply_is_confirmed_denial() {
        let harness = Harness::without_responder(Duration::from_secs(2));
        let _responder = spawn_scripted_responder(
            harness.bus.clone(),
            script(&[("revoked", Script::not_found())]),
        );

        let result = harness.gateway.client().validate(&key("revoked")).await;
        assert!(matches!(result, Ok(None)));

        harness.shutdown().await;
    }
}
