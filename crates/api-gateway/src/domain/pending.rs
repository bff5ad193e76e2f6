//! Pending-Call Registry - async-to-sync bridge for API-key lookups.
//!
//! Maps correlation IDs to callers waiting for a reply from the merchant
//! registry.
//!
//! Flow:
//! 1. Bridge client generates a CorrelationId
//! 2. Client calls `register()` to get a oneshot receiver
//! 3. Client publishes the lookup request carrying the CorrelationId
//! 4. Reply listener receives the reply and calls `settle()`
//! 5. Client awaits the receiver or times out and calls `cancel()`
//!
//! Each entry carries the deadline of its call. The sweeper only removes
//! entries that outlived that deadline by a grace period, so a caller-supplied
//! deadline is never cut short.
//!
//! Every entry leaves the map through exactly one `DashMap::remove`, so the
//! first of {reply, deadline, publish failure, sweep} wins and the others
//! observe a missing entry.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::BridgeError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use keybridge_telemetry::{PENDING_CALLS, UNMATCHED_REPLIES};
use shared_types::LookupReply;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of one bridge call.
///
/// `Registered` is the only non-terminal state; the first of reply arrival,
/// deadline and publish failure moves the call out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Registered,
    Settled,
    TimedOut,
    PublishFailed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Registered)
    }
}

/// A call waiting for its reply
pub(crate) struct PendingCall {
    /// Completion handle, written at most once
    pub(crate) sender: oneshot::Sender<LookupReply>,
    /// When the call was registered
    created_at: Instant,
    /// Deadline the caller is waiting with
    deadline: Duration,
}

/// Statistics for the pending-call registry
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Calls registered
    pub registered: AtomicU64,
    /// Calls settled by a reply
    pub settled: AtomicU64,
    /// Entries removed without a reply (deadline, publish failure, caller gone)
    pub cancelled: AtomicU64,
    /// Calls that hit their deadline
    pub timed_out: AtomicU64,
    /// Calls whose request could not be published
    pub publish_failed: AtomicU64,
    /// Entries removed by the sweeper
    pub expired: AtomicU64,
    /// Replies with no matching entry (late, duplicate or foreign)
    pub unmatched: AtomicU64,
}

/// Concurrency-safe table of in-flight calls.
///
/// Backed by a sharded `DashMap`, so unrelated calls never contend on a single
/// lock. Constructed once per gateway instance and shared behind an `Arc`.
pub struct PendingCallRegistry {
    /// Map of correlation ID to pending call
    pending: DashMap<CorrelationId, PendingCall>,
    /// Statistics
    stats: PendingStats,
}

impl PendingCallRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: PendingStats::default(),
        }
    }

    /// Register a call that will wait at most `deadline`, and get the
    /// receiver its reply will be delivered to.
    ///
    /// Fails if `correlation_id` is already pending; an existing waiter is
    /// never replaced.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        deadline: Duration,
    ) -> Result<oneshot::Receiver<LookupReply>, BridgeError> {
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(correlation_id) {
            Entry::Occupied(_) => return Err(BridgeError::DuplicateCorrelation(correlation_id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingCall {
                    sender: tx,
                    created_at: Instant::now(),
                    deadline,
                });
            }
        }

        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        PENDING_CALLS.inc();

        debug!(
            correlation_id = %correlation_id,
            deadline_ms = deadline.as_millis() as u64,
            "Registered pending call"
        );

        Ok(rx)
    }

    /// Deliver a reply to the waiting call.
    ///
    /// Returns true if a waiter existed and received the reply. False means
    /// the ID is unknown, already settled, or already cancelled; the reply
    /// must then be dropped.
    pub fn settle(&self, correlation_id: &CorrelationId, reply: LookupReply) -> bool {
        let Some(call) = self.claim(correlation_id) else {
            self.stats.unmatched.fetch_add(1, Ordering::Relaxed);
            UNMATCHED_REPLIES.inc();
            debug!(
                correlation_id = %correlation_id,
                "Reply for unknown or expired correlation ID"
            );
            return false;
        };

        let waited = call.created_at.elapsed();
        match call.sender.send(reply) {
            Ok(()) => {
                self.stats.settled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    waited_ms = waited.as_millis() as u64,
                    "Settled pending call"
                );
                true
            }
            Err(_) => {
                // Receiver was dropped (caller went away)
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    "Pending call receiver dropped"
                );
                false
            }
        }
    }

    /// Take the entry a reply is about to be delivered to. The caller owns
    /// delivery from here on; a waiter that times out meanwhile keeps
    /// listening for it.
    pub(crate) fn claim(&self, correlation_id: &CorrelationId) -> Option<PendingCall> {
        let (_, call) = self.pending.remove(correlation_id)?;
        PENDING_CALLS.dec();
        Some(call)
    }

    /// Remove a call that will not be settled.
    ///
    /// Returns false if the entry was already gone, which means a reply or
    /// the sweeper got there first.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            PENDING_CALLS.dec();
            self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Remove entries that outlived their own deadline by more than `grace`.
    ///
    /// Their receivers observe a closed channel. Returns the number removed.
    pub fn remove_expired(&self, grace: Duration) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, call| {
            let age = now.duration_since(call.created_at);
            if age > call.deadline.saturating_add(grace) {
                warn!(
                    correlation_id = %id,
                    age_ms = age.as_millis() as u64,
                    deadline_ms = call.deadline.as_millis() as u64,
                    "Removing expired pending call"
                );
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.stats
                .expired
                .fetch_add(removed as u64, Ordering::Relaxed);
            PENDING_CALLS.sub(removed as f64);
        }
        removed
    }

    /// Number of calls currently pending
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl Default for PendingCallRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that sweeps stale entries until `shutdown` flips to true.
pub async fn sweep_task(
    registry: Arc<PendingCallRegistry>,
    grace: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = registry.remove_expired(grace);
                if removed > 0 {
                    debug!(removed = removed, "Swept expired pending calls");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Pending-call sweeper stopped");
}
