//! Permission coordinator
//!
//! Registers pending requests, suspends the requesting task, and delivers
//! out-of-band decisions to exactly the matching waiter. One instance is
//! created at process start and cloned into the agent side (which calls
//! [`PermissionCoordinator::request`]) and the decision surface (which calls
//! [`PermissionCoordinator::resolve`] or its `grant`/`deny` wrappers).
//!
//! State machine per key:
//!
//! ```text
//! ABSENT -> PENDING   on successful request
//! PENDING -> ABSENT   on resolve, cancel, timeout, or waiter abandonment
//! ```
//!
//! A second `request` for a key that is already PENDING is rejected with
//! [`PermissionError::AlreadyPending`]. Every PENDING -> ABSENT transition
//! goes through the table's atomic `take`, so of any two racing resolvers
//! (duplicate delivery, timeout vs. human) exactly one wins and the other
//! observes a no-op.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::config::CoordinatorConfig;
use crate::decision::Decision;
use crate::error::PermissionError;
use crate::request::ToolRequest;
use crate::sink::NotificationSink;
use crate::table::{PendingRequest, PendingTable};

/// Coordinates human-in-the-loop approval of agent tool invocations.
///
/// Cheap to clone; clones share one pending-request table. No global state:
/// two coordinators are two fully independent request spaces, so tests (and
/// embedders running several agent pools) can instantiate their own.
#[derive(Debug, Clone, Default)]
pub struct PermissionCoordinator {
    table: PendingTable,
    config: CoordinatorConfig,
}

/// Removes the table entry if the suspended `request` future is dropped
/// before a decision lands, returning the key to ABSENT so a late decision
/// resolves nothing. Disarmed once a decision has been received, so it can
/// never evict a successor request that reused the key.
struct AbandonGuard<'a> {
    table: &'a PendingTable,
    key: &'a str,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.table.take(self.key).is_some() {
            tracing::debug!(
                "permission request for key {} abandoned before a decision arrived",
                self.key
            );
        }
    }
}

impl PermissionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self {
            table: PendingTable::new(),
            config,
        }
    }

    /// Register a permission request and suspend until a decision arrives.
    ///
    /// On successful registration the optional `notify` sink is fired once
    /// (best-effort: a sink error is logged and swallowed) and the calling
    /// task suspends with no deadline; see [`Self::request_with_timeout`]
    /// for a bounded wait. Exactly one decision is returned per successful
    /// registration.
    ///
    /// Only one request may be outstanding per key. A duplicate fails with
    /// [`PermissionError::AlreadyPending`] and leaves the first request's
    /// suspension untouched; re-requesting a key before its prior request
    /// resolved is a caller bug, not a race worth retrying.
    ///
    /// If the returned future is dropped mid-suspension (task cancelled,
    /// session gone), the pending entry is removed and any later decision
    /// for the key becomes a no-op.
    pub async fn request(
        &self,
        key: &str,
        request: ToolRequest,
        notify: Option<&dyn NotificationSink>,
    ) -> Result<Decision, PermissionError> {
        if key.is_empty() {
            return Err(PermissionError::EmptyKey);
        }

        // Clone the payload for the announcement before the record takes
        // ownership; the sink fires only after the insert succeeds.
        let announce = notify.map(|sink| (sink, request.clone()));

        let (responder, decided) = oneshot::channel();
        let record = PendingRequest::new(request, responder);

        if self.table.insert(key, record).is_err() {
            tracing::warn!("rejecting duplicate permission request for key {}", key);
            return Err(PermissionError::AlreadyPending {
                key: key.to_string(),
            });
        }
        tracing::info!("registered tool permission request for key {}", key);

        if let Some((sink, payload)) = announce {
            if let Err(error) = sink.notify(&self.config.event_name, &payload) {
                tracing::warn!(
                    "notification sink failed for key {}: {}; request stays pending",
                    key,
                    error
                );
            }
        }

        let mut guard = AbandonGuard {
            table: &self.table,
            key,
            armed: true,
        };
        // A closed channel means the record was discarded without a decision
        // being sent; nothing in the public API does that, but map it to the
        // cancellation sentinel rather than invent an error the caller can't
        // act on.
        let decision = decided.await.unwrap_or_else(|_| Decision::cancelled());
        guard.armed = false;

        Ok(decision)
    }

    /// [`Self::request`] with a deadline raced against the suspension.
    ///
    /// `timeout` falls back to the configured `default_timeout`; with
    /// neither, this is exactly `request`. When the deadline fires first the
    /// entry is invalidated through the same atomic path a human decision
    /// takes, so the two triggers can never both resolve the key: whichever
    /// `take` wins is the decision the caller observes, and the loser is a
    /// no-op.
    pub async fn request_with_timeout(
        &self,
        key: &str,
        request: ToolRequest,
        notify: Option<&dyn NotificationSink>,
        timeout: Option<Duration>,
    ) -> Result<Decision, PermissionError> {
        let Some(timeout) = timeout.or(self.config.default_timeout) else {
            return self.request(key, request, notify).await;
        };

        let suspended = self.request(key, request, notify);
        tokio::pin!(suspended);

        tokio::select! {
            result = &mut suspended => result,
            _ = tokio::time::sleep(timeout) => {
                if self.resolve(key, Decision::timed_out()) {
                    tracing::info!("permission request for key {} timed out", key);
                }
                // The waiter now holds either our sentinel or a decision
                // that beat the deadline to the table.
                suspended.await
            }
        }
    }

    /// Deliver a decision for a pending request, waking its waiter.
    ///
    /// Returns `true` if a pending request was resolved. `false` means
    /// "nothing to resolve" - an unknown key, a key that already resolved,
    /// or a duplicate delivery - and is a no-op, not a fault.
    pub fn resolve(&self, key: &str, decision: Decision) -> bool {
        match self.table.take(key) {
            Some(record) => {
                tracing::info!(
                    "resolving tool permission request for key {} (granted: {})",
                    key,
                    decision.granted
                );
                if record.responder.send(decision).is_err() {
                    // Waiter dropped between our take and this send; the
                    // record is consumed and the key freed either way.
                    tracing::debug!("waiter for key {} gone before delivery", key);
                }
                true
            }
            None => {
                tracing::debug!("no pending permission request for key {}", key);
                false
            }
        }
    }

    /// Resolve as granted.
    pub fn grant(&self, key: &str) -> bool {
        self.resolve(key, Decision::granted())
    }

    /// Resolve as denied, with an optional reason for the agent.
    pub fn deny(&self, key: &str, reason: Option<&str>) -> bool {
        let decision = match reason {
            Some(reason) => Decision::denied_with(reason),
            None => Decision::denied(),
        };
        self.resolve(key, decision)
    }

    /// Withdraw a pending request (session ended, run aborted). The waiter
    /// receives [`Decision::cancelled`].
    pub fn cancel(&self, key: &str) -> bool {
        self.resolve(key, Decision::cancelled())
    }

    /// Payload of the pending request for `key`, if any. Read-only; the
    /// request stays pending.
    pub fn peek_pending(&self, key: &str) -> Option<ToolRequest> {
        self.table.peek(key).map(|(request, _)| request)
    }

    /// When the pending request for `key` was registered, if any.
    pub fn pending_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.table.peek(key).map(|(_, requested_at)| requested_at)
    }

    /// Number of outstanding requests across all keys.
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tokio::sync::Barrier;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::sink::{ChannelSink, PERMISSION_REQUEST_EVENT};

    /// Spawn a request for a fresh key and wait until it is registered.
    async fn spawn_request(
        coordinator: &PermissionCoordinator,
        key: &str,
        request: ToolRequest,
    ) -> JoinHandle<Result<Decision, PermissionError>> {
        let task = {
            let coordinator = coordinator.clone();
            let key = key.to_string();
            tokio::spawn(async move { coordinator.request(&key, request, None).await })
        };
        while coordinator.peek_pending(key).is_none() {
            tokio::task::yield_now().await;
        }
        task
    }

    #[tokio::test]
    async fn test_grant_wakes_waiter() {
        let coordinator = PermissionCoordinator::new();
        let task = spawn_request(&coordinator, "perm1:userA", ToolRequest::new("search")).await;

        assert!(coordinator.grant("perm1:userA"));

        let decision = task.await.unwrap().unwrap();
        assert!(decision.is_granted());
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_delivers_exact_decision() {
        let coordinator = PermissionCoordinator::new();
        let task = spawn_request(&coordinator, "perm1:userA", ToolRequest::new("search")).await;

        assert!(coordinator.resolve("perm1:userA", Decision::denied_with("not needed")));

        let decision = task.await.unwrap().unwrap();
        assert_eq!(decision, Decision::denied_with("not needed"));

        // Second delivery for the same key is a no-op
        assert!(!coordinator.resolve("perm1:userA", Decision::denied_with("not needed")));
    }

    #[tokio::test]
    async fn test_resolve_unknown_key_is_noop() {
        let coordinator = PermissionCoordinator::new();
        assert!(!coordinator.resolve("perm1:userA", Decision::granted()));
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_request_rejected() {
        let coordinator = PermissionCoordinator::new();
        let first = spawn_request(&coordinator, "perm1:userA", ToolRequest::new("search")).await;

        let second = coordinator
            .request("perm1:userA", ToolRequest::new("shell"), None)
            .await;
        assert_eq!(
            second.unwrap_err(),
            PermissionError::AlreadyPending {
                key: "perm1:userA".to_string()
            }
        );

        // The first request is unaffected and still resolvable
        assert_eq!(coordinator.peek_pending("perm1:userA").unwrap().tool, "search");
        assert!(coordinator.grant("perm1:userA"));
        assert!(first.await.unwrap().unwrap().is_granted());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let coordinator = PermissionCoordinator::new();
        let result = coordinator.request("", ToolRequest::new("search"), None).await;
        assert_eq!(result.unwrap_err(), PermissionError::EmptyKey);
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let coordinator = PermissionCoordinator::new();
        let first = spawn_request(&coordinator, "perm1:userA", ToolRequest::new("search")).await;
        let second = spawn_request(&coordinator, "perm2:userB", ToolRequest::new("shell")).await;

        assert!(coordinator.deny("perm2:userB", None));
        assert!(second.await.unwrap().unwrap().is_denied());

        // Resolving one key never wakes the other
        assert!(!first.is_finished());
        assert_eq!(coordinator.pending_count(), 1);

        assert!(coordinator.grant("perm1:userA"));
        assert!(first.await.unwrap().unwrap().is_granted());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_single_winner() {
        const CONTENDERS: usize = 8;

        let coordinator = PermissionCoordinator::new();
        let barrier = Arc::new(Barrier::new(CONTENDERS));
        let failures = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..CONTENDERS)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = barrier.clone();
                let failures = failures.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    let result = coordinator
                        .request("perm1:userA", ToolRequest::new("search"), None)
                        .await;
                    if result.is_err() {
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                    result
                })
            })
            .collect();

        // Wait for every loser to bounce off the winner's entry before
        // resolving, so the key cannot be re-registered mid-test.
        while failures.load(Ordering::SeqCst) < CONTENDERS - 1 {
            tokio::task::yield_now().await;
        }
        assert_eq!(coordinator.pending_count(), 1);
        assert!(coordinator.grant("perm1:userA"));

        let mut granted = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(decision) => {
                    assert!(decision.is_granted());
                    granted += 1;
                }
                Err(PermissionError::AlreadyPending { key }) => {
                    assert_eq!(key, "perm1:userA");
                    rejected += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(granted, 1);
        assert_eq!(rejected, CONTENDERS - 1);
    }

    #[tokio::test]
    async fn test_notify_fires_once_with_payload() {
        let coordinator = PermissionCoordinator::new();
        let (sink, mut events) = ChannelSink::new();

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let request = ToolRequest::new("search")
                    .with_input(serde_json::json!({ "query": "weather" }));
                coordinator
                    .request("perm1:userA", request, Some(&sink))
                    .await
            })
        };

        let event = events.recv().await.unwrap();
        assert_eq!(event.event, PERMISSION_REQUEST_EVENT);
        assert_eq!(event.request.tool, "search");
        assert!(events.try_recv().is_err());

        // The announcement fires after registration, so the key is live
        assert!(coordinator.grant("perm1:userA"));
        assert!(task.await.unwrap().unwrap().is_granted());
    }

    #[tokio::test]
    async fn test_sink_failure_leaves_request_pending() {
        let coordinator = PermissionCoordinator::new();
        let (sink, events) = ChannelSink::new();
        drop(events); // every notify will fail

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .request("perm1:userA", ToolRequest::new("search"), Some(&sink))
                    .await
            })
        };

        while coordinator.peek_pending("perm1:userA").is_none() {
            tokio::task::yield_now().await;
        }
        assert!(coordinator.grant("perm1:userA"));
        assert!(task.await.unwrap().unwrap().is_granted());
    }

    #[tokio::test]
    async fn test_cancel_delivers_cancelled_sentinel() {
        let coordinator = PermissionCoordinator::new();
        let task = spawn_request(&coordinator, "perm1:userA", ToolRequest::new("search")).await;

        assert!(coordinator.cancel("perm1:userA"));
        assert_eq!(task.await.unwrap().unwrap(), Decision::cancelled());
        assert!(!coordinator.cancel("perm1:userA"));
    }

    #[tokio::test]
    async fn test_abandoned_request_clears_entry() {
        let coordinator = PermissionCoordinator::new();
        let task = spawn_request(&coordinator, "perm1:userA", ToolRequest::new("search")).await;

        task.abort();
        let joined = task.await;
        assert!(joined.unwrap_err().is_cancelled());

        // The entry is gone, so a late decision resolves nothing
        assert_eq!(coordinator.pending_count(), 0);
        assert!(!coordinator.grant("perm1:userA"));
    }

    #[tokio::test]
    async fn test_timeout_delivers_sentinel() {
        let coordinator = PermissionCoordinator::new();

        let decision = coordinator
            .request_with_timeout(
                "perm1:userA",
                ToolRequest::new("search"),
                None,
                Some(Duration::from_millis(20)),
            )
            .await
            .unwrap();

        assert_eq!(decision, Decision::timed_out());
        assert_eq!(coordinator.pending_count(), 0);
        assert!(!coordinator.resolve("perm1:userA", Decision::granted()));
    }

    #[tokio::test]
    async fn test_decision_beats_timeout() {
        let coordinator = PermissionCoordinator::new();

        let resolver = coordinator.clone();
        tokio::spawn(async move {
            while !resolver.grant("perm1:userA") {
                tokio::task::yield_now().await;
            }
        });

        let decision = coordinator
            .request_with_timeout(
                "perm1:userA",
                ToolRequest::new("search"),
                None,
                Some(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        assert!(decision.is_granted());
    }

    #[tokio::test]
    async fn test_default_timeout_from_config() {
        let coordinator = PermissionCoordinator::with_config(CoordinatorConfig {
            default_timeout: Some(Duration::from_millis(20)),
            ..CoordinatorConfig::default()
        });

        let decision = coordinator
            .request_with_timeout("perm1:userA", ToolRequest::new("search"), None, None)
            .await
            .unwrap();
        assert_eq!(decision, Decision::timed_out());
    }

    #[tokio::test]
    async fn test_peek_is_read_only() {
        let coordinator = PermissionCoordinator::new();
        let request = ToolRequest::new("search").with_description("Search the web");
        let task = spawn_request(&coordinator, "perm1:userA", request.clone()).await;

        assert_eq!(coordinator.peek_pending("perm1:userA"), Some(request));
        assert!(coordinator.pending_at("perm1:userA").is_some());

        // Peeking must not consume the record
        assert_eq!(coordinator.pending_count(), 1);
        assert!(coordinator.grant("perm1:userA"));
        assert!(task.await.unwrap().unwrap().is_granted());
        assert_eq!(coordinator.peek_pending("perm1:userA"), None);
    }

    #[tokio::test]
    async fn test_custom_event_name() {
        let coordinator = PermissionCoordinator::with_config(CoordinatorConfig {
            event_name: "permission_wanted".to_string(),
            ..CoordinatorConfig::default()
        });
        let (sink, mut events) = ChannelSink::new();

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .request("perm1:userA", ToolRequest::new("search"), Some(&sink))
                    .await
            })
        };

        assert_eq!(events.recv().await.unwrap().event, "permission_wanted");
        coordinator.grant("perm1:userA");
        task.await.unwrap().unwrap();
    }
}
