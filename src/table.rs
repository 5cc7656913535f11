//! Pending-request table
//!
//! The only shared mutable state in the crate: a process-wide map from
//! request key to in-flight record. Every mutation is one atomic
//! check-and-mutate under a single lock acquisition; the lock is never held
//! across an await point, a sink call, or a channel send, so traffic on
//! distinct keys contends only on these short critical sections.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::decision::Decision;
use crate::request::ToolRequest;

/// In-flight request record, owned by the table from registration until
/// resolution or cancellation.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    /// Immutable payload, returned by `peek` and pushed to the sink
    pub request: ToolRequest,

    /// When the request was registered, for re-display after reconnect
    pub requested_at: DateTime<Utc>,

    /// Wakes the suspended requester; single use
    pub responder: oneshot::Sender<Decision>,
}

impl PendingRequest {
    pub fn new(request: ToolRequest, responder: oneshot::Sender<Decision>) -> Self {
        Self {
            request,
            requested_at: Utc::now(),
            responder,
        }
    }
}

/// Thread-safe `key -> PendingRequest` map.
///
/// Cheap to clone; all clones share the same state.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingTable {
    inner: Arc<Mutex<HashMap<String, PendingRequest>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record unless one already exists for `key`.
    ///
    /// The existence check and the write happen under one lock acquisition,
    /// which is what holds the at-most-one-outstanding-per-key invariant
    /// when two requesters race on the same key. On conflict the rejected
    /// record is handed back untouched and the stored one is not disturbed.
    pub fn insert(&self, key: &str, record: PendingRequest) -> Result<(), PendingRequest> {
        let mut map = self.inner.lock().expect("pending table lock poisoned");
        match map.entry(key.to_string()) {
            Entry::Occupied(_) => Err(record),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Atomically remove and return the record for `key`.
    ///
    /// Destructive removal is what makes double-resolution impossible: of
    /// two concurrent resolvers (duplicate delivery, timeout racing a human
    /// decision), only one can get the record.
    pub fn take(&self, key: &str) -> Option<PendingRequest> {
        let mut map = self.inner.lock().expect("pending table lock poisoned");
        map.remove(key)
    }

    /// Read-only snapshot of the payload and registration time for `key`,
    /// without disturbing the record.
    pub fn peek(&self, key: &str) -> Option<(ToolRequest, DateTime<Utc>)> {
        let map = self.inner.lock().expect("pending table lock poisoned");
        map.get(key)
            .map(|record| (record.request.clone(), record.requested_at))
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        let map = self.inner.lock().expect("pending table lock poisoned");
        map.len()
    }
}
