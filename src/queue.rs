//! Presentation-order bookkeeping for decision surfaces
//!
//! The coordinator imposes no ordering across keys (its table is unordered
//! by construction). A surface that shows one modal at a time with a
//! "request 2 of 5" counter keeps that arrival order here, layered outside
//! the coordinator. Plain single-owner state: the presentation task owns
//! the queue, pushing when an announcement arrives and removing when it
//! delivers a decision.

use std::collections::VecDeque;

use crate::request::ToolRequest;

/// FIFO queue of outstanding requests in display order.
#[derive(Debug, Default)]
pub struct RequestQueue {
    queue: VecDeque<(String, ToolRequest)>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Append a newly announced request. Re-pushing a key that is already
    /// queued is ignored; the coordinator guarantees at most one outstanding
    /// request per key upstream.
    pub fn push(&mut self, key: impl Into<String>, request: ToolRequest) {
        let key = key.into();
        if self.queue.iter().any(|(queued, _)| *queued == key) {
            return;
        }
        self.queue.push_back((key, request));
    }

    /// Drop a request once it resolved. Works at any position; decisions
    /// for later entries can arrive first (timeouts, cancellations).
    pub fn remove(&mut self, key: &str) -> bool {
        match self.queue.iter().position(|(queued, _)| queued == key) {
            Some(index) => {
                self.queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// The request currently on display.
    pub fn current(&self) -> Option<(&str, &ToolRequest)> {
        self.queue
            .front()
            .map(|(key, request)| (key.as_str(), request))
    }

    /// Zero-based display position of a key, front first.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.queue.iter().position(|(queued, _)| queued == key)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
