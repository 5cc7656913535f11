//! Error types

use thiserror::Error;

/// Errors surfaced by [`PermissionCoordinator::request`].
///
/// An absent key on the resolve side is deliberately not an error: `resolve`
/// returns `false` for "nothing to resolve" (late, duplicate, or unknown
/// delivery) and callers treat that as a no-op.
///
/// [`PermissionCoordinator::request`]: crate::PermissionCoordinator::request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// A request is already outstanding for this key. Re-requesting before
    /// the prior request resolved is a caller bug, not a race to retry:
    /// retrying would orphan one of the two waiters.
    #[error("a tool permission request is already pending for key {key}")]
    AlreadyPending { key: String },

    /// Request keys must be non-empty.
    #[error("request key must not be empty")]
    EmptyKey,
}

/// Failure pushing to a notification sink.
///
/// Advisory only: the coordinator logs and swallows these; a request is
/// registered and suspended regardless of whether its announcement went out.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    ChannelClosed,

    #[error("{0}")]
    Other(String),
}
