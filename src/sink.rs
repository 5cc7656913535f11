//! Notification sinks
//!
//! A sink is a one-way push channel the coordinator fires once per
//! registration, telling an observer (SSE writer, websocket task, test
//! harness) that a request now exists. Delivery is fire-and-forget: sink
//! failures never affect registration or suspension, and no acknowledgment
//! is awaited.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::NotifyError;
use crate::request::ToolRequest;

/// Event name fired when a permission request is registered.
pub const PERMISSION_REQUEST_EVENT: &str = "tool_permission_request";

/// One-way push capability injected per `request` call.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &str, request: &ToolRequest) -> Result<(), NotifyError>;
}

/// A request announcement as it crosses a transport.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionEvent {
    pub event: String,
    pub request: ToolRequest,
}

/// Sink that forwards announcements into an unbounded channel.
///
/// This is the shape a transport wants: the coordinator pushes from the
/// requesting task, and a writer task drains the receiver onto the wire.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PermissionEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver a writer task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PermissionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: &str, request: &ToolRequest) -> Result<(), NotifyError> {
        self.tx
            .send(PermissionEvent {
                event: event.to_string(),
                request: request.clone(),
            })
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
