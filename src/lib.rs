//! Toolgate - human-in-the-loop permission coordination for agent tool calls
//!
//! An agent task that wants to execute a tool registers a request under a
//! unique key and suspends. A human-facing surface, notified out-of-band,
//! later grants or denies the request and the agent task resumes with the
//! decision. The coordinator enforces at most one outstanding request per
//! key and delivers each decision to exactly one waiter, exactly once.
//!
//! # Example
//!
//! ```
//! use toolgate::{PermissionCoordinator, ToolRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let coordinator = PermissionCoordinator::new();
//!
//!     // Decision surface: grant the request once it shows up.
//!     let resolver = coordinator.clone();
//!     tokio::spawn(async move {
//!         while !resolver.grant("perm1:userA") {
//!             tokio::task::yield_now().await;
//!         }
//!     });
//!
//!     // Agent side: suspends until the decision above lands.
//!     let decision = coordinator
//!         .request("perm1:userA", ToolRequest::new("search"), None)
//!         .await
//!         .expect("first request for this key");
//!     assert!(decision.is_granted());
//! }
//! ```
//!
//! Wiring to a transport goes through [`NotificationSink`]: pass a
//! [`ChannelSink`] to [`PermissionCoordinator::request`] and a writer task
//! forwards [`PermissionEvent`]s to the approval surface.
//! Surfaces that display one request at a time can keep arrival order in a
//! [`RequestQueue`].

mod config;
mod coordinator;
mod decision;
mod error;
mod queue;
mod request;
mod sink;
mod table;

// Re-export the public API
pub use config::CoordinatorConfig;
pub use coordinator::PermissionCoordinator;
pub use decision::Decision;
pub use error::{NotifyError, PermissionError};
pub use queue::RequestQueue;
pub use request::{request_key, unique_request_key, ToolRequest, KEY_SEPARATOR};
pub use sink::{ChannelSink, NotificationSink, PermissionEvent, PERMISSION_REQUEST_EVENT};
