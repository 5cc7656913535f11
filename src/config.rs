//! Coordinator configuration

use std::time::Duration;

use crate::sink::PERMISSION_REQUEST_EVENT;

/// Runtime configuration for a [`PermissionCoordinator`].
///
/// Library users construct this directly; the defaults match the wire
/// contract approval surfaces expect.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use toolgate::CoordinatorConfig;
///
/// let config = CoordinatorConfig {
///     event_name: "tool_permission_request".to_string(),
///     default_timeout: Some(Duration::from_secs(300)),
/// };
/// ```
///
/// [`PermissionCoordinator`]: crate::PermissionCoordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Event name fired at the notification sink on registration.
    pub event_name: String,

    /// Deadline applied by `request_with_timeout` when the caller passes
    /// none. The plain `request` path never times out.
    pub default_timeout: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            event_name: PERMISSION_REQUEST_EVENT.to_string(),
            default_timeout: None,
        }
    }
}
