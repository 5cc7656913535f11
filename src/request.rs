//! Tool invocation descriptions and request-key construction
//!
//! A request key identifies one outstanding permission request:
//! `permission_id:user_id`. The coordinator treats keys as opaque strings
//! and never looks inside them; the helpers here own the concatenation
//! convention on behalf of callers. Callers must keep `permission_id`
//! globally unique per tool invocation ([`unique_request_key`] does this
//! with a UUID).

use serde::{Deserialize, Serialize};

/// Separator between the permission id and the principal in a request key.
pub const KEY_SEPARATOR: char = ':';

/// Description of the tool action awaiting approval.
///
/// Opaque to the coordinator: it is handed to the notification sink at
/// registration and returned from `peek_pending`, nothing more. Serializable
/// so it can cross a transport to the approval surface unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Tool the agent wants to execute
    pub tool: String,

    /// Human-readable description for the approval surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Structured input the tool would be invoked with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            description: None,
            input: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = Some(input);
        self
    }
}

/// Build a request key from a caller-supplied permission id and principal.
pub fn request_key(permission_id: &str, user_id: &str) -> String {
    format!("{}{}{}", permission_id, KEY_SEPARATOR, user_id)
}

/// Build a request key with a freshly generated unique permission id.
pub fn unique_request_key(user_id: &str) -> String {
    request_key(&uuid::Uuid::new_v4().to_string(), user_id)
}
