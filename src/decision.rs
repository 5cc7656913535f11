//! Decision types for permission requests

use serde::{Deserialize, Serialize};

/// Terminal answer for a single permission request.
///
/// `reason` is free text and only meaningful for denials. A decision is
/// delivered at most once per request; the pending entry is gone afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Decision {
    /// The user allowed the tool invocation.
    pub fn granted() -> Self {
        Self {
            granted: true,
            reason: None,
        }
    }

    /// The user denied the tool invocation, no reason given.
    pub fn denied() -> Self {
        Self {
            granted: false,
            reason: None,
        }
    }

    /// The user denied the tool invocation with a reason for the agent.
    pub fn denied_with(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            reason: Some(reason.into()),
        }
    }

    /// Sentinel for a request withdrawn before anyone decided
    /// (caller abandoned, session ended).
    pub fn cancelled() -> Self {
        Self::denied_with("cancelled")
    }

    /// Sentinel delivered when a caller-layered deadline fires first.
    pub fn timed_out() -> Self {
        Self::denied_with("timed out")
    }

    pub fn is_granted(&self) -> bool {
        self.granted
    }

    pub fn is_denied(&self) -> bool {
        !self.granted
    }
}
