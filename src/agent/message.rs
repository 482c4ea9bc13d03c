//! Messages pages post to the agent

use serde::{Deserialize, Serialize};

/// A structured `{ "type": ... }` message from a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Activate the waiting agent now
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,

    /// Any type the agent does not recognise
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a payload. Non-objects and objects without a string `type`
    /// are not messages at all.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        value.get("type")?.as_str()?;
        serde_json::from_value(value.clone()).ok()
    }
}
