//! Bridge protocol type definitions
//!
//! Data structures exchanged with the script runtime in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// How a visit affects the history stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitAction {
    /// Push a new history entry
    #[default]
    Advance,
    /// Replace the current history entry
    Replace,
    /// Return to an existing history entry
    Restore,
}

impl VisitAction {
    /// Wire representation
    pub const fn as_str(self) -> &'static str {
        match self {
            VisitAction::Advance => "advance",
            VisitAction::Replace => "replace",
            VisitAction::Restore => "restore",
        }
    }
}

impl fmt::Display for VisitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "advance" => Ok(VisitAction::Advance),
            "replace" => Ok(VisitAction::Replace),
            "restore" => Ok(VisitAction::Restore),
            other => Err(crate::Error::invalid_message(format!("Unknown visit action: {}", other))),
        }
    }
}

/// Raw inbound message as posted by the runtime
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptMessage {
    /// Message name (e.g., "visitStarted")
    pub name: String,
    /// Message payload
    #[serde(default)]
    pub data: Value,
}

/// Closed set of inbound message names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptMessageName {
    PageLoaded,
    PageInvalidated,
    VisitProposed,
    VisitStarted,
    VisitRequestStarted,
    VisitRequestCompleted,
    VisitRequestFailed,
    VisitRequestFinished,
    VisitRendered,
    VisitCompleted,
    ErrorRaised,
}

/// Decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The runtime finished booting a freshly loaded page
    PageLoaded { restoration_identifier: String },
    /// The loaded page can no longer be reused
    PageInvalidated,
    /// The runtime asks the host to start a navigation
    VisitProposed { location: Url, action: VisitAction },
    /// A script-driven visit was accepted by the runtime
    VisitStarted { identifier: String, has_cached_snapshot: bool },
    VisitRequestStarted { identifier: String },
    VisitRequestCompleted { identifier: String },
    VisitRequestFailed { identifier: String, status_code: u16 },
    VisitRequestFinished { identifier: String },
    VisitRendered { identifier: String },
    VisitCompleted { identifier: String, restoration_identifier: String },
    /// A runtime-side error worth logging
    ErrorRaised { message: String },
}

impl BridgeEvent {
    /// Visit identifier carried by the event, if any
    pub fn visit_identifier(&self) -> Option<&str> {
        match self {
            BridgeEvent::VisitStarted { identifier, .. }
            | BridgeEvent::VisitRequestStarted { identifier }
            | BridgeEvent::VisitRequestCompleted { identifier }
            | BridgeEvent::VisitRequestFailed { identifier, .. }
            | BridgeEvent::VisitRequestFinished { identifier }
            | BridgeEvent::VisitRendered { identifier }
            | BridgeEvent::VisitCompleted { identifier, .. } => Some(identifier),
            _ => None,
        }
    }

    /// Message name this event was decoded from
    pub fn name(&self) -> ScriptMessageName {
        match self {
            BridgeEvent::PageLoaded { .. } => ScriptMessageName::PageLoaded,
            BridgeEvent::PageInvalidated => ScriptMessageName::PageInvalidated,
            BridgeEvent::VisitProposed { .. } => ScriptMessageName::VisitProposed,
            BridgeEvent::VisitStarted { .. } => ScriptMessageName::VisitStarted,
            BridgeEvent::VisitRequestStarted { .. } => ScriptMessageName::VisitRequestStarted,
            BridgeEvent::VisitRequestCompleted { .. } => ScriptMessageName::VisitRequestCompleted,
            BridgeEvent::VisitRequestFailed { .. } => ScriptMessageName::VisitRequestFailed,
            BridgeEvent::VisitRequestFinished { .. } => ScriptMessageName::VisitRequestFinished,
            BridgeEvent::VisitRendered { .. } => ScriptMessageName::VisitRendered,
            BridgeEvent::VisitCompleted { .. } => ScriptMessageName::VisitCompleted,
            BridgeEvent::ErrorRaised { .. } => ScriptMessageName::ErrorRaised,
        }
    }
}

/// Result object produced by the call wrapper script
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The function returned normally
    Returned(Value),
    /// The function threw inside the runtime
    Raised { error: String, stack: String },
}

/// Callback receiving the unwrapped return value of a call
pub type CallCompletion = Box<dyn FnOnce(Value) + Send>;

/// Outbound call waiting to be evaluated by the runtime
pub struct PendingCall {
    /// Full function expression (e.g., "webView.cancelVisitWithIdentifier")
    pub function: String,
    /// Encoded arguments
    pub arguments: Value,
    /// Wrapper script to evaluate
    pub script: String,
    /// Optional completion callback
    pub completion: Option<CallCompletion>,
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("function", &self.function)
            .field("arguments", &self.arguments)
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}
