//! # Bridge protocol
//!
//! Call/event channel between the host and the script runtime living inside
//! the rendering surface.
//!
//! ## Outbound
//! Calls are encoded as `namespace.function(args...)` wrapped in a
//! try/catch script, so a runtime exception comes back as a structured
//! result instead of escaping across the bridge.
//!
//! ## Inbound
//! Messages of the form `{ "name": ..., "data": { ... } }` are decoded into a
//! closed set of [`BridgeEvent`]s through a compile-time dispatch table.
//! Unknown names are ignored.
//!
//! ## Module structure
//! - `traits`: the `ScriptRuntime` evaluation seam
//! - `types`: protocol data types
//! - `codec`: script encoding and message decoding
//! - `client`: the outbound call queue
//! - `mock`: recording runtime for tests
//!
//! ## Example
//! ```rust
//! use visit_session::bridge::{ScriptBridge, VisitAction};
//!
//! let (bridge, mut calls) = ScriptBridge::channel("webView");
//! let url = url::Url::parse("https://example.com/b").unwrap();
//! bridge.visit_location(&url, VisitAction::Advance, "").unwrap();
//!
//! let call = calls.try_recv().unwrap();
//! assert_eq!(call.function, "webView.visitLocationWithActionAndRestorationIdentifier");
//! ```

pub mod traits;
pub mod types;
pub mod codec;
pub mod client;
pub mod mock;

#[cfg(test)]
pub mod tests;

pub use traits::ScriptRuntime;
pub use types::{
    BridgeEvent, CallCompletion, CallOutcome, PendingCall, ScriptMessage, ScriptMessageName,
    VisitAction,
};
pub use client::ScriptBridge;

pub use mock::MockScriptRuntime;
