//! Visit-Session: navigation visit lifecycle engine
//!
//! This library coordinates page-navigation visits between a host that embeds
//! a rendering surface and the script runtime loaded inside it.

pub mod error;
pub mod config;

pub mod bridge;
pub mod session;

// Re-exports
pub use error::{Error, Result, VisitFailure};
pub use config::SessionConfig;
pub use bridge::{BridgeEvent, ScriptBridge, ScriptRuntime, VisitAction};
pub use session::{Session, SessionDelegate, SessionDriver, SessionHandle, Visit, VisitState, Visitable};

/// Visit-Session library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
