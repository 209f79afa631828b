//! Script runtime traits
//!
//! This module defines the abstract interface for evaluating scripts inside
//! the embedded runtime.

use async_trait::async_trait;
use serde_json::Value;

/// Script runtime trait
///
/// Represents the single script execution context that lives inside the
/// rendering surface. Implementations only evaluate; they never interpret
/// the result.
#[async_trait]
pub trait ScriptRuntime: Send + Sync + std::fmt::Debug {
    /// Evaluate a script and return its completion value.
    ///
    /// An `Err` means the runtime could not evaluate the script at all. A
    /// script that throws is not an `Err` here because every bridge call is
    /// wrapped so the exception comes back inside the returned value.
    async fn evaluate(&self, script: &str) -> Result<Value, crate::Error>;
}
