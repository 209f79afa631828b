//! Mock script runtime for testing
//!
//! Records every evaluated script and answers with a configurable result.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bridge::traits::ScriptRuntime;
use crate::Error;

/// Mock script runtime
#[derive(Debug)]
pub struct MockScriptRuntime {
    scripts: Arc<Mutex<Vec<String>>>,
    return_value: Arc<Mutex<Value>>,
    raised: Arc<Mutex<Option<(String, String)>>>,
    unavailable: Arc<AtomicBool>,
}

impl MockScriptRuntime {
    /// Create a new mock runtime that returns `null` for every call
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(Vec::new())),
            return_value: Arc::new(Mutex::new(Value::Null)),
            raised: Arc::new(Mutex::new(None)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Value placed in `result.value` for subsequent calls
    pub async fn set_return_value(&self, value: Value) {
        *self.return_value.lock().await = value;
    }

    /// Make subsequent calls throw inside the runtime
    pub async fn set_raised_exception(&self, error: Option<(&str, &str)>) {
        *self.raised.lock().await = error.map(|(e, s)| (e.to_string(), s.to_string()));
    }

    /// Make subsequent evaluations fail at the transport level
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Scripts evaluated so far, in order
    pub async fn evaluated_scripts(&self) -> Vec<String> {
        self.scripts.lock().await.clone()
    }

    /// Evaluated scripts that call the given function expression
    pub async fn calls_to(&self, function: &str) -> Vec<String> {
        let needle = format!("result.value = {}(", function);
        self.scripts
            .lock()
            .await
            .iter()
            .filter(|script| script.contains(&needle))
            .cloned()
            .collect()
    }
}

impl Default for MockScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptRuntime for MockScriptRuntime {
    async fn evaluate(&self, script: &str) -> Result<Value, Error> {
        self.scripts.lock().await.push(script.to_string());

        if self.unavailable.load(Ordering::Relaxed) {
            return Err(Error::script_evaluation("Script runtime is unavailable"));
        }

        if let Some((error, stack)) = self.raised.lock().await.clone() {
            return Ok(json!({ "error": error, "stack": stack }));
        }

        Ok(json!({ "value": self.return_value.lock().await.clone() }))
    }
}
