//! Outbound bridge client
//!
//! Queues function calls for the script runtime. Calls are fire-and-forget
//! from the caller's point of view; the driver evaluates them in order and
//! routes the outcome back.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::bridge::codec;
use crate::bridge::types::{CallCompletion, PendingCall, VisitAction};
use crate::error::{Error, Result};

const VISIT_LOCATION: &str = "visitLocationWithActionAndRestorationIdentifier";
const ISSUE_REQUEST: &str = "issueRequestForVisitWithIdentifier";
const CHANGE_HISTORY: &str = "changeHistoryForVisitWithIdentifier";
const LOAD_CACHED_SNAPSHOT: &str = "loadCachedSnapshotForVisitWithIdentifier";
const LOAD_RESPONSE: &str = "loadResponseForVisitWithIdentifier";
const CANCEL_VISIT: &str = "cancelVisitWithIdentifier";

/// Handle for issuing calls into the script runtime
#[derive(Debug, Clone)]
pub struct ScriptBridge {
    namespace: Arc<str>,
    outbound: mpsc::UnboundedSender<PendingCall>,
}

impl ScriptBridge {
    /// Create a bridge and the receiving end of its call queue
    pub fn channel(namespace: &str) -> (Self, mpsc::UnboundedReceiver<PendingCall>) {
        let (outbound, calls) = mpsc::unbounded_channel();
        let bridge = Self {
            namespace: Arc::from(namespace),
            outbound,
        };
        (bridge, calls)
    }

    /// Namespace prefixed to every function name
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Queue a call whose return value is discarded
    pub fn call_function<A>(&self, function: &str, arguments: &A) -> Result<()>
    where
        A: Serialize + ?Sized,
    {
        self.enqueue(function, arguments, None)
    }

    /// Queue a call and deliver its return value to `completion`
    pub fn call_function_with_completion<A, F>(&self, function: &str, arguments: &A, completion: F) -> Result<()>
    where
        A: Serialize + ?Sized,
        F: FnOnce(Value) + Send + 'static,
    {
        self.enqueue(function, arguments, Some(Box::new(completion)))
    }

    fn enqueue<A>(&self, function: &str, arguments: &A, completion: Option<CallCompletion>) -> Result<()>
    where
        A: Serialize + ?Sized,
    {
        let expression = format!("{}.{}", self.namespace, function);

        let (arguments, encoded) = codec::encode_arguments(arguments).map_err(|e| {
            warn!("Refusing to call {}: {}", expression, e);
            e
        })?;

        let script = codec::script_for_function_call(&expression, &encoded);
        debug!("Queueing script call {}({})", expression, encoded);

        self.outbound
            .send(PendingCall {
                function: expression,
                arguments,
                script,
                completion,
            })
            .map_err(|e| Error::channel_closed(format!("bridge call queue: {}", e.0.function)))
    }

    /// Ask the runtime to navigate in place
    pub fn visit_location(&self, location: &Url, action: VisitAction, restoration_identifier: &str) -> Result<()> {
        self.call_function(
            VISIT_LOCATION,
            &json!([location.as_str(), action, restoration_identifier]),
        )
    }

    pub fn issue_request_for_visit(&self, identifier: &str) -> Result<()> {
        self.call_function(ISSUE_REQUEST, &[identifier])
    }

    pub fn change_history_for_visit(&self, identifier: &str) -> Result<()> {
        self.call_function(CHANGE_HISTORY, &[identifier])
    }

    pub fn load_cached_snapshot_for_visit(&self, identifier: &str) -> Result<()> {
        self.call_function(LOAD_CACHED_SNAPSHOT, &[identifier])
    }

    pub fn load_response_for_visit(&self, identifier: &str) -> Result<()> {
        self.call_function(LOAD_RESPONSE, &[identifier])
    }

    /// Tell the runtime to abandon a visit. Work already in flight may still
    /// produce events.
    pub fn cancel_visit(&self, identifier: &str) -> Result<()> {
        self.call_function(CANCEL_VISIT, &[identifier])
    }
}
