//! Session driver
//!
//! The single coordination loop. Session inputs and queued bridge calls are
//! consumed here in order; bridge calls are evaluated concurrently and their
//! results are fed back into the session on this same loop.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::bridge::{CallCompletion, PendingCall, ScriptBridge, ScriptRuntime};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::manager::Session;
use crate::session::traits::{RenderSurface, SessionDelegate, SessionHandle, SessionInput};

/// Finished evaluation: function expression, completion and raw result
type Evaluated = (String, Option<CallCompletion>, Result<Value>);

/// Owns a [`Session`] and feeds it from its input and call queues
pub struct SessionDriver {
    session: Session,
    runtime: Arc<dyn ScriptRuntime>,
    inputs: mpsc::UnboundedReceiver<SessionInput>,
    calls: mpsc::UnboundedReceiver<PendingCall>,
    evaluations: FuturesUnordered<BoxFuture<'static, Evaluated>>,
}

impl SessionDriver {
    /// Create a driver and the handle used to submit inputs to it
    pub fn new(
        config: SessionConfig,
        surface: Arc<dyn RenderSurface>,
        runtime: Arc<dyn ScriptRuntime>,
        delegate: Arc<dyn SessionDelegate>,
    ) -> (Self, SessionHandle) {
        let (handle, inputs) = SessionHandle::channel();
        let (bridge, calls) = ScriptBridge::channel(&config.script_namespace);

        info!(
            "Creating session driver (namespace {}, message handler {})",
            config.script_namespace, config.message_handler_name
        );
        let session = Session::new(config, surface, bridge, delegate, handle.downgrade());

        let driver = Self {
            session,
            runtime,
            inputs,
            calls,
            evaluations: FuturesUnordered::new(),
        };
        (driver, handle)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Number of bridge calls currently being evaluated
    pub fn in_flight(&self) -> usize {
        self.evaluations.len()
    }

    /// Process inputs until every [`SessionHandle`] is dropped
    ///
    /// Bridge calls have no timeout: an evaluation that never resolves stays
    /// in flight without blocking other work.
    pub async fn run(&mut self) {
        info!("Session driver running");

        loop {
            tokio::select! {
                biased;

                Some(call) = self.calls.recv() => self.dispatch(call),

                Some((function, completion, result)) = self.evaluations.next(), if !self.evaluations.is_empty() => {
                    self.session.handle_call_result(&function, completion, result);
                }

                input = self.inputs.recv() => match input {
                    Some(input) => self.session.handle_input(input),
                    None => break,
                },
            }
        }

        self.run_until_idle().await;
        info!("Session driver stopped, all handles dropped");
    }

    /// Drain queued inputs and calls and wait for every in-flight evaluation
    ///
    /// Returns once nothing is left to do. Calls and their results are
    /// settled before the next input is applied.
    pub async fn run_until_idle(&mut self) {
        loop {
            while let Ok(call) = self.calls.try_recv() {
                self.dispatch(call);
            }

            if let Some((function, completion, result)) = self.evaluations.next().await {
                self.session.handle_call_result(&function, completion, result);
                continue;
            }

            match self.inputs.try_recv() {
                Ok(input) => self.session.handle_input(input),
                Err(_) => break,
            }
        }

        trace!("Session driver idle");
    }

    fn dispatch(&mut self, call: PendingCall) {
        let PendingCall {
            function,
            script,
            completion,
            ..
        } = call;

        debug!("Evaluating {}", function);
        let runtime = self.runtime.clone();
        self.evaluations.push(Box::pin(async move {
            let result = runtime.evaluate(&script).await;
            (function, completion, result)
        }));
    }
}

impl std::fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDriver")
            .field("runtime", &self.runtime)
            .field("in_flight", &self.evaluations.len())
            .finish()
    }
}
