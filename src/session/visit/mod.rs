//! Visit state machine
//!
//! One [`Visit`] per attempted navigation. The shared lifecycle lives here;
//! the two execution strategies (`cold_boot`, `script`) only supply hooks and
//! event handlers.
//!
//! ```text
//! Initialized -> Started -> Completed | Canceled | Failed
//! ```
//!
//! Terminal states are sinks: every transition and every event handler is a
//! no-op once the visit has left `Started`.

mod cold_boot;
mod script;


pub use cold_boot::ColdBoot;
pub use script::ScriptDriven;

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use crate::bridge::{BridgeEvent, ScriptBridge, VisitAction};
use crate::error::VisitFailure;
use crate::session::traits::{RenderSurface, SurfaceEvent, Visitable};

/// Process-local visit identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitId(Uuid);

impl VisitId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visit lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Initialized,
    Started,
    Canceled,
    Failed,
    Completed,
}

impl VisitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, VisitState::Canceled | VisitState::Failed | VisitState::Completed)
    }
}

/// Receiver of visit lifecycle notifications
///
/// Every notification fires at most once per visit.
pub trait VisitDelegate {
    fn visit_will_start(&mut self, visit: &Visit);
    fn visit_did_start(&mut self, visit: &Visit);
    /// A cold boot completed and the script runtime is ready for in-place visits
    fn visit_did_initialize_runtime(&mut self, visit: &Visit);
    fn visit_will_load_response(&mut self, visit: &Visit);
    fn visit_did_render(&mut self, visit: &Visit);
    fn visit_did_complete(&mut self, visit: &Visit);
    fn visit_did_fail(&mut self, visit: &Visit);
    /// Follows either `visit_did_complete` or `visit_did_fail`
    fn visit_did_finish(&mut self, visit: &Visit);
    fn visit_request_did_start(&mut self, visit: &Visit);
    fn visit_request_did_fail(&mut self, visit: &Visit, failure: &VisitFailure);
    fn visit_request_did_finish(&mut self, visit: &Visit);
}

/// Work deferred until the visible navigation has happened
pub type NavigationContinuation = Box<dyn FnOnce(&mut Visit, &mut dyn VisitDelegate) + Send>;

/// How a visit is carried out
#[derive(Debug)]
pub enum VisitStrategy {
    /// Full reload of the rendering surface
    ColdBoot(ColdBoot),
    /// In-place navigation performed by the loaded script runtime
    Script(ScriptDriven),
}

impl VisitStrategy {
    pub fn cold_boot(surface: Arc<dyn RenderSurface>) -> Self {
        VisitStrategy::ColdBoot(ColdBoot::new(surface))
    }

    pub fn script(bridge: ScriptBridge) -> Self {
        VisitStrategy::Script(ScriptDriven::new(bridge))
    }
}

/// One navigation attempt
pub struct Visit {
    id: VisitId,
    visitable: Arc<dyn Visitable>,
    location: Url,
    action: VisitAction,
    state: VisitState,
    strategy: VisitStrategy,
    has_cached_snapshot: bool,
    restoration_identifier: Option<String>,
    failure: Option<VisitFailure>,
    navigation_completed: bool,
    navigation_continuations: Vec<NavigationContinuation>,
    request_started: bool,
    request_finished: bool,
}

impl Visit {
    /// Create a visit for an explicit location
    pub fn new(visitable: Arc<dyn Visitable>, location: Url, action: VisitAction, strategy: VisitStrategy) -> Self {
        Self {
            id: VisitId::new(),
            visitable,
            location,
            action,
            state: VisitState::Initialized,
            strategy,
            has_cached_snapshot: false,
            restoration_identifier: None,
            failure: None,
            navigation_completed: false,
            navigation_continuations: Vec::new(),
            request_started: false,
            request_finished: false,
        }
    }

    /// Create a visit for the visitable's own URL; `None` if it has none
    pub fn for_visitable(visitable: Arc<dyn Visitable>, action: VisitAction, strategy: VisitStrategy) -> Option<Self> {
        let location = visitable.url()?;
        Some(Self::new(visitable, location, action, strategy))
    }

    pub fn id(&self) -> VisitId {
        self.id
    }

    pub fn visitable(&self) -> &Arc<dyn Visitable> {
        &self.visitable
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn action(&self) -> VisitAction {
        self.action
    }

    pub fn state(&self) -> VisitState {
        self.state
    }

    pub fn has_cached_snapshot(&self) -> bool {
        self.has_cached_snapshot
    }

    pub fn restoration_identifier(&self) -> Option<&str> {
        self.restoration_identifier.as_deref()
    }

    pub fn set_restoration_identifier(&mut self, restoration_identifier: Option<String>) {
        self.restoration_identifier = restoration_identifier;
    }

    /// Why the visit failed, once it has
    pub fn failure(&self) -> Option<&VisitFailure> {
        self.failure.as_ref()
    }

    pub fn is_cold_boot(&self) -> bool {
        matches!(self.strategy, VisitStrategy::ColdBoot(_))
    }

    /// Runtime-assigned identifier of a script-driven visit
    pub fn identifier(&self) -> Option<&str> {
        match &self.strategy {
            VisitStrategy::Script(script) => script.identifier(),
            VisitStrategy::ColdBoot(_) => None,
        }
    }

    pub fn navigation_completed(&self) -> bool {
        self.navigation_completed
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn start(&mut self, delegate: &mut dyn VisitDelegate) {
        if self.state != VisitState::Initialized {
            return;
        }

        debug!("Starting visit {} to {} ({})", self.id, self.location, self.action);
        self.state = VisitState::Started;
        delegate.visit_will_start(self);

        match self.strategy {
            VisitStrategy::ColdBoot(_) => self.start_cold_boot(delegate),
            VisitStrategy::Script(_) => self.start_script_visit(delegate),
        }
    }

    pub fn cancel(&mut self, delegate: &mut dyn VisitDelegate) {
        if self.state != VisitState::Started {
            return;
        }

        debug!("Canceling visit {}", self.id);
        self.state = VisitState::Canceled;

        match self.strategy {
            VisitStrategy::ColdBoot(_) => self.cancel_cold_boot(delegate),
            VisitStrategy::Script(_) => self.cancel_script_visit(delegate),
        }
    }

    pub fn complete(&mut self, delegate: &mut dyn VisitDelegate) {
        if self.state != VisitState::Started {
            return;
        }

        debug!("Completing visit {}", self.id);
        self.state = VisitState::Completed;

        if let VisitStrategy::ColdBoot(_) = self.strategy {
            self.complete_cold_boot(delegate);
        }

        delegate.visit_did_complete(self);
        delegate.visit_did_finish(self);
    }

    pub fn fail(&mut self, delegate: &mut dyn VisitDelegate) {
        self.fail_with(delegate, |_, _| {});
    }

    /// Fail the visit, running `cleanup` right after the transition
    pub fn fail_with<F>(&mut self, delegate: &mut dyn VisitDelegate, cleanup: F)
    where
        F: FnOnce(&mut Visit, &mut dyn VisitDelegate),
    {
        if self.state != VisitState::Started {
            return;
        }

        debug!("Visit {} failed", self.id);
        self.state = VisitState::Failed;
        cleanup(self, &mut *delegate);

        // Both strategies close the request on failure.
        self.finish_request(delegate);

        delegate.visit_did_fail(self);
        delegate.visit_did_finish(self);
    }

    /// Fail with a recorded reason, reporting it as a request failure
    pub fn fail_request(&mut self, delegate: &mut dyn VisitDelegate, failure: VisitFailure) {
        if self.state != VisitState::Started {
            return;
        }

        self.failure = Some(failure.clone());
        self.fail_with(delegate, move |visit, delegate| {
            delegate.visit_request_did_fail(visit, &failure);
        });
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Signal that the visible navigation has happened. Runs pending
    /// continuations in registration order; once the visit is canceled the
    /// rest are dropped.
    pub fn complete_navigation(&mut self, delegate: &mut dyn VisitDelegate) {
        if self.state != VisitState::Started || self.navigation_completed {
            return;
        }

        self.navigation_completed = true;
        let continuations = std::mem::take(&mut self.navigation_continuations);

        for (index, continuation) in continuations.into_iter().enumerate() {
            if self.state == VisitState::Canceled {
                debug!("Visit {} canceled, skipping navigation continuations from #{}", self.id, index);
                break;
            }
            continuation(self, &mut *delegate);
        }
    }

    /// Run `continuation` once navigation completes, or now if it already has
    pub fn after_navigation_completion<F>(&mut self, delegate: &mut dyn VisitDelegate, continuation: F)
    where
        F: FnOnce(&mut Visit, &mut dyn VisitDelegate) + Send + 'static,
    {
        if self.navigation_completed {
            continuation(self, delegate);
        } else {
            self.navigation_continuations.push(Box::new(continuation));
        }
    }

    // ------------------------------------------------------------------
    // Request state
    // ------------------------------------------------------------------

    pub fn start_request(&mut self, delegate: &mut dyn VisitDelegate) {
        if !self.request_started {
            self.request_started = true;
            delegate.visit_request_did_start(self);
        }
    }

    pub fn finish_request(&mut self, delegate: &mut dyn VisitDelegate) {
        if self.request_started && !self.request_finished {
            self.request_finished = true;
            delegate.visit_request_did_finish(self);
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Feed a runtime event to this visit. Events that do not concern it,
    /// or arrive after it reached a terminal state, are dropped.
    pub fn handle_bridge_event(&mut self, event: &BridgeEvent, delegate: &mut dyn VisitDelegate) {
        if self.state != VisitState::Started {
            trace!("Visit {} is {:?}, dropping {:?}", self.id, self.state, event.name());
            return;
        }

        if self.is_cold_boot() {
            match event {
                BridgeEvent::PageLoaded { restoration_identifier } => {
                    self.did_load_page(restoration_identifier, delegate);
                }
                _ => trace!("Cold boot visit {} ignoring {:?}", self.id, event.name()),
            }
            return;
        }

        match event {
            BridgeEvent::VisitStarted { identifier, has_cached_snapshot } => {
                self.did_start_visit(identifier, *has_cached_snapshot, delegate);
            }
            _ if !self.matches_identifier(event.visit_identifier()) => {
                trace!("Visit {} ignoring {:?} for another visit", self.id, event.name());
            }
            BridgeEvent::VisitRequestStarted { .. } => {
                self.start_request(delegate);
            }
            BridgeEvent::VisitRequestCompleted { .. } => {
                self.did_complete_request(delegate);
            }
            BridgeEvent::VisitRequestFailed { status_code, .. } => {
                self.fail_request(delegate, VisitFailure::RequestFailed { status_code: *status_code });
            }
            BridgeEvent::VisitRequestFinished { .. } => {
                self.finish_request(delegate);
            }
            BridgeEvent::VisitRendered { .. } => {
                delegate.visit_did_render(self);
            }
            BridgeEvent::VisitCompleted { restoration_identifier, .. } => {
                self.restoration_identifier = Some(restoration_identifier.clone());
                self.complete(delegate);
            }
            _ => {
                trace!("Visit {} has no handler for {:?}", self.id, event.name());
            }
        }
    }

    /// Feed a rendering surface load outcome to this visit
    pub fn handle_surface_event(&mut self, event: &SurfaceEvent, delegate: &mut dyn VisitDelegate) {
        if self.state != VisitState::Started {
            return;
        }

        match event {
            SurfaceEvent::LoadFinished(navigation) => self.did_finish_load(*navigation, delegate),
            SurfaceEvent::LoadFailed(navigation, message) => self.did_fail_load(*navigation, message, delegate),
        }
    }

    fn matches_identifier(&self, identifier: Option<&str>) -> bool {
        match (self.identifier(), identifier) {
            (Some(own), Some(other)) => own == other,
            _ => false,
        }
    }
}

impl fmt::Debug for Visit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visit")
            .field("id", &self.id)
            .field("visitable", &self.visitable.id())
            .field("location", &self.location.as_str())
            .field("action", &self.action)
            .field("state", &self.state)
            .field("strategy", &self.strategy)
            .field("has_cached_snapshot", &self.has_cached_snapshot)
            .field("restoration_identifier", &self.restoration_identifier)
            .field("pending_continuations", &self.navigation_continuations.len())
            .finish()
    }
}
