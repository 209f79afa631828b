//! Session orchestrator
//!
//! Owns at most one active visit, routes runtime and surface events to it,
//! keeps the topmost visit and the activated visitable, and remembers one
//! restoration identifier per visitable.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::bridge::{codec, BridgeEvent, CallCompletion, CallOutcome, ScriptBridge, VisitAction};
use crate::config::SessionConfig;
use crate::error::{Error, VisitFailure};
use crate::session::traits::{
    RenderSurface, SessionDelegate, SessionInput, SurfaceEvent, Visitable,
    VisitableEvent, VisitableId, WeakSessionHandle,
};
use crate::session::visit::{Visit, VisitDelegate, VisitId, VisitState, VisitStrategy};

/// Visit lifecycle orchestrator
///
/// Not thread-safe by itself: every method must be called from a single
/// coordination context, normally the [`SessionDriver`](super::SessionDriver)
/// loop.
pub struct Session {
    config: SessionConfig,
    surface: Arc<dyn RenderSurface>,
    bridge: ScriptBridge,
    delegate: Arc<dyn SessionDelegate>,
    handle: WeakSessionHandle,
    initialized: bool,
    refreshing: bool,
    visits: HashMap<VisitId, Visit>,
    current_visit: Option<VisitId>,
    topmost_visit: Option<VisitId>,
    activated_visitable: Option<Arc<dyn Visitable>>,
    visitables: HashMap<VisitableId, Weak<dyn Visitable>>,
    restoration_identifiers: HashMap<VisitableId, String>,
    /// Script visits canceled before the runtime assigned them an
    /// identifier, oldest first. Their `VisitStarted` events are still due.
    unbound_canceled_visits: VecDeque<VisitId>,
}

impl Session {
    /// Create a session
    ///
    /// `bridge` queues calls for the script runtime and `handle` is handed to
    /// every visited visitable so it can report view lifecycle events.
    pub fn new(
        config: SessionConfig,
        surface: Arc<dyn RenderSurface>,
        bridge: ScriptBridge,
        delegate: Arc<dyn SessionDelegate>,
        handle: WeakSessionHandle,
    ) -> Self {
        Self {
            config,
            surface,
            bridge,
            delegate,
            handle,
            initialized: false,
            refreshing: false,
            visits: HashMap::new(),
            current_visit: None,
            topmost_visit: None,
            activated_visitable: None,
            visitables: HashMap::new(),
            restoration_identifiers: HashMap::new(),
            unbound_canceled_visits: VecDeque::new(),
        }
    }

    /// Outbound call queue shared by every script visit
    pub fn bridge(&self) -> &ScriptBridge {
        &self.bridge
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the script runtime finished its cold boot handshake
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn current_visit(&self) -> Option<&Visit> {
        self.current_visit.and_then(|id| self.visits.get(&id))
    }

    /// Most recently navigated visit
    pub fn topmost_visit(&self) -> Option<&Visit> {
        self.topmost_visit.and_then(|id| self.visits.get(&id))
    }

    pub fn topmost_visitable(&self) -> Option<Arc<dyn Visitable>> {
        self.topmost_visit().map(|visit| visit.visitable().clone())
    }

    /// Visitable currently attached to the rendering surface
    pub fn activated_visitable(&self) -> Option<&Arc<dyn Visitable>> {
        self.activated_visitable.as_ref()
    }

    // ------------------------------------------------------------------
    // Visiting
    // ------------------------------------------------------------------

    pub fn visit(&mut self, visitable: Arc<dyn Visitable>) {
        self.visit_visitable(visitable, VisitAction::Advance);
    }

    /// Start a visit for `visitable`, canceling the active one
    ///
    /// Does nothing when the visitable exposes no URL.
    #[instrument(skip(self, visitable), fields(visitable = %visitable.id()))]
    pub fn visit_visitable(&mut self, visitable: Arc<dyn Visitable>, action: VisitAction) {
        let Some(location) = visitable.url() else {
            debug!("Visitable has no URL, not visiting");
            return;
        };

        visitable.set_delegate(self.handle.clone());
        self.register_visitable(&visitable);

        let visit = if self.initialized {
            let mut visit = Visit::new(visitable, location, action, VisitStrategy::script(self.bridge.clone()));
            let restoration_identifier = self.restoration_identifier_for(visit.visitable()).map(str::to_string);
            visit.set_restoration_identifier(restoration_identifier);
            visit
        } else {
            Visit::new(visitable, location, action, VisitStrategy::cold_boot(self.surface.clone()))
        };

        if let Some(current) = self.current_visit {
            self.cancel_visit(current);
        }

        if visit.is_cold_boot() && !self.unbound_canceled_visits.is_empty() {
            // A fresh page load discards every visit the old runtime knew
            debug!("Forgetting {} unbound canceled visits", self.unbound_canceled_visits.len());
            self.unbound_canceled_visits.clear();
        }

        let id = visit.id();
        info!("Visiting {} ({}) as {}", visit.location(), action, if visit.is_cold_boot() { "cold boot" } else { "script visit" });
        self.visits.insert(id, visit);
        self.current_visit = Some(id);
        self.prune_visits();

        self.with_visit(id, |visit, session| visit.start(session));
    }

    /// Re-visit the topmost visitable with a fresh cold boot
    ///
    /// The new visit becomes the topmost visit as soon as it is created.
    pub fn reload(&mut self) {
        let Some(visitable) = self.topmost_visitable() else {
            debug!("Nothing to reload");
            return;
        };

        info!("Reloading {}", visitable.id());
        self.initialized = false;
        self.visit(visitable);
        self.topmost_visit = self.current_visit;
        self.prune_visits();
    }

    /// Promote the current visit to topmost and signal its navigation
    pub fn complete_navigation_for_current_visit(&mut self) {
        if let Some(current) = self.current_visit {
            self.topmost_visit = Some(current);
            self.with_visit(current, |visit, session| visit.complete_navigation(session));
        }
    }

    // ------------------------------------------------------------------
    // Restoration identifiers
    // ------------------------------------------------------------------

    pub fn store_restoration_identifier(&mut self, restoration_identifier: &str, visitable: &Arc<dyn Visitable>) {
        trace!("Storing restoration identifier {} for {}", restoration_identifier, visitable.id());
        self.restoration_identifiers
            .insert(visitable.id(), restoration_identifier.to_string());
    }

    pub fn restoration_identifier_for(&self, visitable: &Arc<dyn Visitable>) -> Option<&str> {
        self.restoration_identifiers
            .get(&visitable.id())
            .map(String::as_str)
    }

    // ------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------

    /// Attach the rendering surface to `visitable`, detaching the previous one
    pub fn activate_visitable(&mut self, visitable: &Arc<dyn Visitable>) {
        if self.is_activated(visitable) {
            return;
        }

        if let Some(previous) = self.activated_visitable.clone() {
            self.deactivate_visitable(&previous, self.config.snapshot_on_deactivate);
        }

        debug!("Activating visitable {}", visitable.id());
        visitable.activate_surface(self.surface.clone());
        self.activated_visitable = Some(visitable.clone());
    }

    /// Detach the rendering surface from `visitable` if it holds it,
    /// optionally leaving a snapshot in its place
    pub fn deactivate_visitable(&mut self, visitable: &Arc<dyn Visitable>, show_snapshot: bool) {
        if !self.is_activated(visitable) {
            return;
        }

        if show_snapshot {
            visitable.update_snapshot();
            visitable.show_snapshot();
        }

        debug!("Deactivating visitable {}", visitable.id());
        visitable.deactivate_surface();
        self.activated_visitable = None;
    }

    fn is_activated(&self, visitable: &Arc<dyn Visitable>) -> bool {
        self.activated_visitable
            .as_ref()
            .is_some_and(|activated| activated.id() == visitable.id())
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Apply one input from the session queue
    pub fn handle_input(&mut self, input: SessionInput) {
        trace!("Session input {:?}", input);

        match input {
            SessionInput::Visit { visitable, action } => self.visit_visitable(visitable, action),
            SessionInput::Reload => self.reload(),
            SessionInput::ScriptMessage(message) => self.handle_script_message(&message),
            SessionInput::Surface(event) => self.handle_surface_event(&event),
            SessionInput::Visitable { id, event } => self.handle_visitable_event(id, event),
        }
    }

    /// Decode and apply a raw runtime message. Malformed messages are dropped.
    pub fn handle_script_message(&mut self, message: &Value) {
        match codec::decode_message(message) {
            Ok(Some(event)) => self.handle_bridge_event(&event),
            Ok(None) => debug!("Ignoring unknown script message {}", message),
            Err(e) => warn!("Dropping script message: {}", e),
        }
    }

    pub fn handle_bridge_event(&mut self, event: &BridgeEvent) {
        match event {
            BridgeEvent::VisitProposed { location, action } => {
                debug!("Runtime proposed visit to {} ({})", location, action);
                self.delegate.did_propose_visit(location, *action);
            }
            BridgeEvent::PageInvalidated => self.page_invalidated(),
            BridgeEvent::ErrorRaised { message } => {
                warn!("Script runtime raised an error: {}", message);
            }
            BridgeEvent::VisitStarted { identifier, .. } if !self.unbound_canceled_visits.is_empty() => {
                self.cancel_late_started_visit(identifier);
            }
            _ => {
                let Some(current) = self.current_visit else {
                    debug!("No current visit for {:?}", event.name());
                    return;
                };
                self.with_visit(current, |visit, session| visit.handle_bridge_event(event, session));
            }
        }
    }

    pub fn handle_surface_event(&mut self, event: &SurfaceEvent) {
        if let Some(current) = self.current_visit {
            self.with_visit(current, |visit, session| visit.handle_surface_event(event, session));
        }
    }

    /// Deliver the result of an evaluated bridge call
    ///
    /// A returned value goes to `completion`. A raised exception or a
    /// transport error is treated as a script evaluation failure.
    pub fn handle_call_result(&mut self, function: &str, completion: Option<CallCompletion>, result: Result<Value, Error>) {
        match result.map(codec::decode_call_outcome) {
            Ok(CallOutcome::Returned(value)) => {
                if let Some(completion) = completion {
                    completion(value);
                }
            }
            Ok(CallOutcome::Raised { error, stack }) => {
                self.did_fail_script_evaluation(Error::script_exception(function, error, stack));
            }
            Err(e) => self.did_fail_script_evaluation(e),
        }
    }

    /// Report a failed evaluation and recover through a cold boot
    pub fn did_fail_script_evaluation(&mut self, error: Error) {
        error!("Script evaluation failed: {}", error);
        self.delegate.did_fail_script_evaluation(&error);

        if !self.initialized {
            return;
        }
        let Some(current) = self.current_visit else {
            return;
        };
        let Some((visitable, action)) = self
            .visits
            .get(&current)
            .map(|visit| (visit.visitable().clone(), visit.action()))
        else {
            return;
        };

        warn!("Recovering from script failure with a cold boot of {}", visitable.id());
        self.initialized = false;
        self.cancel_visit(current);
        self.visit_visitable(visitable, action);
    }

    fn page_invalidated(&mut self) {
        let Some(visitable) = self.topmost_visitable() else {
            return;
        };

        info!("Page invalidated, reloading {}", visitable.id());
        visitable.update_snapshot();
        visitable.show_snapshot();
        visitable.show_activity_indicator();
        self.reload();
    }

    // ------------------------------------------------------------------
    // Visitable view lifecycle
    // ------------------------------------------------------------------

    pub fn handle_visitable_event(&mut self, id: VisitableId, event: VisitableEvent) {
        let Some(visitable) = self.visitables.get(&id).and_then(Weak::upgrade) else {
            debug!("Event {:?} for unknown visitable {}", event, id);
            return;
        };

        match event {
            VisitableEvent::ViewWillAppear { moving_to_parent } => {
                self.visitable_view_will_appear(visitable, moving_to_parent)
            }
            VisitableEvent::ViewDidAppear => self.visitable_view_did_appear(visitable),
            VisitableEvent::RequestedReload => {
                if self.is_topmost(&visitable) {
                    self.reload();
                }
            }
            VisitableEvent::RequestedRefresh => {
                if self.is_topmost(&visitable) {
                    self.refreshing = true;
                    visitable.will_refresh();
                    self.reload();
                }
            }
        }
    }

    fn visitable_view_will_appear(&mut self, visitable: Arc<dyn Visitable>, moving_to_parent: bool) {
        let (Some(topmost), Some(current)) = (self.topmost_visit(), self.current_visit()) else {
            return;
        };
        let topmost_state = topmost.state();
        let is_topmost = topmost.visitable().id() == visitable.id();
        let is_current = current.visitable().id() == visitable.id();
        let current_state = current.state();
        let current_id = current.id();

        if is_topmost && moving_to_parent {
            // Back swipe canceled
            if topmost_state == VisitState::Completed {
                self.cancel_visit(current_id);
            } else {
                self.visit_visitable(visitable, VisitAction::Advance);
            }
        } else if is_current && current_state == VisitState::Started {
            // Forward navigation
            self.complete_navigation_for_current_visit();
        } else if !is_topmost {
            // Backward navigation
            self.visit_visitable(visitable, VisitAction::Restore);
        }
    }

    fn visitable_view_did_appear(&mut self, visitable: Arc<dyn Visitable>) {
        if let Some(current) = self.current_visit() {
            if current.visitable().id() == visitable.id() {
                self.complete_navigation_for_current_visit();
                if self.current_visit().map(Visit::state) != Some(VisitState::Failed) {
                    self.activate_visitable(&visitable);
                }
                return;
            }
        }

        let reappearing = self
            .topmost_visit()
            .is_some_and(|topmost| topmost.visitable().id() == visitable.id() && topmost.state() == VisitState::Completed);
        if reappearing {
            // Canceled navigation, the old page is shown again
            visitable.did_render();
            self.activate_visitable(&visitable);
        }
    }

    fn is_topmost(&self, visitable: &Arc<dyn Visitable>) -> bool {
        self.topmost_visit()
            .is_some_and(|topmost| topmost.visitable().id() == visitable.id())
    }

    // ------------------------------------------------------------------
    // Visit storage
    // ------------------------------------------------------------------

    /// Cancel a stored visit, remembering it if the runtime has not bound it yet
    ///
    /// `visitLocation` calls and `VisitStarted` events travel in the same
    /// order, so the next `VisitStarted` belongs to the oldest unbound visit.
    fn cancel_visit(&mut self, id: VisitId) {
        let unbound = self.visits.get(&id).is_some_and(|visit| {
            !visit.is_cold_boot() && visit.state() == VisitState::Started && visit.identifier().is_none()
        });

        self.with_visit(id, |visit, session| visit.cancel(session));

        if unbound {
            trace!("Visit {} canceled before its VisitStarted", id);
            self.unbound_canceled_visits.push_back(id);
        }
    }

    /// Bind a `VisitStarted` to the oldest unbound canceled visit and cancel
    /// it in the runtime
    fn cancel_late_started_visit(&mut self, identifier: &str) {
        let Some(id) = self.unbound_canceled_visits.pop_front() else {
            return;
        };

        debug!("Runtime started canceled visit {} as {}, canceling it", id, identifier);
        if let Err(e) = self.bridge.cancel_visit(identifier) {
            warn!("Bridge call cancelVisit not issued: {}", e);
        }
    }

    /// Run `f` on a stored visit with the session as its delegate
    fn with_visit<R, F>(&mut self, id: VisitId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Visit, &mut Session) -> R,
    {
        let mut visit = self.visits.remove(&id)?;
        let result = f(&mut visit, self);
        self.visits.insert(id, visit);
        self.prune_visits();
        Some(result)
    }

    /// Drop visits that are neither current nor topmost
    fn prune_visits(&mut self) {
        let (current, topmost) = (self.current_visit, self.topmost_visit);
        self.visits.retain(|id, visit| {
            let keep = Some(*id) == current || Some(*id) == topmost;
            if !keep {
                trace!("Releasing visit {} ({:?})", id, visit.state());
            }
            keep
        });
    }

    fn register_visitable(&mut self, visitable: &Arc<dyn Visitable>) {
        self.visitables.retain(|_, known| known.strong_count() > 0);
        self.visitables
            .insert(visitable.id(), Arc::downgrade(visitable));
    }
}

impl VisitDelegate for Session {
    fn visit_will_start(&mut self, visit: &Visit) {
        visit.visitable().show_snapshot();
        self.activate_visitable(visit.visitable());
    }

    fn visit_did_start(&mut self, visit: &Visit) {
        if !visit.has_cached_snapshot() {
            visit.visitable().show_activity_indicator();
        }
    }

    fn visit_did_initialize_runtime(&mut self, visit: &Visit) {
        info!("Script runtime initialized by visit {}", visit.id());
        self.initialized = true;
        self.delegate.did_load_surface();
    }

    fn visit_will_load_response(&mut self, visit: &Visit) {
        visit.visitable().update_snapshot();
        visit.visitable().show_snapshot();
    }

    fn visit_did_render(&mut self, visit: &Visit) {
        let visitable = visit.visitable();
        visitable.hide_snapshot();
        visitable.hide_activity_indicator();
        visitable.did_render();
    }

    fn visit_did_complete(&mut self, visit: &Visit) {
        if let Some(restoration_identifier) = visit.restoration_identifier() {
            self.store_restoration_identifier(restoration_identifier, visit.visitable());
        }
    }

    fn visit_did_fail(&mut self, visit: &Visit) {
        visit.visitable().clear_snapshot();
        visit.visitable().show_snapshot();
    }

    fn visit_did_finish(&mut self, visit: &Visit) {
        if self.refreshing {
            self.refreshing = false;
            visit.visitable().did_refresh();
        }
    }

    fn visit_request_did_start(&mut self, _visit: &Visit) {
        self.delegate.did_start_request();
    }

    fn visit_request_did_fail(&mut self, visit: &Visit, failure: &VisitFailure) {
        warn!("Visit {} to {} failed: {}", visit.id(), visit.location(), failure);
        self.delegate.did_fail_request(visit.visitable(), failure);
    }

    fn visit_request_did_finish(&mut self, _visit: &Visit) {
        self.delegate.did_finish_request();
    }
}
