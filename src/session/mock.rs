//! Mock session collaborators for testing
//!
//! Recording implementations of [`Visitable`], [`RenderSurface`] and
//! [`SessionDelegate`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use super::traits::{
    NavigationId, RenderSurface, SessionDelegate, SessionHandle, Visitable, VisitableId,
    WeakSessionHandle,
};
use crate::bridge::VisitAction;
use crate::error::{Error, VisitFailure};

/// Mock visitable
#[derive(Debug)]
pub struct MockVisitable {
    id: VisitableId,
    url: Option<Url>,
    calls: Mutex<Vec<&'static str>>,
    delegate: Mutex<Option<WeakSessionHandle>>,
    activated: AtomicBool,
}

impl MockVisitable {
    /// Create a visitable for `url`
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self::with_url(Url::parse(url).ok()))
    }

    /// Create a visitable that exposes no URL
    pub fn without_url() -> Arc<Self> {
        Arc::new(Self::with_url(None))
    }

    fn with_url(url: Option<Url>) -> Self {
        Self {
            id: VisitableId::new(),
            url,
            calls: Mutex::new(Vec::new()),
            delegate: Mutex::new(None),
            activated: AtomicBool::new(false),
        }
    }

    fn record(&self, call: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Capability calls received so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of times `call` was received
    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Whether the surface is currently attached
    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::Relaxed)
    }

    /// Handle installed by the session, while the session is reachable
    pub fn delegate(&self) -> Option<SessionHandle> {
        self.delegate
            .lock()
            .ok()
            .and_then(|d| d.as_ref().and_then(WeakSessionHandle::upgrade))
    }
}

impl Visitable for MockVisitable {
    fn id(&self) -> VisitableId {
        self.id
    }

    fn url(&self) -> Option<Url> {
        self.url.clone()
    }

    fn set_delegate(&self, delegate: WeakSessionHandle) {
        if let Ok(mut slot) = self.delegate.lock() {
            *slot = Some(delegate);
        }
    }

    fn activate_surface(&self, _surface: Arc<dyn RenderSurface>) {
        self.activated.store(true, Ordering::Relaxed);
        self.record("activate_surface");
    }

    fn deactivate_surface(&self) {
        self.activated.store(false, Ordering::Relaxed);
        self.record("deactivate_surface");
    }

    fn update_snapshot(&self) {
        self.record("update_snapshot");
    }

    fn show_snapshot(&self) {
        self.record("show_snapshot");
    }

    fn hide_snapshot(&self) {
        self.record("hide_snapshot");
    }

    fn clear_snapshot(&self) {
        self.record("clear_snapshot");
    }

    fn show_activity_indicator(&self) {
        self.record("show_activity_indicator");
    }

    fn hide_activity_indicator(&self) {
        self.record("hide_activity_indicator");
    }

    fn did_render(&self) {
        self.record("did_render");
    }

    fn will_refresh(&self) {
        self.record("will_refresh");
    }

    fn did_refresh(&self) {
        self.record("did_refresh");
    }
}

/// Mock rendering surface
#[derive(Debug, Default)]
pub struct MockRenderSurface {
    loads: Mutex<Vec<(NavigationId, Url)>>,
    stops: AtomicUsize,
    refuse_loads: AtomicBool,
}

impl MockRenderSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent loads fail immediately
    pub fn set_refuse_loads(&self, refuse: bool) {
        self.refuse_loads.store(refuse, Ordering::Relaxed);
    }

    /// Locations loaded so far
    pub fn loaded_urls(&self) -> Vec<String> {
        self.loads
            .lock()
            .map(|l| l.iter().map(|(_, url)| url.to_string()).collect())
            .unwrap_or_default()
    }

    /// Most recent navigation started on the surface
    pub fn last_navigation(&self) -> Option<NavigationId> {
        self.loads.lock().ok().and_then(|l| l.last().map(|(id, _)| *id))
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }
}

impl RenderSurface for MockRenderSurface {
    fn load(&self, location: &Url) -> Result<NavigationId, Error> {
        if self.refuse_loads.load(Ordering::Relaxed) {
            return Err(Error::surface(format!("refused to load {}", location)));
        }

        let navigation = NavigationId::new();
        self.loads
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .push((navigation, location.clone()));
        Ok(navigation)
    }

    fn stop_loading(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }
}

/// Session delegate that records every notification
#[derive(Debug, Default)]
pub struct RecordingSessionDelegate {
    proposals: Mutex<Vec<(String, VisitAction)>>,
    failures: Mutex<Vec<(VisitableId, VisitFailure)>>,
    script_failures: Mutex<Vec<String>>,
    surface_loads: AtomicUsize,
    requests_started: AtomicUsize,
    requests_finished: AtomicUsize,
}

impl RecordingSessionDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn proposals(&self) -> Vec<(String, VisitAction)> {
        self.proposals.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<(VisitableId, VisitFailure)> {
        self.failures.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn script_failures(&self) -> Vec<String> {
        self.script_failures.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn surface_loads(&self) -> usize {
        self.surface_loads.load(Ordering::Relaxed)
    }

    pub fn requests_started(&self) -> usize {
        self.requests_started.load(Ordering::Relaxed)
    }

    pub fn requests_finished(&self) -> usize {
        self.requests_finished.load(Ordering::Relaxed)
    }
}

impl SessionDelegate for RecordingSessionDelegate {
    fn did_propose_visit(&self, location: &Url, action: VisitAction) {
        if let Ok(mut proposals) = self.proposals.lock() {
            proposals.push((location.to_string(), action));
        }
    }

    fn did_fail_request(&self, visitable: &Arc<dyn Visitable>, failure: &VisitFailure) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push((visitable.id(), failure.clone()));
        }
    }

    fn did_load_surface(&self) {
        self.surface_loads.fetch_add(1, Ordering::Relaxed);
    }

    fn did_start_request(&self) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
    }

    fn did_finish_request(&self) {
        self.requests_finished.fetch_add(1, Ordering::Relaxed);
    }

    fn did_fail_script_evaluation(&self, error: &Error) {
        if let Ok(mut failures) = self.script_failures.lock() {
            failures.push(error.to_string());
        }
    }
}
