//! Common test utilities
//!
//! Shared fixtures for driving a session end to end with mock collaborators.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use visit_session::bridge::MockScriptRuntime;
use visit_session::config::SessionConfig;
use visit_session::session::mock::{MockRenderSurface, MockVisitable, RecordingSessionDelegate};
use visit_session::session::{SessionDriver, SessionHandle, SurfaceEvent, Visitable, VisitableEvent};

/// Install a test-friendly subscriber once
///
/// `RUST_LOG` wins; otherwise the level comes from `VISIT_SESSION_LOG_LEVEL`.
pub fn init_tracing() {
    let level = SessionConfig::from_env()
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("visit_session={}", level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Build a runtime message in the wire shape
pub fn message(name: &str, data: Value) -> Value {
    json!({ "name": name, "data": data })
}

/// A driver wired to mock collaborators
pub struct Harness {
    pub driver: SessionDriver,
    pub handle: SessionHandle,
    pub surface: Arc<MockRenderSurface>,
    pub runtime: Arc<MockScriptRuntime>,
    pub delegate: Arc<RecordingSessionDelegate>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();

        let surface = MockRenderSurface::new();
        let runtime = Arc::new(MockScriptRuntime::new());
        let delegate = RecordingSessionDelegate::new();
        let (driver, handle) = SessionDriver::new(
            SessionConfig::default(),
            surface.clone(),
            runtime.clone(),
            delegate.clone(),
        );

        Self {
            driver,
            handle,
            surface,
            runtime,
            delegate,
        }
    }

    /// Deliver a runtime message and settle
    pub async fn deliver(&mut self, name: &str, data: Value) {
        self.handle
            .deliver_message(message(name, data))
            .expect("input queue open");
        self.driver.run_until_idle().await;
    }

    /// Report the last surface load as finished and settle
    pub async fn finish_load(&mut self) {
        let navigation = self.surface.last_navigation().expect("a load was started");
        self.handle
            .surface_event(SurfaceEvent::LoadFinished(navigation))
            .expect("input queue open");
        self.driver.run_until_idle().await;
    }

    /// Report a view lifecycle event the way a visitable would
    pub async fn view_event(&mut self, visitable: &Arc<MockVisitable>, event: VisitableEvent) {
        let handle = visitable.delegate().expect("visitable is attached to a session");
        handle
            .visitable_event(visitable.id(), event)
            .expect("input queue open");
        self.driver.run_until_idle().await;
    }

    /// Visit and settle
    pub async fn visit(&mut self, visitable: &Arc<MockVisitable>) {
        self.handle.visit(visitable.clone()).expect("input queue open");
        self.driver.run_until_idle().await;
    }

    /// Cold boot `visitable` until the runtime is initialized and it is topmost
    pub async fn boot(&mut self, visitable: &Arc<MockVisitable>) {
        self.visit(visitable).await;
        self.finish_load().await;
        self.deliver("pageLoaded", json!({ "restorationIdentifier": "rid-0" })).await;
        self.view_event(visitable, VisitableEvent::ViewDidAppear).await;
    }
}
