//! End-to-end visit lifecycle tests
//!
//! These tests drive a session through its driver, with bridge calls
//! evaluated by the mock script runtime.

mod common;

use common::Harness;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::oneshot;

use visit_session::session::mock::MockVisitable;
use visit_session::session::{SessionDriver, Visitable, VisitableEvent, VisitState};
use visit_session::{SessionConfig, VisitAction, VisitFailure};

const VISIT_LOCATION: &str = "webView.visitLocationWithActionAndRestorationIdentifier";
const ISSUE_REQUEST: &str = "webView.issueRequestForVisitWithIdentifier";
const CANCEL_VISIT: &str = "webView.cancelVisitWithIdentifier";

/// Test 1: cold boot then an in-place visit
#[tokio::test]
async fn test_cold_boot_then_script_visit() {
    let mut h = Harness::new();
    let v1 = MockVisitable::new("https://x/a");
    let v2 = MockVisitable::new("https://x/b");

    h.boot(&v1).await;

    let session = h.driver.session();
    assert!(session.is_initialized());
    assert_eq!(session.current_visit().map(|v| v.state()), Some(VisitState::Completed));
    assert_eq!(session.topmost_visitable().map(|v| v.id()), Some(v1.id()));
    assert_eq!(h.delegate.surface_loads(), 1);
    assert!(h.runtime.evaluated_scripts().await.is_empty());

    h.visit(&v2).await;

    let calls = h.runtime.calls_to(VISIT_LOCATION).await;
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(r#"("https://x/b","advance","")"#));

    h.deliver("visitStarted", json!({ "identifier": "id-2", "hasCachedSnapshot": false })).await;
    assert_eq!(h.runtime.calls_to(ISSUE_REQUEST).await.len(), 1);

    h.deliver("visitCompleted", json!({ "identifier": "id-2", "restorationIdentifier": "rid-1" })).await;

    let session = h.driver.session();
    assert_eq!(session.current_visit().map(|v| v.state()), Some(VisitState::Completed));
    let v2_dyn: Arc<dyn Visitable> = v2.clone();
    assert_eq!(session.restoration_identifier_for(&v2_dyn), Some("rid-1"));
    assert!(h.delegate.script_failures().is_empty());
}

/// Test 2: a full script visit with navigation, request and render
#[tokio::test]
async fn test_script_visit_full_round_trip() {
    let mut h = Harness::new();
    let v1 = MockVisitable::new("https://x/a");
    let v2 = MockVisitable::new("https://x/b");
    h.boot(&v1).await;

    h.visit(&v2).await;
    h.deliver("visitStarted", json!({ "identifier": "id-2", "hasCachedSnapshot": 1 })).await;
    h.view_event(&v2, VisitableEvent::ViewWillAppear { moving_to_parent: true }).await;
    h.deliver("visitRequestStarted", json!({ "identifier": "id-2" })).await;
    h.deliver("visitRequestCompleted", json!({ "identifier": "id-2" })).await;
    h.deliver("visitRequestFinished", json!({ "identifier": "id-2" })).await;
    h.deliver("visitRendered", json!({ "identifier": "id-2" })).await;
    h.deliver("visitCompleted", json!({ "identifier": "id-2", "restorationIdentifier": "rid-1" })).await;
    h.view_event(&v2, VisitableEvent::ViewDidAppear).await;

    let scripts = h.runtime.evaluated_scripts().await;
    let issued: Vec<&str> = [
        "visitLocationWithActionAndRestorationIdentifier",
        "issueRequestForVisitWithIdentifier",
        "changeHistoryForVisitWithIdentifier",
        "loadCachedSnapshotForVisitWithIdentifier",
        "loadResponseForVisitWithIdentifier",
    ]
    .into_iter()
    .filter(|name| scripts.iter().any(|s| s.contains(name)))
    .collect();
    assert_eq!(issued.len(), 5);
    assert_eq!(scripts.len(), 5);

    // A cached snapshot means no activity indicator.
    assert_eq!(v2.count("show_activity_indicator"), 0);
    assert_eq!(v2.count("did_render"), 1);
    assert!(v2.is_activated());
    assert_eq!(h.delegate.requests_started(), 2);
    assert_eq!(h.delegate.requests_finished(), 2);
    assert_eq!(
        h.driver.session().topmost_visitable().map(|v| v.id()),
        Some(v2.id())
    );
}

/// Test 3: a superseded visit ignores its late events
#[tokio::test]
async fn test_superseded_visit_ignores_late_events() {
    let mut h = Harness::new();
    let v1 = MockVisitable::new("https://x/a");
    let v3 = MockVisitable::new("https://x/c");
    let v4 = MockVisitable::new("https://x/d");
    h.boot(&v1).await;

    h.visit(&v3).await;
    h.deliver("visitStarted", json!({ "identifier": "id-3", "hasCachedSnapshot": false })).await;
    h.visit(&v4).await;

    let canceled = h.runtime.calls_to(CANCEL_VISIT).await;
    assert_eq!(canceled.len(), 1);
    assert!(canceled[0].contains(r#"("id-3")"#));

    h.deliver("visitCompleted", json!({ "identifier": "id-3", "restorationIdentifier": "late" })).await;

    let session = h.driver.session();
    let current = session.current_visit().expect("current visit");
    assert_eq!(current.visitable().id(), v4.id());
    assert_eq!(current.state(), VisitState::Started);
    let v3_dyn: Arc<dyn Visitable> = v3.clone();
    assert_eq!(session.restoration_identifier_for(&v3_dyn), None);
}

/// Test 4: a failed request reaches the host with its status code
#[tokio::test]
async fn test_request_failure_reaches_host() {
    let mut h = Harness::new();
    let v1 = MockVisitable::new("https://x/a");
    let v2 = MockVisitable::new("https://x/b");
    h.boot(&v1).await;

    h.visit(&v2).await;
    h.deliver("visitStarted", json!({ "identifier": "id-5", "hasCachedSnapshot": false })).await;
    h.deliver("visitRequestStarted", json!({ "identifier": "id-5" })).await;
    h.deliver("visitRequestFailed", json!({ "identifier": "id-5", "statusCode": 500 })).await;
    h.deliver("visitRequestFinished", json!({ "identifier": "id-5" })).await;

    let failures = h.delegate.failures();
    assert_eq!(failures, vec![(v2.id(), VisitFailure::RequestFailed { status_code: 500 })]);
    assert_eq!(
        h.driver.session().current_visit().map(|v| v.state()),
        Some(VisitState::Failed)
    );
    assert_eq!(h.delegate.requests_finished(), 2);
}

/// Test 5: reload cold boots the topmost visitable again
#[tokio::test]
async fn test_reload_reinitializes_runtime() {
    let mut h = Harness::new();
    let v1 = MockVisitable::new("https://x/a");
    h.boot(&v1).await;

    h.handle.reload().expect("input queue open");
    h.driver.run_until_idle().await;

    assert!(!h.driver.session().is_initialized());
    assert_eq!(h.surface.loaded_urls(), vec!["https://x/a", "https://x/a"]);

    h.finish_load().await;
    h.deliver("pageLoaded", json!({ "restorationIdentifier": "rid-2" })).await;

    assert!(h.driver.session().is_initialized());
    assert_eq!(h.delegate.surface_loads(), 2);
    let v1_dyn: Arc<dyn Visitable> = v1.clone();
    assert_eq!(h.driver.session().restoration_identifier_for(&v1_dyn), Some("rid-2"));
}

/// Test 6: an unavailable runtime triggers a cold boot recovery
#[tokio::test]
async fn test_transport_failure_recovers_with_cold_boot() {
    let mut h = Harness::new();
    let v1 = MockVisitable::new("https://x/a");
    let v2 = MockVisitable::new("https://x/b");
    h.boot(&v1).await;

    h.runtime.set_unavailable(true);
    h.visit(&v2).await;

    assert_eq!(h.delegate.script_failures().len(), 1);
    assert!(!h.driver.session().is_initialized());
    assert_eq!(h.surface.loaded_urls(), vec!["https://x/a", "https://x/b"]);
    assert!(h.driver.session().current_visit().is_some_and(|v| v.is_cold_boot()));

    h.runtime.set_unavailable(false);
    h.finish_load().await;
    h.deliver("pageLoaded", json!({ "restorationIdentifier": "rid-3" })).await;

    assert!(h.driver.session().is_initialized());
    assert_eq!(
        h.driver.session().current_visit().map(|v| v.state()),
        Some(VisitState::Completed)
    );
}

/// Test 7: an exception raised inside the runtime is reported
#[tokio::test]
async fn test_raised_exception_is_reported() {
    let mut h = Harness::new();
    let v1 = MockVisitable::new("https://x/a");
    let v2 = MockVisitable::new("https://x/b");
    h.boot(&v1).await;

    h.runtime
        .set_raised_exception(Some(("TypeError: visit is undefined", "at visitLocation")))
        .await;
    h.visit(&v2).await;

    let failures = h.delegate.script_failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("TypeError: visit is undefined"));
    assert!(failures[0].contains(VISIT_LOCATION));
}

/// Test 8: return values reach completion callbacks
#[tokio::test]
async fn test_call_completion_receives_value() {
    let mut h = Harness::new();
    h.runtime.set_return_value(json!({ "ok": true })).await;
    let (tx, rx) = oneshot::channel();

    h.driver
        .session()
        .bridge()
        .call_function_with_completion("ping", &json!([1, "two"]), move |value| {
            let _ = tx.send(value);
        })
        .expect("call queued");
    h.driver.run_until_idle().await;

    assert_eq!(rx.await.expect("completion called"), json!({ "ok": true }));
    assert_eq!(h.runtime.calls_to("webView.ping").await.len(), 1);
    assert!(h.runtime.evaluated_scripts().await[0].contains(r#"webView.ping(1,"two")"#));
}

/// Test 9: proposals from the runtime are left to the host
#[tokio::test]
async fn test_visit_proposal_is_forwarded() {
    let mut h = Harness::new();

    h.deliver("visitProposed", json!({ "location": "https://x/p", "action": "restore" })).await;

    assert_eq!(
        h.delegate.proposals(),
        vec![("https://x/p".to_string(), VisitAction::Restore)]
    );
    assert!(h.driver.session().current_visit().is_none());
}

/// Test 10: the driver loop stops once every handle is dropped
#[tokio::test]
async fn test_run_stops_when_handles_drop() {
    common::init_tracing();
    let surface = visit_session::session::mock::MockRenderSurface::new();
    let runtime = Arc::new(visit_session::bridge::MockScriptRuntime::new());
    let delegate = visit_session::session::mock::RecordingSessionDelegate::new();
    let (mut driver, handle) = SessionDriver::new(SessionConfig::default(), surface.clone(), runtime, delegate);
    let v1 = MockVisitable::new("https://x/a");

    let task = tokio::spawn(async move {
        driver.run().await;
        driver
    });

    handle.visit(v1.clone()).expect("input queue open");
    drop(handle);

    let driver = tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .expect("driver stopped")
        .expect("driver task completed");

    assert_eq!(surface.loaded_urls(), vec!["https://x/a"]);
    assert_eq!(
        driver.session().current_visit().map(|v| v.visitable().id()),
        Some(v1.id())
    );
    // The visitable only holds a weak handle.
    assert!(v1.delegate().is_none());
}

/// Test 11: a visit superseded before the runtime started it is canceled once it starts
#[tokio::test]
async fn test_unstarted_superseded_visit_is_canceled_when_started() {
    let mut h = Harness::new();
    let v1 = MockVisitable::new("https://x/a");
    let v3 = MockVisitable::new("https://x/c");
    let v4 = MockVisitable::new("https://x/d");
    h.boot(&v1).await;

    h.visit(&v3).await;
    h.visit(&v4).await;
    assert!(h.runtime.calls_to(CANCEL_VISIT).await.is_empty());

    h.deliver("visitStarted", json!({ "identifier": "id-3", "hasCachedSnapshot": false })).await;
    h.deliver("visitStarted", json!({ "identifier": "id-4", "hasCachedSnapshot": false })).await;
    h.deliver("visitCompleted", json!({ "identifier": "id-3", "restorationIdentifier": "late" })).await;

    let canceled = h.runtime.calls_to(CANCEL_VISIT).await;
    assert_eq!(canceled.len(), 1);
    assert!(canceled[0].contains(r#"("id-3")"#));

    let issued = h.runtime.calls_to(ISSUE_REQUEST).await;
    assert_eq!(issued.len(), 1);
    assert!(issued[0].contains(r#"("id-4")"#));

    let session = h.driver.session();
    let current = session.current_visit().expect("current visit");
    assert_eq!(current.visitable().id(), v4.id());
    assert_eq!(current.identifier(), Some("id-4"));
    assert_eq!(current.state(), VisitState::Started);
    let v4_dyn: Arc<dyn Visitable> = v4.clone();
    assert_eq!(session.restoration_identifier_for(&v4_dyn), None);
}
