//! Bridge protocol tests
//!
//! Covers call encoding, outcome unwrapping and inbound message decoding.

use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::codec::{decode_call_outcome, decode_message, encode_arguments, message_name, script_for_function_call};
use super::client::ScriptBridge;
use super::traits::ScriptRuntime;
use super::types::{BridgeEvent, CallOutcome, ScriptMessageName, VisitAction};
use super::mock::MockScriptRuntime;
use crate::Error;

#[test]
fn test_encode_arguments_strips_brackets() {
    let (value, list) = encode_arguments(&json!(["https://x/a", "advance", ""])).unwrap();
    assert_eq!(list, r#""https://x/a","advance","""#);
    assert_eq!(value, json!(["https://x/a", "advance", ""]));

    let (_, empty) = encode_arguments(&Vec::<String>::new()).unwrap();
    assert_eq!(empty, "");
}

#[test]
fn test_encode_arguments_rejects_non_array() {
    let result = encode_arguments(&json!({ "identifier": "abc" }));
    assert!(matches!(result, Err(Error::InvalidArguments(_))));
}

#[test]
fn test_encode_arguments_rejects_unserializable() {
    // Maps with non-string keys cannot become JSON.
    let mut bad = HashMap::new();
    bad.insert((1, 2), "tuple key");
    let result = encode_arguments(&[bad]);
    assert!(matches!(result, Err(Error::Serialization(_))));
}

#[test]
fn test_script_wraps_call_in_try_catch() {
    let script = script_for_function_call("webView.cancelVisitWithIdentifier", r#""v1""#);

    assert!(script.starts_with("(function(result) {"));
    assert!(script.contains(r#"result.value = webView.cancelVisitWithIdentifier("v1")"#));
    assert!(script.contains("result.error = error.toString()"));
    assert!(script.contains("result.stack = error.stack"));
    assert!(script.ends_with("})({})"));
}

#[test]
fn test_decode_call_outcome() {
    assert_eq!(
        decode_call_outcome(json!({ "value": 42 })),
        CallOutcome::Returned(json!(42))
    );
    assert_eq!(decode_call_outcome(json!({})), CallOutcome::Returned(json!(null)));
    assert_eq!(decode_call_outcome(json!("odd")), CallOutcome::Returned(json!(null)));
    assert_eq!(
        decode_call_outcome(json!({ "error": "TypeError: x is undefined", "stack": "at visit" })),
        CallOutcome::Raised {
            error: "TypeError: x is undefined".to_string(),
            stack: "at visit".to_string(),
        }
    );
    // An empty error string is not an exception.
    assert_eq!(
        decode_call_outcome(json!({ "error": "", "value": true })),
        CallOutcome::Returned(json!(true))
    );
    // Neither is an error without a stack.
    assert_eq!(
        decode_call_outcome(json!({ "error": "TypeError: x is undefined", "value": 1 })),
        CallOutcome::Returned(json!(1))
    );
    assert_eq!(
        decode_call_outcome(json!({ "error": "TypeError: x is undefined", "stack": "" })),
        CallOutcome::Returned(json!(null))
    );
}

#[test]
fn test_dispatch_table_covers_every_name() {
    let names = [
        ("pageLoaded", ScriptMessageName::PageLoaded),
        ("pageInvalidated", ScriptMessageName::PageInvalidated),
        ("visitProposed", ScriptMessageName::VisitProposed),
        ("visitStarted", ScriptMessageName::VisitStarted),
        ("visitRequestStarted", ScriptMessageName::VisitRequestStarted),
        ("visitRequestCompleted", ScriptMessageName::VisitRequestCompleted),
        ("visitRequestFailed", ScriptMessageName::VisitRequestFailed),
        ("visitRequestFinished", ScriptMessageName::VisitRequestFinished),
        ("visitRendered", ScriptMessageName::VisitRendered),
        ("visitCompleted", ScriptMessageName::VisitCompleted),
        ("errorRaised", ScriptMessageName::ErrorRaised),
    ];

    for (raw, expected) in names {
        assert_eq!(message_name(raw), Some(expected), "{}", raw);
    }
    assert_eq!(message_name("VisitStarted"), None);
}

#[test]
fn test_decode_visit_messages() {
    let started = decode_message(&json!({
        "name": "visitStarted",
        "data": { "identifier": "v1", "hasCachedSnapshot": 1 }
    }))
    .unwrap();
    assert_eq!(
        started,
        Some(BridgeEvent::VisitStarted {
            identifier: "v1".to_string(),
            has_cached_snapshot: true,
        })
    );

    let failed = decode_message(&json!({
        "name": "visitRequestFailed",
        "data": { "identifier": "v1", "statusCode": 500 }
    }))
    .unwrap()
    .unwrap();
    assert_eq!(failed.visit_identifier(), Some("v1"));
    assert_eq!(
        failed,
        BridgeEvent::VisitRequestFailed {
            identifier: "v1".to_string(),
            status_code: 500,
        }
    );

    let completed = decode_message(&json!({
        "name": "visitCompleted",
        "data": { "identifier": "v1", "restorationIdentifier": "rid-1" }
    }))
    .unwrap()
    .unwrap();
    assert_eq!(completed.name(), ScriptMessageName::VisitCompleted);
}

#[test]
fn test_decode_page_and_proposal_messages() {
    assert_eq!(
        decode_message(&json!({ "name": "pageLoaded", "data": { "restorationIdentifier": "rid-0" } })).unwrap(),
        Some(BridgeEvent::PageLoaded {
            restoration_identifier: "rid-0".to_string()
        })
    );
    assert_eq!(
        decode_message(&json!({ "name": "pageInvalidated" })).unwrap(),
        Some(BridgeEvent::PageInvalidated)
    );

    let proposed = decode_message(&json!({
        "name": "visitProposed",
        "data": { "location": "https://x/c", "action": "replace" }
    }))
    .unwrap()
    .unwrap();
    match proposed {
        BridgeEvent::VisitProposed { location, action } => {
            assert_eq!(location.as_str(), "https://x/c");
            assert_eq!(action, VisitAction::Replace);
        }
        other => panic!("Expected VisitProposed, got {:?}", other),
    }
}

#[test]
fn test_decode_error_raised_is_lenient() {
    let event = decode_message(&json!({ "name": "errorRaised", "data": { "error": { "line": 3 } } }))
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        BridgeEvent::ErrorRaised {
            message: r#"{"line":3}"#.to_string()
        }
    );
}

#[test]
fn test_decode_unknown_name_is_ignored() {
    let result = decode_message(&json!({ "name": "somethingNew", "data": {} })).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_decode_malformed_messages() {
    assert!(matches!(
        decode_message(&json!({ "data": {} })),
        Err(Error::InvalidMessage(_))
    ));
    assert!(matches!(
        decode_message(&json!({ "name": "visitStarted", "data": {} })),
        Err(Error::InvalidMessage(_))
    ));
    assert!(matches!(
        decode_message(&json!({ "name": "visitRequestFailed", "data": { "identifier": "v1", "statusCode": 70000 } })),
        Err(Error::InvalidMessage(_))
    ));
    assert!(matches!(
        decode_message(&json!({ "name": "visitProposed", "data": { "location": "not a url" } })),
        Err(Error::InvalidUrl(_))
    ));
    assert!(matches!(
        decode_message(&json!({ "name": "visitProposed", "data": { "location": "https://x/", "action": "jump" } })),
        Err(Error::InvalidMessage(_))
    ));
}

#[test]
fn test_bridge_queues_named_calls() {
    let (bridge, mut calls) = ScriptBridge::channel("webView");
    let url = url::Url::parse("https://x/b").unwrap();

    bridge.visit_location(&url, VisitAction::Advance, "").unwrap();
    bridge.issue_request_for_visit("v1").unwrap();
    bridge.cancel_visit("v1").unwrap();

    let visit = calls.try_recv().unwrap();
    assert_eq!(visit.function, "webView.visitLocationWithActionAndRestorationIdentifier");
    assert_eq!(visit.arguments, json!(["https://x/b", "advance", ""]));
    assert!(visit.completion.is_none());

    let issue = calls.try_recv().unwrap();
    assert_eq!(issue.function, "webView.issueRequestForVisitWithIdentifier");
    assert_eq!(issue.arguments, json!(["v1"]));

    let cancel = calls.try_recv().unwrap();
    assert_eq!(cancel.function, "webView.cancelVisitWithIdentifier");
    assert!(calls.try_recv().is_err());
}

#[test]
fn test_bridge_rejects_bad_arguments_without_queueing() {
    let (bridge, mut calls) = ScriptBridge::channel("webView");

    let result = bridge.call_function("custom", &json!("not a list"));
    assert!(result.is_err());
    assert!(calls.try_recv().is_err());
}

#[test]
fn test_bridge_reports_closed_queue() {
    let (bridge, calls) = ScriptBridge::channel("webView");
    drop(calls);

    let result = bridge.change_history_for_visit("v1");
    assert!(matches!(result, Err(Error::ChannelClosed(_))));
}

#[test]
fn test_completion_callback_is_carried() {
    let (bridge, mut calls) = ScriptBridge::channel("app");
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();

    bridge
        .call_function_with_completion("title", &Vec::<String>::new(), move |value| {
            *seen_clone.lock().unwrap() = Some(value);
        })
        .unwrap();

    let call = calls.try_recv().unwrap();
    assert_eq!(call.function, "app.title");
    assert!(call.script.contains("result.value = app.title()"));

    (call.completion.unwrap())(json!("Home"));
    assert_eq!(*seen.lock().unwrap(), Some(json!("Home")));
}

#[tokio::test]
async fn test_mock_runtime_modes() {
    let runtime = MockScriptRuntime::new();

    runtime.set_return_value(json!("ok")).await;
    let value = runtime.evaluate("webView.a()").await.unwrap();
    assert_eq!(decode_call_outcome(value), CallOutcome::Returned(json!("ok")));

    runtime.set_raised_exception(Some(("ReferenceError", "at b"))).await;
    let value = runtime.evaluate("webView.b()").await.unwrap();
    assert!(matches!(decode_call_outcome(value), CallOutcome::Raised { .. }));

    runtime.set_unavailable(true);
    assert!(runtime.evaluate("webView.c()").await.is_err());

    assert_eq!(runtime.evaluated_scripts().await.len(), 3);
}
