//! Bridge codec
//!
//! Encodes outbound function calls into wrapper scripts and decodes inbound
//! runtime messages into [`BridgeEvent`]s. Stateless.

use crate::bridge::types::{BridgeEvent, CallOutcome, ScriptMessage, ScriptMessageName, VisitAction};
use crate::error::{Error, Result};
use phf::phf_map;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

/// Inbound message names, resolved without a chain of string comparisons
static MESSAGE_NAMES: phf::Map<&'static str, ScriptMessageName> = phf_map! {
    "pageLoaded" => ScriptMessageName::PageLoaded,
    "pageInvalidated" => ScriptMessageName::PageInvalidated,
    "visitProposed" => ScriptMessageName::VisitProposed,
    "visitStarted" => ScriptMessageName::VisitStarted,
    "visitRequestStarted" => ScriptMessageName::VisitRequestStarted,
    "visitRequestCompleted" => ScriptMessageName::VisitRequestCompleted,
    "visitRequestFailed" => ScriptMessageName::VisitRequestFailed,
    "visitRequestFinished" => ScriptMessageName::VisitRequestFinished,
    "visitRendered" => ScriptMessageName::VisitRendered,
    "visitCompleted" => ScriptMessageName::VisitCompleted,
    "errorRaised" => ScriptMessageName::ErrorRaised,
};

/// Look up a message name in the dispatch table
pub fn message_name(name: &str) -> Option<ScriptMessageName> {
    MESSAGE_NAMES.get(name).copied()
}

/// Encode call arguments as a JavaScript argument list.
///
/// The arguments must serialize to a JSON array; its brackets are stripped so
/// the elements can be spliced between the call parentheses. Returns the
/// array value alongside the argument list.
pub fn encode_arguments<A: Serialize + ?Sized>(arguments: &A) -> Result<(Value, String)> {
    let value = serde_json::to_value(arguments)?;
    if !value.is_array() {
        return Err(Error::invalid_arguments(format!(
            "arguments must encode to an array, got {}",
            value
        )));
    }

    let encoded = serde_json::to_string(&value)?;
    let list = encoded[1..encoded.len() - 1].to_string();
    Ok((value, list))
}

/// Build the wrapper script that calls `function` and captures exceptions
pub fn script_for_function_call(function: &str, encoded_arguments: &str) -> String {
    format!(
        "(function(result) {{\n  try {{\n    result.value = {}({})\n  }} catch (error) {{\n    result.error = error.toString()\n    result.stack = error.stack\n  }}\n  return result\n}})({{}})",
        function, encoded_arguments
    )
}

/// Unwrap the result object produced by [`script_for_function_call`]
pub fn decode_call_outcome(result: Value) -> CallOutcome {
    let Value::Object(mut object) = result else {
        return CallOutcome::Returned(Value::Null);
    };

    let non_empty = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };

    // A raise needs both the message and the stack
    match (non_empty("error"), non_empty("stack")) {
        (Some(error), Some(stack)) => CallOutcome::Raised { error, stack },
        _ => CallOutcome::Returned(object.remove("value").unwrap_or(Value::Null)),
    }
}

/// Decode an inbound message.
///
/// Returns `Ok(None)` for names outside the closed set; those are ignored,
/// not errors. Known names with malformed payloads yield
/// [`Error::InvalidMessage`].
pub fn decode_message(raw: &Value) -> Result<Option<BridgeEvent>> {
    let message: ScriptMessage = serde_json::from_value(raw.clone())
        .map_err(|e| Error::invalid_message(format!("malformed message: {}", e)))?;

    let Some(name) = message_name(&message.name) else {
        debug!("Ignoring unrecognized script message {:?}", message.name);
        return Ok(None);
    };

    let empty = Map::new();
    let data = message.data.as_object().unwrap_or(&empty);

    let event = match name {
        ScriptMessageName::PageLoaded => BridgeEvent::PageLoaded {
            restoration_identifier: string_field(data, "restorationIdentifier")?,
        },
        ScriptMessageName::PageInvalidated => BridgeEvent::PageInvalidated,
        ScriptMessageName::VisitProposed => {
            let location = Url::parse(&string_field(data, "location")?)?;
            let action = match data.get("action").and_then(Value::as_str) {
                Some(action) => action.parse()?,
                None => VisitAction::default(),
            };
            BridgeEvent::VisitProposed { location, action }
        }
        ScriptMessageName::VisitStarted => BridgeEvent::VisitStarted {
            identifier: string_field(data, "identifier")?,
            has_cached_snapshot: flag_field(data, "hasCachedSnapshot"),
        },
        ScriptMessageName::VisitRequestStarted => BridgeEvent::VisitRequestStarted {
            identifier: string_field(data, "identifier")?,
        },
        ScriptMessageName::VisitRequestCompleted => BridgeEvent::VisitRequestCompleted {
            identifier: string_field(data, "identifier")?,
        },
        ScriptMessageName::VisitRequestFailed => BridgeEvent::VisitRequestFailed {
            identifier: string_field(data, "identifier")?,
            status_code: status_code_field(data)?,
        },
        ScriptMessageName::VisitRequestFinished => BridgeEvent::VisitRequestFinished {
            identifier: string_field(data, "identifier")?,
        },
        ScriptMessageName::VisitRendered => BridgeEvent::VisitRendered {
            identifier: string_field(data, "identifier")?,
        },
        ScriptMessageName::VisitCompleted => BridgeEvent::VisitCompleted {
            identifier: string_field(data, "identifier")?,
            restoration_identifier: string_field(data, "restorationIdentifier")?,
        },
        ScriptMessageName::ErrorRaised => BridgeEvent::ErrorRaised {
            message: match data.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            },
        },
    };

    Ok(Some(event))
}

fn string_field(data: &Map<String, Value>, key: &str) -> Result<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_message(format!("missing string field {:?}", key)))
}

// The runtime sends either a boolean or 0/1.
fn flag_field(data: &Map<String, Value>, key: &str) -> bool {
    match data.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn status_code_field(data: &Map<String, Value>) -> Result<u16> {
    data.get("statusCode")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| Error::invalid_message("missing or invalid statusCode"))
}
