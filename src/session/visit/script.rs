//! Script-driven strategy
//!
//! Asks the already-loaded runtime to navigate in place. The runtime assigns
//! the visit an identifier in `VisitStarted`; every later event must carry
//! that identifier to be accepted.

use tracing::{debug, warn};

use super::{Visit, VisitDelegate, VisitStrategy};
use crate::bridge::ScriptBridge;
use crate::error::{Result, VisitFailure};

/// Script-driven strategy state
#[derive(Debug)]
pub struct ScriptDriven {
    bridge: ScriptBridge,
    identifier: Option<String>,
}

impl ScriptDriven {
    pub fn new(bridge: ScriptBridge) -> Self {
        Self {
            bridge,
            identifier: None,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }
}

fn log_call(result: Result<()>, what: &str) {
    if let Err(e) = result {
        warn!("Bridge call {} not issued: {}", what, e);
    }
}

impl Visit {
    pub(super) fn start_script_visit(&mut self, delegate: &mut dyn VisitDelegate) {
        let VisitStrategy::Script(script) = &self.strategy else {
            return;
        };

        let restoration_identifier = self.restoration_identifier.as_deref().unwrap_or_default();
        if let Err(e) = script
            .bridge
            .visit_location(&self.location, self.action, restoration_identifier)
        {
            warn!("Visit {} could not reach the script runtime: {}", self.id, e);
            self.fail_request(delegate, VisitFailure::BridgeCall(e.to_string()));
        }
    }

    pub(super) fn cancel_script_visit(&mut self, delegate: &mut dyn VisitDelegate) {
        if let VisitStrategy::Script(script) = &self.strategy {
            match script.identifier.as_deref() {
                Some(identifier) => log_call(script.bridge.cancel_visit(identifier), "cancelVisit"),
                None => debug!("Visit {} canceled before the runtime assigned an identifier", self.id),
            }
        }
        self.finish_request(delegate);
    }

    pub(super) fn did_start_visit(&mut self, identifier: &str, has_cached_snapshot: bool, delegate: &mut dyn VisitDelegate) {
        let VisitStrategy::Script(script) = &mut self.strategy else {
            return;
        };

        if let Some(existing) = script.identifier.as_deref() {
            if existing != identifier {
                debug!("Visit {} already bound to {}, ignoring start of {}", self.id, existing, identifier);
            }
            return;
        }

        script.identifier = Some(identifier.to_string());
        let bridge = script.bridge.clone();
        self.has_cached_snapshot = has_cached_snapshot;
        delegate.visit_did_start(self);

        log_call(bridge.issue_request_for_visit(identifier), "issueRequestForVisit");

        let identifier = identifier.to_string();
        self.after_navigation_completion(delegate, move |_, _| {
            log_call(bridge.change_history_for_visit(&identifier), "changeHistoryForVisit");
            log_call(bridge.load_cached_snapshot_for_visit(&identifier), "loadCachedSnapshotForVisit");
        });
    }

    pub(super) fn did_complete_request(&mut self, delegate: &mut dyn VisitDelegate) {
        let VisitStrategy::Script(script) = &self.strategy else {
            return;
        };
        let Some(identifier) = script.identifier.clone() else {
            return;
        };
        let bridge = script.bridge.clone();

        self.after_navigation_completion(delegate, move |visit, delegate| {
            delegate.visit_will_load_response(visit);
            log_call(bridge.load_response_for_visit(&identifier), "loadResponseForVisit");
        });
    }
}
