//! Cold boot strategy
//!
//! Loads the location on the rendering surface from scratch. The visit
//! completes once the freshly booted runtime reports `PageLoaded`.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Visit, VisitDelegate, VisitStrategy};
use crate::error::VisitFailure;
use crate::session::traits::{NavigationId, RenderSurface};

/// Cold boot strategy state
pub struct ColdBoot {
    surface: Arc<dyn RenderSurface>,
    navigation: Option<NavigationId>,
}

impl ColdBoot {
    pub fn new(surface: Arc<dyn RenderSurface>) -> Self {
        Self {
            surface,
            navigation: None,
        }
    }

    /// Load started for this visit, once started
    pub fn navigation(&self) -> Option<NavigationId> {
        self.navigation
    }
}

impl fmt::Debug for ColdBoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColdBoot")
            .field("navigation", &self.navigation)
            .finish()
    }
}

impl Visit {
    pub(super) fn start_cold_boot(&mut self, delegate: &mut dyn VisitDelegate) {
        let VisitStrategy::ColdBoot(cold_boot) = &mut self.strategy else {
            return;
        };

        match cold_boot.surface.load(&self.location) {
            Ok(navigation) => {
                debug!("Visit {} loading {} as navigation {}", self.id, self.location, navigation);
                cold_boot.navigation = Some(navigation);
                delegate.visit_did_start(self);
                self.start_request(delegate);
            }
            Err(e) => {
                warn!("Visit {} could not load {}: {}", self.id, self.location, e);
                self.fail_request(delegate, VisitFailure::LoadFailed(e.to_string()));
            }
        }
    }

    pub(super) fn cancel_cold_boot(&mut self, delegate: &mut dyn VisitDelegate) {
        if let VisitStrategy::ColdBoot(cold_boot) = &self.strategy {
            cold_boot.surface.stop_loading();
        }
        self.finish_request(delegate);
    }

    pub(super) fn complete_cold_boot(&mut self, delegate: &mut dyn VisitDelegate) {
        delegate.visit_did_initialize_runtime(self);
    }

    pub(super) fn did_finish_load(&mut self, navigation: NavigationId, delegate: &mut dyn VisitDelegate) {
        if self.owns_navigation(navigation) {
            self.finish_request(delegate);
        }
    }

    pub(super) fn did_fail_load(&mut self, navigation: NavigationId, message: &str, delegate: &mut dyn VisitDelegate) {
        if self.owns_navigation(navigation) {
            warn!("Visit {} load failed: {}", self.id, message);
            self.fail_request(delegate, VisitFailure::LoadFailed(message.to_string()));
        }
    }

    pub(super) fn did_load_page(&mut self, restoration_identifier: &str, delegate: &mut dyn VisitDelegate) {
        self.restoration_identifier = Some(restoration_identifier.to_string());
        delegate.visit_did_render(self);
        self.complete(delegate);
    }

    fn owns_navigation(&self, navigation: NavigationId) -> bool {
        match &self.strategy {
            VisitStrategy::ColdBoot(cold_boot) => cold_boot.navigation == Some(navigation),
            VisitStrategy::Script(_) => false,
        }
    }
}
