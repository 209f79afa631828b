//! Session collaborator traits
//!
//! This module defines the host-supplied capabilities the session consumes
//! and the handle through which every input reaches the session.

use std::fmt;
use std::sync::Arc;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;
use uuid::Uuid;

use crate::bridge::VisitAction;
use crate::error::{Error, VisitFailure};

/// Stable identity of a visitable, used as the restoration identifier key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitableId(Uuid);

impl VisitableId {
    /// Assign a fresh identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VisitableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VisitableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a load started on the rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NavigationId(Uuid);

impl NavigationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NavigationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NavigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rendering surface trait
///
/// The persistent surface shared by every visitable. Loads are started here;
/// their outcome comes back later as a [`SurfaceEvent`].
pub trait RenderSurface: Send + Sync + fmt::Debug {
    /// Start a full load of `location`
    fn load(&self, location: &Url) -> Result<NavigationId, Error>;

    /// Abort the in-flight load, if any
    fn stop_loading(&self);
}

/// Visitable trait
///
/// A host-owned slot that can display the rendering surface for one URL.
/// All methods take `&self`; implementations manage their own interior state.
pub trait Visitable: Send + Sync + fmt::Debug {
    /// Identity used as the restoration identifier key
    fn id(&self) -> VisitableId;

    /// Location to visit
    fn url(&self) -> Option<Url>;

    /// Receive the handle used to report view lifecycle events
    ///
    /// The handle is weak so a visitable never keeps its session alive.
    fn set_delegate(&self, delegate: WeakSessionHandle);

    /// Attach the rendering surface
    fn activate_surface(&self, surface: Arc<dyn RenderSurface>);

    /// Detach the rendering surface
    fn deactivate_surface(&self);

    /// Capture a still image of the current rendering
    fn update_snapshot(&self);

    fn show_snapshot(&self);

    fn hide_snapshot(&self);

    fn clear_snapshot(&self);

    fn show_activity_indicator(&self) {}

    fn hide_activity_indicator(&self) {}

    fn did_render(&self) {}

    fn will_refresh(&self) {}

    fn did_refresh(&self) {}
}

/// Host-facing notifications
pub trait SessionDelegate: Send + Sync {
    /// The runtime asked to navigate somewhere (e.g., a link click)
    fn did_propose_visit(&self, location: &Url, action: VisitAction);

    /// A visit failed; the host usually renders an error page
    fn did_fail_request(&self, visitable: &Arc<dyn Visitable>, failure: &VisitFailure);

    /// A cold boot finished and the runtime is initialized
    fn did_load_surface(&self) {}

    fn did_start_request(&self) {}

    fn did_finish_request(&self) {}

    /// A bridge call could not be evaluated or raised inside the runtime
    fn did_fail_script_evaluation(&self, _error: &Error) {}
}

/// Outcome of a load on the rendering surface
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    LoadFinished(NavigationId),
    LoadFailed(NavigationId, String),
}

/// View lifecycle events reported by a visitable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitableEvent {
    /// The view is about to appear; `moving_to_parent` is true when it is
    /// being pushed rather than revealed
    ViewWillAppear { moving_to_parent: bool },
    ViewDidAppear,
    RequestedReload,
    RequestedRefresh,
}

/// Everything the session reacts to, funneled through one ordered channel
pub enum SessionInput {
    Visit {
        visitable: Arc<dyn Visitable>,
        action: VisitAction,
    },
    Reload,
    ScriptMessage(Value),
    Surface(SurfaceEvent),
    Visitable {
        id: VisitableId,
        event: VisitableEvent,
    },
}

impl fmt::Debug for SessionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionInput::Visit { visitable, action } => f
                .debug_struct("Visit")
                .field("visitable", &visitable.id())
                .field("action", action)
                .finish(),
            SessionInput::Reload => f.write_str("Reload"),
            SessionInput::ScriptMessage(message) => f.debug_tuple("ScriptMessage").field(message).finish(),
            SessionInput::Surface(event) => f.debug_tuple("Surface").field(event).finish(),
            SessionInput::Visitable { id, event } => f
                .debug_struct("Visitable")
                .field("id", id)
                .field("event", event)
                .finish(),
        }
    }
}

/// Cloneable handle for submitting inputs to a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
}

impl SessionHandle {
    /// Create a handle and the receiving end of its input queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionInput>) {
        let (inputs, rx) = mpsc::unbounded_channel();
        (Self { inputs }, rx)
    }

    /// Handle that does not keep the input queue open
    pub fn downgrade(&self) -> WeakSessionHandle {
        WeakSessionHandle {
            inputs: self.inputs.downgrade(),
        }
    }

    /// Submit a raw input
    pub fn send(&self, input: SessionInput) -> Result<(), Error> {
        self.inputs
            .send(input)
            .map_err(|_| Error::channel_closed("session input queue"))
    }

    /// Visit with the `Advance` action
    pub fn visit(&self, visitable: Arc<dyn Visitable>) -> Result<(), Error> {
        self.visit_with_action(visitable, VisitAction::Advance)
    }

    pub fn visit_with_action(&self, visitable: Arc<dyn Visitable>, action: VisitAction) -> Result<(), Error> {
        self.send(SessionInput::Visit { visitable, action })
    }

    pub fn reload(&self) -> Result<(), Error> {
        self.send(SessionInput::Reload)
    }

    /// Deliver a raw message posted by the script runtime
    pub fn deliver_message(&self, message: Value) -> Result<(), Error> {
        self.send(SessionInput::ScriptMessage(message))
    }

    pub fn surface_event(&self, event: SurfaceEvent) -> Result<(), Error> {
        self.send(SessionInput::Surface(event))
    }

    pub fn visitable_event(&self, id: VisitableId, event: VisitableEvent) -> Result<(), Error> {
        self.send(SessionInput::Visitable { id, event })
    }
}

/// Non-owning [`SessionHandle`]
///
/// Held by the session and by visitables so the input queue closes once
/// every host-held handle is gone.
#[derive(Debug, Clone)]
pub struct WeakSessionHandle {
    inputs: mpsc::WeakUnboundedSender<SessionInput>,
}

impl WeakSessionHandle {
    pub fn upgrade(&self) -> Option<SessionHandle> {
        self.inputs.upgrade().map(|inputs| SessionHandle { inputs })
    }
}
