//! # Session layer
//!
//! Coordinates navigation visits between the host and the script runtime.
//!
//! ## Responsibilities
//! - **Visits**: one state machine per navigation attempt, either a cold boot
//!   of the rendering surface or an in-place visit driven by the runtime
//! - **Serialization**: at most one visit is active; a new visit cancels the
//!   previous one before it starts
//! - **Activation**: exactly one visitable holds the rendering surface
//! - **Restoration**: one restoration identifier per visitable for the
//!   lifetime of the session
//!
//! ## Module structure
//! - `traits`: host capabilities, identifiers and the input handle
//! - `visit`: the `Visit` state machine and its strategies
//! - `manager`: the `Session` orchestrator
//! - `driver`: the coordination loop around a `Session`
//! - `mock`: recording implementations for tests
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use visit_session::bridge::MockScriptRuntime;
//! use visit_session::config::SessionConfig;
//! use visit_session::session::mock::{MockRenderSurface, MockVisitable, RecordingSessionDelegate};
//! use visit_session::session::SessionDriver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut driver, handle) = SessionDriver::new(
//!     SessionConfig::default(),
//!     MockRenderSurface::new(),
//!     Arc::new(MockScriptRuntime::new()),
//!     RecordingSessionDelegate::new(),
//! );
//!
//! handle.visit(MockVisitable::new("https://example.com/"))?;
//! driver.run_until_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod visit;
pub mod manager;
pub mod driver;
pub mod mock;


pub use traits::{
    NavigationId, RenderSurface, SessionDelegate, SessionHandle, SessionInput, SurfaceEvent,
    Visitable, VisitableEvent, VisitableId, WeakSessionHandle,
};
pub use visit::{Visit, VisitDelegate, VisitId, VisitState, VisitStrategy};
pub use manager::Session;
pub use driver::SessionDriver;

pub use mock::{MockRenderSurface, MockVisitable, RecordingSessionDelegate};
