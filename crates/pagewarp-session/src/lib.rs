//! pagewarp-session: the interactive page-editing lifecycle.
//!
//! Wraps the pure pipeline stages from `pagewarp-pipeline` in a
//! per-page state machine
//! (`Empty → Detecting → CornersReady → Rectified → Filtered`) with
//! background execution and generation-counter cancellation: starting
//! a new computation supersedes any in-flight one, and stale results
//! are discarded instead of overwriting newer state.
//!
//! The session is a plain object with a callback-based completion
//! mechanism -- no UI framework involved. Embedders provide an event
//! sink and marshal events to whatever thread owns their UI state.

pub mod runner;
pub mod session;

pub use runner::{InlineRunner, Job, JobRunner, ThreadRunner};
pub use session::{
    EventSink, PageArtifacts, PageGeometrySession, SessionConfig, SessionError, SessionEvent,
    SessionPhase,
};
