//! The interactive page-editing state machine.
//!
//! A [`PageGeometrySession`] threads one photo through
//! detect → manual adjust → rectify → filter. Compute operations run
//! on a [`JobRunner`](crate::runner::JobRunner) and deliver results
//! through an event sink, so the owning (UI) thread is never blocked.
//!
//! Every compute operation bumps a generation counter; a completing
//! job whose generation no longer matches was superseded (e.g. by a
//! [`reset`](PageGeometrySession::reset) mid-detection) and its result
//! is discarded silently. Stale work never overwrites newer state and
//! cancellation never surfaces as an error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use pagewarp_pipeline::{
    Corners, DetectorConfig, Dimensions, FilterConfig, FilterKind, PipelineError, RectifyConfig,
    RgbaImage,
};

use crate::runner::{JobRunner, ThreadRunner};

/// Where a session currently is in the editing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No photo loaded yet.
    Empty,
    /// Corner detection is in flight.
    Detecting,
    /// Corners are available (detected or fallback) and editable.
    CornersReady,
    /// A rectified image exists for the current corners.
    Rectified,
    /// A filtered image exists for the current rectified image.
    Filtered,
}

/// Completion notifications delivered through the session's event
/// sink. Emitted on whichever thread the job runner uses; the
/// embedder marshals to its UI thread.
#[derive(Debug)]
pub enum SessionEvent {
    /// Detection finished; the session is in
    /// [`SessionPhase::CornersReady`].
    CornersReady {
        /// Detected corners, or the full image bounds fallback.
        corners: Corners,
    },
    /// Rectification finished.
    Rectified {
        /// The rectified page image.
        image: Arc<RgbaImage>,
    },
    /// Filtering finished.
    Filtered {
        /// The filtered page image.
        image: Arc<RgbaImage>,
        /// The filter that produced it.
        kind: FilterKind,
    },
    /// A compute operation failed. The session remains in its last
    /// valid state.
    Failed {
        /// The failure, surfaced unmodified.
        error: SessionError,
    },
}

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation is not valid in the session's current phase.
    #[error("{operation} is not valid in phase {phase:?}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The phase the session was in.
        phase: SessionPhase,
    },

    /// A pipeline stage failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Stage configuration shared by all operations of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Corner detector parameters.
    pub detector: DetectorConfig,
    /// Rectifier parameters.
    pub rectify: RectifyConfig,
    /// Post-filter parameters.
    pub filter: FilterConfig,
}

/// Callback receiving session events.
pub type EventSink = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// The three values the persistence layer stores per page, available
/// once a filter has been applied.
#[derive(Debug, Clone)]
pub struct PageArtifacts {
    /// The final filtered image.
    pub image: Arc<RgbaImage>,
    /// The corners used for rectification (kept for later re-edit).
    pub corners: Corners,
    /// The filter that produced `image`.
    pub filter: FilterKind,
}

struct State {
    phase: SessionPhase,
    generation: u64,
    source: Option<Arc<RgbaImage>>,
    corners: Option<Corners>,
    rectified: Option<Arc<RgbaImage>>,
    filtered: Option<(FilterKind, Arc<RgbaImage>)>,
}

/// Mutable single-owner state threading one photo through the
/// editing lifecycle. Not shared across pages; create one per page
/// and drop it when the user finishes or abandons the edit.
pub struct PageGeometrySession {
    state: Arc<Mutex<State>>,
    config: SessionConfig,
    runner: Arc<dyn JobRunner>,
    sink: EventSink,
}

impl PageGeometrySession {
    /// Create a session that runs compute work on a thread per job.
    #[must_use]
    pub fn new(sink: EventSink) -> Self {
        Self::with_runner(SessionConfig::default(), sink, Arc::new(ThreadRunner))
    }

    /// Create a session with explicit configuration and job runner.
    #[must_use]
    pub fn with_runner(config: SessionConfig, sink: EventSink, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                phase: SessionPhase::Empty,
                generation: 0,
                source: None,
                corners: None,
                rectified: None,
                filtered: None,
            })),
            config,
            runner,
            sink,
        }
    }

    /// The current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        lock(&self.state).phase
    }

    /// The current working corners, if detection has completed.
    #[must_use]
    pub fn corners(&self) -> Option<Corners> {
        lock(&self.state).corners
    }

    /// The most recent rectified image, if any.
    #[must_use]
    pub fn rectified(&self) -> Option<Arc<RgbaImage>> {
        lock(&self.state).rectified.clone()
    }

    /// The most recent filtered image, if any.
    #[must_use]
    pub fn filtered(&self) -> Option<Arc<RgbaImage>> {
        lock(&self.state).filtered.as_ref().map(|(_, img)| Arc::clone(img))
    }

    /// The values to persist for this page: available only once a
    /// filter has been applied.
    #[must_use]
    pub fn export(&self) -> Option<PageArtifacts> {
        let state = lock(&self.state);
        match (&state.filtered, state.corners) {
            (Some((kind, image)), Some(corners)) if state.phase == SessionPhase::Filtered => {
                Some(PageArtifacts {
                    image: Arc::clone(image),
                    corners,
                    filter: *kind,
                })
            }
            _ => None,
        }
    }

    /// Load the first photo into an empty session and start corner
    /// detection in the background.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] unless the session is
    /// [`SessionPhase::Empty`] (use [`reset`](Self::reset) to point an
    /// active session at a different photo), or
    /// [`SessionError::Pipeline`] for a zero-dimension image.
    pub fn load(&self, image: RgbaImage) -> Result<(), SessionError> {
        {
            let state = lock(&self.state);
            if state.phase != SessionPhase::Empty {
                return Err(SessionError::InvalidState {
                    operation: "load",
                    phase: state.phase,
                });
            }
        }
        self.start_detection(image)
    }

    /// Point the session at a different photo, discarding all derived
    /// data, and start corner detection. Valid in any phase; an
    /// in-flight computation is superseded.
    ///
    /// # Errors
    ///
    /// [`SessionError::Pipeline`] for a zero-dimension image; the
    /// session state is left untouched in that case.
    pub fn reset(&self, image: RgbaImage) -> Result<(), SessionError> {
        self.start_detection(image)
    }

    /// Overwrite the working corners with a manual edit. Does not
    /// itself transition the phase; call [`rectify`](Self::rectify)
    /// to apply.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] before detection has completed.
    pub fn set_corners(&self, corners: Corners) -> Result<(), SessionError> {
        let mut state = lock(&self.state);
        match state.phase {
            SessionPhase::CornersReady | SessionPhase::Rectified | SessionPhase::Filtered => {
                state.corners = Some(corners);
                Ok(())
            }
            phase => Err(SessionError::InvalidState {
                operation: "set_corners",
                phase,
            }),
        }
    }

    /// Rectify the source photo through the current working corners in
    /// the background. Re-runnable any number of times as corners
    /// change; always starts from the original source image, never
    /// from a previous rectification.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] before corners are available.
    pub fn rectify(&self) -> Result<(), SessionError> {
        let (source, corners, generation) = {
            let mut state = lock(&self.state);
            let (Some(source), Some(corners)) = (state.source.clone(), state.corners) else {
                return Err(SessionError::InvalidState {
                    operation: "rectify",
                    phase: state.phase,
                });
            };
            match state.phase {
                SessionPhase::CornersReady | SessionPhase::Rectified | SessionPhase::Filtered => {}
                phase => {
                    return Err(SessionError::InvalidState {
                        operation: "rectify",
                        phase,
                    });
                }
            }
            state.generation += 1;
            (source, corners, state.generation)
        };

        debug!(generation, "starting rectification");
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let config = self.config.rectify;
        self.runner.run(Box::new(move || {
            let result = pagewarp_pipeline::rectify(&source, &corners, &config);
            let event = {
                let mut state = lock(&state);
                if state.generation != generation {
                    debug!(generation, "discarding superseded rectification");
                    return;
                }
                match result {
                    Ok(image) => {
                        let image = Arc::new(image);
                        state.rectified = Some(Arc::clone(&image));
                        state.filtered = None;
                        state.phase = SessionPhase::Rectified;
                        SessionEvent::Rectified { image }
                    }
                    Err(e) => SessionEvent::Failed { error: e.into() },
                }
            };
            sink(event);
        }));
        Ok(())
    }

    /// Apply a post-filter to the most recent rectified image in the
    /// background. Re-running with a different kind recomputes from
    /// the rectified image, never from a previously filtered one.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] before a rectified image exists.
    pub fn apply_filter(&self, kind: FilterKind) -> Result<(), SessionError> {
        let (rectified, generation) = {
            let mut state = lock(&self.state);
            let Some(rectified) = state.rectified.clone() else {
                return Err(SessionError::InvalidState {
                    operation: "apply_filter",
                    phase: state.phase,
                });
            };
            match state.phase {
                SessionPhase::Rectified | SessionPhase::Filtered => {}
                phase => {
                    return Err(SessionError::InvalidState {
                        operation: "apply_filter",
                        phase,
                    });
                }
            }
            state.generation += 1;
            (rectified, state.generation)
        };

        debug!(generation, %kind, "starting filter");
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let config = self.config.filter.clone();
        self.runner.run(Box::new(move || {
            let result = pagewarp_pipeline::apply_filter(&rectified, kind, &config);
            let event = {
                let mut state = lock(&state);
                if state.generation != generation {
                    debug!(generation, "discarding superseded filter result");
                    return;
                }
                match result {
                    Ok(image) => {
                        let image = Arc::new(image);
                        state.filtered = Some((kind, Arc::clone(&image)));
                        state.phase = SessionPhase::Filtered;
                        SessionEvent::Filtered { image, kind }
                    }
                    Err(e) => SessionEvent::Failed { error: e.into() },
                }
            };
            sink(event);
        }));
        Ok(())
    }

    /// Shared by `load` and `reset`: install the new source, drop all
    /// derived data, and kick off detection.
    fn start_detection(&self, image: RgbaImage) -> Result<(), SessionError> {
        let dims = Dimensions::of(&image);
        if dims.is_degenerate() {
            return Err(SessionError::Pipeline(PipelineError::InvalidArgument(
                format!("cannot load a {}x{} image", dims.width, dims.height),
            )));
        }

        let source = Arc::new(image);
        let generation = {
            let mut state = lock(&self.state);
            state.phase = SessionPhase::Detecting;
            state.source = Some(Arc::clone(&source));
            state.corners = None;
            state.rectified = None;
            state.filtered = None;
            state.generation += 1;
            state.generation
        };

        info!(
            generation,
            width = dims.width,
            height = dims.height,
            "starting corner detection",
        );
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let config = self.config.detector.clone();
        self.runner.run(Box::new(move || {
            let result = pagewarp_pipeline::detect_corners(&source, &config);
            let event = {
                let mut state = lock(&state);
                if state.generation != generation {
                    debug!(generation, "discarding superseded detection result");
                    return;
                }
                match result {
                    Ok(corners) => {
                        state.corners = Some(corners);
                        state.phase = SessionPhase::CornersReady;
                        SessionEvent::CornersReady { corners }
                    }
                    Err(e) => SessionEvent::Failed { error: e.into() },
                }
            };
            sink(event);
        }));
        Ok(())
    }
}

/// Lock the state, recovering from a poisoned mutex: pipeline jobs
/// hold the lock only for plain field updates, so a poisoned state is
/// still structurally sound.
fn lock(state: &Arc<Mutex<State>>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
