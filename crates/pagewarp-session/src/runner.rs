//! Execution seam for background geometry computation.
//!
//! The session never blocks its caller on pipeline work: each compute
//! operation is handed to a [`JobRunner`]. [`ThreadRunner`] (the
//! default) spawns a thread per job, which is proportionate for the
//! handful of operations an interactive page edit produces.
//! [`InlineRunner`] runs jobs on the calling thread for batch use and
//! deterministic tests.

/// A queued unit of pipeline work.
pub type Job = Box<dyn FnOnce() + Send>;

/// Strategy for executing session compute jobs.
pub trait JobRunner: Send + Sync {
    /// Execute (or schedule) the job. Implementations decide the
    /// thread; completion is signalled through the session's event
    /// sink, not through this call.
    fn run(&self, job: Job);
}

/// Runs each job on a freshly spawned thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRunner;

impl JobRunner for ThreadRunner {
    fn run(&self, job: Job) {
        std::thread::spawn(job);
    }
}

/// Runs each job synchronously on the calling thread.
///
/// With this runner, `load`/`rectify`/`apply_filter` complete (and
/// deliver their events) before returning -- useful for command-line
/// batch processing and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineRunner;

impl JobRunner for InlineRunner {
    fn run(&self, job: Job) {
        job();
    }
}
