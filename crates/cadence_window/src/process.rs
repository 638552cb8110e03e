//! Process control used when memory relief is refused

/// Ends the process when the compositor cannot free memory for a window
pub trait ProcessControl: Send + Sync {
    fn terminate(&self);
}

/// Aborts the current process
#[derive(Clone, Copy, Debug, Default)]
pub struct AbortProcess;

impl ProcessControl for AbortProcess {
    fn terminate(&self) {
        tracing::error!("terminating process after refused memory relief");
        std::process::abort();
    }
}
