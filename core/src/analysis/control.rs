use crate::prelude::{AnalysisError, AnalysisPhase, VisibilityResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag, checked by the engine between batches.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> VisibilityResult<()> {
        if self.is_aborted() {
            Err(AnalysisError::Aborted)
        } else {
            Ok(())
        }
    }
}

/// Observer notified with a 0-100 completion figure for each phase.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, phase: AnalysisPhase, percent: f64);
}

impl<F> ProgressListener for F
where
    F: Fn(AnalysisPhase, f64) + Send + Sync,
{
    fn on_progress(&self, phase: AnalysisPhase, percent: f64) {
        self(phase, percent)
    }
}

/// Optional hooks for a single run.
#[derive(Clone, Copy, Default)]
pub struct RunControl<'a> {
    pub progress: Option<&'a dyn ProgressListener>,
    pub abort: Option<&'a AbortSignal>,
}

impl<'a> RunControl<'a> {
    pub fn with_progress(mut self, listener: &'a dyn ProgressListener) -> Self {
        self.progress = Some(listener);
        self
    }

    pub fn with_abort(mut self, signal: &'a AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    pub(crate) fn check_abort(&self) -> VisibilityResult<()> {
        self.abort.map_or(Ok(()), AbortSignal::check)
    }

    pub(crate) fn tracker(&self, phase: AnalysisPhase) -> PhaseProgress<'a> {
        PhaseProgress {
            listener: self.progress,
            phase,
            last: -1.0,
        }
    }
}

/// Reports one phase's progress, never letting it move backwards.
pub(crate) struct PhaseProgress<'a> {
    listener: Option<&'a dyn ProgressListener>,
    phase: AnalysisPhase,
    last: f64,
}

impl PhaseProgress<'_> {
    pub(crate) fn report(&mut self, done: usize, total: usize) {
        let percent = if total == 0 {
            100.0
        } else {
            (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        if percent <= self.last {
            return;
        }
        self.last = percent;
        if let Some(listener) = self.listener {
            listener.on_progress(self.phase, percent);
        }
    }
}
