use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle phase of the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// Cycles are being scheduled.
    Running,
    /// Shutdown requested: no new cycle starts, the current one may finish.
    Stopping,
    /// Everything released.
    Stopped,
}

impl RunPhase {
    #[inline(always)]
    const fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Stopping => 1,
            Self::Stopped => 2,
        }
    }

    #[inline(always)]
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// État partagé du cycle de vie : RUNNING → STOPPING → STOPPED.
///
/// Lu par le thread tracker, le worker de dispatch et le chemin d'arrêt.
/// Les transitions ne reculent jamais. Atomique, `Send + Sync`, sans verrou.
///
/// # Example
/// ```
/// use dp_core::run_state::{RunPhase, RunState};
/// let state = RunState::new();
/// assert!(state.is_running());
/// assert!(state.request_stop());
/// assert_eq!(state.phase(), RunPhase::Stopping);
/// state.mark_stopped();
/// assert_eq!(state.phase(), RunPhase::Stopped);
/// ```
#[derive(Debug)]
pub struct RunState {
    phase: AtomicU8,
}

impl RunState {
    /// Starts in `Running`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(RunPhase::Running.as_u8()),
        }
    }

    /// Current phase.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// `true` while new cycles may be scheduled.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase() == RunPhase::Running
    }

    /// RUNNING → STOPPING. Returns `false` if shutdown was already requested.
    pub fn request_stop(&self) -> bool {
        self.phase
            .compare_exchange(
                RunPhase::Running.as_u8(),
                RunPhase::Stopping.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Final transition. Idempotent.
    pub fn mark_stopped(&self) {
        self.phase
            .store(RunPhase::Stopped.as_u8(), Ordering::Release);
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
