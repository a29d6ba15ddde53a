use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use contracts::*;
use gemip_formulation::Solution;

use crate::error::Failure;

/// Lifecycle of a [`Matcher`](crate::Matcher).
///
/// `Idle -> Formulating -> Solving -> Decoding -> Completed`, with `Failed`
/// reachable from every working state and `Cancelled` from every
/// non-terminal one. Ranked enumeration loops `Decoding -> Solving`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatcherState {
    /// Created, not started.
    Idle,
    /// Building the program.
    Formulating,
    /// A solve is in flight.
    Solving,
    /// Decoding an assignment.
    Decoding,
    /// Finished with at least one solution.
    Completed,
    /// Finished with a [`Failure`].
    Failed,
    /// Stopped on request.
    Cancelled,
}

impl MatcherState {
    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for MatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Formulating => "formulating",
            Self::Solving => "solving",
            Self::Decoding => "decoding",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Terminal result of a matcher run.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    /// Solutions in the order they were found, cheapest first.
    Completed(Vec<Solution>),
    /// The run stopped with an error.
    Failed(Failure),
    /// The run was cancelled; nothing was produced.
    Cancelled,
}

impl MatchOutcome {
    /// The terminal state this outcome corresponds to.
    #[must_use]
    pub const fn state(&self) -> MatcherState {
        match self {
            Self::Completed(_) => MatcherState::Completed,
            Self::Failed(_) => MatcherState::Failed,
            Self::Cancelled => MatcherState::Cancelled,
        }
    }

    /// Solutions of a completed run, empty otherwise.
    #[must_use]
    pub fn solutions(&self) -> &[Solution] {
        match self {
            Self::Completed(solutions) => solutions,
            _ => &[],
        }
    }

    /// The failure of a failed run.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// State shared between a running matcher and its handles.
///
/// The state mutex also serves as the condvar lock; the outcome is written
/// once, under that lock, before waiters are woken.
#[derive(Debug)]
pub(crate) struct Progress {
    state: Mutex<MatcherState>,
    cancel_requested: AtomicBool,
    outcome: OnceLock<MatchOutcome>,
    finished: Condvar,
}

impl Progress {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MatcherState::Idle),
            cancel_requested: AtomicBool::new(false),
            outcome: OnceLock::new(),
            finished: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> MatcherState {
        *self.lock()
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Moves to `next`; refused once terminal or after a cancel request.
    pub(crate) fn advance(&self, next: MatcherState) -> bool {
        let mut state = self.lock();
        if state.is_terminal() || self.cancel_requested() {
            return false;
        }
        tracing::trace!("matcher {} -> {}", *state, next);
        *state = next;
        true
    }

    /// Publishes `outcome` unless another outcome already won, and returns
    /// whichever outcome is final. An accepted cancel request turns any
    /// outcome into [`MatchOutcome::Cancelled`].
    #[ensures(self.state().is_terminal())]
    pub(crate) fn finish(&self, outcome: MatchOutcome) -> MatchOutcome {
        let mut state = self.lock();
        if !state.is_terminal() {
            let outcome = if self.cancel_requested() {
                MatchOutcome::Cancelled
            } else {
                outcome
            };
            *state = outcome.state();
            let _ = self.outcome.set(outcome);
        }
        self.finished.notify_all();
        drop(state);
        self.outcome.get().cloned().unwrap_or(MatchOutcome::Cancelled)
    }

    /// Records a cancel request. Returns the state observed at the time of
    /// the request, or `None` when the run had already finished.
    ///
    /// An idle run is cancelled on the spot.
    pub(crate) fn request_cancel(&self) -> Option<MatcherState> {
        let mut state = self.lock();
        let observed = *state;
        if observed.is_terminal() {
            return None;
        }
        self.cancel_requested.store(true, Ordering::Release);
        if observed == MatcherState::Idle {
            *state = MatcherState::Cancelled;
            let _ = self.outcome.set(MatchOutcome::Cancelled);
            self.finished.notify_all();
        }
        Some(observed)
    }

    pub(crate) fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.get()
    }

    pub(crate) fn wait(&self) -> &MatchOutcome {
        let mut guard = self.lock();
        loop {
            if let Some(outcome) = self.outcome.get() {
                return outcome;
            }
            guard = self
                .finished
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Option<&MatchOutcome> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        loop {
            if let Some(outcome) = self.outcome.get() {
                return Some(outcome);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            guard = self
                .finished
                .wait_timeout(guard, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_refused_after_cancel() {
        let progress = Progress::new();
        assert!(progress.advance(MatcherState::Formulating));
        assert_eq!(progress.request_cancel(), Some(MatcherState::Formulating));
        assert!(!progress.advance(MatcherState::Solving));
        assert_eq!(progress.state(), MatcherState::Formulating);
        assert_eq!(progress.finish(MatchOutcome::Cancelled), MatchOutcome::Cancelled);
        assert_eq!(progress.state(), MatcherState::Cancelled);
    }

    #[test]
    fn test_cancel_while_decoding_drops_solutions() {
        let progress = Progress::new();
        for state in [
            MatcherState::Formulating,
            MatcherState::Solving,
            MatcherState::Decoding,
        ] {
            assert!(progress.advance(state));
        }
        assert_eq!(progress.request_cancel(), Some(MatcherState::Decoding));
        assert_eq!(
            progress.finish(MatchOutcome::Completed(Vec::new())),
            MatchOutcome::Cancelled
        );
        assert_eq!(progress.state(), MatcherState::Cancelled);
        assert_eq!(progress.wait(), &MatchOutcome::Cancelled);
    }

    #[test]
    fn test_idle_cancel_is_immediate() {
        let progress = Progress::new();
        assert_eq!(progress.request_cancel(), Some(MatcherState::Idle));
        assert_eq!(progress.outcome(), Some(&MatchOutcome::Cancelled));
        assert_eq!(progress.request_cancel(), None);
        // a late run cannot overwrite the outcome
        assert_eq!(progress.finish(MatchOutcome::Completed(Vec::new())), MatchOutcome::Cancelled);
    }

    #[test]
    fn test_wait_timeout_expires() {
        let progress = Progress::new();
        assert!(progress.wait_timeout(Duration::from_millis(10)).is_none());
        let _ = progress.finish(MatchOutcome::Completed(Vec::new()));
        assert_eq!(progress.wait(), &MatchOutcome::Completed(Vec::new()));
    }
}
