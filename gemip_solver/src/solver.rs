use std::fmt;
use std::time::Duration;

use gemip_common::SolverConfig;
use gemip_program::{Assignment, Degree, Program};
use serde::{Deserialize, Serialize};

/// Options handed to a backend with every program.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveOptions {
    /// Wall-clock budget; `None` means unlimited.
    pub time_limit: Option<Duration>,
    /// Relative optimality gap at which the backend may stop.
    pub gap_tolerance: f64,
    /// Threads the backend may use.
    pub threads: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit: None,
            gap_tolerance: 0.0,
            threads: 1,
        }
    }
}

impl From<&SolverConfig> for SolveOptions {
    fn from(config: &SolverConfig) -> Self {
        Self {
            time_limit: config.time_limit(),
            gap_tolerance: config.gap_tolerance,
            threads: config.threads.max(1),
        }
    }
}

/// Terminal status reported by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Proven optimal within the gap tolerance.
    Optimal,
    /// Feasible, optimality not proven.
    Feasible,
    /// No feasible assignment exists.
    Infeasible,
    /// The objective is unbounded in the optimization direction.
    Unbounded,
    /// The time limit expired before any feasible assignment was found.
    TimedOut,
    /// The backend failed or was aborted.
    Error,
}

impl SolveStatus {
    /// Whether the status comes with an assignment.
    #[must_use]
    pub const fn has_solution(self) -> bool {
        matches!(self, Self::Optimal | Self::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Optimal => "optimal",
            Self::Feasible => "feasible",
            Self::Infeasible => "infeasible",
            Self::Unbounded => "unbounded",
            Self::TimedOut => "timed out",
            Self::Error => "error",
        })
    }
}

/// Outcome of one solve.
///
/// `assignment` and `objective` are present exactly when
/// [`SolveStatus::has_solution`] holds.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveResult {
    /// Terminal status.
    pub status: SolveStatus,
    /// Variable values, in declaration order.
    pub assignment: Option<Assignment>,
    /// Objective value reported by the backend.
    pub objective: Option<f64>,
    /// Backend diagnostic.
    pub message: Option<String>,
}

impl SolveResult {
    /// A solution with the given status.
    #[must_use]
    pub const fn solved(status: SolveStatus, assignment: Assignment, objective: f64) -> Self {
        Self {
            status,
            assignment: Some(assignment),
            objective: Some(objective),
            message: None,
        }
    }

    /// A status without a solution.
    #[must_use]
    pub const fn without_solution(status: SolveStatus) -> Self {
        Self {
            status,
            assignment: None,
            objective: None,
            message: None,
        }
    }

    /// [`SolveStatus::Error`] with a diagnostic.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::without_solution(SolveStatus::Error).with_message(message)
    }

    /// Attaches a diagnostic.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// An optimization backend.
///
/// Implementations must tolerate concurrent calls from several threads.
/// [`Solver::abort`] asks an in-flight solve to stop; backends that cannot be
/// interrupted keep the default, and callers then discard the eventual result.
pub trait Solver: Send + Sync {
    /// Backend name, as registered.
    fn name(&self) -> &str;

    /// Solves `program`, honouring `options` where the backend can.
    fn solve(&self, program: &Program, options: &SolveOptions) -> SolveResult;

    /// Whether programs of `degree` are accepted.
    fn supports(&self, degree: Degree) -> bool {
        let _ = degree;
        true
    }

    /// Requests the running solve to stop; returns whether the request is honoured.
    ///
    /// A request must only reach solves in flight when it is made. It is
    /// refused, not deferred, when nothing is running, so a late abort never
    /// stops a later solve on a shared backend.
    fn abort(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solver").field("name", &self.name()).finish()
    }
}
