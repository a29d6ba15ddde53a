use std::fmt;

use gemip_formulation::{DecodeError, FormulationError};
use gemip_program::{Degree, ValidationError};
use gemip_solver::{RegistryError, SolveStatus};
use thiserror::Error;

/// Stage of a matcher run in which a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Building the program.
    Formulating,
    /// Waiting for the backend.
    Solving,
    /// Turning an assignment into a solution.
    Decoding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Formulating => "formulating",
            Self::Solving => "solving",
            Self::Decoding => "decoding",
        })
    }
}

/// Why a matcher run failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// The formulation refused the graph pair or produced an invalid program.
    #[error("Formulation error: {0}")]
    Formulation(#[from] FormulationError),

    /// A solution cut could not be added to the program.
    #[error("Invalid solution cut: {0}")]
    Cut(#[from] ValidationError),

    /// The backend does not accept programs of this degree.
    #[error("Solver '{backend}' does not support {degree:?} programs")]
    UnsupportedProgram {
        /// Backend name.
        backend: String,
        /// Degree of the rejected program.
        degree: Degree,
    },

    /// The backend finished without a usable assignment.
    #[error("Solver reported {status}")]
    Solver {
        /// Status as reported, never retried.
        status: SolveStatus,
        /// Backend diagnostic, if any.
        message: Option<String>,
    },

    /// The assignment does not describe a consistent correspondence.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl MatchError {
    /// The solver status behind a [`MatchError::Solver`] failure.
    #[must_use]
    pub const fn status(&self) -> Option<SolveStatus> {
        match self {
            Self::Solver { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether no match exists, as opposed to the engine malfunctioning.
    #[must_use]
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            Self::Solver {
                status: SolveStatus::Infeasible,
                ..
            } | Self::Formulation(FormulationError::PatternTooLarge { .. })
        )
    }
}

/// A failed run: the stage it stopped in and the error it stopped with.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed: {error}")]
pub struct Failure {
    /// Where the run stopped.
    pub stage: Stage,
    /// What went wrong.
    #[source]
    pub error: MatchError,
}

impl Failure {
    pub(crate) fn new(stage: Stage, error: impl Into<MatchError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

/// Errors raised while setting up a pool or a session.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The rayon thread pool could not be created.
    #[error("Failed to build matcher pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// The configured backend could not be constructed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
