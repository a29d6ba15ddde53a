use std::sync::Arc;
use std::time::{Duration, Instant};

use gemip_common::Config;
use gemip_formulation::{Formulation, FormulationKind, Solution};
use gemip_graph::{Graph, Weights};
use gemip_solver::{SolveOptions, SolveStatus, Solver};
use tracing::{debug, info, warn};

use crate::error::{Failure, MatchError, Stage};
use crate::state::{MatchOutcome, MatcherState, Progress};

/// One matching request: a graph pair, weights, a formulation and a backend.
///
/// Inputs are shared read-only; several matchers may reference the same
/// graphs concurrently. A matcher runs at most once.
#[derive(Debug)]
pub struct Matcher {
    source: Arc<Graph>,
    target: Arc<Graph>,
    weights: Arc<Weights>,
    formulation: Arc<dyn Formulation>,
    solver: Arc<dyn Solver>,
    config: Config,
    progress: Arc<Progress>,
}

impl Matcher {
    /// A matcher in state [`MatcherState::Idle`].
    #[must_use]
    pub fn new(
        source: Arc<Graph>,
        target: Arc<Graph>,
        weights: Arc<Weights>,
        formulation: Arc<dyn Formulation>,
        solver: Arc<dyn Solver>,
        config: Config,
    ) -> Self {
        Self {
            source,
            target,
            weights,
            formulation,
            solver,
            config,
            progress: Arc::new(Progress::new()),
        }
    }

    /// Formulation this matcher runs.
    #[must_use]
    pub fn kind(&self) -> FormulationKind {
        self.formulation.kind()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> MatcherState {
        self.progress.state()
    }

    /// A handle observing this matcher from other threads.
    #[must_use]
    pub fn handle(&self) -> MatchHandle {
        MatchHandle {
            kind: self.kind(),
            progress: Arc::clone(&self.progress),
            solver: Arc::clone(&self.solver),
        }
    }

    /// Runs to a terminal state on the calling thread.
    ///
    /// Submit through a [`MatchPool`](crate::MatchPool) to run in the background.
    pub fn run(&self) -> MatchOutcome {
        let started = Instant::now();
        let outcome = self.progress.finish(self.execute());
        match &outcome {
            MatchOutcome::Completed(solutions) => info!(
                "{} completed with {} solution(s) in {:?}",
                self.kind(),
                solutions.len(),
                started.elapsed()
            ),
            MatchOutcome::Failed(failure) => info!("{} {failure}", self.kind()),
            MatchOutcome::Cancelled => info!("{} cancelled", self.kind()),
        }
        outcome
    }

    fn execute(&self) -> MatchOutcome {
        if !self.progress.advance(MatcherState::Formulating) {
            return MatchOutcome::Cancelled;
        }
        let (mut program, decoder) =
            match self
                .formulation
                .build_program(&self.source, &self.target, &self.weights)
            {
                Ok(built) => built,
                Err(e) => return failed(Stage::Formulating, e),
            };
        if !self.solver.supports(program.degree()) {
            return failed(
                Stage::Solving,
                MatchError::UnsupportedProgram {
                    backend: self.solver.name().to_string(),
                    degree: program.degree(),
                },
            );
        }

        let options = SolveOptions::from(&self.config.solver);
        let enumeration = &self.config.enumeration;
        let wanted = enumeration.solutions.max(1);
        let mut solutions: Vec<Solution> = Vec::with_capacity(wanted);
        loop {
            if !self.progress.advance(MatcherState::Solving) {
                return MatchOutcome::Cancelled;
            }
            debug!("{}: solving with '{}'", self.kind(), self.solver.name());
            let result = self.solver.solve(&program, &options);
            if self.progress.cancel_requested() {
                debug!("{}: discarding {} result after cancel", self.kind(), result.status);
                return MatchOutcome::Cancelled;
            }
            match result.status {
                status if status.has_solution() => {}
                SolveStatus::Infeasible if !solutions.is_empty() => {
                    debug!("{}: no further solutions after {}", self.kind(), solutions.len());
                    break;
                }
                status if !solutions.is_empty() => {
                    warn!(
                        "{}: enumeration stopped after {} solution(s), solver reported {status}",
                        self.kind(),
                        solutions.len()
                    );
                    break;
                }
                status => {
                    if let Some(message) = &result.message {
                        warn!("{}: solver reported {status}: {message}", self.kind());
                    }
                    return failed(
                        Stage::Solving,
                        MatchError::Solver {
                            status,
                            message: result.message,
                        },
                    );
                }
            }

            if !self.progress.advance(MatcherState::Decoding) {
                return MatchOutcome::Cancelled;
            }
            let solution = match decoder.decode(
                &self.source,
                &self.target,
                &self.weights,
                &result,
                &self.config.decode,
            ) {
                Ok(solution) => solution,
                Err(e) => return failed(Stage::Decoding, e),
            };
            debug!("{}: found {solution}", self.kind());
            solutions.push(solution);
            if solutions.len() >= wanted {
                break;
            }
            let Some(cut) = solutions.last().and_then(|s| decoder.cut(s, enumeration.cut)) else {
                break;
            };
            program = match program.with_constraint(cut) {
                Ok(program) => program,
                Err(e) => return failed(Stage::Formulating, e),
            };
        }
        MatchOutcome::Completed(solutions)
    }
}

fn failed(stage: Stage, error: impl Into<MatchError>) -> MatchOutcome {
    MatchOutcome::Failed(Failure::new(stage, error))
}

/// Observes and controls a matcher from another thread.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    kind: FormulationKind,
    progress: Arc<Progress>,
    solver: Arc<dyn Solver>,
}

impl MatchHandle {
    /// Formulation of the observed matcher.
    #[must_use]
    pub const fn kind(&self) -> FormulationKind {
        self.kind
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> MatcherState {
        self.progress.state()
    }

    /// The outcome, if the run has finished.
    #[must_use]
    pub fn try_outcome(&self) -> Option<&MatchOutcome> {
        self.progress.outcome()
    }

    /// Blocks until the run finishes.
    pub fn wait(&self) -> &MatchOutcome {
        self.progress.wait()
    }

    /// Blocks until the run finishes or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<&MatchOutcome> {
        self.progress.wait_timeout(timeout)
    }

    /// Requests cancellation. Returns `false` when the run already finished.
    ///
    /// An in-flight solve is asked to abort; backends that cannot abort run
    /// to completion and their result is discarded.
    pub fn cancel(&self) -> bool {
        match self.progress.request_cancel() {
            None => false,
            Some(MatcherState::Solving) => {
                if !self.solver.abort() {
                    debug!(
                        "{}: '{}' cannot abort, result will be discarded",
                        self.kind,
                        self.solver.name()
                    );
                }
                true
            }
            Some(_) => true,
        }
    }
}
