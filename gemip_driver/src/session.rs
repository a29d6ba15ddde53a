use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use gemip_common::Config;
use gemip_formulation::{Formulation, FormulationKind, SolutionList};
use gemip_graph::{Graph, Weights};
use gemip_solver::SolverRegistry;

use crate::error::{DriverError, Failure};
use crate::matcher::{MatchHandle, Matcher};
use crate::pool::MatchPool;
use crate::state::MatchOutcome;

/// Everything a session gathered, in completion order.
#[derive(Debug, Default)]
pub struct SessionReport {
    /// Completed solutions, cheapest first, ties in completion order.
    pub solutions: SolutionList,
    /// Failed runs with their formulation.
    pub failures: Vec<(FormulationKind, Failure)>,
    /// Formulations whose run was cancelled.
    pub cancelled: Vec<FormulationKind>,
}

/// Runs several formulations against one graph pair and gathers the results.
///
/// Every submission gets its own backend instance from the registry, so a
/// cancel aborts only that run.
#[derive(Debug)]
pub struct MatchSession {
    pool: MatchPool,
    registry: SolverRegistry,
    config: Config,
    source: Arc<Graph>,
    target: Arc<Graph>,
    weights: Arc<Weights>,
    handles: Vec<MatchHandle>,
    sender: Sender<(FormulationKind, MatchOutcome)>,
    receiver: Receiver<(FormulationKind, MatchOutcome)>,
}

impl MatchSession {
    /// A session with its own pool, sized from `config.pool`.
    ///
    /// # Errors
    /// [`DriverError::Pool`] when the pool cannot be built.
    pub fn new(
        config: Config,
        registry: SolverRegistry,
        source: Arc<Graph>,
        target: Arc<Graph>,
        weights: Arc<Weights>,
    ) -> Result<Self, DriverError> {
        let pool = MatchPool::new(&config.pool)?;
        let (sender, receiver) = mpsc::channel();
        Ok(Self {
            pool,
            registry,
            config,
            source,
            target,
            weights,
            handles: Vec::new(),
            sender,
            receiver,
        })
    }

    /// Submits `formulation` with the session weights.
    ///
    /// # Errors
    /// [`DriverError::Registry`] when the configured backend cannot be built.
    pub fn submit(&mut self, formulation: Arc<dyn Formulation>) -> Result<MatchHandle, DriverError> {
        let weights = Arc::clone(&self.weights);
        self.submit_weighted(formulation, weights)
    }

    /// Submits `formulation` with its own weights for the same graph pair.
    ///
    /// # Errors
    /// [`DriverError::Registry`] when the configured backend cannot be built.
    pub fn submit_weighted(
        &mut self,
        formulation: Arc<dyn Formulation>,
        weights: Arc<Weights>,
    ) -> Result<MatchHandle, DriverError> {
        let solver = self.registry.create(&self.config.solver)?;
        let matcher = Matcher::new(
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            weights,
            formulation,
            solver,
            self.config.clone(),
        );
        let kind = matcher.kind();
        let sender = self.sender.clone();
        let handle = self.pool.submit_with(matcher, move |outcome| {
            // the session may have been dropped already
            let _ = sender.send((kind, outcome));
        });
        self.handles.push(handle.clone());
        Ok(handle)
    }

    /// Handles of every submission, in submission order.
    #[must_use]
    pub fn handles(&self) -> &[MatchHandle] {
        &self.handles
    }

    /// Requests cancellation of every unfinished run.
    pub fn cancel_all(&self) -> usize {
        self.handles.iter().filter(|h| h.cancel()).count()
    }

    /// Waits for every submission and gathers the outcomes.
    #[must_use]
    pub fn collect(self) -> SessionReport {
        let Self {
            handles,
            sender,
            receiver,
            ..
        } = self;
        drop(sender);
        let mut report = SessionReport::default();
        for (kind, outcome) in receiver.iter().take(handles.len()) {
            match outcome {
                MatchOutcome::Completed(solutions) => report.solutions.extend(solutions),
                MatchOutcome::Failed(failure) => report.failures.push((kind, failure)),
                MatchOutcome::Cancelled => report.cancelled.push(kind),
            }
        }
        tracing::info!(
            "session finished: {} solution(s), {} failure(s), {} cancelled",
            report.solutions.len(),
            report.failures.len(),
            report.cancelled.len()
        );
        report
    }
}
