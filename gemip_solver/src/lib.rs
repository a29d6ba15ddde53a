//! Solver contract and backend registry.
//!
//! Formulations never depend on a concrete backend. A [`SolverRegistry`]
//! maps backend names to constructors, and every constructed backend is used
//! only through the [`Solver`] trait. The crate ships one backend,
//! [`ExhaustiveSolver`], a small branch-and-bound used as reference.

mod exhaustive;
mod registry;
mod solver;

pub use crate::exhaustive::ExhaustiveSolver;
pub use crate::registry::{RegistryError, SolverFactory, SolverRegistry};
pub use crate::solver::{SolveOptions, SolveResult, SolveStatus, Solver};
