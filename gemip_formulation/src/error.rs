use gemip_graph::{GraphError, GraphKind};
use gemip_program::ValidationError;
use gemip_solver::SolveStatus;
use thiserror::Error;

use crate::kind::FormulationKind;

/// A matching request that cannot be turned into a program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulationError {
    /// Pattern and world disagree on edge orientation.
    #[error("Cannot match a {pattern:?} pattern against a {world:?} world")]
    KindMismatch {
        /// Orientation of the pattern graph.
        pattern: GraphKind,
        /// Orientation of the world graph.
        world: GraphKind,
    },

    /// The weight table does not fit the graph pair.
    #[error("Weights do not fit the graph pair: {0}")]
    DimensionMismatch(#[from] GraphError),

    /// An injective mapping cannot exist.
    #[error("Pattern has {pattern} vertices but the world only {world}")]
    PatternTooLarge {
        /// Pattern vertex count.
        pattern: usize,
        /// World vertex count.
        world: usize,
    },

    /// The formulation does not implement a requested option.
    #[error("{formulation} does not support {option}")]
    Unsupported {
        /// Formulation that refused.
        formulation: FormulationKind,
        /// The offending option.
        option: &'static str,
    },

    /// The generated program failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A solved assignment that does not describe a valid correspondence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The solver returned no values.
    #[error("Solver reported {status} without an assignment")]
    MissingAssignment {
        /// Reported status.
        status: SolveStatus,
    },

    /// The assignment does not cover the program's variables.
    #[error("Assignment has {found} values, program declares {expected} variables")]
    LengthMismatch {
        /// Declared variable count.
        expected: usize,
        /// Values received.
        found: usize,
    },

    /// A decision variable is too far from 0 and 1 to be rounded.
    #[error("Variable '{variable}' has fractional value {value}")]
    NonBinary {
        /// Variable name.
        variable: String,
        /// Received value.
        value: f64,
    },

    /// A source vertex is mapped to several targets.
    #[error("Source vertex '{vertex}' has {images} images")]
    MultipleImages {
        /// Source vertex id.
        vertex: String,
        /// Number of selected targets, deletion included.
        images: usize,
    },

    /// A source vertex is neither mapped nor deleted.
    #[error("Source vertex '{vertex}' is left unassigned")]
    Unassigned {
        /// Source vertex id.
        vertex: String,
    },

    /// Two source vertices share one target.
    #[error("Target vertex '{target}' is the image of both '{first}' and '{second}'")]
    NonInjective {
        /// Shared target vertex id.
        target: String,
        /// First source vertex id.
        first: String,
        /// Second source vertex id.
        second: String,
    },

    /// A target vertex's insertion flag contradicts whether it is matched.
    #[error("Target vertex '{vertex}' has insertion flag {inserted} but matched is {matched}")]
    InconsistentInsertion {
        /// Target vertex id.
        vertex: String,
        /// Decoded insertion flag.
        inserted: bool,
        /// Whether some source vertex maps onto it.
        matched: bool,
    },

    /// A pattern edge that must be preserved has no image.
    #[error("Pattern edge '{edge}' has no image edge")]
    MissingEdge {
        /// Pattern edge id.
        edge: String,
    },

    /// A world edge between two images has no counterpart in an induced match.
    #[error("World edge '{edge}' joins two images but matches no pattern edge")]
    UnmatchedWorldEdge {
        /// World edge id.
        edge: String,
    },

    /// The decoded correspondence disagrees with the reported objective.
    #[error("Recomputed cost {recomputed} differs from reported objective {reported}")]
    CostMismatch {
        /// Cost of the decoded correspondence.
        recomputed: f64,
        /// Objective reported by the solver.
        reported: f64,
    },
}
