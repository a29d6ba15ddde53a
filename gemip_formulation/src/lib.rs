//! Graph matching formulations.
//!
//! A [`Formulation`] turns a pattern graph, a world graph and their
//! [`Weights`](gemip_graph::Weights) into a [`Program`](gemip_program::Program)
//! and a [`Decoder`] that maps solver assignments back to [`Solution`]s.
//!
//! Every variant is built on the same [`BipartiteEdges`] substrate:
//!
//! | kind | substrate | edges |
//! |------|-----------|-------|
//! | [`BipartiteGraphMatching`] | partial | ignored |
//! | [`LinearGraphEditDistance`] | partial | linearized products |
//! | [`QuadraticGraphEditDistance`] | partial | product terms |
//! | [`SubgraphIsomorphism`] | total | edge flow, identical elements only |
//! | [`SubstitutionTolerantSubgraphIsomorphism`] | total | edge flow |
//! | [`ErrorTolerantSubgraphIsomorphism`] | total | relaxed edge flow with slack |
//! | [`ExactSubgraphIsomorphism`] | total | pairwise exclusion |

mod decoder;
mod edges;
mod error;
mod formulation;
mod ged;
mod kind;
mod solution;
mod subgraph;
mod substrate;

pub use crate::decoder::Decoder;
pub use crate::error::{DecodeError, FormulationError};
pub use crate::formulation::Formulation;
pub use crate::ged::{BipartiteGraphMatching, LinearGraphEditDistance, QuadraticGraphEditDistance};
pub use crate::kind::{FormulationKind, UnknownFormulation};
pub use crate::solution::{Image, Solution, SolutionList};
pub use crate::subgraph::{
    ErrorTolerantSubgraphIsomorphism, ExactSubgraphIsomorphism, SubgraphIsomorphism,
    SubstitutionTolerantSubgraphIsomorphism,
};
pub use crate::substrate::{BipartiteEdges, Correspondence};
