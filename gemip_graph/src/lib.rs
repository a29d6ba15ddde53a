//! Attributed graph model consumed by the formulations.
//!
//! Graphs are built once through a [`GraphBuilder`] and are read-only from
//! then on. Every element carries a [`Weight`], and a [`Weights`] table holds
//! the precomputed substitution and creation costs between a graph pair.

mod element;
mod error;
mod graph;
mod matrix;
mod weights;

pub use crate::element::{Edge, GraphElement, Vertex, Weight};
pub use crate::error::GraphError;
pub use crate::graph::{Graph, GraphBuilder, GraphKind};
pub use crate::matrix::Matrix;
pub use crate::weights::Weights;
