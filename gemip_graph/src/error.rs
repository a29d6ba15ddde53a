use thiserror::Error;

/// Errors raised while building graphs or weight tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two vertices share the same identifier.
    #[error("Duplicate vertex id '{0}'")]
    DuplicateVertex(String),

    /// Two edges share the same identifier.
    #[error("Duplicate edge id '{0}'")]
    DuplicateEdge(String),

    /// An edge references a vertex that was never added.
    #[error("Edge '{edge}' references unknown vertex '{vertex}'")]
    UnknownVertex {
        /// Offending edge.
        edge: String,
        /// Missing endpoint.
        vertex: String,
    },

    /// An edge connects a vertex to itself.
    #[error("Edge '{0}' is a self-loop")]
    SelfLoop(String),

    /// A second edge between the same endpoints.
    #[error("Edge '{edge}' duplicates the connection of edge '{existing}'")]
    ParallelEdge {
        /// Rejected edge.
        edge: String,
        /// Edge already connecting the endpoints.
        existing: String,
    },

    /// A weight table does not fit the graph pair.
    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Which table disagrees.
        what: &'static str,
        /// Size implied by the graphs.
        expected: usize,
        /// Size of the table.
        found: usize,
    },

    /// A cost is NaN or infinite.
    #[error("Non-finite cost in {what} at position {position}")]
    NonFiniteCost {
        /// Which table holds the value.
        what: &'static str,
        /// Flat position in that table.
        position: usize,
    },
}

impl GraphError {
    pub(crate) const fn dimension(what: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            found,
        }
    }
}
