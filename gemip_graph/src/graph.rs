use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::element::{Edge, GraphElement, Vertex, Weight};
use crate::error::GraphError;

/// Orientation of a graph's edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphKind {
    /// `(u, v)` and `(v, u)` are distinct connections.
    Directed,
    /// `(u, v)` and `(v, u)` are the same connection.
    Undirected,
}

impl GraphKind {
    const fn key(self, u: usize, v: usize) -> (usize, usize) {
        match self {
            Self::Directed => (u, v),
            Self::Undirected => {
                if u <= v {
                    (u, v)
                } else {
                    (v, u)
                }
            }
        }
    }
}

/// An immutable attributed graph.
#[derive(Clone, Debug)]
pub struct Graph {
    id: String,
    kind: GraphKind,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    vertex_ids: HashMap<String, usize>,
    adjacency: HashMap<(usize, usize), usize>,
}

impl Graph {
    /// Starts building a graph.
    #[must_use]
    pub fn builder(id: impl Into<String>, kind: GraphKind) -> GraphBuilder {
        GraphBuilder::new(id, kind)
    }

    /// Convenience constructor: one labeled vertex per entry of `labels`
    /// (ids `v0`, `v1`, ...) and one edge per index pair (ids `e0`, `e1`, ...).
    ///
    /// # Errors
    /// Returns the [`GraphBuilder`] errors for bad endpoints.
    pub fn from_labels(
        id: impl Into<String>,
        kind: GraphKind,
        labels: &[&str],
        edges: &[(usize, usize)],
    ) -> Result<Self, GraphError> {
        let mut builder = GraphBuilder::new(id, kind);
        for (i, label) in labels.iter().enumerate() {
            builder.add_vertex(format!("v{i}"), Weight::labeled(*label))?;
        }
        for (i, &(u, v)) in edges.iter().enumerate() {
            builder.add_edge(format!("e{i}"), &format!("v{u}"), &format!("v{v}"), Weight::default())?;
        }
        Ok(builder.build())
    }

    /// Graph identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Edge orientation.
    #[must_use]
    pub const fn kind(&self) -> GraphKind {
        self.kind
    }

    /// Whether edges are oriented.
    #[must_use]
    pub fn is_directed(&self) -> bool {
        self.kind == GraphKind::Directed
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Vertices in index order.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Edges in index order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Vertex at `index`.
    #[must_use]
    pub fn vertex(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    /// Edge at `index`.
    #[must_use]
    pub fn edge(&self, index: usize) -> Option<&Edge> {
        self.edges.get(index)
    }

    /// Index of the vertex with identifier `id`.
    #[must_use]
    pub fn vertex_index(&self, id: &str) -> Option<usize> {
        self.vertex_ids.get(id).copied()
    }

    /// The edge connecting `u` to `v`, honouring orientation.
    #[must_use]
    pub fn edge_between(&self, u: usize, v: usize) -> Option<&Edge> {
        self.adjacency
            .get(&self.kind.key(u, v))
            .and_then(|&e| self.edges.get(e))
    }

    /// Whether `u` connects to `v`.
    #[must_use]
    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.adjacency.contains_key(&self.kind.key(u, v))
    }

    /// Distinct vertices sharing an edge with `vertex`, in either direction.
    pub fn neighbors(&self, vertex: usize) -> impl Iterator<Item = usize> + '_ {
        self.vertices
            .get(vertex)
            .into_iter()
            .flat_map(|v| v.incident_edges())
            .filter_map(move |e| self.edges.get(e).and_then(|edge| edge.opposite(vertex)))
            .unique()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.is_directed() { "->" } else { "--" };
        write!(
            f,
            "{} ({} vertices, {} edges): {}",
            self.id,
            self.vertex_count(),
            self.edge_count(),
            self.edges
                .iter()
                .map(|e| format!(
                    "{}{arrow}{}",
                    self.vertices[e.origin].id(),
                    self.vertices[e.target].id()
                ))
                .join(", ")
        )
    }
}

/// Incremental constructor for [`Graph`].
#[derive(Debug)]
pub struct GraphBuilder {
    graph: Graph,
    edge_ids: HashMap<String, usize>,
}

impl GraphBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: GraphKind) -> Self {
        Self {
            graph: Graph {
                id: id.into(),
                kind,
                vertices: Vec::new(),
                edges: Vec::new(),
                vertex_ids: HashMap::new(),
                adjacency: HashMap::new(),
            },
            edge_ids: HashMap::new(),
        }
    }

    /// Adds a vertex and returns its index.
    ///
    /// # Errors
    /// [`GraphError::DuplicateVertex`] when `id` is taken.
    pub fn add_vertex(&mut self, id: impl Into<String>, weight: Weight) -> Result<usize, GraphError> {
        let id = id.into();
        if self.graph.vertex_ids.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        let index = self.graph.vertices.len();
        self.graph.vertex_ids.insert(id.clone(), index);
        self.graph.vertices.push(Vertex {
            id,
            index,
            weight,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        });
        Ok(index)
    }

    /// Adds an edge between two existing vertices, named by id.
    ///
    /// # Errors
    /// Fails on a duplicate edge id, an unknown endpoint, a self-loop, or a
    /// second edge between the same endpoints.
    pub fn add_edge(
        &mut self,
        id: impl Into<String>,
        origin: &str,
        target: &str,
        weight: Weight,
    ) -> Result<usize, GraphError> {
        let id = id.into();
        let lookup = |vertex: &str| {
            self.graph
                .vertex_index(vertex)
                .ok_or_else(|| GraphError::UnknownVertex {
                    edge: id.clone(),
                    vertex: vertex.to_string(),
                })
        };
        let o = lookup(origin)?;
        let t = lookup(target)?;
        self.connect(id, o, t, weight)
    }

    /// Adds an edge between two vertex indices.
    ///
    /// # Errors
    /// Same as [`GraphBuilder::add_edge`].
    pub fn connect(
        &mut self,
        id: impl Into<String>,
        origin: usize,
        target: usize,
        weight: Weight,
    ) -> Result<usize, GraphError> {
        let id = id.into();
        if self.edge_ids.contains_key(&id) {
            return Err(GraphError::DuplicateEdge(id));
        }
        for endpoint in [origin, target] {
            if endpoint >= self.graph.vertices.len() {
                return Err(GraphError::UnknownVertex {
                    edge: id,
                    vertex: format!("#{endpoint}"),
                });
            }
        }
        if origin == target {
            return Err(GraphError::SelfLoop(id));
        }
        let key = self.graph.kind.key(origin, target);
        if let Some(&existing) = self.graph.adjacency.get(&key) {
            return Err(GraphError::ParallelEdge {
                edge: id,
                existing: self.graph.edges[existing].id.clone(),
            });
        }

        let index = self.graph.edges.len();
        self.edge_ids.insert(id.clone(), index);
        self.graph.adjacency.insert(key, index);
        self.graph.vertices[origin].out_edges.push(index);
        self.graph.vertices[target].in_edges.push(index);
        self.graph.edges.push(Edge {
            id,
            index,
            origin,
            target,
            weight,
        });
        Ok(index)
    }

    /// Finishes the graph.
    #[must_use]
    pub fn build(self) -> Graph {
        tracing::trace!(
            "built graph '{}': {} vertices, {} edges",
            self.graph.id,
            self.graph.vertices.len(),
            self.graph.edges.len()
        );
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn path(kind: GraphKind) -> Graph {
        Graph::from_labels("path", kind, &["a", "b", "c"], &[(0, 1), (1, 2)]).expect("valid graph")
    }

    #[test]
    fn test_directed_adjacency() {
        let g = path(GraphKind::Directed);
        assert!(g.has_edge(0, 1));
        assert!(!g.has_edge(1, 0));
        assert!(!g.has_edge(0, 2));
        assert_eq!(g.edge_between(1, 2).map(GraphElement::index), Some(1));
    }

    #[test]
    fn test_undirected_adjacency_is_symmetric() {
        let g = path(GraphKind::Undirected);
        assert!(g.has_edge(1, 0));
        assert!(g.has_edge(2, 1));
        assert_eq!(g.neighbors(1).collect::<Vec<_>>(), vec![2, 0]);
    }

    #[test]
    fn test_incident_lists() {
        let g = path(GraphKind::Directed);
        let b = g.vertex(1).expect("vertex b");
        assert_eq!(b.out_edges(), &[1]);
        assert_eq!(b.in_edges(), &[0]);
        assert_eq!(b.degree(), 2);
    }

    #[rstest]
    #[case::self_loop(&[(0, 0)], GraphKind::Directed)]
    #[case::unknown_endpoint(&[(0, 7)], GraphKind::Directed)]
    #[case::parallel_undirected(&[(0, 1), (1, 0)], GraphKind::Undirected)]
    #[case::parallel_directed(&[(0, 1), (0, 1)], GraphKind::Directed)]
    fn test_rejected_edges(#[case] edges: &[(usize, usize)], #[case] kind: GraphKind) {
        assert!(Graph::from_labels("bad", kind, &["a", "b"], edges).is_err());
    }

    #[test]
    fn test_antiparallel_directed_edges_are_distinct() {
        let g = Graph::from_labels("cycle", GraphKind::Directed, &["a", "b"], &[(0, 1), (1, 0)])
            .expect("antiparallel edges are allowed");
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_duplicate_ids() {
        let mut b = GraphBuilder::new("dup", GraphKind::Directed);
        b.add_vertex("x", Weight::default()).expect("first vertex");
        assert_eq!(
            b.add_vertex("x", Weight::default()),
            Err(GraphError::DuplicateVertex("x".into()))
        );
        b.add_vertex("y", Weight::default()).expect("second vertex");
        b.add_edge("e", "x", "y", Weight::default()).expect("first edge");
        assert!(matches!(
            b.add_edge("e", "y", "x", Weight::default()),
            Err(GraphError::DuplicateEdge(_))
        ));
        assert!(matches!(
            b.add_edge("f", "x", "z", Weight::default()),
            Err(GraphError::UnknownVertex { .. })
        ));
    }

    #[test]
    fn test_display_lists_edges() {
        let g = path(GraphKind::Undirected);
        assert_eq!(g.to_string(), "path (3 vertices, 2 edges): v0--v1, v1--v2");
    }
}
