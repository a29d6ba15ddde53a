use serde::{Deserialize, Serialize};

/// Attributes attached to a graph element.
///
/// `cost` is the creation cost of the element: deleting it when it belongs to
/// the source graph, inserting it when it belongs to the target graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    /// Optional symbolic label.
    pub label: Option<String>,
    /// Numeric attribute vector.
    pub attributes: Vec<f64>,
    /// Scalar creation cost.
    pub cost: f64,
}

impl Weight {
    /// A weight carrying only a label.
    #[must_use]
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Sets the creation cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Sets the attribute vector.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<f64>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Euclidean distance between the attribute vectors.
    ///
    /// Missing trailing components count as zero.
    #[must_use]
    pub fn attribute_distance(&self, other: &Self) -> f64 {
        let len = self.attributes.len().max(other.attributes.len());
        (0..len)
            .map(|i| {
                let a = self.attributes.get(i).copied().unwrap_or(0.0);
                let b = other.attributes.get(i).copied().unwrap_or(0.0);
                (a - b) * (a - b)
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Whether both labels are present and equal, or both are absent.
    #[must_use]
    pub fn same_label(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

/// Shared view of vertices and edges.
pub trait GraphElement {
    /// Identifier, unique among elements of the same kind in one graph.
    fn id(&self) -> &str;
    /// Position of the element within its graph.
    fn index(&self) -> usize;
    /// Attached attributes.
    fn weight(&self) -> &Weight;
}

/// A graph vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub(crate) id: String,
    pub(crate) index: usize,
    pub(crate) weight: Weight,
    pub(crate) out_edges: Vec<usize>,
    pub(crate) in_edges: Vec<usize>,
}

impl Vertex {
    /// Indices of edges leaving this vertex.
    ///
    /// In undirected graphs this lists every incident edge whose origin is
    /// this vertex; see [`Vertex::incident_edges`] for the full set.
    #[must_use]
    pub fn out_edges(&self) -> &[usize] {
        &self.out_edges
    }

    /// Indices of edges entering this vertex.
    #[must_use]
    pub fn in_edges(&self) -> &[usize] {
        &self.in_edges
    }

    /// Every incident edge, outgoing first.
    pub fn incident_edges(&self) -> impl Iterator<Item = usize> + '_ {
        self.out_edges.iter().chain(self.in_edges.iter()).copied()
    }

    /// Number of incident edges.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.out_edges.len() + self.in_edges.len()
    }
}

impl GraphElement for Vertex {
    fn id(&self) -> &str {
        &self.id
    }

    fn index(&self) -> usize {
        self.index
    }

    fn weight(&self) -> &Weight {
        &self.weight
    }
}

/// A graph edge between two vertices, referenced by index.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub(crate) id: String,
    pub(crate) index: usize,
    pub(crate) origin: usize,
    pub(crate) target: usize,
    pub(crate) weight: Weight,
}

impl Edge {
    /// Index of the origin vertex.
    #[must_use]
    pub const fn origin(&self) -> usize {
        self.origin
    }

    /// Index of the target vertex.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Both endpoints as `(origin, target)`.
    #[must_use]
    pub const fn endpoints(&self) -> (usize, usize) {
        (self.origin, self.target)
    }

    /// The endpoint opposite to `vertex`, if `vertex` is an endpoint.
    #[must_use]
    pub const fn opposite(&self, vertex: usize) -> Option<usize> {
        if vertex == self.origin {
            Some(self.target)
        } else if vertex == self.target {
            Some(self.origin)
        } else {
            None
        }
    }
}

impl GraphElement for Edge {
    fn id(&self) -> &str {
        &self.id
    }

    fn index(&self) -> usize {
        self.index
    }

    fn weight(&self) -> &Weight {
        &self.weight
    }
}
