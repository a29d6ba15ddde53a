use serde::{Deserialize, Serialize};

use crate::element::{Edge, GraphElement, Vertex};
use crate::error::GraphError;
use crate::graph::Graph;
use crate::matrix::Matrix;

/// Precomputed edit costs between a source and a target graph.
///
/// Substitution matrices are indexed `(source element, target element)`.
/// Deletion costs belong to source elements, insertion costs to target
/// elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    vertex_substitution: Matrix<f64>,
    edge_substitution: Matrix<f64>,
    vertex_deletion: Vec<f64>,
    vertex_insertion: Vec<f64>,
    edge_deletion: Vec<f64>,
    edge_insertion: Vec<f64>,
}

impl Weights {
    /// Assembles a table from explicit matrices and vectors.
    ///
    /// # Errors
    /// [`GraphError::DimensionMismatch`] when vectors disagree with the
    /// matrices, [`GraphError::NonFiniteCost`] on NaN or infinite entries.
    pub fn new(
        vertex_substitution: Matrix<f64>,
        edge_substitution: Matrix<f64>,
        vertex_deletion: Vec<f64>,
        vertex_insertion: Vec<f64>,
        edge_deletion: Vec<f64>,
        edge_insertion: Vec<f64>,
    ) -> Result<Self, GraphError> {
        let pairs = [
            ("vertex deletion costs", vertex_substitution.rows(), vertex_deletion.len()),
            ("vertex insertion costs", vertex_substitution.cols(), vertex_insertion.len()),
            ("edge deletion costs", edge_substitution.rows(), edge_deletion.len()),
            ("edge insertion costs", edge_substitution.cols(), edge_insertion.len()),
        ];
        for (what, expected, found) in pairs {
            if expected != found {
                return Err(GraphError::dimension(what, expected, found));
            }
        }
        let tables: [(&'static str, &[f64]); 6] = [
            ("vertex substitution", vertex_substitution.as_slice()),
            ("edge substitution", edge_substitution.as_slice()),
            ("vertex deletion", &vertex_deletion),
            ("vertex insertion", &vertex_insertion),
            ("edge deletion", &edge_deletion),
            ("edge insertion", &edge_insertion),
        ];
        for (what, values) in tables {
            if let Some(position) = values.iter().position(|v| !v.is_finite()) {
                return Err(GraphError::NonFiniteCost { what, position });
            }
        }
        Ok(Self {
            vertex_substitution,
            edge_substitution,
            vertex_deletion,
            vertex_insertion,
            edge_deletion,
            edge_insertion,
        })
    }

    /// Evaluates substitution closures over every element pair; creation costs
    /// come from each element's [`Weight::cost`](crate::Weight).
    pub fn from_fn(
        source: &Graph,
        target: &Graph,
        mut vertex_cost: impl FnMut(&Vertex, &Vertex) -> f64,
        mut edge_cost: impl FnMut(&Edge, &Edge) -> f64,
    ) -> Self {
        let sv = source.vertices();
        let tv = target.vertices();
        let se = source.edges();
        let te = target.edges();
        Self {
            vertex_substitution: Matrix::from_fn(sv.len(), tv.len(), |i, k| {
                vertex_cost(&sv[i], &tv[k])
            }),
            edge_substitution: Matrix::from_fn(se.len(), te.len(), |e, f| edge_cost(&se[e], &te[f])),
            vertex_deletion: sv.iter().map(|v| v.weight().cost).collect(),
            vertex_insertion: tv.iter().map(|v| v.weight().cost).collect(),
            edge_deletion: se.iter().map(|e| e.weight().cost).collect(),
            edge_insertion: te.iter().map(|e| e.weight().cost).collect(),
        }
    }

    /// Substitution costs of `mismatch` between differently labeled elements
    /// plus their attribute distance, zero for identical elements.
    pub fn label_distance(source: &Graph, target: &Graph, mismatch: f64) -> Self {
        fn cost<E: GraphElement>(a: &E, b: &E, mismatch: f64) -> f64 {
            let label = if a.weight().same_label(b.weight()) {
                0.0
            } else {
                mismatch
            };
            label + a.weight().attribute_distance(b.weight())
        }
        Self::from_fn(
            source,
            target,
            |a, b| cost(a, b, mismatch),
            |a, b| cost(a, b, mismatch),
        )
    }

    /// Zero substitution costs; creation costs from element weights.
    pub fn zero(source: &Graph, target: &Graph) -> Self {
        Self::from_fn(source, target, |_, _| 0.0, |_, _| 0.0)
    }

    /// Overrides every deletion and insertion cost.
    #[must_use]
    pub fn with_creation_costs(mut self, vertex: f64, edge: f64) -> Self {
        self.vertex_deletion.fill(vertex);
        self.vertex_insertion.fill(vertex);
        self.edge_deletion.fill(edge);
        self.edge_insertion.fill(edge);
        self
    }

    /// Checks that the table fits `source` and `target`.
    ///
    /// # Errors
    /// [`GraphError::DimensionMismatch`] naming the first disagreeing table.
    pub fn check_dimensions(&self, source: &Graph, target: &Graph) -> Result<(), GraphError> {
        let checks = [
            ("vertex substitution rows", source.vertex_count(), self.vertex_substitution.rows()),
            ("vertex substitution columns", target.vertex_count(), self.vertex_substitution.cols()),
            ("edge substitution rows", source.edge_count(), self.edge_substitution.rows()),
            ("edge substitution columns", target.edge_count(), self.edge_substitution.cols()),
        ];
        for (what, expected, found) in checks {
            if expected != found {
                return Err(GraphError::dimension(what, expected, found));
            }
        }
        Ok(())
    }

    /// Cost of mapping source vertex `i` onto target vertex `k`.
    #[must_use]
    pub fn vertex_substitution(&self, i: usize, k: usize) -> f64 {
        self.vertex_substitution[(i, k)]
    }

    /// Cost of mapping source edge `e` onto target edge `f`.
    #[must_use]
    pub fn edge_substitution(&self, e: usize, f: usize) -> f64 {
        self.edge_substitution[(e, f)]
    }

    /// Cost of deleting source vertex `i`.
    #[must_use]
    pub fn vertex_deletion(&self, i: usize) -> f64 {
        self.vertex_deletion[i]
    }

    /// Cost of inserting target vertex `k`.
    #[must_use]
    pub fn vertex_insertion(&self, k: usize) -> f64 {
        self.vertex_insertion[k]
    }

    /// Cost of deleting source edge `e`.
    #[must_use]
    pub fn edge_deletion(&self, e: usize) -> f64 {
        self.edge_deletion[e]
    }

    /// Cost of inserting target edge `f`.
    #[must_use]
    pub fn edge_insertion(&self, f: usize) -> f64 {
        self.edge_insertion[f]
    }

    /// The vertex substitution matrix.
    #[must_use]
    pub const fn vertex_matrix(&self) -> &Matrix<f64> {
        &self.vertex_substitution
    }

    /// The edge substitution matrix.
    #[must_use]
    pub const fn edge_matrix(&self) -> &Matrix<f64> {
        &self.edge_substitution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GraphBuilder, GraphKind, Weight};
    use rstest::rstest;

    fn pair() -> (Graph, Graph) {
        let mut s = GraphBuilder::new("s", GraphKind::Directed);
        s.add_vertex("a", Weight::labeled("C").with_cost(2.0)).expect("vertex");
        s.add_vertex("b", Weight::labeled("O").with_cost(3.0)).expect("vertex");
        s.add_edge("ab", "a", "b", Weight::labeled("single").with_cost(1.5))
            .expect("edge");
        let t = Graph::from_labels("t", GraphKind::Directed, &["O", "C", "N"], &[(1, 0)])
            .expect("graph");
        (s.build(), t)
    }

    #[test]
    fn test_label_distance() {
        let (s, t) = pair();
        let w = Weights::label_distance(&s, &t, 4.0);
        assert_eq!(w.vertex_matrix().row(0), &[4.0, 0.0, 4.0]);
        assert_eq!(w.vertex_matrix().row(1), &[0.0, 4.0, 4.0]);
        assert_eq!(w.edge_substitution(0, 0), 4.0);
        assert_eq!(w.vertex_deletion(1), 3.0);
        assert_eq!(w.vertex_insertion(2), 0.0);
        assert_eq!(w.edge_deletion(0), 1.5);
        assert!(w.check_dimensions(&s, &t).is_ok());
        assert!(matches!(
            w.check_dimensions(&t, &s),
            Err(GraphError::DimensionMismatch { .. })
        ));
    }

    #[rstest]
    #[case::deletion_length(vec![0.0], vec![0.0, 0.0], "vertex deletion costs")]
    #[case::insertion_length(vec![0.0, 0.0], vec![0.0], "vertex insertion costs")]
    fn test_new_checks_vectors(
        #[case] deletion: Vec<f64>,
        #[case] insertion: Vec<f64>,
        #[case] expected: &str,
    ) {
        let err = Weights::new(
            Matrix::filled(2, 2, 1.0),
            Matrix::filled(0, 0, 0.0),
            deletion,
            insertion,
            vec![],
            vec![],
        )
        .expect_err("mismatched vectors");
        match err {
            GraphError::DimensionMismatch { what, .. } => assert_eq!(what, expected),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_nan() {
        let err = Weights::new(
            Matrix::filled(1, 1, f64::NAN),
            Matrix::filled(0, 0, 0.0),
            vec![1.0],
            vec![1.0],
            vec![],
            vec![],
        );
        assert!(matches!(err, Err(GraphError::NonFiniteCost { .. })));
    }
}
