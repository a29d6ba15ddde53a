use gemip_common::{CutMethod, DecodeConfig};
use gemip_graph::{Graph, GraphElement, Matrix, Weights};
use gemip_program::{Assignment, Constraint, LinearExpression, VarId};
use gemip_solver::SolveResult;

use crate::error::DecodeError;
use crate::kind::FormulationKind;
use crate::solution::{Image, Solution};
use crate::substrate::BipartiteEdges;

/// What a correspondence costs, and which structure it must preserve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CostModel {
    /// Vertex substitutions and vertex creations only.
    VertexOnly,
    /// Full edit distance: edges without image are deleted, uncovered
    /// target edges inserted.
    EditDistance,
    /// Every pattern edge lands on a world edge.
    Structural {
        /// World edges between images must carry a pattern edge.
        induced: bool,
    },
    /// Pattern edges may be dropped through their slack.
    Tolerant {
        /// Uncovered world edges between images pay their slack.
        induced: bool,
    },
}

/// Reads solver assignments back into [`Solution`]s for the program it was
/// built with.
#[derive(Clone, Debug)]
pub struct Decoder {
    kind: FormulationKind,
    model: CostModel,
    variable_count: usize,
    x: Matrix<VarId>,
    deletions: Vec<VarId>,
    insertions: Vec<VarId>,
    edge_slack: Vec<VarId>,
    world_slack: Vec<VarId>,
}

impl Decoder {
    pub(crate) fn new(
        kind: FormulationKind,
        model: CostModel,
        variable_count: usize,
        edges: &BipartiteEdges,
    ) -> Self {
        Self {
            kind,
            model,
            variable_count,
            x: edges.matrix().clone(),
            deletions: edges.deletions().to_vec(),
            insertions: edges.insertions().to_vec(),
            edge_slack: Vec::new(),
            world_slack: Vec::new(),
        }
    }

    pub(crate) fn with_slack(mut self, edge_slack: Vec<VarId>, world_slack: Vec<VarId>) -> Self {
        self.edge_slack = edge_slack;
        self.world_slack = world_slack;
        self
    }

    /// Formulation that built the program.
    #[must_use]
    pub const fn kind(&self) -> FormulationKind {
        self.kind
    }

    /// Number of variables in the paired program.
    #[must_use]
    pub const fn variable_count(&self) -> usize {
        self.variable_count
    }

    /// Decodes `result` into a correspondence from `source` to `target`.
    ///
    /// Values within `config.rounding_epsilon` of 0 or 1 are rounded; the
    /// cost recomputed from `weights` must match the reported objective
    /// within `config.objective_tolerance`.
    ///
    /// # Errors
    /// [`DecodeError`] when the assignment is missing or fractional, breaks
    /// injectivity or the formulation's structure, or disagrees with the
    /// reported objective.
    pub fn decode(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
        result: &SolveResult,
        config: &DecodeConfig,
    ) -> Result<Solution, DecodeError> {
        let (Some(assignment), Some(reported)) = (&result.assignment, result.objective) else {
            return Err(DecodeError::MissingAssignment {
                status: result.status,
            });
        };
        if assignment.len() != self.variable_count {
            return Err(DecodeError::LengthMismatch {
                expected: self.variable_count,
                found: assignment.len(),
            });
        }
        let reader = Reader {
            assignment,
            epsilon: config.rounding_epsilon,
        };

        let (vertex_map, preimage) = self.vertices(&reader, source, target)?;
        let inserted_vertices = self.inserted_vertices(&reader, target, &preimage)?;
        let (edge_map, covered) = self.edges(&reader, source, target, &vertex_map)?;
        let inserted_edges = self.inserted_edges(&reader, target, &preimage, &covered)?;

        let mut cost: f64 = vertex_map
            .iter()
            .enumerate()
            .filter_map(|(i, image)| image.target().map(|k| weights.vertex_substitution(i, k)))
            .sum();
        if matches!(self.model, CostModel::VertexOnly | CostModel::EditDistance) {
            cost += vertex_map
                .iter()
                .enumerate()
                .filter(|(_, image)| !image.is_mapped())
                .map(|(i, _)| weights.vertex_deletion(i))
                .sum::<f64>();
            cost += inserted_vertices
                .iter()
                .map(|&k| weights.vertex_insertion(k))
                .sum::<f64>();
        }
        if self.model != CostModel::VertexOnly {
            for (e, image) in edge_map.iter().enumerate() {
                cost += match image {
                    Image::Mapped(f) => weights.edge_substitution(e, *f),
                    Image::Unmapped => weights.edge_deletion(e),
                };
            }
            cost += inserted_edges
                .iter()
                .map(|&f| weights.edge_insertion(f))
                .sum::<f64>();
        }

        if (cost - reported).abs() > config.objective_tolerance {
            return Err(DecodeError::CostMismatch {
                recomputed: cost,
                reported,
            });
        }
        tracing::trace!("decoded {} solution of cost {cost}", self.kind);
        Ok(
            Solution::new(self.kind, result.status, cost, vertex_map, edge_map)
                .with_insertions(inserted_vertices, inserted_edges),
        )
    }

    fn vertices(
        &self,
        reader: &Reader<'_>,
        source: &Graph,
        target: &Graph,
    ) -> Result<(Vec<Image>, Vec<Option<usize>>), DecodeError> {
        let mut vertex_map = vec![Image::Unmapped; self.x.rows()];
        let mut preimage: Vec<Option<usize>> = vec![None; self.x.cols()];
        for i in 0..self.x.rows() {
            let mut images = Vec::new();
            for k in 0..self.x.cols() {
                if reader.flag(self.x[(i, k)], || format!("x_{i}_{k}"))? {
                    images.push(k);
                }
            }
            let deleted = match self.deletions.get(i) {
                Some(&d) => reader.flag(d, || format!("d_{i}"))?,
                None => false,
            };
            let chosen = images.len() + usize::from(deleted);
            if chosen > 1 {
                return Err(DecodeError::MultipleImages {
                    vertex: vertex_id(source, i),
                    images: chosen,
                });
            }
            if chosen == 0 {
                return Err(DecodeError::Unassigned {
                    vertex: vertex_id(source, i),
                });
            }
            if let Some(&k) = images.first() {
                if let Some(first) = preimage[k] {
                    return Err(DecodeError::NonInjective {
                        target: vertex_id(target, k),
                        first: vertex_id(source, first),
                        second: vertex_id(source, i),
                    });
                }
                preimage[k] = Some(i);
                vertex_map[i] = Image::Mapped(k);
            }
        }
        Ok((vertex_map, preimage))
    }

    fn inserted_vertices(
        &self,
        reader: &Reader<'_>,
        target: &Graph,
        preimage: &[Option<usize>],
    ) -> Result<Vec<usize>, DecodeError> {
        let mut inserted = Vec::new();
        for (k, &e) in self.insertions.iter().enumerate() {
            let flagged = reader.flag(e, || format!("e_{k}"))?;
            let matched = preimage[k].is_some();
            if flagged == matched {
                return Err(DecodeError::InconsistentInsertion {
                    vertex: vertex_id(target, k),
                    inserted: flagged,
                    matched,
                });
            }
            if flagged {
                inserted.push(k);
            }
        }
        Ok(inserted)
    }

    fn edges(
        &self,
        reader: &Reader<'_>,
        source: &Graph,
        target: &Graph,
        vertex_map: &[Image],
    ) -> Result<(Vec<Image>, Vec<bool>), DecodeError> {
        let mut edge_map = vec![Image::Unmapped; source.edge_count()];
        let mut covered = vec![false; target.edge_count()];
        for (e, edge) in source.edges().iter().enumerate() {
            let (i, j) = edge.endpoints();
            let image = match (vertex_map[i], vertex_map[j]) {
                (Image::Mapped(k), Image::Mapped(l)) => {
                    target.edge_between(k, l).map(GraphElement::index)
                }
                _ => None,
            };
            let dropped = match self.edge_slack.get(e) {
                Some(&s) => reader.flag(s, || format!("s_{e}"))?,
                None => false,
            };
            match image {
                Some(f) if !dropped => {
                    edge_map[e] = Image::Mapped(f);
                    covered[f] = true;
                }
                None if !dropped
                    && matches!(
                        self.model,
                        CostModel::Structural { .. } | CostModel::Tolerant { .. }
                    ) =>
                {
                    return Err(DecodeError::MissingEdge {
                        edge: edge.id().to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok((edge_map, covered))
    }

    fn inserted_edges(
        &self,
        reader: &Reader<'_>,
        target: &Graph,
        preimage: &[Option<usize>],
        covered: &[bool],
    ) -> Result<Vec<usize>, DecodeError> {
        let mut inserted = Vec::new();
        for (f, edge) in target.edges().iter().enumerate() {
            let (k, l) = edge.endpoints();
            let joins_images = preimage[k].is_some() && preimage[l].is_some();
            let unmatched = || DecodeError::UnmatchedWorldEdge {
                edge: edge.id().to_string(),
            };
            match self.model {
                CostModel::EditDistance if !covered[f] => inserted.push(f),
                CostModel::Structural { induced: true } if joins_images && !covered[f] => {
                    return Err(unmatched());
                }
                CostModel::Tolerant { induced: true } => {
                    let paid = match self.world_slack.get(f) {
                        Some(&t) => reader.flag(t, || format!("t_{f}"))?,
                        None => false,
                    };
                    if joins_images && !covered[f] && !paid {
                        return Err(unmatched());
                    }
                    if paid {
                        inserted.push(f);
                    }
                }
                _ => {}
            }
        }
        Ok(inserted)
    }

    /// A constraint excluding `solution` from the paired program, or `None`
    /// when `method` has nothing to exclude.
    #[must_use]
    pub fn cut(&self, solution: &Solution, method: CutMethod) -> Option<Constraint> {
        let pairs: Vec<VarId> = solution
            .vertex_pairs()
            .filter_map(|(i, k)| self.x.get(i, k).copied())
            .collect();
        match method {
            CutMethod::Solution => {
                let mut active = pairs;
                active.extend(
                    solution
                        .deleted_vertices()
                        .filter_map(|i| self.deletions.get(i).copied()),
                );
                active.extend(
                    solution
                        .inserted_vertices()
                        .iter()
                        .filter_map(|&k| self.insertions.get(k).copied()),
                );
                if active.is_empty() {
                    return None;
                }
                let bound = active.len() as f64 - 1.0;
                Some(Constraint::less_eq(LinearExpression::sum(active), bound))
            }
            CutMethod::Matchings => {
                (!pairs.is_empty()).then(|| Constraint::equal(LinearExpression::sum(pairs), 0.0))
            }
            CutMethod::Elements => {
                let columns: LinearExpression = solution
                    .vertex_pairs()
                    .flat_map(|(_, k)| self.x.column(k).copied())
                    .map(|x| (x, 1.0))
                    .collect();
                (!columns.is_empty()).then(|| Constraint::equal(columns, 0.0))
            }
        }
    }
}

/// Rounds assignment values to decisions.
struct Reader<'a> {
    assignment: &'a Assignment,
    epsilon: f64,
}

impl Reader<'_> {
    fn flag(&self, var: VarId, name: impl FnOnce() -> String) -> Result<bool, DecodeError> {
        let value = self.assignment.value(var);
        if value.abs() <= self.epsilon {
            Ok(false)
        } else if (value - 1.0).abs() <= self.epsilon {
            Ok(true)
        } else {
            Err(DecodeError::NonBinary {
                variable: name(),
                value,
            })
        }
    }
}

fn vertex_id(graph: &Graph, index: usize) -> String {
    graph
        .vertex(index)
        .map_or_else(|| format!("#{index}"), |v| v.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemip_graph::GraphKind;
    use gemip_program::{Assignment, Program, Relation};
    use gemip_solver::SolveStatus;
    use rstest::rstest;

    use crate::formulation::Formulation;
    use crate::ged::BipartiteGraphMatching;

    struct Fixture {
        source: Graph,
        target: Graph,
        weights: Weights,
        program: Program,
        decoder: Decoder,
    }

    /// Two labeled vertices on each side; variables are
    /// `x_0_0 x_0_1 x_1_0 x_1_1 d_0 d_1 e_0 e_1`.
    fn fixture() -> Fixture {
        let source = Graph::from_labels("s", GraphKind::Directed, &["a", "b"], &[]).expect("s");
        let target = Graph::from_labels("t", GraphKind::Directed, &["a", "b"], &[]).expect("t");
        let weights = Weights::label_distance(&source, &target, 1.0).with_creation_costs(1.0, 1.0);
        let (program, decoder) = BipartiteGraphMatching::default()
            .build_program(&source, &target, &weights)
            .expect("valid formulation");
        Fixture {
            source,
            target,
            weights,
            program,
            decoder,
        }
    }

    fn solved(values: &[f64], objective: f64) -> SolveResult {
        SolveResult::solved(
            SolveStatus::Optimal,
            Assignment::from_values(values.to_vec()),
            objective,
        )
    }

    fn decode(f: &Fixture, result: &SolveResult) -> Result<Solution, DecodeError> {
        f.decoder.decode(
            &f.source,
            &f.target,
            &f.weights,
            result,
            &DecodeConfig::default(),
        )
    }

    const IDENTITY: [f64; 8] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];

    #[test]
    fn test_decodes_identity() {
        let f = fixture();
        assert_eq!(f.decoder.variable_count(), f.program.variable_count());
        let s = decode(&f, &solved(&IDENTITY, 0.0)).expect("valid");
        assert_eq!(s.vertex_map(), &[Image::Mapped(0), Image::Mapped(1)]);
        assert!(s.is_optimal());
    }

    #[test]
    fn test_rounds_within_epsilon() {
        let f = fixture();
        let values = [1.0 - 1e-9, 1e-9, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        assert!(decode(&f, &solved(&values, 0.0)).is_ok());
    }

    #[test]
    fn test_deletion_and_insertion() {
        let f = fixture();
        // a -> a, b deleted, target b inserted
        let values = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        let s = decode(&f, &solved(&values, 2.0)).expect("valid");
        assert_eq!(s.vertex_map(), &[Image::Mapped(0), Image::Unmapped]);
        assert_eq!(s.inserted_vertices(), &[1]);
    }

    fn variant(err: &DecodeError) -> &'static str {
        match err {
            DecodeError::MissingAssignment { .. } => "missing",
            DecodeError::LengthMismatch { .. } => "length",
            DecodeError::NonBinary { .. } => "fractional",
            DecodeError::MultipleImages { .. } => "images",
            DecodeError::Unassigned { .. } => "unassigned",
            DecodeError::NonInjective { .. } => "injective",
            DecodeError::InconsistentInsertion { .. } => "insertion",
            DecodeError::MissingEdge { .. } => "edge",
            DecodeError::UnmatchedWorldEdge { .. } => "induced",
            DecodeError::CostMismatch { .. } => "cost",
        }
    }

    #[rstest]
    #[case::fractional(&[0.5, 0.5, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0], 0.0, "fractional")]
    #[case::two_images(&[1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0], 0.0, "images")]
    #[case::unassigned(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0], 1.0, "unassigned")]
    #[case::shared_target(&[1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0], 1.0, "injective")]
    #[case::insertion_flag(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0], 0.0, "insertion")]
    #[case::cost(&[0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 0.0, "cost")]
    #[case::short(&[1.0, 0.0], 0.0, "length")]
    fn test_rejects(#[case] values: &[f64], #[case] objective: f64, #[case] expected: &str) {
        let f = fixture();
        let err = decode(&f, &solved(values, objective)).expect_err("invalid");
        assert_eq!(variant(&err), expected, "{err}");
    }

    #[test]
    fn test_error_details() {
        let f = fixture();
        let fractional = [0.5, 0.5, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(
            decode(&f, &solved(&fractional, 0.0)),
            Err(DecodeError::NonBinary {
                variable: "x_0_0".into(),
                value: 0.5
            })
        );
        let swapped = [0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(
            decode(&f, &solved(&swapped, 0.0)),
            Err(DecodeError::CostMismatch {
                recomputed: 2.0,
                reported: 0.0
            })
        );
    }

    #[test]
    fn test_missing_assignment() {
        let f = fixture();
        let result = SolveResult::without_solution(SolveStatus::TimedOut);
        assert_eq!(
            decode(&f, &result),
            Err(DecodeError::MissingAssignment {
                status: SolveStatus::TimedOut
            })
        );
    }

    #[rstest]
    #[case::solution(CutMethod::Solution, 2, Relation::LessEq, 1.0)]
    #[case::matchings(CutMethod::Matchings, 2, Relation::Equal, 0.0)]
    #[case::elements(CutMethod::Elements, 4, Relation::Equal, 0.0)]
    fn test_cut_excludes_solution(
        #[case] method: CutMethod,
        #[case] terms: usize,
        #[case] relation: Relation,
        #[case] rhs: f64,
    ) {
        let f = fixture();
        let s = decode(&f, &solved(&IDENTITY, 0.0)).expect("valid");
        let cut = f.decoder.cut(&s, method).expect("something to cut");
        assert_eq!(cut.expression().linear().len(), terms);
        assert_eq!(cut.relation(), relation);
        assert_eq!(cut.rhs(), rhs);
        assert!(!cut.is_satisfied(&Assignment::from_values(IDENTITY.to_vec()), 1e-9));
        assert!(f.program.with_constraint(cut).is_ok());
    }

    #[test]
    fn test_nothing_to_cut() {
        let f = fixture();
        // everything deleted and inserted
        let values = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let s = decode(&f, &solved(&values, 4.0)).expect("valid");
        assert!(f.decoder.cut(&s, CutMethod::Matchings).is_none());
        assert!(f.decoder.cut(&s, CutMethod::Elements).is_none());
        assert!(f.decoder.cut(&s, CutMethod::Solution).is_some());
    }
}
