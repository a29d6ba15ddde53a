//! Subgraph isomorphism formulations.
//!
//! Every pattern vertex maps to exactly one world vertex and no world vertex
//! is used twice. The variants differ in how pattern edges are tied to world
//! edges and in what a mismatch costs.

use gemip_common::FormulationConfig;
use gemip_graph::{Graph, Weights};
use gemip_program::{Constraint, Program, ProgramBuilder, Relation, VarId};

use crate::decoder::{CostModel, Decoder};
use crate::edges::{EdgePairs, lazy_generation};
use crate::error::FormulationError;
use crate::formulation::{Formulation, assemble, check_pair};
use crate::kind::FormulationKind;
use crate::substrate::{BipartiteEdges, Correspondence};

/// Pair checks plus the injectivity precondition, then the total substrate.
fn substrate(
    kind: FormulationKind,
    builder: &mut ProgramBuilder,
    source: &Graph,
    target: &Graph,
    weights: &Weights,
) -> Result<BipartiteEdges, FormulationError> {
    check_pair(source, target, weights)?;
    if source.vertex_count() > target.vertex_count() {
        return Err(FormulationError::PatternTooLarge {
            pattern: source.vertex_count(),
            world: target.vertex_count(),
        });
    }
    tracing::trace!(
        "{kind}: pattern {} into world {}",
        source.vertex_count(),
        target.vertex_count()
    );
    Ok(BipartiteEdges::declare(
        builder,
        source.vertex_count(),
        target.vertex_count(),
        Correspondence::Total,
    ))
}

fn reject_restriction(kind: FormulationKind, config: &FormulationConfig) -> Result<(), FormulationError> {
    if config.upper_bound < 1.0 {
        return Err(FormulationError::Unsupported {
            formulation: kind,
            option: "upper_bound below 1",
        });
    }
    Ok(())
}

/// Edge-flow encoding shared by the identity and substitution tolerant
/// variants: one `y_e_f` per (pattern edge, world edge) pair, each pattern
/// edge chooses exactly one world edge, and flow rows force that edge to join
/// the images of its endpoints.
fn edge_flow(
    kind: FormulationKind,
    config: &FormulationConfig,
    source: &Graph,
    target: &Graph,
    weights: &Weights,
    identity: bool,
) -> Result<(Program, Decoder), FormulationError> {
    let precision = config.zero_cost_precision;
    let mut builder = ProgramBuilder::linear();
    let mut x = substrate(kind, &mut builder, source, target, weights)?;
    if identity {
        let removed = x.retain(&mut builder, |i, k| {
            weights.vertex_substitution(i, k) <= precision
        });
        tracing::debug!("{kind}: {removed} non-identical vertex pairs removed");
    } else {
        x.retain_cheapest(&mut builder, weights.vertex_matrix(), config.upper_bound);
    }

    let pairs = EdgePairs::declare(&mut builder, source, target, |_, _| true);
    if identity {
        for (e, f, y) in pairs.iter() {
            if weights.edge_substitution(e, f) > precision {
                if let Some(var) = builder.variable_mut(y) {
                    var.deactivate();
                }
            }
        }
    }
    pairs.deactivate_orphans(&mut builder, &x, source, target);
    pairs.choose_one(&mut builder, None);
    pairs.flow_rows(&mut builder, &x, source, target, Relation::Equal);
    if config.induced {
        pairs.induced_rows(&mut builder, &x, target, None);
    }

    let mut objective = x.objective(weights);
    for (e, f, y) in pairs.iter() {
        objective.add_term(y, weights.edge_substitution(e, f));
    }
    builder.minimize(objective);
    assemble(
        builder,
        kind,
        CostModel::Structural {
            induced: config.induced,
        },
        &x,
    )
}

/// Identity preserving subgraph isomorphism: only vertex and edge pairs
/// whose substitution cost is within `zero_cost_precision` may be matched.
#[derive(Clone, Debug, Default)]
pub struct SubgraphIsomorphism {
    config: FormulationConfig,
}

impl SubgraphIsomorphism {
    /// A formulation using `config`.
    #[must_use]
    pub const fn new(config: FormulationConfig) -> Self {
        Self { config }
    }
}

impl Formulation for SubgraphIsomorphism {
    fn kind(&self) -> FormulationKind {
        FormulationKind::SubgraphIsomorphism
    }

    fn build_program(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Result<(Program, Decoder), FormulationError> {
        reject_restriction(self.kind(), &self.config)?;
        edge_flow(self.kind(), &self.config, source, target, weights, true)
    }
}

/// Subgraph isomorphism where matched elements may differ; their
/// substitution cost enters the objective.
#[derive(Clone, Debug, Default)]
pub struct SubstitutionTolerantSubgraphIsomorphism {
    config: FormulationConfig,
}

impl SubstitutionTolerantSubgraphIsomorphism {
    /// A formulation using `config`.
    #[must_use]
    pub const fn new(config: FormulationConfig) -> Self {
        Self { config }
    }
}

impl Formulation for SubstitutionTolerantSubgraphIsomorphism {
    fn kind(&self) -> FormulationKind {
        FormulationKind::SubstitutionTolerant
    }

    fn build_program(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Result<(Program, Decoder), FormulationError> {
        edge_flow(self.kind(), &self.config, source, target, weights, false)
    }
}

/// Substitution tolerant isomorphism whose structural rows are relaxed:
/// a pattern edge may go unmatched by paying its deletion cost through the
/// slack `s_e`. In induced mode a world edge joining two images without a
/// pattern counterpart pays its insertion cost through `t_f`.
#[derive(Clone, Debug, Default)]
pub struct ErrorTolerantSubgraphIsomorphism {
    config: FormulationConfig,
}

impl ErrorTolerantSubgraphIsomorphism {
    /// A formulation using `config`.
    #[must_use]
    pub const fn new(config: FormulationConfig) -> Self {
        Self { config }
    }
}

impl Formulation for ErrorTolerantSubgraphIsomorphism {
    fn kind(&self) -> FormulationKind {
        FormulationKind::ErrorTolerant
    }

    fn build_program(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Result<(Program, Decoder), FormulationError> {
        let mut builder = ProgramBuilder::linear();
        let mut x = substrate(self.kind(), &mut builder, source, target, weights)?;
        x.retain_cheapest(&mut builder, weights.vertex_matrix(), self.config.upper_bound);

        let pairs = EdgePairs::declare(&mut builder, source, target, |_, _| true);
        pairs.deactivate_orphans(&mut builder, &x, source, target);
        let edge_slack: Vec<VarId> = (0..source.edge_count())
            .map(|e| builder.add_binary(format!("s_{e}")))
            .collect();
        let world_slack: Vec<VarId> = if self.config.induced {
            (0..target.edge_count())
                .map(|f| builder.add_binary(format!("t_{f}")))
                .collect()
        } else {
            Vec::new()
        };
        pairs.choose_one(&mut builder, Some(&edge_slack));
        pairs.flow_rows(&mut builder, &x, source, target, Relation::LessEq);
        if self.config.induced {
            pairs.induced_rows(&mut builder, &x, target, Some(&world_slack));
        }

        let mut objective = x.objective(weights);
        for (e, f, y) in pairs.iter() {
            objective.add_term(y, weights.edge_substitution(e, f));
        }
        for (e, &s) in edge_slack.iter().enumerate() {
            objective.add_term(s, weights.edge_deletion(e));
        }
        for (f, &t) in world_slack.iter().enumerate() {
            objective.add_term(t, weights.edge_insertion(f));
        }
        builder.minimize(objective);
        let model = CostModel::Tolerant {
            induced: self.config.induced,
        };
        let (program, decoder) = assemble(builder, self.kind(), model, &x)?;
        Ok((program, decoder.with_slack(edge_slack, world_slack)))
    }
}

/// Substitution tolerant isomorphism with hard pairwise exclusion rows:
/// for every pattern edge `(i, j)` and every world pair `(k, l)` that is not
/// an edge, `x_i_k + x_j_l <= 1`.
///
/// Edge substitution costs are carried by linearized `y_e_f`, generated
/// according to the linearization policy; with all-zero edge costs no
/// auxiliary variable is needed.
#[derive(Clone, Debug, Default)]
pub struct ExactSubgraphIsomorphism {
    config: FormulationConfig,
}

impl ExactSubgraphIsomorphism {
    /// A formulation using `config`.
    #[must_use]
    pub const fn new(config: FormulationConfig) -> Self {
        Self { config }
    }
}

impl Formulation for ExactSubgraphIsomorphism {
    fn kind(&self) -> FormulationKind {
        FormulationKind::Exact
    }

    fn build_program(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Result<(Program, Decoder), FormulationError> {
        reject_restriction(self.kind(), &self.config)?;
        let precision = self.config.zero_cost_precision;
        let mut builder = ProgramBuilder::linear();
        let x = substrate(self.kind(), &mut builder, source, target, weights)?;
        let m = target.vertex_count();

        let mut exclusions = 0usize;
        for (e, edge) in source.edges().iter().enumerate() {
            let (i, j) = edge.endpoints();
            for k in 0..m {
                for l in (0..m).filter(|&l| l != k && !target.has_edge(k, l)) {
                    builder.add_constraint(
                        Constraint::less_eq(x.x(i, k) + x.x(j, l), 1.0)
                            .named(format!("excl_{e}_{k}_{l}")),
                    );
                    exclusions += 1;
                }
            }
        }
        if self.config.induced {
            let n = source.vertex_count();
            for i in 0..n {
                for j in (0..n).filter(|&j| j != i && !source.has_edge(i, j)) {
                    for (f, edge) in target.edges().iter().enumerate() {
                        let (k, l) = edge.endpoints();
                        builder.add_constraint(
                            Constraint::less_eq(x.x(i, k) + x.x(j, l), 1.0)
                                .named(format!("nonedge_{i}_{j}_{f}")),
                        );
                        exclusions += 1;
                    }
                }
            }
        }
        tracing::debug!("{}: {exclusions} exclusion rows", self.kind());

        let total = source.edge_count() * target.edge_count();
        let nonzero = (0..source.edge_count())
            .flat_map(|e| (0..target.edge_count()).map(move |f| (e, f)))
            .filter(|&(e, f)| weights.edge_substitution(e, f) > precision)
            .count();
        let lazy = lazy_generation(self.config.linearization, nonzero, total);
        let pairs = EdgePairs::declare(&mut builder, source, target, |e, f| {
            !lazy || weights.edge_substitution(e, f) > precision
        });
        pairs.link_products(&mut builder, &x, source, target);

        let mut objective = x.objective(weights);
        for (e, f, y) in pairs.iter() {
            objective.add_term(y, weights.edge_substitution(e, f));
        }
        builder.minimize(objective);
        let model = CostModel::Structural {
            induced: self.config.induced,
        };
        assemble(builder, self.kind(), model, &x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemip_common::DecodeConfig;
    use gemip_graph::GraphKind;
    use gemip_solver::{ExhaustiveSolver, SolveOptions, SolveStatus, Solver};
    use rstest::rstest;

    use crate::solution::{Image, Solution};

    fn run(
        formulation: &dyn Formulation,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Option<Solution> {
        let (program, decoder) = formulation
            .build_program(source, target, weights)
            .expect("valid formulation");
        let result = ExhaustiveSolver::new().solve(&program, &SolveOptions::default());
        if result.status == SolveStatus::Infeasible {
            return None;
        }
        Some(
            decoder
                .decode(source, target, weights, &result, &DecodeConfig::default())
                .expect("consistent solution"),
        )
    }

    fn all_kinds(config: &FormulationConfig) -> Vec<std::sync::Arc<dyn Formulation>> {
        [
            FormulationKind::SubgraphIsomorphism,
            FormulationKind::SubstitutionTolerant,
            FormulationKind::ErrorTolerant,
            FormulationKind::Exact,
        ]
        .into_iter()
        .map(|k| k.instantiate(config))
        .collect()
    }

    #[rstest]
    #[case::directed(GraphKind::Directed)]
    #[case::undirected(GraphKind::Undirected)]
    fn test_triangle_in_square_with_diagonal(#[case] kind: GraphKind) {
        let pattern =
            Graph::from_labels("p", kind, &["x", "x", "x"], &[(0, 1), (1, 2), (2, 0)]).expect("p");
        let world = Graph::from_labels(
            "w",
            kind,
            &["x", "x", "x", "x"],
            &[(0, 1), (1, 2), (2, 0), (2, 3), (3, 0)],
        )
        .expect("w");
        let weights = Weights::zero(&pattern, &world).with_creation_costs(1.0, 1.0);
        for formulation in all_kinds(&FormulationConfig::default()) {
            let s = run(formulation.as_ref(), &pattern, &world, &weights).expect("feasible");
            assert_eq!(s.cost(), 0.0, "{}", formulation.kind());
            for (e, edge) in pattern.edges().iter().enumerate() {
                let (i, j) = edge.endpoints();
                let (Image::Mapped(k), Image::Mapped(l)) = (s.vertex_image(i), s.vertex_image(j))
                else {
                    panic!("unmapped vertex");
                };
                let f = world.edge_between(k, l).expect("image edge");
                assert_eq!(s.edge_image(e), Image::Mapped(gemip_graph::GraphElement::index(f)));
            }
        }
    }

    #[test]
    fn test_identity_rejects_label_mismatch() {
        let pattern = Graph::from_labels("p", GraphKind::Directed, &["a", "b"], &[(0, 1)]).expect("p");
        let world =
            Graph::from_labels("w", GraphKind::Directed, &["a", "c", "b"], &[(0, 1), (0, 2)])
                .expect("w");
        let weights = Weights::label_distance(&pattern, &world, 1.0);
        let s = run(&SubgraphIsomorphism::default(), &pattern, &world, &weights).expect("feasible");
        assert_eq!(s.vertex_map(), &[Image::Mapped(0), Image::Mapped(2)]);

        let tolerant = run(
            &SubstitutionTolerantSubgraphIsomorphism::default(),
            &pattern,
            &world,
            &weights,
        )
        .expect("feasible");
        assert_eq!(tolerant.cost(), 0.0);
    }

    #[test]
    fn test_error_tolerant_pays_for_missing_edge() {
        let pattern =
            Graph::from_labels("p", GraphKind::Undirected, &["a", "b", "c"], &[(0, 1), (1, 2)])
                .expect("p");
        let world =
            Graph::from_labels("w", GraphKind::Undirected, &["a", "b", "c"], &[(0, 1)]).expect("w");
        let weights = Weights::label_distance(&pattern, &world, 10.0).with_creation_costs(1.0, 2.0);
        assert!(run(&ExactSubgraphIsomorphism::default(), &pattern, &world, &weights).is_none());
        assert!(
            run(
                &SubstitutionTolerantSubgraphIsomorphism::default(),
                &pattern,
                &world,
                &weights
            )
            .is_none()
        );
        let s = run(
            &ErrorTolerantSubgraphIsomorphism::default(),
            &pattern,
            &world,
            &weights,
        )
        .expect("feasible");
        assert_eq!(s.cost(), 2.0);
        assert_eq!(s.edge_map(), &[Image::Mapped(0), Image::Unmapped]);
    }

    #[rstest]
    #[case::exact(FormulationKind::Exact)]
    #[case::subtol(FormulationKind::SubstitutionTolerant)]
    #[case::errortol(FormulationKind::ErrorTolerant)]
    fn test_induced_excludes_extra_world_edge(#[case] kind: FormulationKind) {
        // path a-b-c must not land on the triangle's three vertices
        let pattern =
            Graph::from_labels("p", GraphKind::Undirected, &["x", "x", "x"], &[(0, 1), (1, 2)])
                .expect("p");
        let world = Graph::from_labels(
            "w",
            GraphKind::Undirected,
            &["x", "x", "x", "x"],
            &[(0, 1), (1, 2), (2, 0), (2, 3)],
        )
        .expect("w");
        let weights = Weights::zero(&pattern, &world).with_creation_costs(1.0, 1.0);
        let config = FormulationConfig {
            induced: true,
            ..FormulationConfig::default()
        };
        let s = run(kind.instantiate(&config).as_ref(), &pattern, &world, &weights)
            .expect("feasible");
        assert_eq!(s.cost(), 0.0);
        assert!(s.vertex_image(1) == Image::Mapped(2));
        assert!(s.vertex_pairs().any(|(_, k)| k == 3));
    }

    #[test]
    fn test_pattern_too_large() {
        let pattern = Graph::from_labels("p", GraphKind::Directed, &["a", "b"], &[]).expect("p");
        let world = Graph::from_labels("w", GraphKind::Directed, &["a"], &[]).expect("w");
        let weights = Weights::zero(&pattern, &world);
        for formulation in all_kinds(&FormulationConfig::default()) {
            assert!(matches!(
                formulation.build_program(&pattern, &world, &weights),
                Err(FormulationError::PatternTooLarge {
                    pattern: 2,
                    world: 1
                })
            ));
        }
    }

    #[rstest]
    #[case::identity(FormulationKind::SubgraphIsomorphism, true)]
    #[case::exact(FormulationKind::Exact, true)]
    #[case::subtol(FormulationKind::SubstitutionTolerant, false)]
    #[case::errortol(FormulationKind::ErrorTolerant, false)]
    fn test_upper_bound_support(#[case] kind: FormulationKind, #[case] rejected: bool) {
        let pattern = Graph::from_labels("p", GraphKind::Directed, &["a"], &[]).expect("p");
        let world = Graph::from_labels("w", GraphKind::Directed, &["a", "b"], &[]).expect("w");
        let weights = Weights::label_distance(&pattern, &world, 1.0);
        let config = FormulationConfig {
            upper_bound: 0.5,
            ..FormulationConfig::default()
        };
        let built = kind.instantiate(&config).build_program(&pattern, &world, &weights);
        assert_eq!(
            matches!(built, Err(FormulationError::Unsupported { .. })),
            rejected
        );
    }
}
