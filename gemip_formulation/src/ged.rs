//! Graph edit distance formulations.
//!
//! All three share the partial bipartite substrate: a source vertex is
//! either substituted or deleted (`d_i`), a target vertex either matched or
//! inserted (`e_k`). Edge terms are written relative to "delete every source
//! edge and insert every target edge": the objective carries that total as a
//! constant and every substituted edge pair `(e, f)` adds
//! `sub(e, f) - del(e) - ins(f)`.

use gemip_common::FormulationConfig;
use gemip_graph::{Graph, Weights};
use gemip_program::{Constraint, Program, ProgramBuilder, QuadExpression, Relation};

use crate::decoder::{CostModel, Decoder};
use crate::edges::{EdgePairs, lazy_generation, orientations};
use crate::error::FormulationError;
use crate::formulation::{Formulation, assemble, check_pair};
use crate::kind::FormulationKind;
use crate::substrate::{BipartiteEdges, Correspondence};

/// Objective coefficient of substituting pattern edge `e` by world edge `f`.
fn edge_coefficient(weights: &Weights, e: usize, f: usize) -> f64 {
    weights.edge_substitution(e, f) - weights.edge_deletion(e) - weights.edge_insertion(f)
}

/// Cost of deleting every source edge and inserting every target edge.
fn edge_creation_total(source: &Graph, target: &Graph, weights: &Weights) -> f64 {
    (0..source.edge_count())
        .map(|e| weights.edge_deletion(e))
        .chain((0..target.edge_count()).map(|f| weights.edge_insertion(f)))
        .sum()
}

/// Declares the partial substrate and applies the upper-bound restriction.
fn substrate(
    builder: &mut ProgramBuilder,
    config: &FormulationConfig,
    source: &Graph,
    target: &Graph,
    weights: &Weights,
) -> BipartiteEdges {
    let mut x = BipartiteEdges::declare(
        builder,
        source.vertex_count(),
        target.vertex_count(),
        Correspondence::Partial,
    );
    x.retain_cheapest(builder, weights.vertex_matrix(), config.upper_bound);
    x
}

/// Vertex-only assignment: the substrate alone, ignoring topology.
///
/// Cheapest of the family; its optimum bounds the vertex part of the edit
/// distance.
#[derive(Clone, Debug, Default)]
pub struct BipartiteGraphMatching {
    config: FormulationConfig,
}

impl BipartiteGraphMatching {
    /// A formulation using `config`.
    #[must_use]
    pub const fn new(config: FormulationConfig) -> Self {
        Self { config }
    }
}

impl Formulation for BipartiteGraphMatching {
    fn kind(&self) -> FormulationKind {
        FormulationKind::BipartiteGraphMatching
    }

    fn build_program(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Result<(Program, Decoder), FormulationError> {
        check_pair(source, target, weights)?;
        let mut builder = ProgramBuilder::linear();
        let x = substrate(&mut builder, &self.config, source, target, weights);
        builder.minimize(x.objective(weights));
        assemble(builder, self.kind(), CostModel::VertexOnly, &x)
    }
}

/// Edit distance as an integer linear program.
///
/// Edge substitutions are products of two vertex decisions, replaced by
/// auxiliary binaries `y_e_f` and the linearization triple. Depending on the
/// linearization policy, `y_e_f` is only generated for pairs with a non-zero
/// coefficient.
#[derive(Clone, Debug, Default)]
pub struct LinearGraphEditDistance {
    config: FormulationConfig,
}

impl LinearGraphEditDistance {
    /// A formulation using `config`.
    #[must_use]
    pub const fn new(config: FormulationConfig) -> Self {
        Self { config }
    }
}

impl Formulation for LinearGraphEditDistance {
    fn kind(&self) -> FormulationKind {
        FormulationKind::LinearGraphEditDistance
    }

    fn build_program(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Result<(Program, Decoder), FormulationError> {
        check_pair(source, target, weights)?;
        let precision = self.config.zero_cost_precision;
        let mut builder = ProgramBuilder::linear();
        let x = substrate(&mut builder, &self.config, source, target, weights);

        let total = source.edge_count() * target.edge_count();
        let nonzero = (0..source.edge_count())
            .flat_map(|e| (0..target.edge_count()).map(move |f| (e, f)))
            .filter(|&(e, f)| edge_coefficient(weights, e, f).abs() > precision)
            .count();
        let lazy = lazy_generation(self.config.linearization, nonzero, total);
        let pairs = EdgePairs::declare(&mut builder, source, target, |e, f| {
            !lazy || edge_coefficient(weights, e, f).abs() > precision
        });
        tracing::debug!(
            "{}: {} of {total} edge pairs linearized ({})",
            self.kind(),
            pairs.count(),
            if lazy { "lazy" } else { "exhaustive" }
        );
        pairs.deactivate_orphans(&mut builder, &x, source, target);
        pairs.link_products(&mut builder, &x, source, target);

        let mut objective = x.objective(weights);
        for (e, f, y) in pairs.iter() {
            objective.add_term(y, edge_coefficient(weights, e, f));
        }
        objective.add_constant(edge_creation_total(source, target, weights));
        builder.minimize(objective);
        assemble(builder, self.kind(), CostModel::EditDistance, &x)
    }
}

/// Edit distance as a quadratic program: edge substitutions appear as
/// products `x_i_k * x_j_l` in the objective, and every pattern edge takes
/// at most one image through a quadratic row.
#[derive(Clone, Debug, Default)]
pub struct QuadraticGraphEditDistance {
    config: FormulationConfig,
}

impl QuadraticGraphEditDistance {
    /// A formulation using `config`.
    #[must_use]
    pub const fn new(config: FormulationConfig) -> Self {
        Self { config }
    }
}

impl Formulation for QuadraticGraphEditDistance {
    fn kind(&self) -> FormulationKind {
        FormulationKind::QuadraticGraphEditDistance
    }

    fn build_program(
        &self,
        source: &Graph,
        target: &Graph,
        weights: &Weights,
    ) -> Result<(Program, Decoder), FormulationError> {
        check_pair(source, target, weights)?;
        let precision = self.config.zero_cost_precision;
        let mut builder = ProgramBuilder::quadratic();
        let x = substrate(&mut builder, &self.config, source, target, weights);
        let directed = source.is_directed();

        let mut objective = QuadExpression::from(x.objective(weights));
        objective.add_constant(edge_creation_total(source, target, weights));
        for (e, pattern_edge) in source.edges().iter().enumerate() {
            let mut row = QuadExpression::new();
            for (f, world_edge) in target.edges().iter().enumerate() {
                let coefficient = edge_coefficient(weights, e, f);
                for [(i, k), (j, l)] in
                    orientations(directed, pattern_edge.endpoints(), world_edge.endpoints())
                {
                    if !(x.is_active(i, k) && x.is_active(j, l)) {
                        continue;
                    }
                    row.add_product(x.x(i, k), x.x(j, l), 1.0);
                    if coefficient.abs() > precision {
                        objective.add_product(x.x(i, k), x.x(j, l), coefficient);
                    }
                }
            }
            if !row.is_linear() {
                builder.add_constraint(
                    Constraint::quadratic(row, Relation::LessEq, 1.0).named(format!("qrow_{e}")),
                );
            }
        }
        builder.minimize(objective);
        assemble(builder, self.kind(), CostModel::EditDistance, &x)
    }
}
