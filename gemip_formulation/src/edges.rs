use gemip_common::Linearization;
use gemip_graph::{Graph, Matrix};
use gemip_program::{Constraint, LinearExpression, ProgramBuilder, Relation, VarId};

use crate::substrate::BipartiteEdges;

/// Vertex pairs `[(i, k), (j, l)]` whose joint selection maps the pattern
/// edge `(i, j)` onto the world edge `(k, l)`. Undirected edges match in both
/// orientations.
pub(crate) fn orientations(
    directed: bool,
    (i, j): (usize, usize),
    (k, l): (usize, usize),
) -> Vec<[(usize, usize); 2]> {
    if directed {
        vec![[(i, k), (j, l)]]
    } else {
        vec![[(i, k), (j, l)], [(i, l), (j, k)]]
    }
}

/// Whether auxiliary variables should be generated only for `nonzero` of
/// `total` candidate pairs.
pub(crate) fn lazy_generation(linearization: Linearization, nonzero: usize, total: usize) -> bool {
    let density = if total == 0 {
        0.0
    } else {
        nonzero as f64 / total as f64
    };
    linearization.is_lazy(density)
}

/// Auxiliary binaries `y_e_f`, one per selected (pattern edge, world edge)
/// pair.
#[derive(Clone, Debug)]
pub(crate) struct EdgePairs {
    y: Matrix<Option<VarId>>,
}

impl EdgePairs {
    pub(crate) fn declare(
        builder: &mut ProgramBuilder,
        source: &Graph,
        target: &Graph,
        mut select: impl FnMut(usize, usize) -> bool,
    ) -> Self {
        let y = Matrix::from_fn(source.edge_count(), target.edge_count(), |e, f| {
            select(e, f).then(|| builder.add_binary(format!("y_{e}_{f}")))
        });
        Self { y }
    }

    pub(crate) fn get(&self, e: usize, f: usize) -> Option<VarId> {
        self.y.get(e, f).copied().flatten()
    }

    pub(crate) fn count(&self) -> usize {
        self.y.as_slice().iter().flatten().count()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, usize, VarId)> + '_ {
        let cols = self.y.cols();
        self.y
            .as_slice()
            .iter()
            .enumerate()
            .filter_map(move |(n, y)| y.map(|y| (n / cols, n % cols, y)))
    }

    /// `Σ_f y_e_f` over the world edges `f` in `among`.
    fn sum_row(&self, e: usize, among: impl IntoIterator<Item = usize>) -> LinearExpression {
        among.into_iter().filter_map(|f| self.get(e, f)).map(|y| (y, 1.0)).collect()
    }

    /// `Σ_e y_e_f` over every pattern edge.
    fn sum_column(&self, f: usize) -> LinearExpression {
        (0..self.y.rows())
            .filter_map(|e| self.get(e, f))
            .map(|y| (y, 1.0))
            .collect()
    }

    /// Fixes to zero every `y` whose vertex pairs are all inactive.
    pub(crate) fn deactivate_orphans(
        &self,
        builder: &mut ProgramBuilder,
        x: &BipartiteEdges,
        source: &Graph,
        target: &Graph,
    ) -> usize {
        let mut removed = 0;
        for (e, f, y) in self.iter() {
            let alive = orientations(
                source.is_directed(),
                source.edges()[e].endpoints(),
                target.edges()[f].endpoints(),
            )
            .into_iter()
            .any(|[a, b]| x.is_active(a.0, a.1) && x.is_active(b.0, b.1));
            if !alive {
                if let Some(var) = builder.variable_mut(y) {
                    var.deactivate();
                }
                removed += 1;
            }
        }
        removed
    }

    /// Ties every `y` to its vertex pairs with the linearization triple, and
    /// lets every edge take at most one image.
    pub(crate) fn link_products(
        &self,
        builder: &mut ProgramBuilder,
        x: &BipartiteEdges,
        source: &Graph,
        target: &Graph,
    ) {
        let directed = source.is_directed();
        for (e, f, y) in self.iter() {
            let (i, j) = source.edges()[e].endpoints();
            let (k, l) = target.edges()[f].endpoints();
            let name = format!("lin_{e}_{f}");
            if directed {
                builder.add_constraint(Constraint::less_eq(y - x.x(i, k), 0.0).named(format!("{name}_a")));
                builder.add_constraint(Constraint::less_eq(y - x.x(j, l), 0.0).named(format!("{name}_b")));
                builder.add_constraint(
                    Constraint::less_eq(x.x(i, k) + x.x(j, l) - y, 1.0).named(format!("{name}_c")),
                );
            } else {
                builder.add_constraint(
                    Constraint::less_eq(y - x.x(i, k) - x.x(i, l), 0.0).named(format!("{name}_a")),
                );
                builder.add_constraint(
                    Constraint::less_eq(y - x.x(j, k) - x.x(j, l), 0.0).named(format!("{name}_b")),
                );
                builder.add_constraint(
                    Constraint::less_eq(x.x(i, k) + x.x(j, l) + x.x(i, l) + x.x(j, k) - y, 1.0)
                        .named(format!("{name}_c")),
                );
            }
        }
        for e in 0..self.y.rows() {
            let row = self.sum_row(e, 0..self.y.cols());
            if row.len() > 1 {
                builder.add_constraint(Constraint::less_eq(row, 1.0).named(format!("yrow_{e}")));
            }
        }
        for f in 0..self.y.cols() {
            let column = self.sum_column(f);
            if column.len() > 1 {
                builder.add_constraint(Constraint::less_eq(column, 1.0).named(format!("ycol_{f}")));
            }
        }
    }

    /// Every pattern edge takes exactly one world edge, or its slack.
    pub(crate) fn choose_one(&self, builder: &mut ProgramBuilder, slack: Option<&[VarId]>) {
        for e in 0..self.y.rows() {
            let mut row = self.sum_row(e, 0..self.y.cols());
            if let Some(&s) = slack.and_then(|s| s.get(e)) {
                row += s;
            }
            builder.add_constraint(Constraint::equal(row, 1.0).named(format!("edge_{e}")));
        }
    }

    /// Flow rows binding edge images to vertex images: for every pattern edge
    /// `(i, j)` and world vertex `k`, the chosen world edges leaving `k` equal
    /// `x_i_k` and those entering `k` equal `x_j_k`. Undirected graphs use one
    /// row over all incident edges against `x_i_k + x_j_k`.
    ///
    /// `relation` is [`Relation::Equal`] for a hard encoding and
    /// [`Relation::LessEq`] when edges may go unmatched.
    pub(crate) fn flow_rows(
        &self,
        builder: &mut ProgramBuilder,
        x: &BipartiteEdges,
        source: &Graph,
        target: &Graph,
        relation: Relation,
    ) {
        for (e, edge) in source.edges().iter().enumerate() {
            let (i, j) = edge.endpoints();
            for (k, vertex) in target.vertices().iter().enumerate() {
                if source.is_directed() {
                    let out = self.sum_row(e, vertex.out_edges().iter().copied()) - x.x(i, k);
                    let inc = self.sum_row(e, vertex.in_edges().iter().copied()) - x.x(j, k);
                    builder.add_constraint(
                        Constraint::linear(out, relation, 0.0).named(format!("flow_{e}_{k}_out")),
                    );
                    builder.add_constraint(
                        Constraint::linear(inc, relation, 0.0).named(format!("flow_{e}_{k}_in")),
                    );
                } else {
                    let all = self.sum_row(e, vertex.incident_edges()) - x.x(i, k) - x.x(j, k);
                    builder.add_constraint(
                        Constraint::linear(all, relation, 0.0).named(format!("flow_{e}_{k}")),
                    );
                }
            }
        }
    }

    /// Induced rows: a world edge whose endpoints are both images must carry
    /// a pattern edge, or pay its slack.
    pub(crate) fn induced_rows(
        &self,
        builder: &mut ProgramBuilder,
        x: &BipartiteEdges,
        target: &Graph,
        slack: Option<&[VarId]>,
    ) {
        for (f, edge) in target.edges().iter().enumerate() {
            let (k, l) = edge.endpoints();
            let mut row: LinearExpression = x
                .matrix()
                .column(k)
                .chain(x.matrix().column(l))
                .map(|&v| (v, 1.0))
                .collect();
            row -= self.sum_column(f);
            if let Some(&t) = slack.and_then(|s| s.get(f)) {
                row.add_term(t, -1.0);
            }
            builder.add_constraint(Constraint::less_eq(row, 1.0).named(format!("induced_{f}")));
        }
    }
}
