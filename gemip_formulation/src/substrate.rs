use gemip_graph::{Matrix, Weights};
use gemip_program::{Constraint, LinearExpression, ProgramBuilder, VarId};

/// How many targets a source vertex takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Correspondence {
    /// Every source vertex maps to exactly one target; a target is used at
    /// most once.
    Total,
    /// A source vertex maps to at most one target, otherwise it is deleted;
    /// an unused target is inserted. Both choices carry explicit variables.
    Partial,
}

/// The bipartite assignment shared by every formulation: one binary
/// `x_i_k` per (source vertex, target vertex) pair, meaning "i maps to k".
///
/// Declaring it adds one row per source vertex and one column per target
/// vertex. In [`Correspondence::Partial`] mode every row gets a deletion
/// variable `d_i` and every column an insertion variable `e_k`, and both
/// become equalities.
#[derive(Clone, Debug)]
pub struct BipartiteEdges {
    correspondence: Correspondence,
    x: Matrix<VarId>,
    deletions: Vec<VarId>,
    insertions: Vec<VarId>,
    active: Matrix<bool>,
}

impl BipartiteEdges {
    /// Declares the variables and assignment rows in `builder`.
    pub fn declare(
        builder: &mut ProgramBuilder,
        rows: usize,
        cols: usize,
        correspondence: Correspondence,
    ) -> Self {
        let x = Matrix::from_fn(rows, cols, |i, k| builder.add_binary(format!("x_{i}_{k}")));
        let (deletions, insertions) = match correspondence {
            Correspondence::Total => (Vec::new(), Vec::new()),
            Correspondence::Partial => (
                (0..rows)
                    .map(|i| builder.add_binary(format!("d_{i}")))
                    .collect(),
                (0..cols)
                    .map(|k| builder.add_binary(format!("e_{k}")))
                    .collect(),
            ),
        };

        for i in 0..rows {
            let mut row = LinearExpression::sum(x.row(i).iter().copied());
            if let Some(&d) = deletions.get(i) {
                row += d;
            }
            builder.add_constraint(Constraint::equal(row, 1.0).named(format!("row_{i}")));
        }
        for k in 0..cols {
            let mut column = LinearExpression::sum(x.column(k).copied());
            let constraint = match insertions.get(k) {
                Some(&e) => {
                    column += e;
                    Constraint::equal(column, 1.0)
                }
                None => Constraint::less_eq(column, 1.0),
            };
            builder.add_constraint(constraint.named(format!("col_{k}")));
        }

        Self {
            correspondence,
            x,
            deletions,
            insertions,
            active: Matrix::filled(rows, cols, true),
        }
    }

    /// Mode chosen at declaration.
    #[must_use]
    pub const fn correspondence(&self) -> Correspondence {
        self.correspondence
    }

    /// Number of source vertices.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.x.rows()
    }

    /// Number of target vertices.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.x.cols()
    }

    /// The variable for "`i` maps to `k`".
    #[must_use]
    pub fn x(&self, i: usize, k: usize) -> VarId {
        self.x[(i, k)]
    }

    /// All mapping variables.
    #[must_use]
    pub const fn matrix(&self) -> &Matrix<VarId> {
        &self.x
    }

    /// Deletion variable of source vertex `i`, in partial mode.
    #[must_use]
    pub fn deletion(&self, i: usize) -> Option<VarId> {
        self.deletions.get(i).copied()
    }

    /// Insertion variable of target vertex `k`, in partial mode.
    #[must_use]
    pub fn insertion(&self, k: usize) -> Option<VarId> {
        self.insertions.get(k).copied()
    }

    /// Whether `x_i_k` may still take the value 1.
    #[must_use]
    pub fn is_active(&self, i: usize, k: usize) -> bool {
        self.active[(i, k)]
    }

    /// Vertex substitution cost over the matrix, plus creation costs in
    /// partial mode.
    #[must_use]
    pub fn objective(&self, weights: &Weights) -> LinearExpression {
        let mut objective = LinearExpression::new();
        for i in 0..self.rows() {
            for k in 0..self.cols() {
                objective.add_term(self.x(i, k), weights.vertex_substitution(i, k));
            }
        }
        for (i, &d) in self.deletions.iter().enumerate() {
            objective.add_term(d, weights.vertex_deletion(i));
        }
        for (k, &e) in self.insertions.iter().enumerate() {
            objective.add_term(e, weights.vertex_insertion(k));
        }
        objective
    }

    /// Fixes `x_i_k` to zero.
    pub fn deactivate(&mut self, builder: &mut ProgramBuilder, i: usize, k: usize) {
        if let Some(var) = builder.variable_mut(self.x(i, k)) {
            var.deactivate();
        }
        self.active[(i, k)] = false;
    }

    /// Deactivates every pair for which `keep` is false.
    pub fn retain(
        &mut self,
        builder: &mut ProgramBuilder,
        mut keep: impl FnMut(usize, usize) -> bool,
    ) -> usize {
        let mut removed = 0;
        for i in 0..self.rows() {
            for k in 0..self.cols() {
                if self.is_active(i, k) && !keep(i, k) {
                    self.deactivate(builder, i, k);
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Keeps, per row and per column, only candidates whose cost does not
    /// exceed the `ratio` quantile of that row or column. `ratio >= 1`
    /// keeps everything.
    pub fn retain_cheapest(
        &mut self,
        builder: &mut ProgramBuilder,
        costs: &Matrix<f64>,
        ratio: f64,
    ) -> usize {
        if ratio >= 1.0 {
            return 0;
        }
        let row_limits: Vec<f64> = (0..self.rows())
            .map(|i| quantile(costs.row(i).to_vec(), ratio))
            .collect();
        let col_limits: Vec<f64> = (0..self.cols())
            .map(|k| quantile(costs.column(k).copied().collect(), ratio))
            .collect();
        let removed = self.retain(builder, |i, k| {
            costs[(i, k)] <= row_limits[i] && costs[(i, k)] <= col_limits[k]
        });
        tracing::debug!("upper bound {ratio} deactivated {removed} vertex pairs");
        removed
    }

    pub(crate) fn deletions(&self) -> &[VarId] {
        &self.deletions
    }

    pub(crate) fn insertions(&self) -> &[VarId] {
        &self.insertions
    }
}

/// Value at position `floor(len * ratio)` of the sorted values.
fn quantile(mut values: Vec<f64>, ratio: f64) -> f64 {
    if values.is_empty() {
        return f64::INFINITY;
    }
    values.sort_by(f64::total_cmp);
    let position = ((values.len() as f64) * ratio).floor() as usize;
    values[position.min(values.len() - 1)]
}
