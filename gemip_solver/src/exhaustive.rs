//! Depth-first branch-and-bound over bounded integral variables.
//!
//! Variables are fixed in declaration order. After each fixing, every
//! constraint touching the variable is checked against the interval of
//! activities the still-free variables can reach, and the node is dropped
//! when no completion can satisfy it. An objective lower bound computed the
//! same way prunes nodes that cannot beat the incumbent.
//!
//! The search is exact but exponential; it is meant for small programs and as
//! a reference backend in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use gemip_common::SolverConfig;
use gemip_program::{Assignment, Domain, Expression, Program, Relation, Sense};

use crate::registry::RegistryError;
use crate::solver::{SolveOptions, SolveResult, SolveStatus, Solver};

const FEASIBILITY_TOLERANCE: f64 = 1e-9;
const CHECK_INTERVAL: u64 = 1024;
const DEFAULT_NODE_LIMIT: u64 = u64::MAX;

/// Reference backend enumerating integral assignments.
///
/// An abort stops every solve running on this instance at the time of the
/// request; with no solve running it is refused.
#[derive(Debug)]
pub struct ExhaustiveSolver {
    node_limit: u64,
    running: Mutex<usize>,
    aborted: AtomicBool,
}

impl Default for ExhaustiveSolver {
    fn default() -> Self {
        Self {
            node_limit: DEFAULT_NODE_LIMIT,
            running: Mutex::new(0),
            aborted: AtomicBool::new(false),
        }
    }
}

impl ExhaustiveSolver {
    /// Registry name.
    pub const NAME: &'static str = "exhaustive";

    /// A solver without node limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the optional `node_limit` parameter.
    ///
    /// # Errors
    /// [`RegistryError::Construction`] when `node_limit` is not an integer.
    pub fn from_config(config: &SolverConfig) -> Result<Self, RegistryError> {
        let node_limit = match config.params.get("node_limit") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                RegistryError::construction(Self::NAME, format!("node_limit '{raw}': {e}"))
            })?,
            None => DEFAULT_NODE_LIMIT,
        };
        Ok(Self {
            node_limit,
            ..Self::default()
        })
    }

    /// Caps the number of explored nodes; hitting the cap behaves like a time-out.
    #[must_use]
    pub const fn with_node_limit(mut self, node_limit: u64) -> Self {
        self.node_limit = node_limit;
        self
    }

    fn enter(&self) -> Running<'_> {
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Running { solver: self }
    }
}

/// Marks one solve in flight; the last one out clears a pending abort.
struct Running<'a> {
    solver: &'a ExhaustiveSolver,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        let mut running = self
            .solver
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *running -= 1;
        if *running == 0 {
            self.solver.aborted.store(false, Ordering::Release);
        }
    }
}

impl Solver for ExhaustiveSolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn solve(&self, program: &Program, options: &SolveOptions) -> SolveResult {
        let started = Instant::now();
        let _running = self.enter();
        let model = match Model::compile(program) {
            Ok(model) => model,
            Err(reason) => return SolveResult::error(reason),
        };
        tracing::debug!(
            "exhaustive search: {} variables, {} rows",
            model.lower.len(),
            model.rows.len()
        );

        let mut search = Search {
            model: &model,
            lo: model.lower.clone(),
            hi: model.upper.clone(),
            incumbent: None,
            nodes: 0,
            gap: options.gap_tolerance,
            deadline: options.time_limit.map(|limit| started + limit),
            node_limit: self.node_limit,
            aborted: &self.aborted,
            stop: None,
        };
        let root_ok = (0..model.rows.len()).all(|r| search.row_feasible(r));
        if root_ok {
            search.descend(0);
        }

        let nodes = search.nodes;
        let stop = search.stop;
        let incumbent = search.incumbent.take();
        let result = match (stop, incumbent) {
            (Some(Stop::Aborted), _) => SolveResult::error("solve aborted"),
            (Some(Stop::Limit), Some((values, value))) => {
                SolveResult::solved(SolveStatus::Feasible, Assignment::from_values(values), model.report(value))
            }
            (Some(Stop::Limit), None) => SolveResult::without_solution(SolveStatus::TimedOut),
            (None, Some((values, value))) => {
                SolveResult::solved(SolveStatus::Optimal, Assignment::from_values(values), model.report(value))
            }
            (None, None) => SolveResult::without_solution(SolveStatus::Infeasible),
        };
        tracing::debug!(
            "exhaustive search finished: {} after {nodes} nodes in {:?} (objective {:?})",
            result.status,
            started.elapsed(),
            result.objective
        );
        result
    }

    fn abort(&self) -> bool {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if *running == 0 {
            return false;
        }
        self.aborted.store(true, Ordering::Release);
        true
    }
}

struct Row {
    linear: Vec<(usize, f64)>,
    products: Vec<(usize, usize, f64)>,
    relation: Relation,
    rhs: f64,
}

/// Flattened program in minimization form.
struct Model {
    lower: Vec<f64>,
    upper: Vec<f64>,
    rows: Vec<Row>,
    rows_of: Vec<Vec<usize>>,
    objective: Row,
    constant: f64,
    maximize: bool,
}

impl Model {
    fn compile(program: &Program) -> Result<Self, String> {
        let maximize = program.sense() == Sense::Maximize;
        let sign = if maximize { -1.0 } else { 1.0 };

        let mut lower = Vec::with_capacity(program.variable_count());
        let mut upper = Vec::with_capacity(program.variable_count());
        for var in program.variables() {
            let (lo, hi) = (var.lower(), var.upper());
            if var.domain() == Domain::Continuous && lo < hi {
                return Err(format!(
                    "continuous variable '{}' is not supported by the exhaustive backend",
                    var.name()
                ));
            }
            if !lo.is_finite() || !hi.is_finite() {
                return Err(format!("variable '{}' has an unbounded domain", var.name()));
            }
            let (lo, hi) = if var.domain().is_integral() {
                (lo.ceil(), hi.floor())
            } else {
                (lo, hi)
            };
            if lo > hi {
                return Err(format!("variable '{}' has no integral value", var.name()));
            }
            lower.push(lo);
            upper.push(hi);
        }

        let flatten = |expr: &Expression, scale: f64| Row {
            linear: expr
                .linear()
                .terms()
                .map(|(v, c)| (v.index(), c * scale))
                .collect(),
            products: expr
                .products()
                .map(|(a, b, c)| (a.index(), b.index(), c * scale))
                .collect(),
            relation: Relation::LessEq,
            rhs: 0.0,
        };

        let mut rows = Vec::with_capacity(program.constraint_count());
        let mut rows_of = vec![Vec::new(); program.variable_count()];
        for constraint in program.constraints() {
            let mut row = flatten(constraint.expression(), 1.0);
            row.relation = constraint.relation();
            row.rhs = constraint.rhs();
            let index = rows.len();
            let touched = row
                .linear
                .iter()
                .map(|&(v, _)| v)
                .chain(row.products.iter().flat_map(|&(a, b, _)| [a, b]));
            for v in touched {
                if rows_of[v].last() != Some(&index) {
                    rows_of[v].push(index);
                }
            }
            rows.push(row);
        }

        let objective = flatten(program.objective(), sign);
        let constant = program.objective().linear().constant() * sign;
        Ok(Self {
            lower,
            upper,
            rows,
            rows_of,
            objective,
            constant,
            maximize,
        })
    }

    /// Objective value in the program's own sense.
    fn report(&self, internal: f64) -> f64 {
        if self.maximize { -internal } else { internal }
    }
}

fn product_range(c: f64, a: (f64, f64), b: (f64, f64), same: bool) -> (f64, f64) {
    let (lo, hi) = if same {
        let (l2, h2) = (a.0 * a.0, a.1 * a.1);
        if a.0 >= 0.0 {
            (l2, h2)
        } else if a.1 <= 0.0 {
            (h2, l2)
        } else {
            (0.0, l2.max(h2))
        }
    } else {
        let corners = [a.0 * b.0, a.0 * b.1, a.1 * b.0, a.1 * b.1];
        corners
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    };
    if c >= 0.0 { (c * lo, c * hi) } else { (c * hi, c * lo) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stop {
    Limit,
    Aborted,
}

struct Search<'a> {
    model: &'a Model,
    lo: Vec<f64>,
    hi: Vec<f64>,
    incumbent: Option<(Vec<f64>, f64)>,
    nodes: u64,
    gap: f64,
    deadline: Option<Instant>,
    node_limit: u64,
    aborted: &'a AtomicBool,
    stop: Option<Stop>,
}

impl Search<'_> {
    fn range(&self, row: &Row) -> (f64, f64) {
        let mut min = 0.0;
        let mut max = 0.0;
        for &(v, c) in &row.linear {
            let (a, b) = (c * self.lo[v], c * self.hi[v]);
            min += a.min(b);
            max += a.max(b);
        }
        for &(a, b, c) in &row.products {
            let (l, h) = product_range(c, (self.lo[a], self.hi[a]), (self.lo[b], self.hi[b]), a == b);
            min += l;
            max += h;
        }
        (min, max)
    }

    fn row_feasible(&self, index: usize) -> bool {
        let row = &self.model.rows[index];
        let (min, max) = self.range(row);
        match row.relation {
            Relation::LessEq => min <= row.rhs + FEASIBILITY_TOLERANCE,
            Relation::GreaterEq => max >= row.rhs - FEASIBILITY_TOLERANCE,
            Relation::Equal => {
                min <= row.rhs + FEASIBILITY_TOLERANCE && max >= row.rhs - FEASIBILITY_TOLERANCE
            }
        }
    }

    fn bound(&self) -> f64 {
        self.model.constant + self.range(&self.model.objective).0
    }

    fn prunes(&self, bound: f64) -> bool {
        self.incumbent.as_ref().is_some_and(|(_, best)| {
            bound >= best - self.gap * best.abs() - FEASIBILITY_TOLERANCE
        })
    }

    fn should_stop(&mut self) -> bool {
        if self.stop.is_some() {
            return true;
        }
        self.nodes += 1;
        if self.aborted.load(Ordering::Acquire) {
            self.stop = Some(Stop::Aborted);
        } else if self.nodes >= self.node_limit {
            self.stop = Some(Stop::Limit);
        } else if self.nodes.is_multiple_of(CHECK_INTERVAL)
            && self.deadline.is_some_and(|d| Instant::now() >= d)
        {
            self.stop = Some(Stop::Limit);
        }
        self.stop.is_some()
    }

    fn values(&self, var: usize) -> Vec<f64> {
        let (lo, hi) = (self.model.lower[var], self.model.upper[var]);
        let count = (hi - lo) as usize + 1;
        let ascending = self
            .model
            .objective
            .linear
            .iter()
            .find(|&&(v, _)| v == var)
            .is_some_and(|&(_, c)| c > 0.0);
        let mut values: Vec<f64> = (0..count).map(|k| lo + k as f64).collect();
        if !ascending {
            values.reverse();
        }
        values
    }

    fn descend(&mut self, var: usize) {
        if self.should_stop() {
            return;
        }
        if var == self.lo.len() {
            let value = self.bound();
            if !self.prunes(value) || self.incumbent.is_none() {
                tracing::trace!("exhaustive search: incumbent {value} at node {}", self.nodes);
                self.incumbent = Some((self.lo.clone(), value));
            }
            return;
        }

        for value in self.values(var) {
            self.lo[var] = value;
            self.hi[var] = value;
            let feasible = self.model.rows_of[var].iter().all(|&r| self.row_feasible(r));
            if feasible && !self.prunes(self.bound()) {
                self.descend(var + 1);
            }
            if self.stop.is_some() {
                break;
            }
        }
        self.lo[var] = self.model.lower[var];
        self.hi[var] = self.model.upper[var];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemip_program::{Constraint, LinearExpression, ProgramBuilder, QuadExpression};
    use rstest::rstest;

    fn knapsack(sense: Sense) -> Program {
        let mut b = ProgramBuilder::linear();
        let x = b.add_binary("x");
        let y = b.add_binary("y");
        let z = b.add_binary("z");
        b.add_constraint(Constraint::less_eq(x * 3.0 + y * 4.0 + z * 2.0, 6.0));
        b.set_objective(sense, x * 4.0 + y * 5.0 + z * 3.0);
        b.build().expect("valid program")
    }

    #[test]
    fn test_maximize_knapsack() {
        let r = ExhaustiveSolver::new().solve(&knapsack(Sense::Maximize), &SolveOptions::default());
        assert_eq!(r.status, SolveStatus::Optimal);
        assert_eq!(r.objective, Some(8.0));
        assert_eq!(r.assignment.expect("solved").values(), &[0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_minimize_prefers_zero() {
        let r = ExhaustiveSolver::new().solve(&knapsack(Sense::Minimize), &SolveOptions::default());
        assert_eq!(r.status, SolveStatus::Optimal);
        assert_eq!(r.objective, Some(0.0));
    }

    #[test]
    fn test_infeasible() {
        let mut b = ProgramBuilder::linear();
        let x = b.add_binary("x");
        let y = b.add_binary("y");
        b.add_constraint(Constraint::equal(x + y, 1.0));
        b.add_constraint(Constraint::greater_eq(x + y, 2.0));
        let p = b.build().expect("valid");
        let r = ExhaustiveSolver::new().solve(&p, &SolveOptions::default());
        assert_eq!(r.status, SolveStatus::Infeasible);
        assert!(r.assignment.is_none());
    }

    #[test]
    fn test_integer_and_quadratic_terms() {
        let mut b = ProgramBuilder::quadratic();
        let n = b.add_integer("n", -3.0, 3.0);
        let x = b.add_binary("x");
        let mut q = QuadExpression::new();
        q.add_product(n, n, 1.0);
        q.add_product(n, x, -4.0);
        q.add_term(x, 1.0);
        b.minimize(q);
        let p = b.build().expect("valid");
        let r = ExhaustiveSolver::new().solve(&p, &SolveOptions::default());
        // n^2 - 4nx + x is minimal at n = 2, x = 1: 4 - 8 + 1.
        assert_eq!(r.status, SolveStatus::Optimal);
        assert_eq!(r.objective, Some(-3.0));
        assert_eq!(r.assignment.expect("solved").values(), &[2.0, 1.0]);
    }

    #[rstest]
    #[case::continuous(Domain::Continuous, 0.0, 1.0)]
    #[case::unbounded(Domain::Integer, 0.0, f64::INFINITY)]
    fn test_unsupported_domains(#[case] domain: Domain, #[case] lower: f64, #[case] upper: f64) {
        let mut b = ProgramBuilder::linear();
        b.add_variable("v", domain, lower, upper);
        let p = b.build().expect("valid");
        let r = ExhaustiveSolver::new().solve(&p, &SolveOptions::default());
        assert_eq!(r.status, SolveStatus::Error);
        assert!(r.message.is_some());
    }

    #[test]
    fn test_fixed_continuous_is_accepted() {
        let mut b = ProgramBuilder::linear();
        let c = b.add_continuous("c", 2.5, 2.5);
        b.minimize(c * 2.0);
        let r = ExhaustiveSolver::new().solve(&b.build().expect("valid"), &SolveOptions::default());
        assert_eq!(r.objective, Some(5.0));
    }

    fn wide_program() -> Program {
        let mut b = ProgramBuilder::linear();
        let vars: Vec<_> = (0..24).map(|i| b.add_binary(format!("x{i}"))).collect();
        b.add_constraint(Constraint::equal(LinearExpression::sum(vars.iter().copied()), 12.0));
        b.minimize(
            vars.iter()
                .enumerate()
                .map(|(i, &v)| (v, (i % 5) as f64 - 2.0))
                .collect::<LinearExpression>(),
        );
        b.build().expect("valid")
    }

    #[test]
    fn test_node_limit_without_incumbent_times_out() {
        let r = ExhaustiveSolver::new()
            .with_node_limit(3)
            .solve(&wide_program(), &SolveOptions::default());
        assert_eq!(r.status, SolveStatus::TimedOut);
    }

    /// Greedy value order fixes `x = 1` first, which forces the costly `z`.
    fn misleading_program() -> Program {
        let mut b = ProgramBuilder::linear();
        let x = b.add_binary("x");
        let z = b.add_binary("z");
        b.add_constraint(Constraint::greater_eq(z - x, 0.0));
        b.minimize(z * 10.0 - x);
        b.build().expect("valid")
    }

    #[rstest]
    #[case::cut_short(4, SolveStatus::Feasible, 9.0)]
    #[case::proven(u64::MAX, SolveStatus::Optimal, 0.0)]
    fn test_node_limit_after_first_incumbent(
        #[case] node_limit: u64,
        #[case] status: SolveStatus,
        #[case] objective: f64,
    ) {
        let r = ExhaustiveSolver::new()
            .with_node_limit(node_limit)
            .solve(&misleading_program(), &SolveOptions::default());
        assert_eq!(r.status, status);
        assert_eq!(r.objective, Some(objective));
        assert!(r.assignment.is_some());
    }

    #[test]
    fn test_abort_without_running_solve_is_refused() {
        let solver = ExhaustiveSolver::new();
        assert!(!solver.abort());
        let r = solver.solve(&wide_program(), &SolveOptions::default());
        assert_eq!(r.status, SolveStatus::Optimal);
    }

    #[test]
    fn test_abort_stops_running_solve_only() {
        let solver = ExhaustiveSolver::new();
        {
            let _guard = solver.enter();
            assert!(solver.abort());
        }
        // the request died with the solve it targeted
        assert!(!solver.aborted.load(Ordering::Acquire));
        let r = solver.solve(&knapsack(Sense::Maximize), &SolveOptions::default());
        assert_eq!(r.status, SolveStatus::Optimal);
    }
}
