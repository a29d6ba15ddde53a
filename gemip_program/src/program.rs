use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use contracts::*;
use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::error::{ValidationError, Violation};
use crate::expression::Expression;
use crate::variable::{Domain, VarId, Variable};

static NEXT_SCOPE: AtomicU32 = AtomicU32::new(1);

/// Optimization direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sense {
    /// Smaller objective values are better.
    Minimize,
    /// Larger objective values are better.
    Maximize,
}

/// Declared degree of a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Degree {
    /// Objective and constraints hold no product terms.
    Linear,
    /// Product terms are allowed anywhere.
    Quadratic,
}

/// One value per declared variable, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    values: Vec<f64>,
}

impl Assignment {
    /// Wraps a dense value vector.
    #[must_use]
    pub const fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Value of `var`; zero for ids beyond the vector.
    #[must_use]
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }

    /// Value of `var`, if present.
    #[must_use]
    pub fn get(&self, var: VarId) -> Option<f64> {
        self.values.get(var.index()).copied()
    }

    /// All values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Collects variables, constraints and an objective, then validates them
/// into a closed [`Program`].
#[derive(Debug)]
pub struct ProgramBuilder {
    scope: u32,
    degree: Degree,
    sense: Sense,
    objective: Expression,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
}

impl ProgramBuilder {
    /// An empty program of the given degree, minimizing zero.
    #[must_use]
    pub fn new(degree: Degree) -> Self {
        Self {
            scope: NEXT_SCOPE.fetch_add(1, Ordering::Relaxed),
            degree,
            sense: Sense::Minimize,
            objective: Expression::default(),
            variables: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Shorthand for a linear program.
    #[must_use]
    pub fn linear() -> Self {
        Self::new(Degree::Linear)
    }

    /// Shorthand for a quadratic program.
    #[must_use]
    pub fn quadratic() -> Self {
        Self::new(Degree::Quadratic)
    }

    /// Declares a variable. Name uniqueness is checked by [`ProgramBuilder::build`].
    #[ensures(ret.index() + 1 == self.variables.len())]
    pub fn add_variable(&mut self, name: impl Into<String>, domain: Domain, lower: f64, upper: f64) -> VarId {
        let id = VarId {
            scope: self.scope,
            index: self.variables.len() as u32,
        };
        self.variables.push(Variable::new(name.into(), domain, lower, upper));
        id
    }

    /// Declares a `{0, 1}` variable.
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_variable(name, Domain::Binary, 0.0, 1.0)
    }

    /// Declares an integer variable within `[lower, upper]`.
    pub fn add_integer(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_variable(name, Domain::Integer, lower, upper)
    }

    /// Declares a continuous variable within `[lower, upper]`.
    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_variable(name, Domain::Continuous, lower, upper)
    }

    fn owns(&self, var: VarId) -> bool {
        var.scope == self.scope && var.index() < self.variables.len()
    }

    /// A declared variable.
    #[must_use]
    pub fn variable(&self, var: VarId) -> Option<&Variable> {
        if self.owns(var) {
            self.variables.get(var.index())
        } else {
            None
        }
    }

    /// Mutable access for bound or domain changes before building.
    pub fn variable_mut(&mut self, var: VarId) -> Option<&mut Variable> {
        if self.owns(var) {
            self.variables.get_mut(var.index())
        } else {
            None
        }
    }

    /// Appends a constraint and returns its position.
    pub fn add_constraint(&mut self, constraint: Constraint) -> usize {
        self.constraints.push(constraint);
        self.constraints.len() - 1
    }

    /// Sets direction and objective.
    pub fn set_objective(&mut self, sense: Sense, objective: impl Into<Expression>) {
        self.sense = sense;
        self.objective = objective.into();
    }

    /// Minimizes `objective`.
    pub fn minimize(&mut self, objective: impl Into<Expression>) {
        self.set_objective(Sense::Minimize, objective);
    }

    /// Maximizes `objective`.
    pub fn maximize(&mut self, objective: impl Into<Expression>) {
        self.set_objective(Sense::Maximize, objective);
    }

    /// Number of declared variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of constraints added so far.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Validates and closes the program.
    ///
    /// # Errors
    /// Any [`ValidationError`]: undeclared or foreign variables, product terms
    /// in a linear program, duplicate names, empty bounds, non-finite numbers.
    pub fn build(self) -> Result<Program, ValidationError> {
        let mut names = HashMap::with_capacity(self.variables.len());
        for (index, var) in self.variables.iter().enumerate() {
            if names.insert(var.name().to_string(), index).is_some() {
                return Err(ValidationError::DuplicateVariable(var.name().to_string()));
            }
            let (lower, upper) = (var.lower(), var.upper());
            let empty = lower.is_nan()
                || upper.is_nan()
                || lower > upper
                || lower == f64::INFINITY
                || upper == f64::NEG_INFINITY;
            if empty {
                return Err(ValidationError::InvalidBounds {
                    name: var.name().to_string(),
                    lower,
                    upper,
                });
            }
        }

        let program = Program {
            scope: self.scope,
            degree: self.degree,
            sense: self.sense,
            objective: self.objective,
            variables: self.variables,
            constraints: self.constraints,
            names,
        };
        program.check_expression("objective", &program.objective)?;
        for index in 0..program.constraints.len() {
            program.check_constraint(index)?;
        }

        tracing::debug!(
            "built {:?} program: {} variables, {} constraints",
            program.degree,
            program.variables.len(),
            program.constraints.len()
        );
        Ok(program)
    }
}

/// A closed, validated optimization problem.
///
/// Every variable referenced by the objective or a constraint is declared, and
/// a linear program holds no product terms.
#[derive(Clone, Debug)]
pub struct Program {
    scope: u32,
    degree: Degree,
    sense: Sense,
    objective: Expression,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    names: HashMap<String, usize>,
}

impl Program {
    fn check_expression(&self, context: &str, expr: &Expression) -> Result<(), ValidationError> {
        if self.degree == Degree::Linear && expr.has_products() {
            return Err(ValidationError::degree(context));
        }
        if !expr.linear().constant().is_finite() {
            return Err(ValidationError::non_finite(context));
        }
        for (v, c) in expr.linear().terms() {
            if !self.declares(v) {
                return Err(ValidationError::undeclared(context, v));
            }
            if !c.is_finite() {
                return Err(ValidationError::non_finite(context));
            }
        }
        for (a, b, c) in expr.products() {
            for v in [a, b] {
                if !self.declares(v) {
                    return Err(ValidationError::undeclared(context, v));
                }
            }
            if !c.is_finite() {
                return Err(ValidationError::non_finite(context));
            }
        }
        Ok(())
    }

    fn check_constraint(&self, index: usize) -> Result<(), ValidationError> {
        let Some(constraint) = self.constraints.get(index) else {
            return Ok(());
        };
        let context = match constraint.name() {
            Some(name) => format!("constraint {index} '{name}'"),
            None => format!("constraint {index}"),
        };
        if !constraint.bound().is_finite() {
            return Err(ValidationError::non_finite(context));
        }
        self.check_expression(&context, constraint.expression())
    }

    /// Whether `var` was declared by this program's builder.
    #[must_use]
    pub fn declares(&self, var: VarId) -> bool {
        var.scope == self.scope && var.index() < self.variables.len()
    }

    /// Declared degree.
    #[must_use]
    pub const fn degree(&self) -> Degree {
        self.degree
    }

    /// Optimization direction.
    #[must_use]
    pub const fn sense(&self) -> Sense {
        self.sense
    }

    /// Objective expression.
    #[must_use]
    pub const fn objective(&self) -> &Expression {
        &self.objective
    }

    /// Declared variables in declaration order.
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Constraints in insertion order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// The variable behind `var`.
    #[must_use]
    pub fn variable(&self, var: VarId) -> Option<&Variable> {
        if self.declares(var) {
            self.variables.get(var.index())
        } else {
            None
        }
    }

    /// Id of the variable called `name`.
    #[must_use]
    pub fn variable_id(&self, name: &str) -> Option<VarId> {
        self.names.get(name).map(|&index| VarId {
            scope: self.scope,
            index: index as u32,
        })
    }

    /// Ids of every declared variable.
    pub fn variable_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        (0..self.variables.len() as u32).map(|index| VarId {
            scope: self.scope,
            index,
        })
    }

    /// Number of declared variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of constraints.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Objective value under `assignment`.
    #[must_use]
    pub fn objective_value(&self, assignment: &Assignment) -> f64 {
        self.objective.evaluate(assignment)
    }

    /// A copy extended by one more constraint, validated like the rest.
    ///
    /// # Errors
    /// The [`ValidationError`] the constraint would trigger at build time.
    #[ensures(ret.is_err() || ret.as_ref().is_ok_and(|p| p.constraints.len() == self.constraints.len() + 1))]
    pub fn with_constraint(&self, constraint: Constraint) -> Result<Self, ValidationError> {
        let mut program = self.clone();
        program.constraints.push(constraint);
        program.check_constraint(program.constraints.len() - 1)?;
        Ok(program)
    }

    /// Checks bounds, domains and every constraint against `assignment`.
    ///
    /// # Errors
    /// The first [`Violation`] found.
    pub fn check_feasible(&self, assignment: &Assignment, tolerance: f64) -> Result<(), Violation> {
        if assignment.len() != self.variables.len() {
            return Err(Violation::Length {
                expected: self.variables.len(),
                found: assignment.len(),
            });
        }
        for (var, &value) in self.variables.iter().zip(assignment.values()) {
            if !var.admits(value, tolerance) {
                return Err(Violation::Variable {
                    name: var.name().to_string(),
                    value,
                });
            }
        }
        for (index, constraint) in self.constraints.iter().enumerate() {
            if !constraint.is_satisfied(assignment, tolerance) {
                return Err(Violation::Constraint {
                    index,
                    lhs: constraint.expression().evaluate(assignment),
                    relation: constraint.relation(),
                    rhs: constraint.bound(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{LinearExpression, QuadExpression};
    use crate::Relation;

    #[test]
    fn test_build_accepts_declared_variables() {
        let mut b = ProgramBuilder::linear();
        let x = b.add_binary("x");
        let y = b.add_binary("y");
        b.add_constraint(Constraint::less_eq(x + y, 1.0));
        b.minimize(x * 2.0 + y);
        let p = b.build().expect("valid program");
        assert_eq!(p.variable_count(), 2);
        assert_eq!(p.variable_id("y"), Some(y));
        assert!(p.declares(x));
    }

    #[test]
    fn test_foreign_variable_is_undeclared() {
        let mut other = ProgramBuilder::linear();
        let foreign = other.add_binary("x");
        let mut b = ProgramBuilder::linear();
        b.add_binary("x");
        b.add_constraint(Constraint::less_eq(foreign, 1.0));
        assert!(matches!(
            b.build(),
            Err(ValidationError::UndeclaredVariable { variable, .. }) if variable == foreign
        ));
    }

    #[test]
    fn test_linear_program_rejects_products() {
        let mut b = ProgramBuilder::linear();
        let x = b.add_binary("x");
        let y = b.add_binary("y");
        let mut q = QuadExpression::new();
        q.add_product(x, y, 1.0);
        b.minimize(q);
        assert!(matches!(b.build(), Err(ValidationError::DegreeMismatch { .. })));
    }

    #[test]
    fn test_quadratic_program_accepts_linear_rows() {
        let mut b = ProgramBuilder::quadratic();
        let x = b.add_binary("x");
        let y = b.add_binary("y");
        let mut q = QuadExpression::new();
        q.add_product(x, y, 3.0);
        b.add_constraint(Constraint::quadratic(q.clone(), Relation::LessEq, 2.0));
        b.add_constraint(Constraint::equal(x + y, 1.0));
        b.minimize(q);
        assert!(b.build().is_ok());
    }

    #[test]
    fn test_duplicate_names() {
        let mut b = ProgramBuilder::linear();
        b.add_binary("x");
        b.add_binary("x");
        assert_eq!(b.build().err(), Some(ValidationError::DuplicateVariable("x".into())));
    }

    #[test]
    fn test_invalid_bounds() {
        let mut b = ProgramBuilder::linear();
        b.add_integer("n", 3.0, 1.0);
        assert!(matches!(b.build(), Err(ValidationError::InvalidBounds { .. })));
    }

    #[test]
    fn test_variable_mut_before_build() {
        let mut b = ProgramBuilder::linear();
        let x = b.add_binary("x");
        b.variable_mut(x).expect("declared").deactivate();
        let p = b.build().expect("valid");
        assert!(!p.variable(x).expect("declared").is_active());
    }

    #[test]
    fn test_with_constraint_keeps_original() {
        let mut b = ProgramBuilder::linear();
        let x = b.add_binary("x");
        let p = b.build().expect("valid");
        let q = p
            .with_constraint(Constraint::less_eq(LinearExpression::from(x), 0.0))
            .expect("declared variable");
        assert_eq!(p.constraint_count(), 0);
        assert_eq!(q.constraint_count(), 1);

        let mut other = ProgramBuilder::linear();
        let y = other.add_binary("y");
        assert!(p.with_constraint(Constraint::less_eq(y, 0.0)).is_err());
    }

    #[test]
    fn test_check_feasible() {
        let mut b = ProgramBuilder::linear();
        let x = b.add_binary("x");
        let y = b.add_binary("y");
        b.add_constraint(Constraint::equal(x + y, 1.0));
        let p = b.build().expect("valid");
        assert!(p.check_feasible(&Assignment::from_values(vec![1.0, 0.0]), 1e-9).is_ok());
        assert!(matches!(
            p.check_feasible(&Assignment::from_values(vec![1.0, 1.0]), 1e-9),
            Err(Violation::Constraint { index: 0, .. })
        ));
        assert!(matches!(
            p.check_feasible(&Assignment::from_values(vec![0.5, 0.5]), 1e-9),
            Err(Violation::Variable { .. })
        ));
        assert!(matches!(
            p.check_feasible(&Assignment::from_values(vec![1.0]), 1e-9),
            Err(Violation::Length { .. })
        ));
    }
}
