use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expression::{Expression, LinearExpression, QuadExpression};
use crate::program::{Assignment, Degree};

/// Relation between a constraint's expression and its right-hand side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// `expr <= rhs`
    LessEq,
    /// `expr = rhs`
    Equal,
    /// `expr >= rhs`
    GreaterEq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LessEq => "<=",
            Self::Equal => "=",
            Self::GreaterEq => ">=",
        })
    }
}

/// An expression related to a bound.
///
/// Linear constraints are built with [`Constraint::linear`] and its
/// shorthands, quadratic ones with [`Constraint::quadratic`]. The constant
/// part of the expression is kept in the expression; [`Constraint::rhs`]
/// reports the effective bound with that constant moved across.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    name: Option<String>,
    expression: Expression,
    relation: Relation,
    rhs: f64,
}

impl Constraint {
    /// `expr (relation) rhs` over a linear expression.
    pub fn linear(expr: impl Into<LinearExpression>, relation: Relation, rhs: f64) -> Self {
        Self {
            name: None,
            expression: Expression::Linear(expr.into()),
            relation,
            rhs,
        }
    }

    /// `expr (relation) rhs` over a quadratic expression.
    #[must_use]
    pub fn quadratic(expr: QuadExpression, relation: Relation, rhs: f64) -> Self {
        Self {
            name: None,
            expression: Expression::Quadratic(expr),
            relation,
            rhs,
        }
    }

    /// `expr <= rhs`.
    pub fn less_eq(expr: impl Into<LinearExpression>, rhs: f64) -> Self {
        Self::linear(expr, Relation::LessEq, rhs)
    }

    /// `expr = rhs`.
    pub fn equal(expr: impl Into<LinearExpression>, rhs: f64) -> Self {
        Self::linear(expr, Relation::Equal, rhs)
    }

    /// `expr >= rhs`.
    pub fn greater_eq(expr: impl Into<LinearExpression>, rhs: f64) -> Self {
        Self::linear(expr, Relation::GreaterEq, rhs)
    }

    /// Attaches a row name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Row name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Left-hand side, constant included.
    #[must_use]
    pub const fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Relation to the bound.
    #[must_use]
    pub const fn relation(&self) -> Relation {
        self.relation
    }

    /// Bound with the expression's constant moved to the right-hand side.
    #[must_use]
    pub fn rhs(&self) -> f64 {
        self.rhs - self.expression.linear().constant()
    }

    pub(crate) const fn bound(&self) -> f64 {
        self.rhs
    }

    /// Lowest degree able to express this constraint.
    #[must_use]
    pub fn degree(&self) -> Degree {
        if self.expression.has_products() {
            Degree::Quadratic
        } else {
            Degree::Linear
        }
    }

    /// How far `assignment` is from satisfying the constraint; zero when it does.
    #[must_use]
    pub fn violation(&self, assignment: &Assignment) -> f64 {
        let lhs = self.expression.evaluate(assignment);
        match self.relation {
            Relation::LessEq => (lhs - self.rhs).max(0.0),
            Relation::GreaterEq => (self.rhs - lhs).max(0.0),
            Relation::Equal => (lhs - self.rhs).abs(),
        }
    }

    /// Whether `assignment` satisfies the constraint up to `tolerance`.
    #[must_use]
    pub fn is_satisfied(&self, assignment: &Assignment, tolerance: f64) -> bool {
        self.violation(assignment) <= tolerance
    }
}
