use thiserror::Error;

use crate::constraint::Relation;
use crate::variable::VarId;

/// A malformed program, detected when it is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// An expression references a variable that the program does not declare.
    #[error("{context} references undeclared variable {variable}")]
    UndeclaredVariable {
        /// Where the reference occurs.
        context: String,
        /// The foreign or out-of-range id.
        variable: VarId,
    },

    /// A product term appears in a linear program.
    #[error("{context} has quadratic terms but the program is linear")]
    DegreeMismatch {
        /// Where the product occurs.
        context: String,
    },

    /// Two variables share a name.
    #[error("Duplicate variable name '{0}'")]
    DuplicateVariable(String),

    /// A variable's bounds are empty or not numbers.
    #[error("Variable '{name}' has invalid bounds [{lower}, {upper}]")]
    InvalidBounds {
        /// Variable name.
        name: String,
        /// Declared lower bound.
        lower: f64,
        /// Declared upper bound.
        upper: f64,
    },

    /// A coefficient, constant or bound is NaN or infinite where it must be finite.
    #[error("{context} holds a non-finite number")]
    NonFinite {
        /// Where the value occurs.
        context: String,
    },
}

impl ValidationError {
    pub(crate) fn undeclared(context: impl Into<String>, variable: VarId) -> Self {
        Self::UndeclaredVariable {
            context: context.into(),
            variable,
        }
    }

    pub(crate) fn degree(context: impl Into<String>) -> Self {
        Self::DegreeMismatch {
            context: context.into(),
        }
    }

    pub(crate) fn non_finite(context: impl Into<String>) -> Self {
        Self::NonFinite {
            context: context.into(),
        }
    }
}

/// The first requirement an assignment fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    /// The assignment does not hold one value per variable.
    #[error("Assignment has {found} values, program declares {expected} variables")]
    Length {
        /// Declared variables.
        expected: usize,
        /// Provided values.
        found: usize,
    },

    /// A value is outside its variable's bounds or domain.
    #[error("Variable '{name}' = {value} is outside its bounds or domain")]
    Variable {
        /// Variable name.
        name: String,
        /// Offending value.
        value: f64,
    },

    /// A constraint does not hold.
    #[error("Constraint {index} ({lhs} {relation} {rhs}) is violated")]
    Constraint {
        /// Position of the constraint.
        index: usize,
        /// Evaluated left-hand side.
        lhs: f64,
        /// Constraint relation.
        relation: Relation,
        /// Right-hand side.
        rhs: f64,
    },
}
