//! Generic mathematical-program model.
//!
//! A [`ProgramBuilder`] collects [`Variable`]s, [`Constraint`]s and an
//! objective [`Expression`], and [`ProgramBuilder::build`] validates them into
//! a closed [`Program`]. Validation is eager: an undeclared variable or a
//! product term in a linear program fails the build instead of surfacing later
//! as an odd solver status.

mod constraint;
mod error;
mod expression;
mod lp;
mod program;
mod variable;

pub use crate::constraint::{Constraint, Relation};
pub use crate::error::{ValidationError, Violation};
pub use crate::expression::{Expression, LinearExpression, QuadExpression};
pub use crate::program::{Assignment, Degree, Program, ProgramBuilder, Sense};
pub use crate::variable::{Domain, VarId, Variable};
