use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to a variable declared in one [`ProgramBuilder`](crate::ProgramBuilder).
///
/// The scope ties the id to its builder; an id used in a different program is
/// reported as undeclared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId {
    pub(crate) scope: u32,
    pub(crate) index: u32,
}

impl VarId {
    /// Position of the variable in its program's declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.scope, self.index)
    }
}

/// Value domain of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    /// Any real value within bounds.
    Continuous,
    /// Integral values within bounds.
    Integer,
    /// `0` or `1`.
    Binary,
}

impl Domain {
    /// Whether values must be integral.
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::Integer | Self::Binary)
    }
}

/// A decision variable: name, domain and bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    domain: Domain,
    lower: f64,
    upper: f64,
}

impl Variable {
    pub(crate) fn new(name: String, domain: Domain, lower: f64, upper: f64) -> Self {
        Self {
            name,
            domain,
            lower,
            upper,
        }
    }

    /// Unique name within the program.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value domain.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    /// Lower bound.
    #[must_use]
    pub const fn lower(&self) -> f64 {
        self.lower
    }

    /// Upper bound.
    #[must_use]
    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// Replaces both bounds.
    pub const fn set_bounds(&mut self, lower: f64, upper: f64) {
        self.lower = lower;
        self.upper = upper;
    }

    /// Changes the domain; switching to binary clamps the bounds to `[0, 1]`.
    pub fn set_domain(&mut self, domain: Domain) {
        self.domain = domain;
        if let Domain::Binary = domain {
            self.lower = self.lower.max(0.0);
            self.upper = self.upper.min(1.0);
        }
    }

    /// Fixes the variable to its lower bound.
    pub const fn deactivate(&mut self) {
        self.upper = self.lower;
    }

    /// Whether the variable can take more than one value.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.upper > self.lower
    }

    /// Whether `value` lies within the bounds and the domain, up to `tolerance`.
    #[must_use]
    pub fn admits(&self, value: f64, tolerance: f64) -> bool {
        if value < self.lower - tolerance || value > self.upper + tolerance {
            return false;
        }
        !self.domain.is_integral() || (value - value.round()).abs() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deactivate_fixes_to_lower_bound() {
        let mut v = Variable::new("x".into(), Domain::Binary, 0.0, 1.0);
        assert!(v.is_active());
        v.deactivate();
        assert!(!v.is_active());
        assert!(v.admits(0.0, 1e-9));
        assert!(!v.admits(1.0, 1e-9));
    }

    #[test]
    fn test_binary_domain_clamps() {
        let mut v = Variable::new("z".into(), Domain::Integer, -3.0, 7.0);
        assert!(v.admits(-2.0, 0.0));
        assert!(!v.admits(1.5, 1e-6));
        v.set_domain(Domain::Binary);
        assert_eq!((v.lower(), v.upper()), (0.0, 1.0));
    }
}
