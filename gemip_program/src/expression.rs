//! Linear and quadratic expressions over [`VarId`]s.
//!
//! Expressions are values: every arithmetic operator produces a new
//! expression and never aliases another one. Terms whose coefficient cancels
//! to zero are dropped so that two equal sums compare equal.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::program::Assignment;
use crate::variable::VarId;

/// A weighted sum of variables plus a constant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpression {
    terms: BTreeMap<VarId, f64>,
    constant: f64,
}

impl LinearExpression {
    /// The empty expression `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The constant expression `c`.
    #[must_use]
    pub fn from_constant(c: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: c,
        }
    }

    /// `coefficient * var`.
    #[must_use]
    pub fn term(var: VarId, coefficient: f64) -> Self {
        let mut expr = Self::new();
        expr.add_term(var, coefficient);
        expr
    }

    /// The plain sum of `vars`.
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        vars.into_iter().map(|v| (v, 1.0)).collect()
    }

    /// Adds `coefficient * var`, merging with an existing term.
    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        if coefficient == 0.0 {
            return;
        }
        let slot = self.terms.entry(var).or_insert(0.0);
        *slot += coefficient;
        if *slot == 0.0 {
            self.terms.remove(&var);
        }
    }

    /// Adds to the constant part.
    pub fn add_constant(&mut self, c: f64) {
        self.constant += c;
    }

    /// Constant part.
    #[must_use]
    pub const fn constant(&self) -> f64 {
        self.constant
    }

    /// Coefficient of `var`, zero when absent.
    #[must_use]
    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    /// Non-zero terms in variable order.
    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(&v, &c)| (v, c))
    }

    /// Number of non-zero terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether there is no variable term.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Referenced variables.
    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.keys().copied()
    }

    /// Value of the expression under `assignment`.
    #[must_use]
    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(&v, &c)| c * assignment.value(v))
                .sum::<f64>()
    }

    /// A copy multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        if factor == 0.0 {
            return Self::new();
        }
        Self {
            terms: self.terms.iter().map(|(&v, &c)| (v, c * factor)).collect(),
            constant: self.constant * factor,
        }
    }
}

impl FromIterator<(VarId, f64)> for LinearExpression {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        let mut expr = Self::new();
        for (v, c) in iter {
            expr.add_term(v, c);
        }
        expr
    }
}

impl From<VarId> for LinearExpression {
    fn from(var: VarId) -> Self {
        Self::term(var, 1.0)
    }
}

impl From<f64> for LinearExpression {
    fn from(c: f64) -> Self {
        Self::from_constant(c)
    }
}

impl AddAssign for LinearExpression {
    fn add_assign(&mut self, rhs: Self) {
        for (v, c) in rhs.terms {
            self.add_term(v, c);
        }
        self.constant += rhs.constant;
    }
}

impl SubAssign for LinearExpression {
    fn sub_assign(&mut self, rhs: Self) {
        *self += -rhs;
    }
}

impl AddAssign<VarId> for LinearExpression {
    fn add_assign(&mut self, rhs: VarId) {
        self.add_term(rhs, 1.0);
    }
}

impl Neg for LinearExpression {
    type Output = Self;

    fn neg(self) -> Self {
        self.scaled(-1.0)
    }
}

impl<T: Into<Self>> Add<T> for LinearExpression {
    type Output = Self;

    fn add(mut self, rhs: T) -> Self {
        let rhs: Self = rhs.into();
        self += rhs;
        self
    }
}

impl<T: Into<Self>> Sub<T> for LinearExpression {
    type Output = Self;

    fn sub(mut self, rhs: T) -> Self {
        let rhs: Self = rhs.into();
        self -= rhs;
        self
    }
}

impl Mul<f64> for LinearExpression {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scaled(rhs)
    }
}

impl<T: Into<LinearExpression>> Add<T> for VarId {
    type Output = LinearExpression;

    fn add(self, rhs: T) -> LinearExpression {
        LinearExpression::from(self) + rhs
    }
}

impl<T: Into<LinearExpression>> Sub<T> for VarId {
    type Output = LinearExpression;

    fn sub(self, rhs: T) -> LinearExpression {
        LinearExpression::from(self) - rhs
    }
}

impl Mul<f64> for VarId {
    type Output = LinearExpression;

    fn mul(self, rhs: f64) -> LinearExpression {
        LinearExpression::term(self, rhs)
    }
}

impl Mul<VarId> for f64 {
    type Output = LinearExpression;

    fn mul(self, rhs: VarId) -> LinearExpression {
        LinearExpression::term(rhs, self)
    }
}

impl Neg for VarId {
    type Output = LinearExpression;

    fn neg(self) -> LinearExpression {
        LinearExpression::term(self, -1.0)
    }
}

/// A linear expression plus pairwise product terms.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuadExpression {
    linear: LinearExpression,
    products: BTreeMap<(VarId, VarId), f64>,
}

fn ordered(a: VarId, b: VarId) -> (VarId, VarId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl QuadExpression {
    /// The empty expression `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coefficient * a * b`; `a * b` and `b * a` are the same term.
    pub fn add_product(&mut self, a: VarId, b: VarId, coefficient: f64) {
        if coefficient == 0.0 {
            return;
        }
        let key = ordered(a, b);
        let slot = self.products.entry(key).or_insert(0.0);
        *slot += coefficient;
        if *slot == 0.0 {
            self.products.remove(&key);
        }
    }

    /// Adds `coefficient * var` to the linear part.
    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        self.linear.add_term(var, coefficient);
    }

    /// Adds to the constant part.
    pub fn add_constant(&mut self, c: f64) {
        self.linear.add_constant(c);
    }

    /// Linear part including the constant.
    #[must_use]
    pub const fn linear(&self) -> &LinearExpression {
        &self.linear
    }

    /// Product terms `(a, b, coefficient)` with `a <= b`.
    pub fn products(&self) -> impl Iterator<Item = (VarId, VarId, f64)> + '_ {
        self.products.iter().map(|(&(a, b), &c)| (a, b, c))
    }

    /// Whether no product term is present.
    #[must_use]
    pub fn is_linear(&self) -> bool {
        self.products.is_empty()
    }

    /// Referenced variables, possibly repeated.
    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.linear
            .variables()
            .chain(self.products.keys().flat_map(|&(a, b)| [a, b]))
    }

    /// Value of the expression under `assignment`.
    #[must_use]
    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        self.linear.evaluate(assignment)
            + self
                .products
                .iter()
                .map(|(&(a, b), &c)| c * assignment.value(a) * assignment.value(b))
                .sum::<f64>()
    }

    /// A copy multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        if factor == 0.0 {
            return Self::new();
        }
        Self {
            linear: self.linear.scaled(factor),
            products: self
                .products
                .iter()
                .map(|(&k, &c)| (k, c * factor))
                .collect(),
        }
    }
}

impl From<LinearExpression> for QuadExpression {
    fn from(linear: LinearExpression) -> Self {
        Self {
            linear,
            products: BTreeMap::new(),
        }
    }
}

impl AddAssign for QuadExpression {
    fn add_assign(&mut self, rhs: Self) {
        self.linear += rhs.linear;
        for ((a, b), c) in rhs.products {
            self.add_product(a, b, c);
        }
    }
}

impl AddAssign<LinearExpression> for QuadExpression {
    fn add_assign(&mut self, rhs: LinearExpression) {
        self.linear += rhs;
    }
}

impl Neg for QuadExpression {
    type Output = Self;

    fn neg(self) -> Self {
        self.scaled(-1.0)
    }
}

impl<T: Into<Self>> Add<T> for QuadExpression {
    type Output = Self;

    fn add(mut self, rhs: T) -> Self {
        let rhs: Self = rhs.into();
        self += rhs;
        self
    }
}

impl<T: Into<Self>> Sub<T> for QuadExpression {
    type Output = Self;

    fn sub(mut self, rhs: T) -> Self {
        let rhs: Self = rhs.into();
        self += -rhs;
        self
    }
}

impl Mul<f64> for QuadExpression {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scaled(rhs)
    }
}

/// Either kind of expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// Degree at most one.
    Linear(LinearExpression),
    /// May hold product terms.
    Quadratic(QuadExpression),
}

impl Default for Expression {
    fn default() -> Self {
        Self::Linear(LinearExpression::new())
    }
}

impl Expression {
    /// Whether a product term is present.
    #[must_use]
    pub fn has_products(&self) -> bool {
        match self {
            Self::Linear(_) => false,
            Self::Quadratic(q) => !q.is_linear(),
        }
    }

    /// Linear part including the constant.
    #[must_use]
    pub const fn linear(&self) -> &LinearExpression {
        match self {
            Self::Linear(l) => l,
            Self::Quadratic(q) => q.linear(),
        }
    }

    /// Product terms, empty for linear expressions.
    pub fn products(&self) -> Box<dyn Iterator<Item = (VarId, VarId, f64)> + '_> {
        match self {
            Self::Linear(_) => Box::new(std::iter::empty()),
            Self::Quadratic(q) => Box::new(q.products()),
        }
    }

    /// Referenced variables, possibly repeated.
    pub fn variables(&self) -> Box<dyn Iterator<Item = VarId> + '_> {
        match self {
            Self::Linear(l) => Box::new(l.variables()),
            Self::Quadratic(q) => Box::new(q.variables()),
        }
    }

    /// Value of the expression under `assignment`.
    #[must_use]
    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        match self {
            Self::Linear(l) => l.evaluate(assignment),
            Self::Quadratic(q) => q.evaluate(assignment),
        }
    }
}

impl From<LinearExpression> for Expression {
    fn from(l: LinearExpression) -> Self {
        Self::Linear(l)
    }
}

impl From<QuadExpression> for Expression {
    fn from(q: QuadExpression) -> Self {
        Self::Quadratic(q)
    }
}

impl From<VarId> for Expression {
    fn from(v: VarId) -> Self {
        Self::Linear(v.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn var(index: u32) -> VarId {
        VarId { scope: 0, index }
    }

    #[test]
    fn test_operators_build_new_expressions() {
        let x = var(0);
        let y = var(1);
        let e = x + y * 2.0 - 1.0;
        assert_eq!(e.coefficient(x), 1.0);
        assert_eq!(e.coefficient(y), 2.0);
        assert_eq!(e.constant(), -1.0);

        let f = -e.clone() + x;
        assert_eq!(f.coefficient(x), 0.0);
        assert_eq!(f.len(), 1);
        assert_eq!(e.len(), 2);
    }

    #[test]
    fn test_cancelled_terms_are_dropped() {
        let x = var(0);
        let e = (x + x) - 2.0 * x;
        assert!(e.is_empty());
        assert_eq!(e, LinearExpression::new());
    }

    #[test]
    fn test_products_are_unordered() {
        let mut q = QuadExpression::new();
        q.add_product(var(3), var(1), 2.0);
        q.add_product(var(1), var(3), 1.0);
        assert_eq!(q.products().collect::<Vec<_>>(), vec![(var(1), var(3), 3.0)]);
        q.add_product(var(3), var(1), -3.0);
        assert!(q.is_linear());
    }

    #[test]
    fn test_evaluate() {
        let a = Assignment::from_values(vec![1.0, 0.5, 2.0]);
        let mut q = QuadExpression::from(var(0) + var(2) * 3.0 + 1.0);
        q.add_product(var(1), var(2), 4.0);
        assert!((q.evaluate(&a) - (1.0 + 6.0 + 1.0 + 4.0)).abs() < 1e-12);
        assert!(Expression::from(q).has_products());
    }
}
