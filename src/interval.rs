//! Closed real intervals.
//!
//! An [`Interval`] `[min, max]` is the basic uncertainty carrier of the crate: flow dynamics
//! carry an optional additive interval (see [`ExpressionInterval`][crate::expr_interval::ExpressionInterval]),
//! range estimators return one interval per time window, and the continuization engine
//! bloats and multiplies them.
//!
//! Arithmetic follows the usual interval semantics: the result of `a ∘ b` covers `x ∘ y`
//! for every `x ∈ a` and `y ∈ b`. For `*` and `/` all four corner combinations are
//! considered, since the operands may change sign inside the interval.
//!
//! # Equality
//!
//! `==` is strict structural equality of the endpoints. Tolerance-based comparison is
//! available through [`Interval::approx_eq`], with the tolerance supplied by the caller
//! (usually [`Context::tolerance`][crate::context::Context::tolerance]).
//!
//! ```
//! use hybrid_rs::interval::Interval;
//!
//! let a = Interval::new(-1.0, 2.0);
//! let b = Interval::new(3.0, 4.0);
//! assert_eq!(a * b, Interval::new(-4.0, 8.0));
//! assert!((a + b).approx_eq(&Interval::new(2.0, 6.0), 1e-12));
//! ```

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A closed interval `[min, max]` of reals.
///
/// # Invariants
///
/// - `min <= max`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

// Constructors
impl Interval {
    /// Creates the interval `[min, max]`.
    ///
    /// # Panics
    ///
    /// Panics if `min > max` (or either bound is NaN). Endpoints are never swapped.
    pub fn new(min: f64, max: f64) -> Self {
        assert!(min <= max, "Interval bounds must satisfy min <= max, got [{}, {}]", min, max);
        Interval { min, max }
    }

    /// Creates the interval `[min, max]`, or `None` when `min > max`.
    pub fn try_new(min: f64, max: f64) -> Option<Self> {
        if min <= max {
            Some(Interval { min, max })
        } else {
            None
        }
    }

    /// The degenerate interval `[value, value]`.
    pub fn point(value: f64) -> Self {
        Interval::new(value, value)
    }

    /// The exact zero `[0, 0]`.
    pub fn zero() -> Self {
        Interval::point(0.0)
    }

    /// The whole real line.
    pub fn entire() -> Self {
        Interval {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Smallest interval containing all the given values, or `None` for an empty iterator.
    pub fn enclosing(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut result: Option<Interval> = None;
        for v in values {
            result = Some(match result {
                None => Interval::point(v),
                Some(i) => i.hull_value(v),
            });
        }
        result
    }
}

// Queries
impl Interval {
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn middle(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn is_point(&self) -> bool {
        self.min == self.max
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn contains_interval(&self, other: &Interval) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    /// Equality of both endpoints up to the absolute tolerance `tol`.
    pub fn approx_eq(&self, other: &Interval, tol: f64) -> bool {
        close(self.min, other.min, tol) && close(self.max, other.max, tol)
    }
}

fn close(a: f64, b: f64, tol: f64) -> bool {
    if a == b {
        // Covers matching infinities.
        return true;
    }
    (a - b).abs() <= tol
}

// Operations
impl Interval {
    /// Smallest interval containing both `self` and `other`.
    pub fn hull(&self, other: &Interval) -> Interval {
        Interval {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Smallest interval containing `self` and `value`.
    pub fn hull_value(&self, value: f64) -> Interval {
        Interval {
            min: self.min.min(value),
            max: self.max.max(value),
        }
    }

    /// Symmetric inflation `[min - amount, max + amount]`.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is negative enough to invert the interval.
    pub fn bloat(&self, amount: f64) -> Interval {
        Interval::new(self.min - amount, self.max + amount)
    }

    /// Image of the interval under a monotone non-decreasing function.
    pub fn map_monotone(&self, f: impl Fn(f64) -> f64) -> Interval {
        Interval::new(f(self.min), f(self.max))
    }

    pub fn add(&self, other: &Interval) -> Interval {
        Interval::new(self.min + other.min, self.max + other.max)
    }

    pub fn sub(&self, other: &Interval) -> Interval {
        Interval::new(self.min - other.max, self.max - other.min)
    }

    pub fn mul(&self, other: &Interval) -> Interval {
        let corners = [
            mul_bound(self.min, other.min),
            mul_bound(self.min, other.max),
            mul_bound(self.max, other.min),
            mul_bound(self.max, other.max),
        ];
        corner_hull(&corners)
    }

    /// Interval division. A divisor containing zero yields [`Interval::entire`].
    pub fn div(&self, other: &Interval) -> Interval {
        if other.contains(0.0) {
            return Interval::entire();
        }
        let corners = [
            self.min / other.min,
            self.min / other.max,
            self.max / other.min,
            self.max / other.max,
        ];
        corner_hull(&corners)
    }

    pub fn scale(&self, factor: f64) -> Interval {
        self.mul(&Interval::point(factor))
    }
}

/// Product of two bounds where `0 * inf` is taken as `0`.
fn mul_bound(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

fn corner_hull(corners: &[f64; 4]) -> Interval {
    let min = corners.iter().copied().fold(f64::INFINITY, f64::min);
    let max = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Interval::new(min, max)
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Self) -> Self::Output {
        Interval::add(&self, &rhs)
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Self) -> Self::Output {
        Interval::sub(&self, &rhs)
    }
}

impl Mul for Interval {
    type Output = Interval;

    fn mul(self, rhs: Self) -> Self::Output {
        Interval::mul(&self, &rhs)
    }
}

impl Mul<f64> for Interval {
    type Output = Interval;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

impl Div for Interval {
    type Output = Interval;

    fn div(self, rhs: Self) -> Self::Output {
        Interval::div(&self, &rhs)
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Self::Output {
        Interval::new(-self.max, -self.min)
    }
}

impl From<f64> for Interval {
    fn from(value: f64) -> Self {
        Interval::point(value)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn samples(i: &Interval) -> Vec<f64> {
        (0..=8).map(|k| i.min + i.width() * k as f64 / 8.0).collect()
    }

    #[test]
    fn test_add_sub() {
        let a = Interval::new(1.0, 3.0);
        let b = Interval::new(2.0, 4.0);
        assert_eq!(a + b, Interval::new(3.0, 7.0));
        assert_eq!(a - b, Interval::new(-3.0, 1.0));
        assert_eq!(-a, Interval::new(-3.0, -1.0));
    }

    #[test]
    fn test_mul_sign_change() {
        let a = Interval::new(-2.0, 3.0);
        let b = Interval::new(-5.0, 1.0);
        // Corners: 10, -2, -15, 3
        assert_eq!(a * b, Interval::new(-15.0, 10.0));
    }

    #[test]
    fn test_mul_contains_all_products() {
        let cases = [
            (Interval::new(-2.0, 3.0), Interval::new(-5.0, 1.0)),
            (Interval::new(-0.005, 0.0), Interval::new(-32.6, 9.2)),
            (Interval::new(1.0, 2.0), Interval::new(-4.0, -3.0)),
            (Interval::new(-7.0, -1.0), Interval::new(-2.0, 0.5)),
        ];
        for (a, b) in cases {
            let p = a * b;
            for x in samples(&a) {
                for y in samples(&b) {
                    assert!(p.contains(x * y), "{} * {} = {} misses {} * {}", a, b, p, x, y);
                }
            }
        }
    }

    #[test]
    fn test_sampling_error_product() {
        let k = Interval::new(-32.648, 9.27);
        let delta = Interval::new(-0.005, 0.0) * k;
        assert!(delta.approx_eq(&Interval::new(-0.04635, 0.16324), 1e-9));
    }

    #[test]
    fn test_div() {
        let a = Interval::new(1.0, 2.0);
        let b = Interval::new(4.0, 8.0);
        assert_eq!(a / b, Interval::new(0.125, 0.5));
        let c = Interval::new(-1.0, 1.0);
        assert_eq!(a / c, Interval::entire());
    }

    #[test]
    fn test_bloat_and_hull() {
        let a = Interval::new(-1.0, 2.0);
        assert_eq!(a.bloat(0.5), Interval::new(-1.5, 2.5));
        assert_eq!(a.hull(&Interval::point(5.0)), Interval::new(-1.0, 5.0));
        assert_eq!(Interval::enclosing([3.0, -1.0, 2.0]), Some(Interval::new(-1.0, 3.0)));
        assert_eq!(Interval::enclosing(std::iter::empty()), None);
    }

    #[test]
    fn test_approx_eq() {
        let a = Interval::new(0.0, 0.7071);
        let b = Interval::new(0.0, std::f64::consts::FRAC_1_SQRT_2);
        assert!(a.approx_eq(&b, 1e-3));
        assert!(!a.approx_eq(&b, 1e-6));
        assert_ne!(a, b);
        assert!(Interval::entire().approx_eq(&Interval::entire(), 0.0));
    }

    #[test]
    fn test_try_new() {
        assert!(Interval::try_new(2.0, 1.0).is_none());
        assert_eq!(Interval::try_new(1.0, 1.0), Some(Interval::point(1.0)));
    }

    #[test]
    #[should_panic(expected = "Interval bounds must satisfy min <= max")]
    fn test_inverted_panics() {
        Interval::new(1.0, 0.0);
    }
}
