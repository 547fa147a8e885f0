//! Expressions with bounded additive uncertainty.

use std::fmt;
use std::ops::Add;

use crate::expr::Expr;
use crate::interval::Interval;
use crate::printer::PrinterConfig;

/// The value of `expr` plus any real drawn from `interval`.
///
/// An absent interval means the value is exactly `expr`. Used for flow right-hand sides and
/// reset values.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionInterval {
    pub expr: Expr,
    pub interval: Option<Interval>,
}

impl ExpressionInterval {
    pub fn new(expr: Expr) -> Self {
        Self { expr, interval: None }
    }

    pub fn with_interval(expr: Expr, interval: Interval) -> Self {
        Self {
            expr,
            interval: Some(interval),
        }
    }

    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }

    pub fn is_exact(&self) -> bool {
        self.interval.is_none()
    }

    /// Adds `extra` to the uncertainty, treating an absent interval as `[0, 0]`.
    pub fn with_added_interval(self, extra: Interval) -> Self {
        let interval = self.interval.unwrap_or_else(Interval::zero) + extra;
        Self {
            expr: self.expr,
            interval: Some(interval),
        }
    }

    /// Applies `f` to the expression, keeping the uncertainty.
    pub fn map_expr(&self, f: impl FnOnce(&Expr) -> Expr) -> Self {
        Self {
            expr: f(&self.expr),
            interval: self.interval,
        }
    }

    pub fn to_string_with(&self, config: &PrinterConfig) -> String {
        match self.interval {
            Some(i) => format!("{} + {}", self.expr.to_string_with(config), i),
            None => self.expr.to_string_with(config),
        }
    }
}

impl From<Expr> for ExpressionInterval {
    fn from(expr: Expr) -> Self {
        ExpressionInterval::new(expr)
    }
}

impl Add for ExpressionInterval {
    type Output = ExpressionInterval;

    fn add(self, rhs: Self) -> Self::Output {
        let interval = match (self.interval, rhs.interval) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or_else(Interval::zero) + b.unwrap_or_else(Interval::zero)),
        };
        ExpressionInterval {
            expr: self.expr.add(rhs.expr),
            interval,
        }
    }
}

impl fmt::Display for ExpressionInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interval {
            Some(i) => write!(f, "{} + {}", self.expr, i),
            None => write!(f, "{}", self.expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_add_sums_intervals() {
        let a = ExpressionInterval::with_interval(Expr::var("x"), Interval::new(-1.0, 1.0));
        let b = ExpressionInterval::new(Expr::var("y"));
        let sum = a.clone() + b.clone();
        assert_eq!(sum.expr.to_string(), "x + y");
        assert_eq!(sum.interval(), Some(Interval::new(-1.0, 1.0)));

        let c = ExpressionInterval::with_interval(Expr::num(2.0), Interval::new(0.5, 2.0));
        assert_eq!((a + c).interval(), Some(Interval::new(-0.5, 3.0)));
        assert_eq!((b.clone() + b).interval(), None);
    }

    #[test]
    fn test_with_added_interval() {
        let e = ExpressionInterval::new(Expr::var("a"));
        assert!(e.is_exact());
        let e = e.with_added_interval(Interval::new(-0.1, 0.2));
        let e = e.with_added_interval(Interval::new(-0.1, 0.0));
        assert!(e.interval().unwrap().approx_eq(&Interval::new(-0.2, 0.2), 1e-12));
        assert_eq!(e.to_string(), "a + [-0.2, 0.2]");
    }
}
