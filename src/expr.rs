//! Symbolic expressions.
//!
//! An [`Expr`] is an immutable tree over numeric constants, boolean constants, variable
//! references, unary/binary operators and named function calls. The same type describes
//! arithmetic terms (flow right-hand sides, reset values) and conditions (guards,
//! invariants, initial regions).
//!
//! The tree supports:
//!
//! - numeric, boolean and interval evaluation ([`Expr::eval`], [`Expr::holds`], [`Expr::eval_interval`]),
//! - substitution and renaming of variables,
//! - algebraic simplification ([`Expr::simplify`]),
//! - symbolic differentiation ([`Expr::derivative`]) and the affine-coefficient query used by
//!   continuization ([`Expr::linear_coefficient`]).
//!
//! Textual rendering lives in [`printer`][crate::printer]; `Display` uses the default printer.
//!
//! ```
//! use hybrid_rs::expr::Expr;
//!
//! // 10 - 10 * x - 3 * v
//! let f = Expr::num(10.0)
//!     .sub(Expr::num(10.0).mul(Expr::var("x")))
//!     .sub(Expr::num(3.0).mul(Expr::var("v")));
//! assert_eq!(f.to_string(), "10 - 10 * x - 3 * v");
//! assert_eq!(f.linear_coefficient("v"), Some(-3.0));
//! ```

use std::collections::BTreeSet;

use thiserror::Error;

use crate::interval::Interval;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div => 5,
            BinaryOp::Pow => 7,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// `a op b` holds iff `b op.mirror() a` holds.
    pub fn mirror(self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            op => op,
        }
    }

    /// Logical negation of a comparison.
    pub fn negate(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Ne),
            BinaryOp::Ne => Some(BinaryOp::Eq),
            BinaryOp::Lt => Some(BinaryOp::Ge),
            BinaryOp::Le => Some(BinaryOp::Gt),
            BinaryOp::Gt => Some(BinaryOp::Le),
            BinaryOp::Ge => Some(BinaryOp::Lt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Bool(bool),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown function '{name}' with {arity} argument(s)")]
    UnknownFunction { name: String, arity: usize },
    #[error("expected a numeric term, found condition '{0}'")]
    NotNumeric(String),
    #[error("expected a condition, found numeric term '{0}'")]
    NotCondition(String),
    #[error("cannot differentiate '{0}'")]
    NotDifferentiable(String),
}

// Constructors
impl Expr {
    pub const TRUE: Expr = Expr::Bool(true);
    pub const FALSE: Expr = Expr::Bool(false);

    pub fn num(value: f64) -> Expr {
        Expr::Num(value)
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call(name.into(), args)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary(op, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, self, rhs)
    }

    pub fn div(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Div, self, rhs)
    }

    pub fn pow(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Pow, self, rhs)
    }

    pub fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }

    pub fn not(self) -> Expr {
        Expr::unary(UnaryOp::Not, self)
    }

    pub fn le(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Le, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Ge, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn equals(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, self, rhs)
    }

    /// Conjunction, absorbing `true` operands and keeping chains left-nested.
    pub fn and(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Bool(true), e) | (e, Expr::Bool(true)) => e,
            (lhs, Expr::Binary(BinaryOp::And, l, r)) => lhs.and(*l).and(*r),
            (lhs, rhs) => Expr::binary(BinaryOp::And, lhs, rhs),
        }
    }

    /// Disjunction, absorbing `false` operands and keeping chains left-nested.
    pub fn or(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Bool(false), e) | (e, Expr::Bool(false)) => e,
            (lhs, Expr::Binary(BinaryOp::Or, l, r)) => lhs.or(*l).or(*r),
            (lhs, rhs) => Expr::binary(BinaryOp::Or, lhs, rhs),
        }
    }

    /// Left-nested conjunction of all items; `true` for none.
    pub fn and_all(items: impl IntoIterator<Item = Expr>) -> Expr {
        items.into_iter().fold(Expr::TRUE, Expr::and)
    }

    /// Left-nested disjunction of all items; `false` for none.
    pub fn or_all(items: impl IntoIterator<Item = Expr>) -> Expr {
        items.into_iter().fold(Expr::FALSE, Expr::or)
    }
}

// Structure queries
impl Expr {
    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Bool(true))
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Expr::Num(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Expr::Var(name) => Some(name),
            _ => None,
        }
    }

    /// Whether the expression denotes a truth value rather than a number.
    pub fn is_condition(&self) -> bool {
        match self {
            Expr::Bool(_) => true,
            Expr::Unary(UnaryOp::Not, _) => true,
            Expr::Binary(op, _, _) => op.is_comparison() || op.is_logical(),
            _ => false,
        }
    }

    /// Top-level conjuncts (`a && (b && c)` yields `[a, b, c]`).
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        collect_chain(self, BinaryOp::And, &mut out);
        out
    }

    /// Top-level disjuncts.
    pub fn disjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        collect_chain(self, BinaryOp::Or, &mut out);
        out
    }

    /// All variable names referenced by the expression.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.visit_vars(&mut |name| {
            out.insert(name.to_string());
        });
        out
    }

    pub fn mentions(&self, var: &str) -> bool {
        let mut found = false;
        self.visit_vars(&mut |name| found |= name == var);
        found
    }

    fn visit_vars(&self, f: &mut impl FnMut(&str)) {
        match self {
            Expr::Num(_) | Expr::Bool(_) => {}
            Expr::Var(name) => f(name),
            Expr::Unary(_, e) => e.visit_vars(f),
            Expr::Binary(_, l, r) => {
                l.visit_vars(f);
                r.visit_vars(f);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.visit_vars(f)),
        }
    }
}

fn collect_chain<'a>(expr: &'a Expr, op: BinaryOp, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Binary(o, l, r) if *o == op => {
            collect_chain(l, op, out);
            collect_chain(r, op, out);
        }
        _ => out.push(expr),
    }
}

// Substitution
impl Expr {
    /// Replace every variable for which `f` returns `Some`.
    pub fn substitute_with(&self, f: &impl Fn(&str) -> Option<Expr>) -> Expr {
        match self {
            Expr::Num(_) | Expr::Bool(_) => self.clone(),
            Expr::Var(name) => f(name).unwrap_or_else(|| self.clone()),
            Expr::Unary(op, e) => Expr::unary(*op, e.substitute_with(f)),
            Expr::Binary(op, l, r) => Expr::binary(*op, l.substitute_with(f), r.substitute_with(f)),
            Expr::Call(name, args) => Expr::Call(name.clone(), args.iter().map(|a| a.substitute_with(f)).collect()),
        }
    }

    /// Replace every occurrence of `var` by `replacement`.
    pub fn substitute(&self, var: &str, replacement: &Expr) -> Expr {
        self.substitute_with(&|name| (name == var).then(|| replacement.clone()))
    }

    /// Rename variables through `f`.
    pub fn rename(&self, f: &impl Fn(&str) -> String) -> Expr {
        self.substitute_with(&|name| Some(Expr::Var(f(name))))
    }

    /// Drop every top-level conjunct that mentions `var`.
    pub fn without_conjuncts_mentioning(&self, var: &str) -> Expr {
        Expr::and_all(self.conjuncts().into_iter().filter(|c| !c.mentions(var)).cloned())
    }
}

// Evaluation
impl Expr {
    /// Numeric value under the variable assignment `env`.
    pub fn eval<F>(&self, env: &F) -> Result<f64, EvalError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Expr::Num(v) => Ok(*v),
            Expr::Var(name) => env(name).ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            Expr::Unary(UnaryOp::Neg, e) => Ok(-e.eval(env)?),
            Expr::Binary(op, l, r) if !op.is_comparison() && !op.is_logical() => {
                let a = l.eval(env)?;
                let b = r.eval(env)?;
                Ok(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                    _ => unreachable!(),
                })
            }
            Expr::Call(name, args) => {
                let values = args.iter().map(|a| a.eval(env)).collect::<Result<Vec<_>, _>>()?;
                apply_function(name, &values).ok_or_else(|| EvalError::UnknownFunction {
                    name: name.clone(),
                    arity: args.len(),
                })
            }
            _ => Err(EvalError::NotNumeric(self.to_string())),
        }
    }

    /// Truth value under the variable assignment `env`.
    pub fn holds<F>(&self, env: &F) -> Result<bool, EvalError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Expr::Bool(b) => Ok(*b),
            Expr::Unary(UnaryOp::Not, e) => Ok(!e.holds(env)?),
            Expr::Binary(BinaryOp::And, l, r) => Ok(l.holds(env)? && r.holds(env)?),
            Expr::Binary(BinaryOp::Or, l, r) => Ok(l.holds(env)? || r.holds(env)?),
            Expr::Binary(op, l, r) if op.is_comparison() => {
                let a = l.eval(env)?;
                let b = r.eval(env)?;
                Ok(match op {
                    BinaryOp::Eq => a == b,
                    BinaryOp::Ne => a != b,
                    BinaryOp::Lt => a < b,
                    BinaryOp::Le => a <= b,
                    BinaryOp::Gt => a > b,
                    BinaryOp::Ge => a >= b,
                    _ => unreachable!(),
                })
            }
            _ => Err(EvalError::NotCondition(self.to_string())),
        }
    }

    /// Interval enclosure of the value when each variable ranges over `env(name)`.
    pub fn eval_interval<F>(&self, env: &F) -> Result<Interval, EvalError>
    where
        F: Fn(&str) -> Option<Interval>,
    {
        match self {
            Expr::Num(v) => Ok(Interval::point(*v)),
            Expr::Var(name) => env(name).ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            Expr::Unary(UnaryOp::Neg, e) => Ok(-e.eval_interval(env)?),
            Expr::Binary(op, l, r) if !op.is_comparison() && !op.is_logical() => {
                let a = l.eval_interval(env)?;
                let b = r.eval_interval(env)?;
                Ok(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => pow_interval(&a, &b),
                    _ => unreachable!(),
                })
            }
            Expr::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval_interval(env))
                    .collect::<Result<Vec<_>, _>>()?;
                apply_function_interval(name, &values).ok_or_else(|| EvalError::UnknownFunction {
                    name: name.clone(),
                    arity: args.len(),
                })
            }
            _ => Err(EvalError::NotNumeric(self.to_string())),
        }
    }
}

/// Numeric value of a supported function, `None` if unknown.
pub fn apply_function(name: &str, args: &[f64]) -> Option<f64> {
    match (name, args) {
        ("sin", [x]) => Some(x.sin()),
        ("cos", [x]) => Some(x.cos()),
        ("tan", [x]) => Some(x.tan()),
        ("exp", [x]) => Some(x.exp()),
        ("ln" | "log", [x]) => Some(x.ln()),
        ("sqrt", [x]) => Some(x.sqrt()),
        ("abs", [x]) => Some(x.abs()),
        ("min", [a, b]) => Some(a.min(*b)),
        ("max", [a, b]) => Some(a.max(*b)),
        _ => None,
    }
}

fn apply_function_interval(name: &str, args: &[Interval]) -> Option<Interval> {
    use std::f64::consts::{FRAC_PI_2, PI};

    match (name, args) {
        ("sin", [x]) => Some(sin_interval(x)),
        ("cos", [x]) => Some(sin_interval(&(*x + Interval::point(FRAC_PI_2)))),
        ("tan", [x]) => {
            // Unbounded if the interval reaches a pole at pi/2 + k*pi.
            let k = ((x.min - FRAC_PI_2) / PI).ceil();
            if x.width() >= PI || FRAC_PI_2 + k * PI <= x.max {
                Some(Interval::entire())
            } else {
                Some(x.map_monotone(f64::tan))
            }
        }
        ("exp", [x]) => Some(x.map_monotone(f64::exp)),
        ("ln" | "log", [x]) => Some(if x.min > 0.0 {
            x.map_monotone(f64::ln)
        } else {
            Interval::entire()
        }),
        ("sqrt", [x]) => Some(if x.min >= 0.0 {
            x.map_monotone(f64::sqrt)
        } else {
            Interval::entire()
        }),
        ("abs", [x]) => Some(if x.min >= 0.0 {
            *x
        } else if x.max <= 0.0 {
            -*x
        } else {
            Interval::new(0.0, x.max.max(-x.min))
        }),
        ("min", [a, b]) => Some(Interval::new(a.min.min(b.min), a.max.min(b.max))),
        ("max", [a, b]) => Some(Interval::new(a.min.max(b.min), a.max.max(b.max))),
        _ => None,
    }
}

fn sin_interval(x: &Interval) -> Interval {
    use std::f64::consts::{FRAC_PI_2, PI};

    if !x.is_bounded() || x.width() >= 2.0 * PI {
        return Interval::new(-1.0, 1.0);
    }
    let mut result = Interval::point(x.min.sin()).hull_value(x.max.sin());
    // Maxima at pi/2 + 2k*pi, minima at -pi/2 + 2k*pi.
    let first_max = FRAC_PI_2 + 2.0 * PI * ((x.min - FRAC_PI_2) / (2.0 * PI)).ceil();
    if first_max <= x.max {
        result = result.hull_value(1.0);
    }
    let first_min = -FRAC_PI_2 + 2.0 * PI * ((x.min + FRAC_PI_2) / (2.0 * PI)).ceil();
    if first_min <= x.max {
        result = result.hull_value(-1.0);
    }
    result
}

fn pow_interval(base: &Interval, exponent: &Interval) -> Interval {
    if exponent.is_point() && exponent.min.fract() == 0.0 {
        let n = exponent.min as i32;
        if n == 0 {
            return Interval::point(1.0);
        }
        if n < 0 {
            return Interval::point(1.0) / pow_interval(base, &Interval::point(-n as f64));
        }
        let lo = base.min.powi(n);
        let hi = base.max.powi(n);
        if n % 2 == 1 {
            return Interval::new(lo, hi);
        }
        if base.contains(0.0) {
            return Interval::new(0.0, lo.max(hi));
        }
        return Interval::new(lo.min(hi), lo.max(hi));
    }
    if base.min > 0.0 {
        let ln = base.map_monotone(f64::ln);
        return (*exponent * ln).map_monotone(f64::exp);
    }
    Interval::entire()
}

// Simplification
impl Expr {
    /// Constant folding and algebraic identities, applied bottom-up.
    ///
    /// The result is equivalent for every finite assignment of the variables. Constants are
    /// moved to the left of products and negative coefficients are turned into subtractions,
    /// so `x + -3 * v` becomes `x - 3 * v`.
    pub fn simplify(&self) -> Expr {
        match self {
            Expr::Num(_) | Expr::Bool(_) | Expr::Var(_) => self.clone(),
            Expr::Unary(op, e) => simplify_unary(*op, e.simplify()),
            Expr::Binary(op, l, r) => simplify_binary(*op, l.simplify(), r.simplify()),
            Expr::Call(name, args) => {
                let args: Vec<Expr> = args.iter().map(Expr::simplify).collect();
                let values: Option<Vec<f64>> = args.iter().map(Expr::as_num).collect();
                match values.and_then(|v| apply_function(name, &v)) {
                    Some(v) if v.is_finite() => Expr::Num(v),
                    _ => Expr::Call(name.clone(), args),
                }
            }
        }
    }
}

fn simplify_unary(op: UnaryOp, e: Expr) -> Expr {
    match (op, e) {
        (UnaryOp::Neg, Expr::Num(v)) => Expr::Num(-v),
        (UnaryOp::Neg, Expr::Unary(UnaryOp::Neg, inner)) => *inner,
        (UnaryOp::Neg, Expr::Binary(BinaryOp::Mul, l, r)) if l.as_num().is_some() => {
            Expr::Num(-l.as_num().unwrap_or_default()).mul(*r)
        }
        (UnaryOp::Not, Expr::Bool(b)) => Expr::Bool(!b),
        (UnaryOp::Not, Expr::Unary(UnaryOp::Not, inner)) => *inner,
        (UnaryOp::Not, Expr::Binary(cmp, l, r)) if cmp.is_comparison() => match cmp.negate() {
            Some(neg) => Expr::Binary(neg, l, r),
            None => Expr::Unary(UnaryOp::Not, Box::new(Expr::Binary(cmp, l, r))),
        },
        (op, e) => Expr::unary(op, e),
    }
}

fn simplify_binary(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    use BinaryOp::*;

    // Constant folding.
    match (&l, &r) {
        (Expr::Num(a), Expr::Num(b)) => {
            let (a, b) = (*a, *b);
            let folded = match op {
                Add => Some(Expr::Num(a + b)),
                Sub => Some(Expr::Num(a - b)),
                Mul => Some(Expr::Num(a * b)),
                Div if b != 0.0 => Some(Expr::Num(a / b)),
                Pow => Some(Expr::Num(a.powf(b))),
                Eq => Some(Expr::Bool(a == b)),
                Ne => Some(Expr::Bool(a != b)),
                Lt => Some(Expr::Bool(a < b)),
                Le => Some(Expr::Bool(a <= b)),
                Gt => Some(Expr::Bool(a > b)),
                Ge => Some(Expr::Bool(a >= b)),
                _ => None,
            };
            match folded {
                Some(Expr::Num(v)) if !v.is_finite() => {}
                Some(e) => return e,
                None => {}
            }
        }
        (Expr::Bool(a), Expr::Bool(b)) => match op {
            And => return Expr::Bool(*a && *b),
            Or => return Expr::Bool(*a || *b),
            _ => {}
        },
        _ => {}
    }

    match op {
        And => match (l, r) {
            (Expr::Bool(false), _) | (_, Expr::Bool(false)) => Expr::FALSE,
            (l, r) => l.and(r),
        },
        Or => match (l, r) {
            (Expr::Bool(true), _) | (_, Expr::Bool(true)) => Expr::TRUE,
            (l, r) => l.or(r),
        },
        Add => match (l, r) {
            (Expr::Num(z), e) | (e, Expr::Num(z)) if z == 0.0 => e,
            (l, Expr::Num(c)) if c < 0.0 => l.sub(Expr::Num(-c)),
            (l, Expr::Unary(UnaryOp::Neg, r)) => l.sub(*r),
            (l, Expr::Binary(Mul, c, r)) if c.as_num().is_some_and(|c| c < 0.0) => {
                l.sub(Expr::Num(-c.as_num().unwrap_or_default()).mul(*r))
            }
            (l, r) => l.add(r),
        },
        Sub => match (l, r) {
            (e, Expr::Num(z)) if z == 0.0 => e,
            (Expr::Num(z), e) if z == 0.0 => simplify_unary(UnaryOp::Neg, e),
            (l, Expr::Num(c)) if c < 0.0 => l.add(Expr::Num(-c)),
            (l, Expr::Unary(UnaryOp::Neg, r)) => l.add(*r),
            (l, Expr::Binary(Mul, c, r)) if c.as_num().is_some_and(|c| c < 0.0) => {
                l.add(Expr::Num(-c.as_num().unwrap_or_default()).mul(*r))
            }
            (l, r) => l.sub(r),
        },
        Mul => match (l, r) {
            (Expr::Num(z), _) | (_, Expr::Num(z)) if z == 0.0 => Expr::Num(0.0),
            (Expr::Num(o), e) | (e, Expr::Num(o)) if o == 1.0 => e,
            (Expr::Num(m), e) | (e, Expr::Num(m)) if m == -1.0 => simplify_unary(UnaryOp::Neg, e),
            (Expr::Num(a), Expr::Binary(Mul, b, e)) if b.as_num().is_some() => {
                Expr::Num(a * b.as_num().unwrap_or_default()).mul(*e)
            }
            (e, Expr::Num(c)) => Expr::Num(c).mul(e),
            (Expr::Unary(UnaryOp::Neg, a), Expr::Unary(UnaryOp::Neg, b)) => a.mul(*b),
            (l, r) => l.mul(r),
        },
        Div => match (l, r) {
            (e, Expr::Num(o)) if o == 1.0 => e,
            (Expr::Num(z), _) if z == 0.0 => Expr::Num(0.0),
            (l, r) => l.div(r),
        },
        Pow => match (l, r) {
            (_, Expr::Num(z)) if z == 0.0 => Expr::Num(1.0),
            (e, Expr::Num(o)) if o == 1.0 => e,
            (l, r) => l.pow(r),
        },
        cmp => Expr::binary(cmp, l, r),
    }
}

// Differentiation
impl Expr {
    /// Symbolic partial derivative with respect to `var`, simplified.
    pub fn derivative(&self, var: &str) -> Result<Expr, EvalError> {
        Ok(self.derivative_raw(var)?.simplify())
    }

    fn derivative_raw(&self, var: &str) -> Result<Expr, EvalError> {
        if self.is_condition() {
            return Err(EvalError::NotNumeric(self.to_string()));
        }
        if !self.mentions(var) {
            return Ok(Expr::Num(0.0));
        }
        Ok(match self {
            Expr::Var(_) => Expr::Num(1.0),
            Expr::Unary(UnaryOp::Neg, e) => e.derivative_raw(var)?.neg(),
            Expr::Binary(BinaryOp::Add, l, r) => l.derivative_raw(var)?.add(r.derivative_raw(var)?),
            Expr::Binary(BinaryOp::Sub, l, r) => l.derivative_raw(var)?.sub(r.derivative_raw(var)?),
            Expr::Binary(BinaryOp::Mul, l, r) => {
                let dl = l.derivative_raw(var)?;
                let dr = r.derivative_raw(var)?;
                dl.mul((**r).clone()).add((**l).clone().mul(dr))
            }
            Expr::Binary(BinaryOp::Div, l, r) => {
                let dl = l.derivative_raw(var)?;
                let dr = r.derivative_raw(var)?;
                let numerator = dl.mul((**r).clone()).sub((**l).clone().mul(dr));
                numerator.div((**r).clone().pow(Expr::Num(2.0)))
            }
            Expr::Binary(BinaryOp::Pow, base, exponent) if !exponent.mentions(var) => {
                // d(u^n) = n * u^(n-1) * u'
                let du = base.derivative_raw(var)?;
                let n = (**exponent).clone();
                n.clone()
                    .mul((**base).clone().pow(n.sub(Expr::Num(1.0))))
                    .mul(du)
            }
            Expr::Binary(BinaryOp::Pow, base, exponent) => {
                // d(u^v) = u^v * (v' * ln(u) + v * u' / u)
                let du = base.derivative_raw(var)?;
                let dv = exponent.derivative_raw(var)?;
                let ln_u = Expr::call("ln", vec![(**base).clone()]);
                self.clone()
                    .mul(dv.mul(ln_u).add((**exponent).clone().mul(du).div((**base).clone())))
            }
            Expr::Call(name, args) if args.len() == 1 => {
                let u = args[0].clone();
                let du = u.derivative_raw(var)?;
                let outer = match name.as_str() {
                    "sin" => Expr::call("cos", vec![u]),
                    "cos" => Expr::call("sin", vec![u]).neg(),
                    "tan" => Expr::Num(1.0).div(Expr::call("cos", vec![u]).pow(Expr::Num(2.0))),
                    "exp" => Expr::call("exp", vec![u]),
                    "ln" | "log" => Expr::Num(1.0).div(u),
                    "sqrt" => Expr::Num(1.0).div(Expr::Num(2.0).mul(Expr::call("sqrt", vec![u]))),
                    _ => return Err(EvalError::NotDifferentiable(self.to_string())),
                };
                outer.mul(du)
            }
            _ => return Err(EvalError::NotDifferentiable(self.to_string())),
        })
    }

    /// The constant `c` such that `self = c * var + (terms without var)`, or `None` if the
    /// expression is not affine in `var` with a constant coefficient.
    pub fn linear_coefficient(&self, var: &str) -> Option<f64> {
        let d = self.derivative(var).ok()?;
        if !d.variables().is_empty() {
            return None;
        }
        d.eval(&|_| None).ok()
    }

    /// Time derivative along the flow: `sum over x of d(self)/dx * flow(x)`.
    pub fn lie_derivative<'a>(&self, flows: impl IntoIterator<Item = (&'a str, &'a Expr)>) -> Result<Expr, EvalError> {
        let mut terms = Vec::new();
        for (var, rhs) in flows {
            if self.mentions(var) {
                terms.push(self.derivative(var)?.mul(rhs.clone()));
            }
        }
        let sum = terms.into_iter().reduce(Expr::add).unwrap_or(Expr::Num(0.0));
        Ok(sum.simplify())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::parser::parse_expression;

    fn p(text: &str) -> Expr {
        parse_expression(text).unwrap()
    }

    fn env(name: &str) -> Option<f64> {
        match name {
            "x" => Some(2.0),
            "v" => Some(-1.0),
            "t" => Some(0.0),
            _ => None,
        }
    }

    #[test]
    fn test_eval() {
        assert_eq!(p("10 - 10 * x - 3 * v").eval(&env), Ok(-7.0));
        assert_eq!(p("x ^ 3").eval(&env), Ok(8.0));
        assert_eq!(p("cos(t)").eval(&env), Ok(1.0));
        assert_eq!(
            p("y + 1").eval(&env),
            Err(EvalError::UnknownVariable("y".to_string()))
        );
        assert!(matches!(p("foo(x)").eval(&env), Err(EvalError::UnknownFunction { .. })));
    }

    #[test]
    fn test_holds() {
        assert_eq!(p("x >= 2 && v < 0").holds(&env), Ok(true));
        assert_eq!(p("x > 2 || !(v < 0)").holds(&env), Ok(false));
        assert!(p("x + 1").holds(&env).is_err());
    }

    #[test]
    fn test_eval_interval() {
        let box_env = |name: &str| match name {
            "x" => Some(Interval::new(-1.0, 2.0)),
            "t" => Some(Interval::new(0.0, std::f64::consts::FRAC_PI_4)),
            _ => None,
        };
        assert_eq!(p("x * x").eval_interval(&box_env), Ok(Interval::new(-2.0, 4.0)));
        assert_eq!(p("x ^ 2").eval_interval(&box_env), Ok(Interval::new(0.0, 4.0)));
        let s = p("sin(t)").eval_interval(&box_env).unwrap();
        assert!(s.approx_eq(&Interval::new(0.0, std::f64::consts::FRAC_1_SQRT_2), 1e-12));
        let c = p("cos(x)").eval_interval(&box_env).unwrap();
        assert!(c.approx_eq(&Interval::new(2f64.cos(), 1.0), 1e-12));
    }

    #[test]
    fn test_substitute() {
        let e = p("v + a");
        let f = p("10 - 10 * x - 3 * v");
        assert_eq!(e.substitute("a", &f).to_string(), "v + (10 - 10 * x - 3 * v)");
        assert_eq!(e.rename(&|n| format!("inst.{}", n)).to_string(), "inst.v + inst.a");
    }

    #[test]
    fn test_simplify() {
        assert_eq!(p("t >= 2.5 * 2").simplify().to_string(), "t >= 5");
        assert_eq!(p("0 + x * 1").simplify().to_string(), "x");
        assert_eq!(p("x + -3 * v").simplify().to_string(), "x - 3 * v");
        assert_eq!(p("true && x <= 1").simplify().to_string(), "x <= 1");
        assert_eq!(p("x <= 1 && 1 > 2").simplify(), Expr::FALSE);
        assert_eq!(p("!(x < 1)").simplify().to_string(), "x >= 1");
        assert_eq!(p("x * 2").simplify().to_string(), "2 * x");
    }

    #[test]
    fn test_derivative() {
        assert_eq!(p("10 - 10 * x - 3 * v").derivative("x").unwrap(), Expr::Num(-10.0));
        assert_eq!(p("x ^ 3").derivative("x").unwrap().to_string(), "3 * x ^ 2");
        assert_eq!(p("sin(t)").derivative("t").unwrap().to_string(), "cos(t)");
        assert_eq!(p("y").derivative("x").unwrap(), Expr::Num(0.0));
        assert!(p("abs(x)").derivative("x").is_err());
    }

    #[test]
    fn test_linear_coefficient() {
        assert_eq!(p("-10 * v - 3 * a").linear_coefficient("a"), Some(-3.0));
        assert_eq!(p("a").linear_coefficient("a"), Some(1.0));
        assert_eq!(p("v").linear_coefficient("a"), Some(0.0));
        assert_eq!(p("a * v").linear_coefficient("a"), None);
        assert_eq!(p("a ^ 2").linear_coefficient("a"), None);
    }

    #[test]
    fn test_lie_derivative() {
        let f = p("10 - 10 * x - 3 * v");
        let x_flow = p("v");
        let v_flow = p("a");
        let lie = f.lie_derivative([("x", &x_flow), ("v", &v_flow)]).unwrap();
        assert_eq!(lie.to_string(), "-10 * v - 3 * a");
    }

    #[test]
    fn test_conjuncts() {
        let e = p("t <= 5 && clock <= 0.005 && x >= 0");
        assert_eq!(e.conjuncts().len(), 3);
        assert_eq!(e.without_conjuncts_mentioning("clock").to_string(), "t <= 5 && x >= 0");
        assert_eq!(p("x > 1 || x < -1").disjuncts().len(), 2);
        assert_eq!(Expr::and_all(vec![]), Expr::TRUE);
    }
}
