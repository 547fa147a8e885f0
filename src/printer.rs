//! Textual rendering of expressions.
//!
//! Rendering emits the minimal set of parentheses that keeps the tree structure when the text
//! is parsed back, and formats numbers with the shortest representation that round-trips
//! (`5` rather than `5.0`). Operator spellings are configurable through [`PrinterConfig`] so
//! that tool-specific dialects can be produced without touching the expressions.

use std::fmt::{self, Write};

use crate::expr::{BinaryOp, Expr, UnaryOp};

/// Operator spellings used when rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterConfig {
    pub and: &'static str,
    pub or: &'static str,
    pub not: &'static str,
    pub eq: &'static str,
    pub ne: &'static str,
    pub pow: &'static str,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            and: "&&",
            or: "||",
            not: "!",
            eq: "==",
            ne: "!=",
            pow: "^",
        }
    }
}

impl PrinterConfig {
    /// Single-character logical operators, as in SpaceEx model files.
    pub fn spaceex() -> Self {
        Self {
            and: "&",
            or: "|",
            ..Self::default()
        }
    }

    fn binary_symbol(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => self.pow,
            BinaryOp::And => self.and,
            BinaryOp::Or => self.or,
            BinaryOp::Eq => self.eq,
            BinaryOp::Ne => self.ne,
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

const UNARY_PRECEDENCE: u8 = 6;
const ATOM_PRECEDENCE: u8 = 10;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary(op, _, _) => op.precedence(),
        Expr::Unary(_, _) => UNARY_PRECEDENCE,
        Expr::Num(v) if *v < 0.0 => UNARY_PRECEDENCE,
        _ => ATOM_PRECEDENCE,
    }
}

/// Shortest decimal form of a number, with `-0` normalized to `0`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

/// Render `expr` with the given operator spellings.
pub fn render(expr: &Expr, config: &PrinterConfig) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_expr(&mut out, expr, config);
    out
}

pub fn write_expr(out: &mut impl Write, expr: &Expr, config: &PrinterConfig) -> fmt::Result {
    match expr {
        Expr::Num(v) => write!(out, "{}", format_number(*v)),
        Expr::Bool(b) => write!(out, "{}", b),
        Expr::Var(name) => write!(out, "{}", name),
        Expr::Unary(op, operand) => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => config.not,
            };
            write!(out, "{}", symbol)?;
            // `--x` is not accepted back, so nested negations are parenthesized.
            let wrap = precedence(operand) < UNARY_PRECEDENCE
                || (*op == UnaryOp::Neg && precedence(operand) == UNARY_PRECEDENCE);
            write_operand(out, operand, config, wrap)
        }
        Expr::Binary(op, lhs, rhs) => {
            let p = op.precedence();
            let wrap_lhs = match op {
                // Right-associative: `(a ^ b) ^ c` needs the parentheses, and so does `(-a) ^ b`.
                BinaryOp::Pow => precedence(lhs) <= p,
                _ => precedence(lhs) < p || (op.is_comparison() && lhs.is_condition()),
            };
            let wrap_rhs = match (op, &**rhs) {
                (BinaryOp::Pow, _) => precedence(rhs) < UNARY_PRECEDENCE,
                (op, Expr::Num(v)) if *v < 0.0 => !op.is_comparison() && !op.is_logical(),
                // Operators are left-associative, so an equal-precedence right operand keeps its parentheses.
                _ => precedence(rhs) <= p,
            };
            write_operand(out, lhs, config, wrap_lhs)?;
            write!(out, " {} ", config.binary_symbol(*op))?;
            write_operand(out, rhs, config, wrap_rhs)
        }
        Expr::Call(name, args) => {
            write!(out, "{}(", name)?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write_expr(out, arg, config)?;
            }
            write!(out, ")")
        }
    }
}

fn write_operand(out: &mut impl Write, expr: &Expr, config: &PrinterConfig, wrap: bool) -> fmt::Result {
    if wrap {
        write!(out, "(")?;
        write_expr(out, expr, config)?;
        write!(out, ")")
    } else {
        write_expr(out, expr, config)
    }
}

impl Expr {
    pub fn to_string_with(&self, config: &PrinterConfig) -> String {
        render(self, config)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, &PrinterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::parser::parse_expression;

    fn roundtrip(text: &str) -> String {
        parse_expression(text).unwrap().to_string()
    }

    #[test]
    fn test_minimal_parens() {
        assert_eq!(roundtrip("(10 - (10 * x)) - (3 * v)"), "10 - 10 * x - 3 * v");
        assert_eq!(roundtrip("a - (b - c)"), "a - (b - c)");
        assert_eq!(roundtrip("a + (b + c)"), "a + (b + c)");
        assert_eq!(roundtrip("(a + b) * c"), "(a + b) * c");
        assert_eq!(roundtrip("2 ^ 3 ^ 2"), "2 ^ 3 ^ 2");
        assert_eq!(roundtrip("(2 ^ 3) ^ 2"), "(2 ^ 3) ^ 2");
        assert_eq!(roundtrip("-(x + 1)"), "-(x + 1)");
        assert_eq!(roundtrip("x * -2"), "x * (-2)");
        assert_eq!(roundtrip("x <= -2"), "x <= -2");
    }

    #[test]
    fn test_reparse_is_identity() {
        for text in [
            "10 - 10 * x - 3 * v",
            "t >= 1.5 && t <= 5.005",
            "x > 1 || !(y <= 2) && z == 0",
            "-x ^ 2 + sin(t) / (1 - cos(t))",
            "a - (b - c) - (d + e) * f",
        ] {
            let once = parse_expression(text).unwrap();
            let again = parse_expression(&once.to_string()).unwrap();
            assert_eq!(once, again, "round trip of '{}'", text);
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(2.505), "2.505");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.005), "0.005");
    }

    #[test]
    fn test_spaceex_dialect() {
        let e = parse_expression("x <= 1 && y == 2 || z").unwrap();
        assert_eq!(render(&e, &PrinterConfig::spaceex()), "x <= 1 & y == 2 | z");
        assert_eq!(render(&e, &PrinterConfig::default()), "x <= 1 && y == 2 || z");
    }
}
