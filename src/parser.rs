//! Parsing of the textual expression language.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and (('||' | '|') and)*
//! and     := not (('&&' | '&') not)*
//! not     := '!' not | cmp
//! cmp     := sum (cmpop sum)*            a <= x <= b  means  a <= x && x <= b
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := atom ('^' unary)?
//! atom    := number | 'true' | 'false' | ident | ident '(' args ')' | '(' or ')'
//! ```
//!
//! Identifiers may contain `.` so that names qualified by an instance (`inst.x`) survive a
//! round trip. A single `=` is accepted as equality.

use thiserror::Error;

use crate::expr::{BinaryOp, Expr, UnaryOp};

/// Malformed input, with the byte offset of the offending token.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at offset {offset} near '{token}': {message}")]
pub struct ParseError {
    pub offset: usize,
    pub token: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    End,
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Number(v) => v.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Op(op) => op.to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
            Token::End => "<end>".to_string(),
        }
    }
}

const OPERATORS: &[&str] = &[
    "&&", "||", "==", "!=", "<=", ">=", "&", "|", "=", "<", ">", "!", "+", "-", "*", "/", "^",
];

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos] as char;
        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let start = pos;
            while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                pos += 1;
            }
            // Exponent part: 1e-7, 2.5E3
            if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
                let mut look = pos + 1;
                if look < bytes.len() && (bytes[look] == b'+' || bytes[look] == b'-') {
                    look += 1;
                }
                if look < bytes.len() && bytes[look].is_ascii_digit() {
                    pos = look;
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text = &input[start..pos];
            let value = text.parse::<f64>().map_err(|_| ParseError {
                offset: start,
                token: text.to_string(),
                message: "invalid number".to_string(),
            })?;
            tokens.push((Token::Number(value), start));
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = pos;
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'.') {
                pos += 1;
            }
            tokens.push((Token::Ident(input[start..pos].to_string()), start));
            continue;
        }

        match ch {
            '(' => tokens.push((Token::LParen, pos)),
            ')' => tokens.push((Token::RParen, pos)),
            ',' => tokens.push((Token::Comma, pos)),
            _ => {
                let op = OPERATORS
                    .iter()
                    .find(|op| input[pos..].starts_with(**op))
                    .ok_or_else(|| ParseError {
                        offset: pos,
                        token: input[pos..].chars().next().map(String::from).unwrap_or_default(),
                        message: "unexpected character".to_string(),
                    })?;
                tokens.push((Token::Op(op), pos));
                pos += op.len();
                continue;
            }
        }
        pos += 1;
    }

    tokens.push((Token::End, input.len()));
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let (token, offset) = &self.tokens[self.pos];
        ParseError {
            offset: *offset,
            token: token.text(),
            message: message.into(),
        }
    }

    fn eat_op(&mut self, candidates: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Token::Op(op) if candidates.contains(op) => {
                let op = *op;
                self.advance();
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected.text())))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat_op(&["||", "|"]).is_some() {
            let rhs = self.parse_and()?;
            lhs = Expr::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.eat_op(&["&&", "&"]).is_some() {
            let rhs = self.parse_not()?;
            lhs = Expr::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat_op(&["!"]).is_some() {
            return Ok(Expr::unary(UnaryOp::Not, self.parse_not()?));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_sum()?;
        let mut links = Vec::new();
        let mut lhs = first.clone();
        while let Some(op) = self.eat_op(&["==", "=", "!=", "<=", ">=", "<", ">"]) {
            let op = match op {
                "==" | "=" => BinaryOp::Eq,
                "!=" => BinaryOp::Ne,
                "<=" => BinaryOp::Le,
                ">=" => BinaryOp::Ge,
                "<" => BinaryOp::Lt,
                _ => BinaryOp::Gt,
            };
            let rhs = self.parse_sum()?;
            links.push(Expr::binary(op, lhs, rhs.clone()));
            lhs = rhs;
        }
        if links.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::and_all(links))
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_product()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.parse_product()?;
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let rhs = self.parse_unary()?;
            let op = if op == "*" { BinaryOp::Mul } else { BinaryOp::Div };
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat_op(&["-"]).is_some() {
            if matches!(self.peek(), Token::Op("-")) {
                return Err(self.error("ambiguous double negation, use parentheses"));
            }
            return Ok(match self.parse_unary()? {
                Expr::Num(v) => Expr::Num(-v),
                e => Expr::unary(UnaryOp::Neg, e),
            });
        }
        if self.eat_op(&["+"]).is_some() {
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_atom()?;
        if self.eat_op(&["^"]).is_some() {
            let exponent = self.parse_unary()?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Number(v) => {
                self.advance();
                Ok(Expr::Num(v))
            }
            Token::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "true" => return Ok(Expr::TRUE),
                    "false" => return Ok(Expr::FALSE),
                    _ => {}
                }
                if *self.peek() != Token::LParen {
                    return Ok(Expr::Var(name));
                }
                self.advance();
                let mut args = Vec::new();
                if *self.peek() != Token::RParen {
                    loop {
                        args.push(self.parse_or()?);
                        if *self.peek() == Token::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Call(name, args))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => Err(self.error("expected a number, a name or '('")),
        }
    }
}

/// Parse any expression.
pub fn parse_expression(text: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if *parser.peek() != Token::End {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

fn parse_condition(text: &str, what: &str) -> Result<Expr, ParseError> {
    let expr = parse_expression(text)?;
    if !expr.is_condition() {
        return Err(ParseError {
            offset: 0,
            token: text.trim().to_string(),
            message: format!("expected a {}, found a numeric term", what),
        });
    }
    Ok(expr)
}

/// Parse a transition guard; the empty string is `true`.
pub fn parse_guard(text: &str) -> Result<Expr, ParseError> {
    if text.trim().is_empty() {
        return Ok(Expr::TRUE);
    }
    parse_condition(text, "guard")
}

/// Parse a mode invariant; the empty string is `true`.
pub fn parse_invariant(text: &str) -> Result<Expr, ParseError> {
    if text.trim().is_empty() {
        return Ok(Expr::TRUE);
    }
    parse_condition(text, "invariant")
}

/// Parse an initial or forbidden region.
pub fn parse_initial(text: &str) -> Result<Expr, ParseError> {
    parse_condition(text, "region")
}
