//! Expression trees for equation templates
//!
//! Templates are plain infix arithmetic equal to zero, with parameters written
//! as `{name}`:
//!
//! ```text
//! {top_tube} - {stack} * TAN((90 - {seat_angle}) / 180 * PI) - {reach}
//! ```
//!
//! Grammar (`^` binds tighter than unary minus and is right associative):
//!
//! ```text
//! expr    = term (("+" | "-") term)*
//! term    = unary (("*" | "/") unary)*
//! unary   = "-" unary | power
//! power   = primary ("^" unary)?
//! primary = number | "{" name "}" | "PI" | FUNC "(" expr ("," expr)* ")" | "(" expr ")"
//! ```
//!
//! A template is parsed once. Solving binds every parameter except the target
//! to a number ([`Expr::bind`]), which leaves a one-variable expression the
//! root finder evaluates ([`Expr::eval`]).

use bgdv_common::{Error, Result};
use std::fmt;

/// Built-in functions (angles in radians)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Atan2,
    Sqrt,
}

/// Names accepted in templates, with their arity
const FUNCTIONS: &[(&str, Function, usize)] = &[
    ("SIN", Function::Sin, 1),
    ("COS", Function::Cos, 1),
    ("TAN", Function::Tan, 1),
    ("ATAN2", Function::Atan2, 2),
    ("SQRT", Function::Sqrt, 1),
];

/// Constant accepted in templates
const PI_NAME: &str = "PI";

impl Function {
    fn lookup(name: &str) -> Option<(Function, usize)> {
        FUNCTIONS
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, function, arity)| (*function, *arity))
    }

    pub fn name(&self) -> &'static str {
        FUNCTIONS
            .iter()
            .find(|(_, function, _)| function == self)
            .map(|(name, _, _)| *name)
            .unwrap_or("?")
    }

    fn apply(&self, args: &[f64]) -> f64 {
        match (self, args) {
            (Function::Sin, [a]) => a.sin(),
            (Function::Cos, [a]) => a.cos(),
            (Function::Tan, [a]) => a.tan(),
            (Function::Sqrt, [a]) => a.sqrt(),
            (Function::Atan2, [y, x]) => y.atan2(*x),
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn symbol(&self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Pow => '^',
        }
    }

    fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
        }
    }
}

/// Parsed equation template
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Pi,
    /// Named parameter, not yet bound
    Parameter(String),
    /// The symbol being solved for
    Unknown,
    Negate(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    /// Parse a template
    pub fn parse(input: &str) -> Result<Expr> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(Error::Expression(format!(
                "unexpected {} after end of expression in '{}'",
                token, input
            ))),
        }
    }

    /// Distinct parameter names in order of first appearance
    pub fn parameters(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit(&mut |expr| {
            if let Expr::Parameter(name) = expr {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        });
        names
    }

    /// How many times a parameter is referenced
    pub fn occurrences(&self, name: &str) -> usize {
        let mut count = 0;
        self.visit(&mut |expr| {
            if matches!(expr, Expr::Parameter(n) if n == name) {
                count += 1;
            }
        });
        count
    }

    fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Negate(inner) => inner.visit(f),
            Expr::Binary(_, lhs, rhs) => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Call(_, args) => args.iter().for_each(|arg| arg.visit(f)),
            Expr::Number(_) | Expr::Pi | Expr::Parameter(_) | Expr::Unknown => {}
        }
    }

    /// Replace `unknown` by the solve symbol and every other parameter by its
    /// value
    ///
    /// Fails if `lookup` has no value for a referenced parameter.
    pub fn bind(&self, unknown: &str, lookup: &impl Fn(&str) -> Option<f64>) -> Result<Expr> {
        Ok(match self {
            Expr::Parameter(name) if name == unknown => Expr::Unknown,
            Expr::Parameter(name) => match lookup(name) {
                Some(value) => Expr::Number(value),
                None => {
                    return Err(Error::Expression(format!(
                        "no numeric value for parameter '{}'",
                        name
                    )))
                }
            },
            Expr::Negate(inner) => Expr::Negate(Box::new(inner.bind(unknown, lookup)?)),
            Expr::Binary(op, lhs, rhs) => Expr::Binary(
                *op,
                Box::new(lhs.bind(unknown, lookup)?),
                Box::new(rhs.bind(unknown, lookup)?),
            ),
            Expr::Call(function, args) => Expr::Call(
                *function,
                args.iter()
                    .map(|arg| arg.bind(unknown, lookup))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Expr::Number(_) | Expr::Pi | Expr::Unknown => self.clone(),
        })
    }

    /// Evaluate with the solve symbol set to `x`
    ///
    /// Unbound parameters evaluate to NaN, as do square roots of negative
    /// numbers; the root finder skips such samples.
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Number(value) => *value,
            Expr::Pi => std::f64::consts::PI,
            Expr::Parameter(_) => f64::NAN,
            Expr::Unknown => x,
            Expr::Negate(inner) => -inner.eval(x),
            Expr::Binary(op, lhs, rhs) => op.apply(lhs.eval(x), rhs.eval(x)),
            Expr::Call(function, args) => {
                let values: Vec<f64> = args.iter().map(|arg| arg.eval(x)).collect();
                function.apply(&values)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Pi => write!(f, "{}", PI_NAME),
            Expr::Parameter(name) => write!(f, "{{{}}}", name),
            Expr::Unknown => write!(f, "x"),
            Expr::Negate(inner) => write!(f, "-({})", inner),
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Call(function, args) => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Parameter(String),
    Ident(String),
    Symbol(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "number {}", value),
            Token::Parameter(name) => write!(f, "parameter {{{}}}", name),
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Symbol(c) => write!(f, "'{}'", c),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| Error::Expression(format!("invalid number '{}'", text)))?;
            tokens.push(Token::Number(value));
        } else if c == '{' {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|&c| c == '}')
                .map(|offset| start + offset)
                .ok_or_else(|| Error::Expression(format!("unclosed '{{' in '{}'", input)))?;
            let name: String = chars[start..end].iter().collect();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::Expression(format!("invalid parameter name '{}'", name)));
            }
            tokens.push(Token::Parameter(name));
            i = end + 1;
        } else if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if "+-*/^(),".contains(c) {
            tokens.push(Token::Symbol(c));
            i += 1;
        } else {
            return Err(Error::Expression(format!("unexpected character '{}' in '{}'", c, input)));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, symbol: char) -> Result<()> {
        if self.eat(symbol) {
            Ok(())
        } else {
            Err(Error::Expression(match self.peek() {
                Some(token) => format!("expected '{}', found {}", symbol, token),
                None => format!("expected '{}', found end of expression", symbol),
            }))
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat('+') {
                BinaryOp::Add
            } else if self.eat('-') {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat('*') {
                BinaryOp::Mul
            } else if self.eat('/') {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat('-') {
            Ok(Expr::Negate(Box::new(self.unary()?)))
        } else {
            self.power()
        }
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.primary()?;
        if self.eat('^') {
            let exponent = self.unary()?;
            Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
        } else {
            Ok(base)
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Parameter(name)) => Ok(Expr::Parameter(name)),
            Some(Token::Symbol('(')) => {
                let inner = self.expr()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if name == PI_NAME => Ok(Expr::Pi),
            Some(Token::Ident(name)) => {
                let (function, arity) = Function::lookup(&name)
                    .ok_or_else(|| Error::Expression(format!("unknown function '{}'", name)))?;
                self.expect('(')?;
                let mut args = vec![self.expr()?];
                while self.eat(',') {
                    args.push(self.expr()?);
                }
                self.expect(')')?;
                if args.len() != arity {
                    return Err(Error::Expression(format!(
                        "{} takes {} argument(s), got {}",
                        name,
                        arity,
                        args.len()
                    )));
                }
                Ok(Expr::Call(function, args))
            }
            Some(token) => Err(Error::Expression(format!("unexpected {}", token))),
            None => Err(Error::Expression("unexpected end of expression".to_string())),
        }
    }
}
