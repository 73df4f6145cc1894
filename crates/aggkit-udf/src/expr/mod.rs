//! Expressions and predicates embedded in an aggregation descriptor.
//!
//! The language is the expression subset of Lua 5.1 that descriptors use:
//! literals, `rec['bin']` / `rec.bin` access, arithmetic, concatenation,
//! comparisons and the short-circuit `and` / `or` / `not`. The only bound
//! name is `rec`, the record being aggregated; any other name is `nil`, as an
//! undefined global would be.

mod eval;
mod lexer;
mod parser;

use aggkit_core::Value;

use crate::error::UdfError;

pub use eval::{compare, numeric_add};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Literal(Value),
    Name(String),
    Index(Box<Node>, Box<Node>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// A compiled expression, ready to evaluate against many records.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    source: String,
    root: Node,
}

impl Expr {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `rec` bound to `record`.
    pub fn eval(&self, record: &Value) -> Result<Value, UdfError> {
        eval::eval(&self.root, record)
            .map(|v| v.into_owned())
            .map_err(|e| match e {
                UdfError::Runtime(msg) => {
                    UdfError::Runtime(format!("{msg} (in `{}`)", self.source))
                }
                other => other,
            })
    }
}

pub fn compile(source: &str) -> Result<Expr, UdfError> {
    let tokens = lexer::tokenize(source)?;
    let root = parser::Parser::new(tokens).parse()?;
    Ok(Expr {
        source: source.to_string(),
        root,
    })
}
