use aggkit_core::Value;

use super::lexer::{Spanned, Token};
use super::{BinaryOp, Node, UnaryOp};
use crate::error::UdfError;

const UNARY_BP: u8 = 13;

/// Syntax levels allowed in one expression, the same bound Lua uses. Nesting,
/// operator chains and index suffixes all count. Evaluation recurses over the
/// tree, so this bounds it too.
pub(crate) const MAX_DEPTH: usize = 200;

enum Infix {
    Or,
    And,
    Binary(BinaryOp),
}

/// Binding powers, lowest first: `or`, `and`, comparisons, `..` (right),
/// `+ -`, `* / %`, unary, `^` (right).
fn infix(token: &Token) -> Option<(Infix, u8, u8)> {
    let entry = match token {
        Token::Or => (Infix::Or, 1, 2),
        Token::And => (Infix::And, 3, 4),
        Token::Eq => (Infix::Binary(BinaryOp::Eq), 5, 6),
        Token::Ne => (Infix::Binary(BinaryOp::Ne), 5, 6),
        Token::Lt => (Infix::Binary(BinaryOp::Lt), 5, 6),
        Token::Le => (Infix::Binary(BinaryOp::Le), 5, 6),
        Token::Gt => (Infix::Binary(BinaryOp::Gt), 5, 6),
        Token::Ge => (Infix::Binary(BinaryOp::Ge), 5, 6),
        Token::Concat => (Infix::Binary(BinaryOp::Concat), 7, 7),
        Token::Plus => (Infix::Binary(BinaryOp::Add), 9, 10),
        Token::Minus => (Infix::Binary(BinaryOp::Sub), 9, 10),
        Token::Star => (Infix::Binary(BinaryOp::Mul), 11, 12),
        Token::Slash => (Infix::Binary(BinaryOp::Div), 11, 12),
        Token::Percent => (Infix::Binary(BinaryOp::Mod), 11, 12),
        Token::Caret => (Infix::Binary(BinaryOp::Pow), 15, 14),
        _ => return None,
    };
    Some(entry)
}

pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<Node, UdfError> {
        if self.peek() == &Token::Eof {
            return Err(UdfError::syntax(0, "empty expression"));
        }
        let node = self.expression(0)?;
        match self.peek() {
            Token::Eof => Ok(node),
            other => Err(UdfError::syntax(
                self.offset(),
                format!("unexpected {other:?} after expression"),
            )),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), UdfError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(UdfError::syntax(
                self.offset(),
                format!("expected {expected:?}, found {:?}", self.peek()),
            ))
        }
    }

    /// One more level of tree depth; fails past [`MAX_DEPTH`].
    fn descend(&mut self) -> Result<(), UdfError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(UdfError::syntax(self.offset(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn expression(&mut self, min_bp: u8) -> Result<Node, UdfError> {
        self.descend()?;
        let mut levels = 1;
        let mut lhs = self.prefix()?;

        // Each fold wraps `lhs` in a new node, so left-leaning chains deepen
        // the tree as much as nesting does.
        while let Some((op, lbp, rbp)) = infix(self.peek()) {
            if lbp < min_bp {
                break;
            }
            self.advance();
            self.descend()?;
            levels += 1;
            let rhs = self.expression(rbp)?;
            lhs = match op {
                Infix::Or => Node::Or(Box::new(lhs), Box::new(rhs)),
                Infix::And => Node::And(Box::new(lhs), Box::new(rhs)),
                Infix::Binary(op) => Node::Binary(op, Box::new(lhs), Box::new(rhs)),
            };
        }

        self.depth -= levels;
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Node, UdfError> {
        let offset = self.offset();
        match self.advance() {
            Token::Not => {
                let operand = self.expression(UNARY_BP)?;
                Ok(Node::Unary(UnaryOp::Not, Box::new(operand)))
            }
            Token::Minus => {
                let operand = self.expression(UNARY_BP)?;
                Ok(Node::Unary(UnaryOp::Neg, Box::new(operand)))
            }
            Token::Nil => Ok(Node::Literal(Value::Nil)),
            Token::True => Ok(Node::Literal(Value::Bool(true))),
            Token::False => Ok(Node::Literal(Value::Bool(false))),
            Token::Number(n) => Ok(Node::Literal(n)),
            Token::Str(s) => Ok(Node::Literal(Value::String(s))),
            Token::Name(name) => self.suffixes(Node::Name(name)),
            Token::LParen => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                self.suffixes(inner)
            }
            Token::Eof => Err(UdfError::syntax(offset, "unexpected end of expression")),
            other => Err(UdfError::syntax(offset, format!("unexpected {other:?}"))),
        }
    }

    /// `[expr]` and `.name` indexing after a primary expression.
    fn suffixes(&mut self, mut node: Node) -> Result<Node, UdfError> {
        let mut levels = 0;
        loop {
            if matches!(self.peek(), Token::LBracket | Token::Dot) {
                self.descend()?;
                levels += 1;
            }
            match self.peek() {
                Token::LBracket => {
                    self.advance();
                    let key = self.expression(0)?;
                    self.expect(Token::RBracket)?;
                    node = Node::Index(Box::new(node), Box::new(key));
                }
                Token::Dot => {
                    self.advance();
                    let offset = self.offset();
                    match self.advance() {
                        Token::Name(field) => {
                            node = Node::Index(
                                Box::new(node),
                                Box::new(Node::Literal(Value::String(field))),
                            );
                        }
                        other => {
                            return Err(UdfError::syntax(
                                offset,
                                format!("expected field name after '.', found {other:?}"),
                            ));
                        }
                    }
                }
                _ => {
                    self.depth -= levels;
                    return Ok(node);
                }
            }
        }
    }
}
