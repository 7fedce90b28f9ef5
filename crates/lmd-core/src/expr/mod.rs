//! Expression language shared by template fields and conditions.
//!
//! Source text is tokenized by [`lexer`] and parsed into an [`Expr`] tree by
//! [`parser`]. Evaluation lives with the callers: the condition evaluator
//! accepts only the boolean subset while the field resolver also evaluates
//! helper calls and ternaries.

mod lexer;
mod parser;

use serde_json::Value;

use crate::metadata::PathSegment;

pub use lexer::CmpOp;
pub use parser::parse;

/// Errors raised while tokenizing or parsing an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at offset {pos}")]
    UnterminatedString { pos: usize },

    #[error("invalid number at offset {pos}")]
    InvalidNumber { pos: usize },

    #[error("expected {expected} at offset {pos}")]
    Expected { expected: &'static str, pos: usize },

    #[error("expected {expected}, found end of expression")]
    UnexpectedEnd { expected: &'static str },

    #[error("empty expression")]
    Empty,
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String, number, boolean or null literal.
    Literal(Value),
    /// Metadata lookup such as `client.name` or `parties[0].name`.
    Path(Vec<PathSegment>),
    /// Helper call: `name(arg, ...)`.
    Call { name: String, args: Vec<Expr> },
    /// `cond ? then : otherwise`.
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Whether evaluating this expression involves more than a plain lookup.
    ///
    /// Used by field tracking to tell imported values from computed ones.
    #[must_use]
    pub fn has_logic(&self) -> bool {
        !matches!(self, Expr::Path(_) | Expr::Literal(_))
    }

    /// Dotted form of a path expression, or `None` for anything else.
    #[must_use]
    pub fn path_name(&self) -> Option<String> {
        let Expr::Path(segments) = self else {
            return None;
        };
        let mut out = String::new();
        for segment in segments {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        Some(out)
    }
}
