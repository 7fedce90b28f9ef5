//! Recursive-descent parser producing [`Expr`] trees.
//!
//! Precedence, loosest first: ternary, `||`, `&&`, `!`, comparison, primary.

use serde_json::Value;

use super::lexer::{Token, tokenize};
use super::{Expr, ExprError};
use crate::metadata::{PathSegment, number_value};

/// Parse `source` into an expression tree.
///
/// # Errors
///
/// Returns [`ExprError`] when the source cannot be tokenized, is empty, or
/// has trailing tokens after a complete expression.
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if !parser.at_end() {
        return Err(parser.error("end of expression"));
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Parser state
// ---------------------------------------------------------------------------

struct ExprParser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, name: &'static str) -> Result<(), ExprError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(name))
        }
    }

    fn error(&self, expected: &'static str) -> ExprError {
        match self.tokens.get(self.pos) {
            Some((_, pos)) => ExprError::Expected {
                expected,
                pos: *pos,
            },
            None => ExprError::UnexpectedEnd { expected },
        }
    }

    // -----------------------------------------------------------------------
    // Grammar
    // -----------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.parse_expr()?;
        self.expect(&Token::Colon, "':'")?;
        let otherwise = self.parse_expr()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::PipePipe) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::AmpAmp) {
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Bang) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_primary()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.parse_primary()?;
            return Ok(Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let Some(token) = self.advance() else {
            return Err(ExprError::UnexpectedEnd {
                expected: "a value",
            });
        };
        match token {
            Token::Number(n) => Ok(Expr::Literal(number_value(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.parse_args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    self.parse_path(name)
                }
            }
            _ => {
                self.pos -= 1;
                Err(self.error("a value"))
            }
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma, "',' or ')'")?;
        }
    }

    fn parse_path(&mut self, first: String) -> Result<Expr, ExprError> {
        let mut segments = vec![PathSegment::Key(first)];
        loop {
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Token::Ident(key)) => segments.push(PathSegment::Key(key)),
                    Some(Token::Number(n)) => segments.push(PathSegment::Index(as_index(n).ok_or(
                        ExprError::Expected {
                            expected: "an array index",
                            pos: self.tokens[self.pos - 1].1,
                        },
                    )?)),
                    Some(_) => {
                        self.pos -= 1;
                        return Err(self.error("a property name"));
                    }
                    None => {
                        return Err(ExprError::UnexpectedEnd {
                            expected: "a property name",
                        });
                    }
                }
            } else if self.eat(&Token::LBracket) {
                match self.advance() {
                    Some(Token::Number(n)) => match as_index(n) {
                        Some(index) => segments.push(PathSegment::Index(index)),
                        None => {
                            self.pos -= 1;
                            return Err(self.error("an array index"));
                        }
                    },
                    Some(Token::Str(key)) => segments.push(PathSegment::Key(key)),
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        return Err(self.error("an index or quoted key"));
                    }
                }
                self.expect(&Token::RBracket, "']'")?;
            } else {
                return Ok(Expr::Path(segments));
            }
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
fn as_index(n: f64) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::CmpOp;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path(parts: &[&str]) -> Expr {
        Expr::Path(
            parts
                .iter()
                .map(|p| PathSegment::Key((*p).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn test_dotted_path() {
        assert_eq!(parse("client.name").unwrap(), path(&["client", "name"]));
    }

    #[test]
    fn test_indexed_path() {
        assert_eq!(
            parse("parties[1].name").unwrap(),
            Expr::Path(vec![
                PathSegment::Key("parties".to_owned()),
                PathSegment::Index(1),
                PathSegment::Key("name".to_owned()),
            ])
        );
    }

    #[test]
    fn test_nested_call_with_quoted_comma() {
        let expr = parse(r#"f(g(a, b), "x,y")"#).unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "f".to_owned(),
                args: vec![
                    Expr::Call {
                        name: "g".to_owned(),
                        args: vec![path(&["a"]), path(&["b"])],
                    },
                    Expr::Literal(json!("x,y")),
                ],
            }
        );
    }

    #[test]
    fn test_ternary() {
        let expr = parse("premium ? 'Gold' : \"Basic\"").unwrap();
        assert_eq!(
            expr,
            Expr::Ternary {
                cond: Box::new(path(&["premium"])),
                then: Box::new(Expr::Literal(json!("Gold"))),
                otherwise: Box::new(Expr::Literal(json!("Basic"))),
            }
        );
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let expr = parse("a || b && c == 1").unwrap();
        let Expr::Or(lhs, rhs) = expr else {
            panic!("expected Or");
        };
        assert_eq!(*lhs, path(&["a"]));
        let Expr::And(_, cmp) = *rhs else {
            panic!("expected And");
        };
        assert!(matches!(*cmp, Expr::Compare { op: CmpOp::Eq, .. }));
    }

    #[test]
    fn test_whole_numbers_are_integers() {
        assert_eq!(parse("3").unwrap(), Expr::Literal(json!(3)));
        assert_eq!(parse("0.055").unwrap(), Expr::Literal(json!(0.055)));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(""), Err(ExprError::Empty));
        assert!(matches!(
            parse("f(a"),
            Err(ExprError::UnexpectedEnd { .. })
        ));
        assert!(matches!(parse("a b"), Err(ExprError::Expected { .. })));
        assert!(matches!(parse("a ? b"), Err(ExprError::UnexpectedEnd { .. })));
    }

    #[test]
    fn test_path_name_and_logic() {
        let expr = parse("parties[0].name").unwrap();
        assert_eq!(expr.path_name().as_deref(), Some("parties[0].name"));
        assert!(!expr.has_logic());
        assert!(parse("upper(name)").unwrap().has_logic());
    }
}
