//! Tokenizer for template and condition expressions.

use super::ExprError;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    /// Source form of the operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    // Literals
    Number(f64),
    Str(String),
    True,
    False,
    Null,

    Ident(String),

    // Operators
    Cmp(CmpOp),
    AmpAmp,
    PipePipe,
    Bang,
    Question,
    Colon,
    Comma,
    Dot,

    // Grouping
    LParen,
    RParen,
    LBracket,
    RBracket,
}

/// Split `source` into tokens, with the byte offset of each.
pub(crate) fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                pos += 1;
            }
            b'(' => {
                tokens.push((Token::LParen, start));
                pos += 1;
            }
            b')' => {
                tokens.push((Token::RParen, start));
                pos += 1;
            }
            b'[' => {
                tokens.push((Token::LBracket, start));
                pos += 1;
            }
            b']' => {
                tokens.push((Token::RBracket, start));
                pos += 1;
            }
            b',' => {
                tokens.push((Token::Comma, start));
                pos += 1;
            }
            b'.' => {
                tokens.push((Token::Dot, start));
                pos += 1;
            }
            b'?' => {
                tokens.push((Token::Question, start));
                pos += 1;
            }
            b':' => {
                tokens.push((Token::Colon, start));
                pos += 1;
            }
            b'&' if bytes.get(pos + 1) == Some(&b'&') => {
                tokens.push((Token::AmpAmp, start));
                pos += 2;
            }
            b'|' if bytes.get(pos + 1) == Some(&b'|') => {
                tokens.push((Token::PipePipe, start));
                pos += 2;
            }
            b'=' if bytes.get(pos + 1) == Some(&b'=') => {
                // `===` is accepted as `==`
                pos += if bytes.get(pos + 2) == Some(&b'=') { 3 } else { 2 };
                tokens.push((Token::Cmp(CmpOp::Eq), start));
            }
            b'!' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += if bytes.get(pos + 2) == Some(&b'=') { 3 } else { 2 };
                tokens.push((Token::Cmp(CmpOp::Ne), start));
            }
            b'!' => {
                tokens.push((Token::Bang, start));
                pos += 1;
            }
            b'>' | b'<' => {
                let or_equal = bytes.get(pos + 1) == Some(&b'=');
                let op = match (c, or_equal) {
                    (b'>', true) => CmpOp::Ge,
                    (b'>', false) => CmpOp::Gt,
                    (_, true) => CmpOp::Le,
                    (_, false) => CmpOp::Lt,
                };
                tokens.push((Token::Cmp(op), start));
                pos += if or_equal { 2 } else { 1 };
            }
            b'"' | b'\'' => {
                let (value, next) = read_string(source, pos)?;
                tokens.push((Token::Str(value), start));
                pos = next;
            }
            b'0'..=b'9' => {
                let (value, next) = read_number(source, pos)?;
                tokens.push((Token::Number(value), start));
                pos = next;
            }
            b'-' if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                let (value, next) = read_number(source, pos + 1)?;
                tokens.push((Token::Number(-value), start));
                pos = next;
            }
            _ if is_ident_start(c) => {
                let end = source[pos..]
                    .bytes()
                    .position(|b| !is_ident_continue(b))
                    .map_or(source.len(), |off| pos + off);
                let word = &source[pos..end];
                let token = match word {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "undefined" => Token::Null,
                    _ => Token::Ident(word.to_owned()),
                };
                tokens.push((token, start));
                pos = end;
            }
            _ => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(ExprError::UnexpectedChar { ch, pos });
            }
        }
    }

    Ok(tokens)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'@' || b == b'$' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'$' || b >= 0x80
}

/// Read a quoted string starting at the opening quote.
///
/// Returns the unescaped value and the offset after the closing quote.
fn read_string(source: &str, start: usize) -> Result<(String, usize), ExprError> {
    let quote = source.as_bytes()[start];
    let mut value = String::new();
    let mut chars = source[start + 1..].char_indices();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            c if c == char::from(quote) => {
                return Ok((value, start + 1 + offset + 1));
            }
            c => value.push(c),
        }
    }

    Err(ExprError::UnterminatedString { pos: start })
}

/// Read an unsigned decimal number.
///
/// A `.` is only consumed when a digit follows, so `items.0.name` keeps
/// its dots as path separators.
fn read_number(source: &str, start: usize) -> Result<(f64, usize), ExprError> {
    let bytes = source.as_bytes();
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    source[start..end]
        .parse::<f64>()
        .map(|value| (value, end))
        .map_err(|_| ExprError::InvalidNumber { pos: start })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_call_with_string_and_number() {
        assert_eq!(
            kinds(r#"formatPercent(0.055, "x,y")"#),
            vec![
                Token::Ident("formatPercent".to_owned()),
                Token::LParen,
                Token::Number(0.055),
                Token::Comma,
                Token::Str("x,y".to_owned()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(
            kinds("a.b >= 10 && c != 'x' || !d"),
            vec![
                Token::Ident("a".to_owned()),
                Token::Dot,
                Token::Ident("b".to_owned()),
                Token::Cmp(CmpOp::Ge),
                Token::Number(10.0),
                Token::AmpAmp,
                Token::Ident("c".to_owned()),
                Token::Cmp(CmpOp::Ne),
                Token::Str("x".to_owned()),
                Token::PipePipe,
                Token::Bang,
                Token::Ident("d".to_owned()),
            ]
        );
    }

    #[test]
    fn test_path_index_keeps_dots() {
        assert_eq!(
            kinds("items.0.name"),
            vec![
                Token::Ident("items".to_owned()),
                Token::Dot,
                Token::Number(0.0),
                Token::Dot,
                Token::Ident("name".to_owned()),
            ]
        );
    }

    #[test]
    fn test_hyphenated_identifier_and_negative_number() {
        assert_eq!(
            kinds("level-one -5"),
            vec![Token::Ident("level-one".to_owned()), Token::Number(-5.0)]
        );
    }

    #[test]
    fn test_escaped_quote() {
        assert_eq!(kinds(r"'it\'s'"), vec![Token::Str("it's".to_owned())]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            tokenize("'open"),
            Err(ExprError::UnterminatedString { pos: 0 })
        ));
        assert!(matches!(
            tokenize("a + b"),
            Err(ExprError::UnexpectedChar { ch: '+', .. })
        ));
    }
}
