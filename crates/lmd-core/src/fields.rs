//! Template field resolution and field tracking.
//!
//! [`FieldResolver`] scans a text run for `{{expression}}` fields and bare
//! `@today` tokens and produces a sequence of [`Piece`]s. Unresolved fields
//! are rendered back as their original `{{...}}` text. When tracking spans
//! are requested every field, resolved or not, is wrapped in a
//! `<span class="legal-field ...">` marker.

use serde::Serialize;
use serde_json::Value;

use crate::condition;
use crate::dates::{TODAY_PATTERN, TodayToken};
use crate::expr::{self, Expr};
use crate::helpers::{Helper, HelperEnv, HelperError};
use crate::metadata::{Metadata, display_value, is_truthy};

/// Closing tag of a tracking span.
pub const SPAN_CLOSE: &str = "</span>";

const SPAN_PREFIX: &str = "<span class=\"legal-field";

/// Resolution state of a tracked field, also its CSS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldStatus {
    /// Resolved by plain lookup.
    ImportedValue,
    /// Resolved through a helper, formula, date token or loop.
    Highlight,
    /// Not resolved.
    MissingValue,
}

impl FieldStatus {
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            FieldStatus::ImportedValue => "imported-value",
            FieldStatus::Highlight => "highlight",
            FieldStatus::MissingValue => "missing-value",
        }
    }

    fn of(value: Option<&str>, has_logic: bool) -> Self {
        match (value, has_logic) {
            (None, _) => FieldStatus::MissingValue,
            (Some(_), true) => FieldStatus::Highlight,
            (Some(_), false) => FieldStatus::ImportedValue,
        }
    }
}

/// One tracked field occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedField {
    pub field_name: String,
    pub value: Option<String>,
    #[serde(skip)]
    pub original_text: String,
    pub has_logic: bool,
    pub status: FieldStatus,
}

/// Fields seen during a run, keyed by field name in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTracker {
    fields: Vec<TrackedField>,
}

impl FieldTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field; a later record for the same name replaces the earlier.
    pub fn record(&mut self, field: TrackedField) {
        match self
            .fields
            .iter_mut()
            .find(|f| f.field_name == field.field_name)
        {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[TrackedField] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, field_name: &str) -> Option<&TrackedField> {
        self.fields.iter().find(|f| f.field_name == field_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON array suitable for the `_field_mappings` metadata key.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.fields).unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<TrackedField> {
        self.fields
    }
}

/// Output fragment of a resolved text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Plain text, escaped by renderers.
    Text(String),
    /// Markup emitted verbatim.
    Markup(String),
}

/// Opening tag of a tracking span.
#[must_use]
pub fn span_open(field_name: &str, status: FieldStatus) -> String {
    format!(
        "{SPAN_PREFIX} {}\" data-field=\"{}\">",
        status.css_class(),
        escape_attr(field_name)
    )
}

/// Whether `markup` opens a tracking span.
#[must_use]
pub fn is_span_open(markup: &str) -> bool {
    markup.starts_with(SPAN_PREFIX)
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Whether `text` may contain anything the resolver would rewrite.
#[must_use]
pub fn contains_fields(text: &str) -> bool {
    text.contains("{{") || text.contains("@today")
}

/// Result of evaluating one field expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub value: Option<String>,
    pub has_logic: bool,
}

/// Resolves fields against one metadata scope.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    scope: &'a Metadata,
    env: HelperEnv,
    spans: bool,
    in_loop: bool,
    escape: Option<fn(&str) -> String>,
}

impl<'a> FieldResolver<'a> {
    #[must_use]
    pub fn new(scope: &'a Metadata, env: HelperEnv) -> Self {
        Self {
            scope,
            env,
            spans: false,
            in_loop: false,
            escape: None,
        }
    }

    /// Wrap every field in a tracking span.
    #[must_use]
    pub fn with_spans(mut self, spans: bool) -> Self {
        self.spans = spans;
        self
    }

    /// Mark resolutions as loop-derived, which tracks them as computed.
    #[must_use]
    pub fn in_loop(mut self, in_loop: bool) -> Self {
        self.in_loop = in_loop;
        self
    }

    /// Pass resolved values through `escape` before emitting them.
    #[must_use]
    pub fn with_value_escape(mut self, escape: fn(&str) -> String) -> Self {
        self.escape = Some(escape);
        self
    }

    /// Evaluate one field expression (the text between the braces).
    #[must_use]
    pub fn resolve_expression(&self, source: &str) -> Resolution {
        let source = source.trim();
        if let Some(token) = TodayToken::parse(source) {
            return Resolution {
                value: token.render(self.env.today, self.env.locale),
                has_logic: true,
            };
        }
        let expr = match expr::parse(source) {
            Ok(expr) => expr,
            Err(e) => {
                tracing::debug!(field = %source, error = %e, "Unparseable field");
                return Resolution {
                    value: None,
                    has_logic: false,
                };
            }
        };
        let has_logic = self.in_loop || expr.has_logic();
        match self.eval(&expr) {
            Ok(value) => Resolution {
                value: display_value(&value),
                has_logic,
            },
            Err(e) => {
                tracing::warn!(field = %source, error = %e, "Field evaluation failed");
                Resolution {
                    value: None,
                    has_logic,
                }
            }
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value, HelperError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(segments) => {
                if let Some(value) = self.scope.get_segments(segments) {
                    return Ok(value.clone());
                }
                let name = expr.path_name().unwrap_or_default();
                if name == "@today" {
                    return Ok(Value::String(self.env.today.format("%Y-%m-%d").to_string()));
                }
                Ok(self.scope.get(&name).cloned().unwrap_or(Value::Null))
            }
            Expr::Call { name, args } => {
                let helper =
                    Helper::from_name(name).ok_or_else(|| HelperError::Unknown(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                helper.call(&args, &self.env)
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if is_truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Compare { op, lhs, rhs } => Ok(Value::Bool(condition::compare(
                *op,
                &self.eval(lhs)?,
                &self.eval(rhs)?,
            ))),
            Expr::And(lhs, rhs) => Ok(Value::Bool(
                is_truthy(&self.eval(lhs)?) && is_truthy(&self.eval(rhs)?),
            )),
            Expr::Or(lhs, rhs) => Ok(Value::Bool(
                is_truthy(&self.eval(lhs)?) || is_truthy(&self.eval(rhs)?),
            )),
            Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&self.eval(inner)?))),
        }
    }

    /// Resolve every field in `text`, recording each in `tracker`.
    ///
    /// Block markers (`{{#...}}`, `{{/...}}`, `{{else}}`) and everything
    /// between an opening and its closing marker are left untouched.
    pub fn resolve_text(&self, text: &str, tracker: &mut FieldTracker) -> Vec<Piece> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut depth = 0usize;
        let mut pos = 0;

        while pos < text.len() {
            let next_field = text[pos..].find("{{").map(|off| pos + off);
            let next_today = if depth == 0 {
                find_bare_today(text, pos)
            } else {
                None
            };

            match (next_field, next_today) {
                (Some(start), today) if today.is_none_or(|(t, _)| start < t) => {
                    let Some(close) = text[start + 2..].find("}}").map(|off| start + 2 + off) else {
                        break;
                    };
                    let end = close + 2;
                    let inner = &text[start + 2..close];
                    literal.push_str(&text[pos..start]);
                    let marker = inner.trim();
                    if marker.starts_with('#') {
                        depth += 1;
                        literal.push_str(&text[start..end]);
                    } else if marker.starts_with('/') {
                        depth = depth.saturating_sub(1);
                        literal.push_str(&text[start..end]);
                    } else if depth > 0 || marker == "else" {
                        literal.push_str(&text[start..end]);
                    } else {
                        let resolution = self.resolve_expression(inner);
                        self.emit(
                            marker,
                            &text[start..end],
                            resolution,
                            tracker,
                            &mut literal,
                            &mut pieces,
                        );
                    }
                    pos = end;
                }
                (_, Some((start, end))) => {
                    literal.push_str(&text[pos..start]);
                    let token = &text[start..end];
                    let resolution = self.resolve_expression(token);
                    self.emit(token, token, resolution, tracker, &mut literal, &mut pieces);
                    pos = end;
                }
                _ => break,
            }
        }

        literal.push_str(&text[pos..]);
        if !literal.is_empty() {
            pieces.push(Piece::Text(literal));
        }
        pieces
    }

    fn emit(
        &self,
        field_name: &str,
        original: &str,
        resolution: Resolution,
        tracker: &mut FieldTracker,
        literal: &mut String,
        pieces: &mut Vec<Piece>,
    ) {
        let status = FieldStatus::of(resolution.value.as_deref(), resolution.has_logic);
        let shown = match (&resolution.value, self.escape) {
            (Some(value), Some(escape)) => escape(value),
            (Some(value), None) => value.clone(),
            (None, _) => original.to_owned(),
        };
        tracker.record(TrackedField {
            field_name: field_name.to_owned(),
            value: resolution.value,
            original_text: original.to_owned(),
            has_logic: resolution.has_logic,
            status,
        });

        if self.spans {
            if !literal.is_empty() {
                pieces.push(Piece::Text(std::mem::take(literal)));
            }
            pieces.push(Piece::Markup(span_open(field_name, status)));
            pieces.push(Piece::Text(shown));
            pieces.push(Piece::Markup(SPAN_CLOSE.to_owned()));
        } else {
            literal.push_str(&shown);
        }
    }

    /// Resolve `text` to a plain string, dropping span markup.
    #[must_use]
    pub fn resolve_plain(&self, text: &str) -> String {
        let mut tracker = FieldTracker::new();
        self.without_spans()
            .resolve_text(text, &mut tracker)
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(t) | Piece::Markup(t) => t,
            })
            .collect()
    }

    fn without_spans(self) -> Self {
        Self {
            spans: false,
            ..self
        }
    }
}

/// Next bare `@today` token at or after `from`, as a byte range.
///
/// Tokens glued to a preceding word character (`x@today`) or followed by one
/// (`@todays`) are ignored.
fn find_bare_today(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut search = from;
    while let Some(caps) = TODAY_PATTERN.captures_at(text, search) {
        let m = caps.get(0)?;
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        let glued_before = before.is_some_and(|c| c.is_alphanumeric() || c == '_');
        let glued_after = after.is_some_and(|c| c.is_alphanumeric() || c == '_');
        if !glued_before && !glued_after {
            return Some((m.start(), m.end()));
        }
        search = m.end();
    }
    None
}
