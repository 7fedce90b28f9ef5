//! Restricted boolean evaluator for clause conditions.
//!
//! Supports `||` over `&&` over atoms, where an atom is a comparison, a bare
//! path truthiness check or a literal. Anything else (helper calls,
//! ternaries, grouping) is rejected. Rejections evaluate to `false` through
//! [`evaluate`]; callers wanting a different policy use [`try_evaluate`].

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::expr::{self, CmpOp, Expr, ExprError};
use crate::metadata::{Metadata, is_truthy};

static ALLOWED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[A-Za-z0-9_\s.\-@$"'=!<>&|?:\[\]]*$"#).expect("invalid allow-list regex")
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*/?\s*[A-Za-z][^<>]*>").expect("invalid tag regex"));

const DENIED_WORDS: &[&str] = &["script", "eval", "function", "constructor", "prototype"];

/// Why a condition could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition contains disallowed content: {0}")]
    Unsafe(String),

    #[error("invalid condition: {0}")]
    Parse(#[from] ExprError),

    #[error("unsupported construct in condition: {0}")]
    Unsupported(&'static str),
}

/// Check `source` against the allow-list, deny-list and tag filters.
///
/// # Errors
///
/// Returns [`ConditionError::Unsafe`] naming the first failing filter.
pub fn check_safety(source: &str) -> Result<(), ConditionError> {
    if !ALLOWED_CHARS.is_match(source) {
        return Err(ConditionError::Unsafe("characters outside the allowed set".to_owned()));
    }
    let lower = source.to_ascii_lowercase();
    if let Some(word) = DENIED_WORDS.iter().find(|w| lower.contains(*w)) {
        return Err(ConditionError::Unsafe(format!("keyword '{word}'")));
    }
    if HTML_TAG.is_match(source) {
        return Err(ConditionError::Unsafe("markup tag".to_owned()));
    }
    Ok(())
}

/// Evaluate a condition, reporting why it could not be evaluated.
///
/// # Errors
///
/// Returns [`ConditionError`] if the source is unsafe, does not parse, or
/// uses constructs outside the condition grammar.
pub fn try_evaluate(source: &str, scope: &Metadata) -> Result<bool, ConditionError> {
    check_safety(source)?;
    let expr = expr::parse(source.trim())?;
    eval_bool(&expr, scope)
}

/// Evaluate a condition; rejected or malformed conditions are `false`.
#[must_use]
pub fn evaluate(source: &str, scope: &Metadata) -> bool {
    match try_evaluate(source, scope) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(condition = %source, error = %e, "Condition rejected");
            false
        }
    }
}

fn eval_bool(expr: &Expr, scope: &Metadata) -> Result<bool, ConditionError> {
    match expr {
        Expr::Or(lhs, rhs) => Ok(eval_bool(lhs, scope)? || eval_bool(rhs, scope)?),
        Expr::And(lhs, rhs) => Ok(eval_bool(lhs, scope)? && eval_bool(rhs, scope)?),
        Expr::Not(inner) => Ok(!eval_bool(inner, scope)?),
        Expr::Compare { op, lhs, rhs } => {
            let lhs = operand(lhs, scope)?;
            let rhs = operand(rhs, scope)?;
            Ok(compare(*op, &lhs, &rhs))
        }
        Expr::Path(_) | Expr::Literal(_) => Ok(is_truthy(&operand(expr, scope)?)),
        Expr::Call { .. } => Err(ConditionError::Unsupported("function call")),
        Expr::Ternary { .. } => Err(ConditionError::Unsupported("ternary")),
    }
}

fn operand(expr: &Expr, scope: &Metadata) -> Result<Value, ConditionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(segments) => Ok(scope.get_segments(segments).cloned().unwrap_or(Value::Null)),
        _ => Err(ConditionError::Unsupported("nested expression as operand")),
    }
}

/// Compare two values with loose numeric coercion.
///
/// Numbers compare with numeric strings by value; ordering between
/// non-numeric strings is lexicographic; any other ordering is false.
#[must_use]
pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => loose_eq(lhs, rhs),
        CmpOp::Ne => !loose_eq(lhs, rhs),
        CmpOp::Gt => ordering(lhs, rhs) == Some(Ordering::Greater),
        CmpOp::Lt => ordering(lhs, rhs) == Some(Ordering::Less),
        CmpOp::Ge => matches!(ordering(lhs, rhs), Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::Le => matches!(ordering(lhs, rhs), Some(Ordering::Less | Ordering::Equal)),
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((as_number(lhs), as_number(rhs)), (Some(a), Some(b)) if (a - b).abs() < f64::EPSILON)
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s.trim() == b.to_string()
        }
        _ => lhs == rhs,
    }
}

fn ordering(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return a.partial_cmp(&b);
    }
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Metadata {
        Metadata::from_value(json!({
            "hasWarranty": false,
            "premium": true,
            "tier": "gold",
            "amount": 1500,
            "limit": "1000",
            "client": { "type": "corporate", "employees": 0 },
            "items": [],
            "tags": ["a"],
        }))
    }

    #[test]
    fn test_truthiness_atoms() {
        let s = scope();
        assert!(evaluate("premium", &s));
        assert!(!evaluate("hasWarranty", &s));
        assert!(!evaluate("missing", &s));
        assert!(!evaluate("client.employees", &s));
        assert!(!evaluate("items", &s));
        assert!(evaluate("tags", &s));
        assert!(evaluate("'text'", &s));
        assert!(!evaluate("''", &s));
    }

    #[test]
    fn test_comparisons() {
        let s = scope();
        assert!(evaluate("tier == 'gold'", &s));
        assert!(evaluate("tier === \"gold\"", &s));
        assert!(evaluate("client.type != 'individual'", &s));
        assert!(evaluate("amount > 1000", &s));
        assert!(evaluate("amount >= limit", &s));
        assert!(!evaluate("amount < 100", &s));
        assert!(evaluate("hasWarranty == false", &s));
        assert!(evaluate("amount == '1500'", &s));
    }

    #[test]
    fn test_logical_precedence() {
        let s = scope();
        assert!(evaluate("hasWarranty && premium || tier == 'gold'", &s));
        assert!(!evaluate("hasWarranty || premium && tier == 'silver'", &s));
        assert!(evaluate("!hasWarranty", &s));
    }

    #[test]
    fn test_unsafe_is_false() {
        let s = scope();
        assert!(!evaluate("constructor", &s));
        assert!(!evaluate("premium && <script>", &s));
        assert!(!evaluate("premium; alert(1)", &s));
        assert!(matches!(
            try_evaluate("eval(tier)", &s),
            Err(ConditionError::Unsafe(_))
        ));
    }

    #[test]
    fn test_unsupported_and_malformed() {
        let s = scope();
        assert!(matches!(
            try_evaluate("premium ? tier : amount", &s),
            Err(ConditionError::Unsupported(_))
        ));
        assert!(matches!(
            try_evaluate("tier ==", &s),
            Err(ConditionError::Parse(_))
        ));
        assert!(!evaluate("tier ==", &s));
    }
}
