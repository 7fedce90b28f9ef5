//! Built-in template helpers.
//!
//! Helpers form a closed set: names are looked up once in [`Helper::from_name`]
//! and unknown names are rejected there. Arguments arrive already evaluated.

use chrono::NaiveDate;
use serde_json::Value;

use crate::dates::{self, DateUnit, Locale};
use crate::metadata::{display_value, format_number, number_value};

/// Errors raised by a single helper call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HelperError {
    #[error("unknown helper '{0}'")]
    Unknown(String),

    #[error("{helper} expects {expected} argument(s), got {found}")]
    Arity {
        helper: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("{helper}: '{value}' is not a number")]
    NotANumber { helper: &'static str, value: String },

    #[error("{helper}: '{value}' is not a date")]
    NotADate { helper: &'static str, value: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{helper}: {value} exceeds the limit of {limit}")]
    OutOfRange {
        helper: &'static str,
        value: String,
        limit: usize,
    },
}

/// Largest width accepted by `padStart`, `padEnd` and `truncate`.
pub const MAX_WIDTH: usize = 10_000;

/// Largest number of decimals accepted by the number formatters.
pub const MAX_DECIMALS: usize = 20;

/// Ambient values helpers may read.
#[derive(Debug, Clone, Copy)]
pub struct HelperEnv {
    pub today: NaiveDate,
    pub locale: Locale,
}

/// A built-in helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    // Dates
    AddDays,
    AddMonths,
    AddYears,
    FormatDate,
    // Numbers
    FormatCurrency,
    FormatDollar,
    FormatEuro,
    FormatPound,
    FormatPercent,
    FormatInteger,
    NumberToWords,
    Round,
    // Strings
    TitleCase,
    Capitalize,
    Upper,
    Lower,
    Truncate,
    Clean,
    Pluralize,
    Initials,
    PadStart,
    PadEnd,
    Contains,
    ReplaceAll,
    CamelCase,
    KebabCase,
    SnakeCase,
    PascalCase,
    Concat,
    // Math
    Add,
    Subtract,
    Multiply,
    Divide,
}

const HELPERS: &[(&str, Helper)] = &[
    ("addDays", Helper::AddDays),
    ("addMonths", Helper::AddMonths),
    ("addYears", Helper::AddYears),
    ("formatDate", Helper::FormatDate),
    ("formatCurrency", Helper::FormatCurrency),
    ("formatDollar", Helper::FormatDollar),
    ("formatEuro", Helper::FormatEuro),
    ("formatPound", Helper::FormatPound),
    ("formatPercent", Helper::FormatPercent),
    ("formatInteger", Helper::FormatInteger),
    ("numberToWords", Helper::NumberToWords),
    ("round", Helper::Round),
    ("titleCase", Helper::TitleCase),
    ("capitalize", Helper::Capitalize),
    ("upper", Helper::Upper),
    ("lower", Helper::Lower),
    ("truncate", Helper::Truncate),
    ("clean", Helper::Clean),
    ("pluralize", Helper::Pluralize),
    ("initials", Helper::Initials),
    ("padStart", Helper::PadStart),
    ("padEnd", Helper::PadEnd),
    ("contains", Helper::Contains),
    ("replaceAll", Helper::ReplaceAll),
    ("camelCase", Helper::CamelCase),
    ("kebabCase", Helper::KebabCase),
    ("snakeCase", Helper::SnakeCase),
    ("pascalCase", Helper::PascalCase),
    ("concat", Helper::Concat),
    ("add", Helper::Add),
    ("subtract", Helper::Subtract),
    ("multiply", Helper::Multiply),
    ("divide", Helper::Divide),
];

impl Helper {
    /// Look up a helper by its template name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        HELPERS.iter().find(|(n, _)| *n == name).map(|(_, h)| *h)
    }

    /// Template name of this helper.
    #[must_use]
    pub fn name(self) -> &'static str {
        HELPERS
            .iter()
            .find(|(_, h)| *h == self)
            .map_or("?", |(n, _)| n)
    }

    /// Every helper name, in table order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        HELPERS.iter().map(|(n, _)| *n)
    }

    /// Invoke the helper.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError`] on wrong arity, non-numeric or non-date
    /// arguments, or division by zero.
    pub fn call(self, args: &[Value], env: &HelperEnv) -> Result<Value, HelperError> {
        let name = self.name();
        let call = Call { name, args };
        match self {
            Helper::AddDays => call.shift_date(DateUnit::Days, env),
            Helper::AddMonths => call.shift_date(DateUnit::Months, env),
            Helper::AddYears => call.shift_date(DateUnit::Years, env),
            Helper::FormatDate => {
                call.arity(1, 2, "1-2")?;
                let date = call.date(0, env)?;
                let format = call.opt_string(1).unwrap_or_else(|| dates::DEFAULT_FORMAT.to_owned());
                Ok(Value::String(dates::format_date(date, &format, env.locale)))
            }

            Helper::FormatCurrency => {
                call.arity(1, 3, "1-3")?;
                let code = call.opt_string(1).unwrap_or_else(|| "USD".to_owned());
                let decimals = call.opt_usize(2, MAX_DECIMALS)?.unwrap_or(2);
                Ok(Value::String(format_currency(call.number(0)?, &code, decimals)))
            }
            Helper::FormatDollar => call.currency("USD"),
            Helper::FormatEuro => call.currency("EUR"),
            Helper::FormatPound => call.currency("GBP"),
            Helper::FormatPercent => {
                call.arity(1, 2, "1-2")?;
                let decimals = call.opt_usize(1, MAX_DECIMALS)?.unwrap_or(2);
                let value = call.number(0)? * 100.0;
                Ok(Value::String(format!("{value:.decimals$}%")))
            }
            Helper::FormatInteger => {
                call.arity(1, 2, "1-2")?;
                let separator = call.opt_string(1).unwrap_or_else(|| ",".to_owned());
                let value = call.number(0)?.round();
                let digits = format!("{:.0}", value.abs());
                let sign = if value < 0.0 { "-" } else { "" };
                Ok(Value::String(format!("{sign}{}", group_thousands(&digits, &separator))))
            }
            Helper::NumberToWords => {
                call.arity(1, 1, "1")?;
                Ok(Value::String(number_to_words(call.number(0)?)))
            }
            Helper::Round => {
                call.arity(1, 2, "1-2")?;
                let decimals = call.opt_usize(1, MAX_DECIMALS)?.unwrap_or(0);
                let exponent = i32::try_from(decimals).map_err(|_| call.out_of_range(decimals, MAX_DECIMALS))?;
                let factor = 10f64.powi(exponent);
                Ok(number_value((call.number(0)? * factor).round() / factor))
            }

            Helper::TitleCase => call.map_string(|s| {
                s.split(' ')
                    .map(|w| capitalize(&w.to_lowercase()))
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
            Helper::Capitalize => call.map_string(capitalize),
            Helper::Upper => call.map_string(str::to_uppercase),
            Helper::Lower => call.map_string(str::to_lowercase),
            Helper::Truncate => {
                call.arity(2, 3, "2-3")?;
                let text = call.string(0);
                let max = call.opt_usize(1, MAX_WIDTH)?.unwrap_or(0);
                let suffix = call.opt_string(2).unwrap_or_else(|| "...".to_owned());
                if text.chars().count() <= max {
                    Ok(Value::String(text))
                } else {
                    let cut: String = text.chars().take(max).collect();
                    Ok(Value::String(format!("{}{suffix}", cut.trim_end())))
                }
            }
            Helper::Clean => call.map_string(|s| s.split_whitespace().collect::<Vec<_>>().join(" ")),
            Helper::Pluralize => {
                call.arity(2, 3, "2-3")?;
                let word = call.string(0);
                let count = call.number(1)?;
                if (count - 1.0).abs() < f64::EPSILON {
                    Ok(Value::String(word))
                } else {
                    Ok(Value::String(call.opt_string(2).unwrap_or_else(|| plural(&word))))
                }
            }
            Helper::Initials => call.map_string(|s| {
                s.split_whitespace()
                    .filter_map(|w| w.chars().next())
                    .flat_map(char::to_uppercase)
                    .collect()
            }),
            Helper::PadStart | Helper::PadEnd => {
                call.arity(2, 3, "2-3")?;
                let text = call.string(0);
                let width = call.opt_usize(1, MAX_WIDTH)?.unwrap_or(0);
                let fill = call.opt_string(2).unwrap_or_else(|| " ".to_owned());
                Ok(Value::String(pad(&text, width, &fill, self == Helper::PadStart)))
            }
            Helper::Contains => {
                call.arity(2, 2, "2")?;
                Ok(Value::Bool(call.string(0).contains(&call.string(1))))
            }
            Helper::ReplaceAll => {
                call.arity(3, 3, "3")?;
                let search = call.string(1);
                if search.is_empty() {
                    return Ok(Value::String(call.string(0)));
                }
                Ok(Value::String(call.string(0).replace(&search, &call.string(2))))
            }
            Helper::CamelCase => call.map_string(|s| join_words(s, Case::Camel)),
            Helper::KebabCase => call.map_string(|s| join_words(s, Case::Kebab)),
            Helper::SnakeCase => call.map_string(|s| join_words(s, Case::Snake)),
            Helper::PascalCase => call.map_string(|s| join_words(s, Case::Pascal)),
            Helper::Concat => Ok(Value::String(
                args.iter().filter_map(display_value).collect(),
            )),

            Helper::Add => call.arithmetic(|a, b| Ok(a + b)),
            Helper::Subtract => call.arithmetic(|a, b| Ok(a - b)),
            Helper::Multiply => call.arithmetic(|a, b| Ok(a * b)),
            Helper::Divide => call.arithmetic(|a, b| {
                if b == 0.0 {
                    Err(HelperError::DivisionByZero)
                } else {
                    Ok(a / b)
                }
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Argument access
// ---------------------------------------------------------------------------

struct Call<'a> {
    name: &'static str,
    args: &'a [Value],
}

impl Call<'_> {
    fn arity(&self, min: usize, max: usize, expected: &'static str) -> Result<(), HelperError> {
        if (min..=max).contains(&self.args.len()) {
            Ok(())
        } else {
            Err(HelperError::Arity {
                helper: self.name,
                expected,
                found: self.args.len(),
            })
        }
    }

    fn string(&self, index: usize) -> String {
        self.args
            .get(index)
            .and_then(display_value)
            .unwrap_or_default()
    }

    fn opt_string(&self, index: usize) -> Option<String> {
        self.args.get(index).and_then(display_value)
    }

    fn number(&self, index: usize) -> Result<f64, HelperError> {
        let value = self.args.get(index).unwrap_or(&Value::Null);
        to_number(value).ok_or_else(|| HelperError::NotANumber {
            helper: self.name,
            value: display_value(value).unwrap_or_default(),
        })
    }

    /// Optional non-negative count, rejected above `limit`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn opt_usize(&self, index: usize, limit: usize) -> Result<Option<usize>, HelperError> {
        match self.args.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => {
                let value = self.number(index)?;
                if value.is_nan() || value > limit as f64 {
                    return Err(HelperError::OutOfRange {
                        helper: self.name,
                        value: value.to_string(),
                        limit,
                    });
                }
                Ok(Some(value.max(0.0) as usize))
            }
        }
    }

    fn out_of_range(&self, value: usize, limit: usize) -> HelperError {
        HelperError::OutOfRange {
            helper: self.name,
            value: value.to_string(),
            limit,
        }
    }

    fn date(&self, index: usize, env: &HelperEnv) -> Result<NaiveDate, HelperError> {
        let text = self.string(index);
        if text == "@today" || text == "today" {
            return Ok(env.today);
        }
        dates::parse_date(&text).ok_or(HelperError::NotADate {
            helper: self.name,
            value: text,
        })
    }

    fn shift_date(&self, unit: DateUnit, env: &HelperEnv) -> Result<Value, HelperError> {
        self.arity(2, 2, "2")?;
        let date = self.date(0, env)?;
        #[allow(clippy::cast_possible_truncation)]
        let amount = self.number(1)?.trunc() as i64;
        let shifted = dates::add_offset(date, amount, unit).ok_or(HelperError::NotADate {
            helper: self.name,
            value: self.string(0),
        })?;
        Ok(Value::String(shifted.format("%Y-%m-%d").to_string()))
    }

    fn currency(&self, code: &str) -> Result<Value, HelperError> {
        self.arity(1, 2, "1-2")?;
        let decimals = self.opt_usize(1, MAX_DECIMALS)?.unwrap_or(2);
        Ok(Value::String(format_currency(self.number(0)?, code, decimals)))
    }

    fn map_string(&self, f: impl FnOnce(&str) -> String) -> Result<Value, HelperError> {
        self.arity(1, 1, "1")?;
        Ok(Value::String(f(&self.string(0))))
    }

    fn arithmetic(
        &self,
        op: impl FnOnce(f64, f64) -> Result<f64, HelperError>,
    ) -> Result<Value, HelperError> {
        self.arity(2, 2, "2")?;
        Ok(number_value(op(self.number(0)?, self.number(1)?)?))
    }
}

/// Numeric value of a number, numeric string (commas allowed) or boolean.
#[must_use]
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Currency symbol for an ISO code; unknown codes render as `CODE `.
#[must_use]
pub fn currency_symbol(code: &str) -> String {
    match code.to_ascii_uppercase().as_str() {
        "USD" => "$".to_owned(),
        "EUR" => "€".to_owned(),
        "GBP" => "£".to_owned(),
        "JPY" => "¥".to_owned(),
        other => format!("{other} "),
    }
}

/// `$1,234.50` style amount.
#[must_use]
pub fn format_currency(amount: f64, code: &str, decimals: usize) -> String {
    let fixed = format!("{:.decimals$}", amount.abs());
    let (whole, fraction) = match fixed.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (fixed.as_str(), None),
    };
    let sign = if amount < 0.0 { "-" } else { "" };
    let mut out = format!("{sign}{}{}", currency_symbol(code), group_thousands(whole, ","));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn group_thousands(digits: &str, separator: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];
const SCALES: [(u64, &str); 4] = [
    (1_000_000_000_000, "trillion"),
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
];

/// English words for the integer part of `value`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn number_to_words(value: f64) -> String {
    let whole = value.trunc();
    if whole.abs() >= 1e15 {
        return format_number(whole);
    }
    let mut n = whole.abs() as u64;
    if n == 0 {
        return ONES[0].to_owned();
    }
    let mut parts = Vec::new();
    if whole < 0.0 {
        parts.push("minus".to_owned());
    }
    for (scale, name) in SCALES {
        if n >= scale {
            parts.push(format!("{} {name}", below_thousand(n / scale)));
            n %= scale;
        }
    }
    if n > 0 {
        parts.push(below_thousand(n));
    }
    parts.join(" ")
}

#[allow(clippy::cast_possible_truncation)]
fn below_thousand(n: u64) -> String {
    let n = n as usize;
    let mut parts = Vec::new();
    if n >= 100 {
        parts.push(format!("{} hundred", ONES[n / 100]));
    }
    let rest = n % 100;
    if rest >= 20 {
        if rest % 10 == 0 {
            parts.push(TENS[rest / 10].to_owned());
        } else {
            parts.push(format!("{}-{}", TENS[rest / 10], ONES[rest % 10]));
        }
    } else if rest > 0 {
        parts.push(ONES[rest].to_owned());
    }
    parts.join(" ")
}

// ---------------------------------------------------------------------------
// String helpers
// ---------------------------------------------------------------------------

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn plural(word: &str) -> String {
    let lower = word.to_lowercase();
    let ends_consonant_y = lower.ends_with('y')
        && !matches!(
            lower.chars().rev().nth(1),
            Some('a' | 'e' | 'i' | 'o' | 'u')
        );
    if ends_consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

fn pad(text: &str, width: usize, fill: &str, at_start: bool) -> String {
    let len = text.chars().count();
    if len >= width || fill.is_empty() {
        return text.to_owned();
    }
    let padding: String = fill.chars().cycle().take(width - len).collect();
    if at_start {
        format!("{padding}{text}")
    } else {
        format!("{text}{padding}")
    }
}

#[derive(Clone, Copy)]
enum Case {
    Camel,
    Pascal,
    Kebab,
    Snake,
}

/// Split on non-alphanumerics and lower-to-upper transitions.
fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in s.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn join_words(s: &str, case: Case) -> String {
    let words: Vec<String> = split_words(s).iter().map(|w| w.to_lowercase()).collect();
    match case {
        Case::Kebab => words.join("-"),
        Case::Snake => words.join("_"),
        Case::Pascal => words.iter().map(|w| capitalize(w)).collect(),
        Case::Camel => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn env() -> HelperEnv {
        HelperEnv {
            today: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            locale: Locale::En,
        }
    }

    fn call(name: &str, args: &[Value]) -> Result<Value, HelperError> {
        Helper::from_name(name)
            .ok_or_else(|| HelperError::Unknown(name.to_owned()))?
            .call(args, &env())
    }

    #[test]
    fn test_name_table_round_trips() {
        for name in Helper::names() {
            assert_eq!(Helper::from_name(name).unwrap().name(), name);
        }
        assert_eq!(Helper::from_name("eval"), None);
    }

    #[test]
    fn test_percent_and_currency() {
        assert_eq!(call("formatPercent", &[json!(0.055), json!(1)]), Ok(json!("5.5%")));
        assert_eq!(call("formatDollar", &[json!(12)]), Ok(json!("$12.00")));
        assert_eq!(
            call("formatCurrency", &[json!(1234567.891), json!("EUR")]),
            Ok(json!("€1,234,567.89"))
        );
        assert_eq!(call("formatPound", &[json!(-5)]), Ok(json!("-£5.00")));
        assert_eq!(
            call("formatCurrency", &[json!(10), json!("CHF"), json!(0)]),
            Ok(json!("CHF 10"))
        );
        assert_eq!(call("formatInteger", &[json!("1234567")]), Ok(json!("1,234,567")));
    }

    #[test]
    fn test_math() {
        assert_eq!(call("multiply", &[json!(3), json!(4)]), Ok(json!(12)));
        assert_eq!(call("add", &[json!("1.5"), json!(1)]), Ok(json!(2.5)));
        assert_eq!(call("divide", &[json!(1), json!(0)]), Err(HelperError::DivisionByZero));
        assert_eq!(call("round", &[json!(2.346), json!(2)]), Ok(json!(2.35)));
        assert!(matches!(
            call("subtract", &[json!("abc"), json!(1)]),
            Err(HelperError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_number_to_words() {
        assert_eq!(number_to_words(0.0), "zero");
        assert_eq!(number_to_words(42.0), "forty-two");
        assert_eq!(number_to_words(1_234.0), "one thousand two hundred thirty-four");
        assert_eq!(number_to_words(2_000_010.0), "two million ten");
        assert_eq!(number_to_words(-7.9), "minus seven");
    }

    #[test]
    fn test_dates() {
        assert_eq!(call("addDays", &[json!("2024-01-30"), json!(3)]), Ok(json!("2024-02-02")));
        assert_eq!(call("addMonths", &[json!("@today"), json!(-1)]), Ok(json!("2023-12-15")));
        assert_eq!(call("addYears", &[json!("2024-02-29"), json!(1)]), Ok(json!("2025-02-28")));
        assert_eq!(
            call("formatDate", &[json!("2024-07-04"), json!("legal")]),
            Ok(json!("July 4th, 2024"))
        );
        assert!(matches!(
            call("addDays", &[json!("someday"), json!(1)]),
            Err(HelperError::NotADate { .. })
        ));
    }

    #[test]
    fn test_strings() {
        assert_eq!(call("titleCase", &[json!("the QUICK fox")]), Ok(json!("The Quick Fox")));
        assert_eq!(call("capitalize", &[json!("acme")]), Ok(json!("Acme")));
        assert_eq!(call("upper", &[json!("a")]), Ok(json!("A")));
        assert_eq!(
            call("truncate", &[json!("Confidential Information"), json!(12)]),
            Ok(json!("Confidential..."))
        );
        assert_eq!(call("clean", &[json!("  a   b ")]), Ok(json!("a b")));
        assert_eq!(call("pluralize", &[json!("party"), json!(2)]), Ok(json!("parties")));
        assert_eq!(call("pluralize", &[json!("box"), json!(1)]), Ok(json!("box")));
        assert_eq!(call("initials", &[json!("john ronald smith")]), Ok(json!("JRS")));
        assert_eq!(call("padStart", &[json!("7"), json!(3), json!("0")]), Ok(json!("007")));
        assert_eq!(call("padEnd", &[json!("ab"), json!(4)]), Ok(json!("ab  ")));
        assert_eq!(call("contains", &[json!("abc"), json!("b")]), Ok(json!(true)));
        assert_eq!(
            call("replaceAll", &[json!("a-b-c"), json!("-"), json!("+")]),
            Ok(json!("a+b+c"))
        );
        assert_eq!(call("concat", &[json!("a"), json!(1), json!(null)]), Ok(json!("a1")));
    }

    #[test]
    fn test_width_and_precision_limits() {
        assert!(matches!(
            call("padStart", &[json!("a"), json!(50_000_000)]),
            Err(HelperError::OutOfRange { helper: "padStart", limit: MAX_WIDTH, .. })
        ));
        assert!(matches!(
            call("truncate", &[json!("a"), json!(1e12)]),
            Err(HelperError::OutOfRange { limit: MAX_WIDTH, .. })
        ));
        assert!(matches!(
            call("formatPercent", &[json!(0.5), json!(1000)]),
            Err(HelperError::OutOfRange { limit: MAX_DECIMALS, .. })
        ));
        assert!(matches!(
            call("formatEuro", &[json!(1), json!(21)]),
            Err(HelperError::OutOfRange { .. })
        ));
        assert!(matches!(
            call("round", &[json!(1.5), json!(3e9)]),
            Err(HelperError::OutOfRange { helper: "round", .. })
        ));
        assert_eq!(
            call("padEnd", &[json!("a"), json!(MAX_WIDTH)]).map(|v| v.as_str().map(str::len)),
            Ok(Some(MAX_WIDTH))
        );
        assert_eq!(call("round", &[json!(1.25), json!(20)]), Ok(json!(1.25)));
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(call("camelCase", &[json!("service level agreement")]), Ok(json!("serviceLevelAgreement")));
        assert_eq!(call("pascalCase", &[json!("service-level")]), Ok(json!("ServiceLevel")));
        assert_eq!(call("kebabCase", &[json!("serviceLevel Agreement")]), Ok(json!("service-level-agreement")));
        assert_eq!(call("snakeCase", &[json!("ServiceLevel")]), Ok(json!("service_level")));
    }

    #[test]
    fn test_arity() {
        assert!(matches!(
            call("upper", &[]),
            Err(HelperError::Arity { helper: "upper", found: 0, .. })
        ));
    }
}
