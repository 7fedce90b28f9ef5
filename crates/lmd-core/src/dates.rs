//! Date tokens and date formatting.
//!
//! `@today` resolves against a caller-supplied date, never the clock, so
//! processing is deterministic. Offsets (`+1y6m`, `-30d`, `+2`) shift the
//! date; a trailing `[format]` picks a named format or a token pattern.

use std::sync::LazyLock;

use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use regex::Regex;

/// `@today`, optional offsets, optional `[format]`.
pub static TODAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@today((?:[+-](?:\d+[dmy]?)+)*)(?:\[([^\]\n]*)\])?").expect("invalid today regex")
});

static OFFSET_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([dmy]?)").expect("invalid offset regex"));

/// Pattern used when no format is given.
pub const DEFAULT_FORMAT: &str = "YYYY-MM-DD";

/// Language used for month and weekday names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    En,
    Es,
    Fr,
    De,
}

impl Locale {
    /// Locale for a language code such as `es` or `fr-CA`; unknown codes map
    /// to English.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let lang = code
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match lang.as_str() {
            "es" => Locale::Es,
            "fr" => Locale::Fr,
            "de" => Locale::De,
            _ => Locale::En,
        }
    }

    fn months(self) -> &'static [&'static str; 12] {
        match self {
            Locale::En => &[
                "January", "February", "March", "April", "May", "June", "July", "August",
                "September", "October", "November", "December",
            ],
            Locale::Es => &[
                "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto",
                "septiembre", "octubre", "noviembre", "diciembre",
            ],
            Locale::Fr => &[
                "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août",
                "septembre", "octobre", "novembre", "décembre",
            ],
            Locale::De => &[
                "Januar", "Februar", "März", "April", "Mai", "Juni", "Juli", "August",
                "September", "Oktober", "November", "Dezember",
            ],
        }
    }

    fn weekdays(self) -> &'static [&'static str; 7] {
        match self {
            Locale::En => &[
                "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
            ],
            Locale::Es => &[
                "lunes", "martes", "miércoles", "jueves", "viernes", "sábado", "domingo",
            ],
            Locale::Fr => &[
                "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
            ],
            Locale::De => &[
                "Montag", "Dienstag", "Mittwoch", "Donnerstag", "Freitag", "Samstag", "Sonntag",
            ],
        }
    }

    fn ordinal(self, day: u32) -> String {
        match self {
            Locale::En => {
                let suffix = match (day % 10, day % 100) {
                    (_, 11..=13) => "th",
                    (1, _) => "st",
                    (2, _) => "nd",
                    (3, _) => "rd",
                    _ => "th",
                };
                format!("{day}{suffix}")
            }
            Locale::Es => format!("{day}º"),
            Locale::Fr if day == 1 => "1er".to_owned(),
            Locale::Fr => day.to_string(),
            Locale::De => format!("{day}."),
        }
    }
}

/// Token pattern for a named format, if `name` is one.
#[must_use]
pub fn named_format(name: &str) -> Option<&'static str> {
    let pattern = match name.trim().to_ascii_lowercase().as_str() {
        "iso" => "YYYY-MM-DD",
        "us" => "MM/DD/YYYY",
        "eu" | "european" => "DD/MM/YYYY",
        "legal" => "MMMM Do, YYYY",
        "long" => "MMMM D, YYYY",
        "medium" => "MMM D, YYYY",
        "short" => "MM/DD/YY",
        _ => return None,
    };
    Some(pattern)
}

/// Format `date` with a named format or a token pattern.
///
/// Tokens: `YYYY`, `YY`, `MMMM`, `MMM`, `MM`, `M`, `DD`, `Do`, `D`, `dddd`,
/// `ddd`. Text inside `[...]` is copied literally.
#[must_use]
pub fn format_date(date: NaiveDate, format: &str, locale: Locale) -> String {
    let pattern = named_format(format).unwrap_or(format);
    let month_name = locale.months()[date.month0() as usize];
    let weekday_name = locale.weekdays()[date.weekday().num_days_from_monday() as usize];

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('[') {
            if let Some(end) = stripped.find(']') {
                out.push_str(&stripped[..end]);
                rest = &stripped[end + 1..];
                continue;
            }
        }
        let (piece, len) = if rest.starts_with("YYYY") {
            (format!("{:04}", date.year()), 4)
        } else if rest.starts_with("YY") {
            (format!("{:02}", date.year().rem_euclid(100)), 2)
        } else if rest.starts_with("MMMM") {
            (month_name.to_owned(), 4)
        } else if rest.starts_with("MMM") {
            (month_name.chars().take(3).collect(), 3)
        } else if rest.starts_with("MM") {
            (format!("{:02}", date.month()), 2)
        } else if rest.starts_with('M') {
            (date.month().to_string(), 1)
        } else if rest.starts_with("DD") {
            (format!("{:02}", date.day()), 2)
        } else if rest.starts_with("Do") {
            (locale.ordinal(date.day()), 2)
        } else if rest.starts_with('D') {
            (date.day().to_string(), 1)
        } else if rest.starts_with("dddd") {
            (weekday_name.to_owned(), 4)
        } else if rest.starts_with("ddd") {
            (weekday_name.chars().take(3).collect(), 3)
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            (ch.to_string(), ch.len_utf8())
        };
        out.push_str(&piece);
        rest = &rest[len..];
    }
    out
}

/// Unit of a date offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Days,
    Months,
    Years,
}

/// Shift `date` by `amount` units; `None` on overflow.
#[must_use]
pub fn add_offset(date: NaiveDate, amount: i64, unit: DateUnit) -> Option<NaiveDate> {
    match unit {
        DateUnit::Days => date.checked_add_signed(TimeDelta::try_days(amount)?),
        DateUnit::Months | DateUnit::Years => {
            let months = if unit == DateUnit::Years {
                amount.checked_mul(12)?
            } else {
                amount
            };
            let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
            if months >= 0 {
                date.checked_add_months(magnitude)
            } else {
                date.checked_sub_months(magnitude)
            }
        }
    }
}

/// Parsed `@today` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayToken {
    pub offsets: Vec<(i64, DateUnit)>,
    pub format: Option<String>,
}

impl TodayToken {
    /// Parse a token that spans the whole of `text`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let caps = TODAY_PATTERN.captures(text.trim())?;
        if caps.get(0)?.as_str().len() != text.trim().len() {
            return None;
        }
        Some(Self::from_captures(&caps))
    }

    /// Build a token from a [`TODAY_PATTERN`] match.
    #[must_use]
    pub fn from_captures(caps: &regex::Captures<'_>) -> Self {
        let mut offsets = Vec::new();
        let mut sign = 1i64;
        let spec = caps.get(1).map_or("", |m| m.as_str());
        let mut rest = spec;
        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('+') {
                sign = 1;
                rest = stripped;
                continue;
            }
            if let Some(stripped) = rest.strip_prefix('-') {
                sign = -1;
                rest = stripped;
                continue;
            }
            let Some(part) = OFFSET_PART.captures(rest) else {
                break;
            };
            let whole = part.get(0).map_or(0, |m| m.end());
            let amount: i64 = part[1].parse().unwrap_or(0);
            let unit = match &part[2] {
                "m" => DateUnit::Months,
                "y" => DateUnit::Years,
                _ => DateUnit::Days,
            };
            offsets.push((sign * amount, unit));
            rest = &rest[whole..];
        }
        Self {
            offsets,
            format: caps
                .get(2)
                .map(|m| m.as_str().trim().to_owned())
                .filter(|f| !f.is_empty()),
        }
    }

    /// The shifted date; `None` on overflow.
    #[must_use]
    pub fn date(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.offsets
            .iter()
            .try_fold(today, |date, (amount, unit)| add_offset(date, *amount, *unit))
    }

    /// Render the token against `today`.
    #[must_use]
    pub fn render(&self, today: NaiveDate, locale: Locale) -> Option<String> {
        let date = self.date(today)?;
        let format = self.format.as_deref().unwrap_or(DEFAULT_FORMAT);
        Some(format_date(date, format, locale))
    }
}

/// Parse a date from metadata: `YYYY-MM-DD` (optionally followed by a time)
/// or `MM/DD/YYYY`.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_named_formats() {
        let d = date(2024, 3, 1);
        assert_eq!(format_date(d, "iso", Locale::En), "2024-03-01");
        assert_eq!(format_date(d, "us", Locale::En), "03/01/2024");
        assert_eq!(format_date(d, "eu", Locale::En), "01/03/2024");
        assert_eq!(format_date(d, "legal", Locale::En), "March 1st, 2024");
        assert_eq!(format_date(d, "long", Locale::En), "March 1, 2024");
        assert_eq!(format_date(d, "medium", Locale::En), "Mar 1, 2024");
        assert_eq!(format_date(d, "short", Locale::En), "03/01/24");
    }

    #[test]
    fn test_token_pattern_and_literals() {
        let d = date(2024, 1, 22);
        assert_eq!(
            format_date(d, "dddd, [the] Do [of] MMMM", Locale::En),
            "Monday, the 22nd of January"
        );
        assert_eq!(format_date(d, "D.M.YY", Locale::En), "22.1.24");
    }

    #[test]
    fn test_ordinals() {
        let ord = |n| Locale::En.ordinal(n);
        assert_eq!(
            [ord(1), ord(2), ord(3), ord(4), ord(11), ord(12), ord(13), ord(21), ord(23)],
            ["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "23rd"]
        );
    }

    #[test]
    fn test_locales() {
        let d = date(2024, 8, 1);
        assert_eq!(format_date(d, "long", Locale::from_code("es")), "agosto 1, 2024");
        assert_eq!(format_date(d, "Do MMMM YYYY", Locale::from_code("fr-FR")), "1er août 2024");
        assert_eq!(format_date(d, "Do MMMM YYYY", Locale::De), "1. August 2024");
        assert_eq!(Locale::from_code("pt"), Locale::En);
    }

    #[test]
    fn test_today_offsets() {
        let today = date(2024, 1, 31);
        let token = TodayToken::parse("@today+1y6m").unwrap();
        assert_eq!(token.offsets, vec![(1, DateUnit::Years), (6, DateUnit::Months)]);
        assert_eq!(token.date(today), Some(date(2025, 7, 31)));

        let token = TodayToken::parse("@today+1m").unwrap();
        assert_eq!(token.date(today), Some(date(2024, 2, 29)));

        let token = TodayToken::parse("@today-30[us]").unwrap();
        assert_eq!(token.render(today, Locale::En).as_deref(), Some("01/01/2024"));
    }

    #[test]
    fn test_today_default_format() {
        let token = TodayToken::parse("@today").unwrap();
        assert_eq!(
            token.render(date(2024, 5, 6), Locale::En).as_deref(),
            Some("2024-05-06")
        );
        assert!(TodayToken::parse("@today is").is_none());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-02-03"), Some(date(2024, 2, 3)));
        assert_eq!(parse_date("2024-02-03T10:00:00Z"), Some(date(2024, 2, 3)));
        assert_eq!(parse_date("02/03/2024"), Some(date(2024, 2, 3)));
        assert_eq!(parse_date("soon"), None);
    }
}
