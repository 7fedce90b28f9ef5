//! Alphabetic and Roman numeral labels for section numbering.
//!
//! Both formatters return an empty string for zero: counters start at zero
//! and an unset level must render as nothing rather than as an error.

const ROMAN_PAIRS: [(u32, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Bijective base-26 label: 1 → `a`, 26 → `z`, 27 → `aa`, 703 → `aaa`.
#[must_use]
pub fn to_alpha(n: u32) -> String {
    let mut n = n;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        // n % 26 < 26, so the cast cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        letters.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Roman numeral, uppercase unless `lowercase` is set.
#[must_use]
pub fn to_roman(n: u32, lowercase: bool) -> String {
    let mut n = n;
    let mut out = String::new();
    for (value, symbol) in ROMAN_PAIRS {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    if lowercase {
        out.to_lowercase()
    } else {
        out
    }
}
