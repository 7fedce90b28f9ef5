//! Document metadata map.
//!
//! A single string-keyed map of JSON-like values, seeded from frontmatter and
//! extended by imports and pipeline side channels. Keys written by the
//! pipeline itself are prefixed with an underscore (`_cross_references`,
//! `_field_mappings`).

use serde_json::{Map, Value};

/// Key under which resolved cross-references are recorded.
pub const CROSS_REFERENCES_KEY: &str = "_cross_references";
/// Key under which tracked template fields are recorded.
pub const FIELD_MAPPINGS_KEY: &str = "_field_mappings";

/// Keys that imported documents may never contribute.
///
/// Header formatting belongs to the main document.
const RESERVED_IMPORT_KEYS: &[&str] = &[
    "level-one",
    "level-two",
    "level-three",
    "level-four",
    "level-five",
    "level-six",
    "level-seven",
    "level-eight",
    "level-nine",
    "no-reset",
    "no-indent",
];

/// One segment of a dotted metadata path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse a dotted path such as `parties[0].name` or `items.1`.
///
/// Returns `None` for malformed bracket syntax or empty segments.
#[must_use]
pub fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }
        let (name, mut rest) = match part.find('[') {
            Some(pos) => part.split_at(pos),
            None => (part, ""),
        };
        if !name.is_empty() {
            match name.parse::<usize>() {
                Ok(index) if !segments.is_empty() => segments.push(PathSegment::Index(index)),
                _ => segments.push(PathSegment::Key(name.to_owned())),
            }
        }
        while let Some(stripped) = rest.strip_prefix('[') {
            let end = stripped.find(']')?;
            let inner = stripped[..end].trim();
            let inner = inner.trim_matches(|c| c == '"' || c == '\'');
            match inner.parse::<usize>() {
                Ok(index) => segments.push(PathSegment::Index(index)),
                Err(_) if !inner.is_empty() => segments.push(PathSegment::Key(inner.to_owned())),
                Err(_) => return None,
            }
            rest = &stripped[end + 1..];
        }
        if !rest.is_empty() {
            return None;
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Walk `segments` starting from `root`.
#[must_use]
pub fn lookup<'a>(root: &'a Map<String, Value>, segments: &[PathSegment]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = match first {
        PathSegment::Key(key) => root.get(key)?,
        PathSegment::Index(_) => return None,
    };
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
            (PathSegment::Key(key), Value::Array(items)) => {
                let index = key.parse::<usize>().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Truthiness used by conditions, ternaries and block helpers.
///
/// `null` is false; numbers are false only for zero; strings, arrays and
/// objects are false only when empty.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Render a value as document text.
///
/// Returns `None` for `null` and for empty strings, which callers treat as
/// "unresolved".
#[must_use]
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(format_number(n.as_f64().unwrap_or_default())),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(display_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Format a float without a trailing `.0` for whole numbers.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = value as i64;
        whole.to_string()
    } else {
        format!("{value}")
    }
}

/// Convert an `f64` into a JSON number value, using an integer when whole.
#[must_use]
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = value as i64;
        Value::from(whole)
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// Outcome of merging an imported document's frontmatter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Keys newly added to the document metadata.
    pub added: Vec<String>,
    /// Keys already present in the document (document value kept).
    pub conflicts: Vec<String>,
    /// Reserved keys that imports may not set.
    pub skipped: Vec<String>,
}

/// The mutable metadata map for one processing run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    values: Map<String, Value>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Build metadata from a JSON value; non-objects yield an empty map.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Look up a dotted path (`client.address.city`, `parties[1].name`).
    ///
    /// A top-level key that itself contains dots wins over path traversal.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(path) {
            return Some(value);
        }
        let segments = parse_path(path)?;
        lookup(&self.values, &segments)
    }

    /// Look up pre-parsed path segments.
    #[must_use]
    pub fn get_segments(&self, segments: &[PathSegment]) -> Option<&Value> {
        lookup(&self.values, segments)
    }

    /// Look up a string value by key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Look up a boolean flag, accepting `true`/`false` strings.
    #[must_use]
    pub fn get_flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// Create a scoped view: a copy of this map with `overlay` entries on top.
    #[must_use]
    pub fn overlay<I>(&self, overlay: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut values = self.values.clone();
        for (key, value) in overlay {
            values.insert(key, value);
        }
        Self { values }
    }

    /// Merge frontmatter from an imported document.
    ///
    /// Keys already present in the document keep their value, reserved
    /// header keys and underscore-prefixed pipeline keys are skipped.
    pub fn merge_imported(&mut self, imported: Map<String, Value>) -> MergeReport {
        let mut report = MergeReport::default();
        for (key, value) in imported {
            if key.starts_with('_') || RESERVED_IMPORT_KEYS.contains(&key.as_str()) {
                report.skipped.push(key);
            } else if self.values.contains_key(&key) {
                report.conflicts.push(key);
            } else {
                self.values.insert(key.clone(), value);
                report.added.push(key);
            }
        }
        report
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}
