//! YAML frontmatter split and parse.

use serde_json::{Map, Value};

/// Error type for frontmatter parsing.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("invalid frontmatter: {0}")]
    Parse(String),
}

/// Split a leading `---` block from `source`.
///
/// Returns the YAML text (without delimiters) and the remaining body. A
/// document without a closed block is returned whole as the body.
#[must_use]
pub fn split(source: &str) -> (Option<&str>, &str) {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(first_line_end) = source.find('\n') else {
        return (None, source);
    };
    if source[..first_line_end].trim_end() != "---" {
        return (None, source);
    }

    let yaml_start = first_line_end + 1;
    let mut line_start = yaml_start;
    while line_start <= source.len() {
        let line_end = source[line_start..]
            .find('\n')
            .map_or(source.len(), |off| line_start + off);
        let line = source[line_start..line_end].trim_end();
        if line == "---" || line == "..." {
            let body_start = (line_end + 1).min(source.len());
            return (Some(&source[yaml_start..line_start]), &source[body_start..]);
        }
        if line_end == source.len() {
            break;
        }
        line_start = line_end + 1;
    }
    (None, source)
}

/// Parse YAML text into a metadata map.
///
/// Empty text yields an empty map.
///
/// # Errors
///
/// Returns [`FrontmatterError::Parse`] for malformed YAML or a top level that
/// is not a mapping.
pub fn parse_yaml(yaml: &str) -> Result<Map<String, Value>, FrontmatterError> {
    let trimmed = yaml.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }
    match serde_yaml::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(FrontmatterError::Parse(
            "frontmatter must be a mapping".to_owned(),
        )),
        Err(e) => Err(FrontmatterError::Parse(format!("Invalid YAML: {e}"))),
    }
}

/// Split and parse frontmatter, returning the metadata map and the body.
///
/// # Errors
///
/// Returns [`FrontmatterError::Parse`] if the frontmatter block is malformed.
pub fn parse(source: &str) -> Result<(Map<String, Value>, &str), FrontmatterError> {
    match split(source) {
        (Some(yaml), body) => Ok((parse_yaml(yaml)?, body)),
        (None, body) => Ok((Map::new(), body)),
    }
}
