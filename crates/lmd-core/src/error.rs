//! Errors that abort a processing run.
//!
//! Per-field failures never reach this type: they are rendered as visible
//! placeholders by the stage that hit them.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::frontmatter::FrontmatterError;
use crate::plugins::OrderError;

/// A chain of import paths, displayed as `a -> b -> a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportChain(pub Vec<PathBuf>);

impl fmt::Display for ImportChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

/// Systemic failure of a processing run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("circular import: {chain}")]
    CircularImport { chain: ImportChain },

    #[error("import depth {depth} exceeds limit of {limit}")]
    ImportDepthExceeded { depth: usize, limit: usize },

    #[error("processing timed out after {elapsed:?} (limit {limit:?})")]
    Timeout { elapsed: Duration, limit: Duration },

    #[error("failed to import {}: {source}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown stage: {name}")]
    UnknownStage { name: String },

    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    #[error(transparent)]
    Order(#[from] OrderError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_circular_import_display() {
        let err = PipelineError::CircularImport {
            chain: ImportChain(vec![
                PathBuf::from("a.md"),
                PathBuf::from("b.md"),
                PathBuf::from("a.md"),
            ]),
        };
        assert_eq!(err.to_string(), "circular import: a.md -> b.md -> a.md");
    }

    #[test]
    fn test_depth_display() {
        let err = PipelineError::ImportDepthExceeded {
            depth: 11,
            limit: 10,
        };
        assert_eq!(err.to_string(), "import depth 11 exceeds limit of 10");
    }
}
