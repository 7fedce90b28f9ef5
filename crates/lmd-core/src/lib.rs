//! Legal Markdown processing pipeline.
//!
//! Turns a markdown document with legal extensions into a rewritten
//! [`Node`] tree ready for rendering:
//!
//! - `l.` .. `lllllllll.` lines become numbered legal headings
//! - `{{field}}` expressions, helper calls and `@today` tokens are resolved
//!   against the frontmatter
//! - `{{#if}}`, `{{#list}}` and bracket clauses are expanded
//! - `|key|` cross-references resolve to section numbers
//! - `@import path` pulls in other documents
//!
//! # Example
//!
//! ```
//! use lmd_core::{Pipeline, ProcessingOptions};
//!
//! let pipeline = Pipeline::new(ProcessingOptions::new()).unwrap();
//! let doc = pipeline
//!     .process("---\nparty: Acme\n---\nl. Parties |parties|\n{{party}} is bound by |parties| of this agreement.\n")
//!     .unwrap();
//! assert_eq!(doc.tree.children[0].plain_text(), "Article 1. Parties");
//! assert_eq!(
//!     doc.tree.children[1].plain_text(),
//!     "Acme is bound by Article 1. of this agreement."
//! );
//! ```

pub mod condition;
pub mod dates;
mod error;
pub mod expr;
pub mod fields;
pub mod frontmatter;
pub mod helpers;
pub mod inline;
pub mod markdown;
pub mod metadata;
pub mod numeral;
mod pipeline;
pub mod plugins;
pub mod stages;
pub mod tree;

pub use error::{ImportChain, PipelineError};
pub use fields::{FieldStatus, TrackedField};
pub use frontmatter::FrontmatterError;
pub use metadata::{CROSS_REFERENCES_KEY, FIELD_MAPPINGS_KEY, Metadata};
pub use pipeline::{Pipeline, ProcessedDocument, ProcessingOptions, ReadFileFn};
pub use plugins::{
    IssueKind, OrderError, PluginMetadata, PluginRegistry, ValidationIssue, ValidationOptions,
    ValidationResult,
};
pub use stages::{CrossReference, DEFAULT_ORDER, HeaderOptions, builtin_registry};
pub use tree::{Heading, Node, NodeKind, ReferenceKind};
