//! Renderers for processed Legal Markdown trees.
//!
//! A generic [`DocumentRenderer`] walks the tree produced by
//! [`lmd_core::Pipeline`] and delegates output syntax to a [`RenderBackend`]:
//! - [`HtmlBackend`]: HTML fragments, legal headings tagged with
//!   `legal-header level-N` classes
//! - [`MarkdownBackend`]: normalized markdown, legal headings become `#`
//!   headings carrying their number
//!
//! Definition markers are dropped and resolved cross-references are written
//! as their section number in both formats.
//!
//! # Example
//!
//! ```
//! use lmd_core::{Pipeline, ProcessingOptions};
//! use lmd_renderer::{DocumentRenderer, HtmlBackend};
//!
//! let doc = Pipeline::new(ProcessingOptions::new())
//!     .unwrap()
//!     .process("l. Scope\n\nThis **agreement** applies.\n")
//!     .unwrap();
//! let result = DocumentRenderer::<HtmlBackend>::new().render(&doc.tree);
//! assert!(result.output.contains("<strong>agreement</strong>"));
//! ```

mod backend;
mod html;
mod markdown;
mod renderer;
mod state;

pub use backend::RenderBackend;
pub use html::HtmlBackend;
pub use markdown::MarkdownBackend;
pub use renderer::{DocumentRenderer, RenderResult};
pub use state::{TocEntry, escape_html};
