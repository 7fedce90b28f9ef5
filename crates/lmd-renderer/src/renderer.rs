//! Generic tree renderer with pluggable backend.

use std::marker::PhantomData;

use lmd_core::{Node, NodeKind, ReferenceKind};

use crate::backend::RenderBackend;
use crate::state::TocEntry;

/// Result of rendering a document tree.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderResult {
    /// Rendered HTML or markdown.
    pub output: String,
    /// Text of the first heading (if title extraction was enabled).
    pub title: Option<String>,
    /// Every heading in document order.
    pub toc: Vec<TocEntry>,
}

/// Generic tree renderer with pluggable backend.
///
/// Handles traversal, cross-reference output and heading collection; the
/// [`RenderBackend`] decides the syntax of each element.
pub struct DocumentRenderer<B: RenderBackend> {
    extract_title: bool,
    title: Option<String>,
    toc: Vec<TocEntry>,
    _backend: PhantomData<B>,
}

impl<B: RenderBackend> Default for DocumentRenderer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RenderBackend> DocumentRenderer<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            extract_title: false,
            title: None,
            toc: Vec::new(),
            _backend: PhantomData,
        }
    }

    /// Record the first heading's text as the document title.
    #[must_use]
    pub fn with_title_extraction(mut self) -> Self {
        self.extract_title = true;
        self
    }

    /// Render a tree rooted at `root`.
    pub fn render(&mut self, root: &Node) -> RenderResult {
        let mut output = if root.is_block_container() {
            self.blocks(&root.children)
        } else {
            let mut out = String::new();
            self.block(root, &mut out);
            out
        };
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        RenderResult {
            output,
            title: self.title.take(),
            toc: std::mem::take(&mut self.toc),
        }
    }

    fn blocks(&mut self, nodes: &[Node]) -> String {
        let mut out = String::new();
        for node in nodes {
            let mut block = String::new();
            self.block(node, &mut block);
            if block.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str(B::BLOCK_SEPARATOR);
            }
            out.push_str(&block);
        }
        out
    }

    fn block(&mut self, node: &Node, out: &mut String) {
        match &node.kind {
            NodeKind::Root => out.push_str(&self.blocks(&node.children)),
            NodeKind::Paragraph => {
                let content = inline::<B>(&node.children);
                if !content.trim().is_empty() {
                    B::paragraph(&content, out);
                }
            }
            NodeKind::Heading(heading) => {
                let text = node.plain_text();
                let text = text.trim();
                if self.extract_title && self.title.is_none() {
                    self.title = Some(text.to_owned());
                }
                self.toc.push(TocEntry {
                    level: heading.depth,
                    number: heading.number.clone(),
                    title: text.to_owned(),
                });
                let content = inline::<B>(&node.children);
                B::heading(heading, content.trim_start(), out);
            }
            NodeKind::BlockQuote => {
                let content = self.blocks(&node.children);
                B::blockquote(&content, out);
            }
            NodeKind::List { ordered, start } => {
                let items: Vec<String> = node
                    .children
                    .iter()
                    .map(|item| {
                        if item.has_inline_children() {
                            inline::<B>(&item.children)
                        } else {
                            self.blocks(&item.children)
                        }
                    })
                    .collect();
                B::list(*ordered, *start, &items, out);
            }
            NodeKind::ListItem => out.push_str(&self.blocks(&node.children)),
            NodeKind::CodeBlock { info, literal } => B::code_block(info, literal, out),
            NodeKind::ThematicBreak => B::thematic_break(out),
            NodeKind::RawMarkup(markup) => B::raw_markup(markup.trim_end(), out),
            // Stray inline content at block level.
            _ => {
                let content = inline::<B>(std::slice::from_ref(node));
                if !content.is_empty() {
                    B::paragraph(&content, out);
                }
            }
        }
    }
}

/// Render inline nodes.
fn inline<B: RenderBackend>(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        inline_node::<B>(node, &mut out);
    }
    out
}

fn inline_node<B: RenderBackend>(node: &Node, out: &mut String) {
    match &node.kind {
        NodeKind::Text(text) => B::text(text, out),
        NodeKind::RawMarkup(markup) => B::raw_markup(markup, out),
        NodeKind::Reference {
            kind: ReferenceKind::Definition,
            ..
        } => {}
        NodeKind::Reference {
            resolved: Some(value),
            ..
        } => B::text(value, out),
        NodeKind::Reference { key, .. } => B::text(&format!("|{key}|"), out),
        NodeKind::Emphasis => B::emphasis(&inline::<B>(&node.children), out),
        NodeKind::Strong => B::strong(&inline::<B>(&node.children), out),
        NodeKind::InlineCode(code) => B::inline_code(code, out),
        NodeKind::Link { url, title } => {
            B::link(url, title, &inline::<B>(&node.children), out);
        }
        NodeKind::Image { url, title } => B::image(url, title, &node.plain_text(), out),
        NodeKind::SoftBreak => B::soft_break(out),
        NodeKind::HardBreak => B::hard_break(out),
        _ => {
            for child in &node.children {
                inline_node::<B>(child, out);
            }
        }
    }
}
