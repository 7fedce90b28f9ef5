//! `|key|` cross-references.
//!
//! Definitions are collected from headings first, then usages elsewhere are
//! replaced by typed [`NodeKind::Reference`] nodes carrying the resolved
//! value. Headings that define a key are never searched for usages.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::{CROSS_REFERENCES, Context, Transform};
use crate::dates::parse_date;
use crate::error::PipelineError;
use crate::fields::{
    FieldStatus, FieldTracker, SPAN_CLOSE, TrackedField, is_span_open, span_open,
};
use crate::helpers::{format_currency, to_number};
use crate::metadata::{Metadata, display_value};
use crate::tree::{Node, NodeKind, ReferenceKind, merge_adjacent_text};

static USAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|([\w.-]+)\|").expect("invalid cross-reference regex"));

static TRAILING_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\|([\w.-]+)\|\s*$").expect("invalid cross-reference marker regex")
});

const DEFAULT_CURRENCY: &str = "USD";

/// A registered cross-reference definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReference {
    pub key: String,
    /// Rendered section number, or the heading text for unnumbered headings.
    pub section_number: String,
    pub header_text: String,
    pub level: u8,
}

/// Resolves `|key|` usages against heading definitions and metadata.
#[derive(Debug, Default)]
pub struct CrossReferences;

impl Transform for CrossReferences {
    fn name(&self) -> &'static str {
        CROSS_REFERENCES
    }

    fn run(&self, root: &mut Node, ctx: &mut Context<'_>) -> Result<(), PipelineError> {
        let definitions = collect_definitions(root);

        let mut resolved = 0usize;
        {
            let mut by_key: HashMap<&str, &CrossReference> = HashMap::new();
            for definition in &definitions {
                if by_key.insert(&definition.key, definition).is_some() {
                    tracing::warn!(
                        key = %definition.key,
                        "Duplicate cross-reference key, last definition wins"
                    );
                }
            }
            let resolver = UsageResolver {
                definitions: by_key,
                metadata: &ctx.metadata,
                tracking: ctx.options.field_tracking,
            };
            resolve_usages(root, &resolver, &mut ctx.tracker, &mut resolved);
        }
        tracing::debug!(
            definitions = definitions.len(),
            usages = resolved,
            "Resolved cross-references"
        );

        let mut unique: Vec<CrossReference> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            unique.retain(|d| d.key != definition.key);
            unique.push(definition);
        }
        ctx.cross_references = unique;
        Ok(())
    }
}

/// Register every heading definition in document order.
///
/// A plain heading ending in `|key|` is converted to carry a definition
/// node first.
fn collect_definitions(root: &mut Node) -> Vec<CrossReference> {
    let mut definitions = Vec::new();
    root.for_each_heading_mut(&mut |node| {
        if node.definition_key().is_none() {
            attach_trailing_definition(node);
        }
        let (Some(key), Some(heading)) = (node.definition_key(), node.heading()) else {
            return;
        };
        let text = node.plain_text();
        let text = text.trim();
        let header_text = heading
            .number
            .as_deref()
            .and_then(|number| text.strip_prefix(number))
            .unwrap_or(text)
            .trim()
            .to_owned();
        definitions.push(CrossReference {
            key: key.to_owned(),
            section_number: heading
                .number
                .clone()
                .unwrap_or_else(|| header_text.clone()),
            header_text,
            level: heading.depth,
        });
    });
    definitions
}

fn attach_trailing_definition(node: &mut Node) {
    let Some(NodeKind::Text(text)) = node.children.last_mut().map(|n| &mut n.kind) else {
        return;
    };
    let Some(caps) = TRAILING_KEY.captures(text) else {
        return;
    };
    let key = caps[1].to_owned();
    let start = caps.get(0).map_or(text.len(), |m| m.start());
    text.truncate(start);
    node.children
        .push(Node::reference(key, ReferenceKind::Definition));
    merge_adjacent_text(&mut node.children);
}

struct UsageResolver<'a> {
    definitions: HashMap<&'a str, &'a CrossReference>,
    metadata: &'a Metadata,
    tracking: bool,
}

impl UsageResolver<'_> {
    /// Resolved value and whether it came from a heading definition.
    fn resolve(&self, key: &str) -> Option<(String, bool)> {
        if let Some(definition) = self.definitions.get(key) {
            return Some((definition.section_number.clone(), true));
        }
        let value = self.metadata.get_path(key)?;
        metadata_fallback(key, value, self.metadata).map(|v| (v, false))
    }

    fn expand(&self, text: &str, tracker: &mut FieldTracker, resolved: &mut usize) -> Vec<Node> {
        let mut out = Vec::new();
        let mut last = 0;
        for caps in USAGE.captures_iter(text) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let key = key.as_str();
            let resolution = self.resolve(key);
            if resolution.is_none() && !self.tracking {
                continue;
            }
            out.push(Node::text(&text[last..whole.start()]));
            last = whole.end();

            match resolution {
                Some((value, from_heading)) => {
                    *resolved += 1;
                    let node = Node::new(NodeKind::Reference {
                        key: key.to_owned(),
                        kind: ReferenceKind::Usage,
                        resolved: Some(value.clone()),
                    });
                    if self.tracking {
                        let status = if from_heading {
                            FieldStatus::Highlight
                        } else {
                            FieldStatus::ImportedValue
                        };
                        record(tracker, key, Some(value), whole.as_str(), status);
                        out.push(Node::raw(span_open(key, status)));
                        out.push(node);
                        out.push(Node::raw(SPAN_CLOSE));
                    } else {
                        out.push(node);
                    }
                }
                None => {
                    tracing::debug!(key, "Unresolved cross-reference");
                    record(tracker, key, None, whole.as_str(), FieldStatus::MissingValue);
                    out.push(Node::raw(span_open(key, FieldStatus::MissingValue)));
                    out.push(Node::text(whole.as_str()));
                    out.push(Node::raw(SPAN_CLOSE));
                }
            }
        }
        out.push(Node::text(&text[last..]));
        out
    }
}

fn record(
    tracker: &mut FieldTracker,
    key: &str,
    value: Option<String>,
    original: &str,
    status: FieldStatus,
) {
    tracker.record(TrackedField {
        field_name: key.to_owned(),
        value,
        original_text: original.to_owned(),
        has_logic: status == FieldStatus::Highlight,
        status,
    });
}

/// Format a metadata value found under a cross-reference key.
///
/// Dates render as ISO, numbers under keys mentioning "amount" render as
/// currency in the document's `currency` code.
fn metadata_fallback(key: &str, value: &Value, metadata: &Metadata) -> Option<String> {
    if let Value::String(s) = value {
        if let Some(date) = parse_date(s) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    if key.to_lowercase().contains("amount") {
        if let Some(amount) = to_number(value) {
            let code = metadata.get_str("currency").unwrap_or(DEFAULT_CURRENCY);
            return Some(format_currency(amount, code, 2));
        }
    }
    display_value(value)
}

fn resolve_usages(
    node: &mut Node,
    resolver: &UsageResolver<'_>,
    tracker: &mut FieldTracker,
    resolved: &mut usize,
) {
    if node.heading().is_some() && node.definition_key().is_some() {
        return;
    }
    if matches!(node.kind, NodeKind::CodeBlock { .. }) {
        return;
    }

    let mut span_depth = 0usize;
    let mut out = Vec::with_capacity(node.children.len());
    for mut child in node.children.drain(..) {
        match &child.kind {
            NodeKind::RawMarkup(markup) if is_span_open(markup) => span_depth += 1,
            NodeKind::RawMarkup(markup) if markup == SPAN_CLOSE => {
                span_depth = span_depth.saturating_sub(1);
            }
            NodeKind::Text(text) if span_depth == 0 && USAGE.is_match(text) => {
                out.extend(resolver.expand(text, tracker, resolved));
                continue;
            }
            _ => resolve_usages(&mut child, resolver, tracker, resolved),
        }
        out.push(child);
    }
    merge_adjacent_text(&mut out);
    node.children = out;
}
