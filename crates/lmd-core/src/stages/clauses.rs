//! Conditional clauses and loops.
//!
//! Four surface forms share one model:
//!
//! - `{{#if cond}}body{{else}}alt{{/if}}`
//! - `{{#name}}body{{/name}}`: a loop when `name` is an array, otherwise a
//!   truthiness check
//! - `[body]{cond}`
//! - `[{{cond}}body]` (legacy)
//!
//! Markers that sit alone in their own paragraph open a block that spans the
//! sibling blocks up to the matching close marker. Markers inside a text run
//! are expanded on the serialized inline markdown, which is then re-parsed.
//!
//! Conditions that fail to evaluate include their body.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::template_fields::resolve_node;
use super::{CLAUSES, Context, Transform};
use crate::condition;
use crate::error::PipelineError;
use crate::fields::{FieldResolver, FieldTracker, Piece};
use crate::helpers::HelperEnv;
use crate::inline::{escape_text, parse_inline, serialize_inline};
use crate::metadata::{Metadata, is_truthy};
use crate::tree::{Node, NodeKind};

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{\s*(?:#\s*if\s+([^{}]*?)|#\s*([\w.@$-]+)|/\s*([\w.@$-]*)|(else))\s*\}\}",
    )
    .expect("invalid block tag regex")
});

static BRACKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]]*)\]\{([^{}]+)\}").expect("invalid bracket clause regex")
});

static LEGACY_BRACKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\{\{([^{}]+)\}\}([^\[\]]+)\]").expect("invalid legacy bracket clause regex")
});

/// A block marker.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    If(String),
    Section(String),
    Close,
    Else,
}

impl Tag {
    fn from_captures(caps: &Captures<'_>) -> Self {
        if let Some(cond) = caps.get(1) {
            Tag::If(cond.as_str().trim().to_owned())
        } else if let Some(name) = caps.get(2) {
            Tag::Section(name.as_str().to_owned())
        } else if caps.get(3).is_some() {
            Tag::Close
        } else {
            Tag::Else
        }
    }

    fn is_open(&self) -> bool {
        matches!(self, Tag::If(_) | Tag::Section(_))
    }
}

struct TagMatch {
    tag: Tag,
    start: usize,
    end: usize,
}

fn scan_tags(text: &str) -> Vec<TagMatch> {
    BLOCK_TAG
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(TagMatch {
                tag: Tag::from_captures(&caps),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Find the `{{else}}` and close that pair with an opening tag.
///
/// `following` yields the tags after the opening one with their indices.
/// Nested blocks of any kind are skipped over.
fn match_block<'t>(
    following: impl Iterator<Item = (usize, &'t Tag)>,
) -> Option<(Option<usize>, usize)> {
    let mut depth = 0usize;
    let mut else_at = None;
    for (index, tag) in following {
        match tag {
            Tag::If(_) | Tag::Section(_) => depth += 1,
            Tag::Close if depth == 0 => return Some((else_at, index)),
            Tag::Close => depth -= 1,
            Tag::Else if depth == 0 && else_at.is_none() => else_at = Some(index),
            Tag::Else => {}
        }
    }
    None
}

/// Scope for one loop iteration: the item's own fields over `scope`, plus
/// `this`, `@index`, `@first`, `@last` and `@total`.
#[must_use]
pub fn item_scope(scope: &Metadata, item: &Value, index: usize, total: usize) -> Metadata {
    let mut overlay: Vec<(String, Value)> = match item {
        Value::Object(fields) => fields.clone().into_iter().collect(),
        _ => Vec::new(),
    };
    overlay.extend([
        ("this".to_owned(), item.clone()),
        ("@index".to_owned(), Value::from(index)),
        ("@first".to_owned(), Value::Bool(index == 0)),
        ("@last".to_owned(), Value::Bool(index + 1 == total)),
        ("@total".to_owned(), Value::from(total)),
    ]);
    scope.overlay(overlay)
}

/// Expands clauses and loops for one run.
struct ClauseExpander<'t> {
    env: HelperEnv,
    spans: bool,
    tracker: &'t mut FieldTracker,
}

/// Evaluate a clause condition, including the clause when evaluation fails.
fn clause_condition(source: &str, scope: &Metadata) -> bool {
    match condition::try_evaluate(source, scope) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(condition = %source, error = %e, "Condition failed, including clause");
            true
        }
    }
}

impl ClauseExpander<'_> {
    // -----------------------------------------------------------------------
    // Block level
    // -----------------------------------------------------------------------

    fn process_blocks(&mut self, blocks: Vec<Node>, scope: &Metadata) -> Vec<Node> {
        let markers: Vec<Option<Tag>> = blocks.iter().map(block_marker).collect();
        let mut slots: Vec<Option<Node>> = blocks.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(slots.len());

        let mut i = 0;
        while i < slots.len() {
            if let Some(open) = markers[i].as_ref().filter(|t| t.is_open()) {
                let following = markers
                    .iter()
                    .enumerate()
                    .skip(i + 1)
                    .filter_map(|(j, m)| m.as_ref().map(|t| (j, t)));
                if let Some((else_at, close)) = match_block(following) {
                    let body_end = else_at.unwrap_or(close);
                    let body: Vec<Node> = slots[i + 1..body_end]
                        .iter_mut()
                        .filter_map(Option::take)
                        .collect();
                    let alt: Vec<Node> = else_at.map_or_else(Vec::new, |e| {
                        slots[e + 1..close]
                            .iter_mut()
                            .filter_map(Option::take)
                            .collect()
                    });
                    out.extend(self.block_clause(open, body, alt, scope));
                    i = close + 1;
                    continue;
                }
            }
            if let Some(node) = slots[i].take() {
                out.push(self.process_node(node, scope));
            }
            i += 1;
        }
        out
    }

    fn block_clause(
        &mut self,
        open: &Tag,
        body: Vec<Node>,
        alt: Vec<Node>,
        scope: &Metadata,
    ) -> Vec<Node> {
        match open {
            Tag::If(cond) => {
                let chosen = if clause_condition(cond, scope) { body } else { alt };
                self.process_blocks(chosen, scope)
            }
            Tag::Section(name) => match scope.get_path(name) {
                Some(Value::Array(items)) if !items.is_empty() => {
                    let mut out = Vec::new();
                    for (index, item) in items.iter().enumerate() {
                        let scoped = item_scope(scope, item, index, items.len());
                        let mut expanded = self.process_blocks(body.clone(), &scoped);
                        let resolver = FieldResolver::new(&scoped, self.env)
                            .in_loop(true)
                            .with_spans(self.spans);
                        for node in &mut expanded {
                            resolve_node(node, &resolver, self.tracker);
                        }
                        out.extend(expanded);
                    }
                    out
                }
                Some(value) if !value.is_array() && is_truthy(value) => {
                    self.process_blocks(body, scope)
                }
                _ => self.process_blocks(alt, scope),
            },
            Tag::Close | Tag::Else => Vec::new(),
        }
    }

    fn process_node(&mut self, mut node: Node, scope: &Metadata) -> Node {
        if node.has_inline_children() {
            self.expand_inline(&mut node, scope);
        } else if node.is_block_container() {
            let children = std::mem::take(&mut node.children);
            node.children = self.process_blocks(children, scope);
        }
        node
    }

    fn expand_inline(&mut self, node: &mut Node, scope: &Metadata) {
        let mut needed = false;
        node.walk(&mut |n| {
            if let Some(text) = n.as_text() {
                needed |= text.contains("{{#") || text.contains("]{") || text.contains("[{{");
            }
        });
        if !needed {
            return;
        }
        let source = serialize_inline(&node.children);
        let expanded = self.expand(&source, scope);
        if expanded != source {
            node.children = parse_inline(&expanded);
        }
    }

    // -----------------------------------------------------------------------
    // Text level
    // -----------------------------------------------------------------------

    /// Expand every clause in inline markdown `text`.
    fn expand(&mut self, text: &str, scope: &Metadata) -> String {
        let tags = scan_tags(text);
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        let mut i = 0;

        while i < tags.len() {
            let open = &tags[i];
            if !open.tag.is_open() || open.start < pos {
                i += 1;
                continue;
            }
            let following = tags
                .iter()
                .enumerate()
                .skip(i + 1)
                .map(|(j, t)| (j, &t.tag));
            let Some((else_at, close)) = match_block(following) else {
                i += 1;
                continue;
            };

            let body_end = else_at.map_or(tags[close].start, |e| tags[e].start);
            let body = &text[open.end..body_end];
            let alt = else_at.map_or("", |e| &text[tags[e].end..tags[close].start]);

            out.push_str(&text[pos..open.start]);
            let replacement = self.text_clause(&open.tag, body, alt, scope);
            out.push_str(&replacement);
            pos = tags[close].end;
            i = close + 1;
        }
        out.push_str(&text[pos..]);

        let out = expand_brackets(&BRACKET, &out, scope, (2, 1));
        expand_brackets(&LEGACY_BRACKET, &out, scope, (1, 2))
    }

    fn text_clause(&mut self, open: &Tag, body: &str, alt: &str, scope: &Metadata) -> String {
        match open {
            Tag::If(cond) => {
                let chosen = if clause_condition(cond, scope) { body } else { alt };
                self.expand(chosen, scope)
            }
            Tag::Section(name) => match scope.get_path(name) {
                Some(Value::Array(items)) if !items.is_empty() => {
                    let mut out = String::new();
                    for (index, item) in items.iter().enumerate() {
                        let scoped = item_scope(scope, item, index, items.len());
                        let expanded = self.expand(body, &scoped);
                        out.push_str(&self.resolve_loop_fields(&expanded, &scoped));
                    }
                    out
                }
                Some(value) if !value.is_array() && is_truthy(value) => self.expand(body, scope),
                _ => self.expand(alt, scope),
            },
            Tag::Close | Tag::Else => String::new(),
        }
    }

    fn resolve_loop_fields(&mut self, text: &str, scope: &Metadata) -> String {
        FieldResolver::new(scope, self.env)
            .in_loop(true)
            .with_spans(self.spans)
            .with_value_escape(escape_text)
            .resolve_text(text, self.tracker)
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(t) | Piece::Markup(t) => t,
            })
            .collect()
    }
}

/// Replace bracket clauses matched by `pattern`.
///
/// `groups` names the `(condition, body)` capture groups. Brackets
/// preceded by a backslash are left alone.
fn expand_brackets(
    pattern: &Regex,
    text: &str,
    scope: &Metadata,
    (cond_group, body_group): (usize, usize),
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if text[..whole.start()].ends_with('\\') {
            continue;
        }
        let cond = caps.get(cond_group).map_or("", |m| m.as_str()).trim();
        let body = caps.get(body_group).map_or("", |m| m.as_str());
        out.push_str(&text[last..whole.start()]);
        if clause_condition(cond, scope) {
            out.push_str(body);
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Marker carried by a paragraph whose only content is one block tag.
fn block_marker(node: &Node) -> Option<Tag> {
    if !matches!(node.kind, NodeKind::Paragraph) {
        return None;
    }
    let [only] = node.children.as_slice() else {
        return None;
    };
    let text = only.as_text()?.trim();
    let caps = BLOCK_TAG.captures(text)?;
    let whole = caps.get(0)?;
    (whole.start() == 0 && whole.end() == text.len()).then(|| Tag::from_captures(&caps))
}

/// Expand clauses in inline markdown against `scope`.
///
/// Fields inside loop bodies are resolved against each item. Fields outside
/// loops are left for field resolution.
#[must_use]
pub fn expand_text(text: &str, scope: &Metadata, env: HelperEnv) -> String {
    let mut tracker = FieldTracker::new();
    ClauseExpander {
        env,
        spans: false,
        tracker: &mut tracker,
    }
    .expand(text, scope)
}

/// Expands conditional clauses and loops.
#[derive(Debug, Default)]
pub struct Clauses;

impl Transform for Clauses {
    fn name(&self) -> &'static str {
        CLAUSES
    }

    fn run(&self, root: &mut Node, ctx: &mut Context<'_>) -> Result<(), PipelineError> {
        let spans = ctx.field_tracking();
        let mut expander = ClauseExpander {
            env: ctx.env,
            spans,
            tracker: &mut ctx.tracker,
        };
        let blocks = std::mem::take(&mut root.children);
        root.children = expander.process_blocks(blocks, &ctx.metadata);
        tracing::debug!(blocks = root.children.len(), "Expanded clauses");
        Ok(())
    }
}
