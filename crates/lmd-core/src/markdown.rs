//! Markdown → document tree.
//!
//! `{{...}}` regions are swapped for opaque placeholders before parsing and
//! restored in every text-bearing node afterwards, so underscores and
//! asterisks inside field names never become emphasis.

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};

use crate::tree::{Heading, Node, NodeKind};

static FIELD_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^\n]*?\}\}").expect("invalid field region regex"));

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").expect("invalid placeholder regex"));

/// Parse markdown into a document tree rooted at [`NodeKind::Root`].
#[must_use]
pub fn parse_markdown(source: &str) -> Node {
    let protected = Protected::new(source);
    let mut builder = TreeBuilder::new(&protected);
    for event in Parser::new_ext(&protected.text, Options::empty()) {
        builder.event(event);
    }
    builder.finish()
}

/// Source text with field regions replaced by placeholders.
struct Protected {
    text: String,
    regions: Vec<String>,
}

impl Protected {
    fn new(source: &str) -> Self {
        let mut regions = Vec::new();
        let text = FIELD_REGION
            .replace_all(source, |caps: &Captures<'_>| {
                regions.push(caps[0].to_owned());
                format!("\u{E000}{}\u{E001}", regions.len() - 1)
            })
            .into_owned();
        Self { text, regions }
    }

    fn restore(&self, text: &str) -> String {
        if self.regions.is_empty() || !text.contains('\u{E000}') {
            return text.to_owned();
        }
        PLACEHOLDER
            .replace_all(text, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.regions.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_owned())
            })
            .into_owned()
    }
}

struct TreeBuilder<'p> {
    protected: &'p Protected,
    stack: Vec<Node>,
    in_html_block: bool,
}

impl<'p> TreeBuilder<'p> {
    fn new(protected: &'p Protected) -> Self {
        Self {
            protected,
            stack: vec![Node::root(Vec::new())],
            in_html_block: false,
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                let code = self.protected.restore(&code);
                self.push(Node::new(NodeKind::InlineCode(code)));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.raw(&html),
            Event::SoftBreak => self.push(Node::new(NodeKind::SoftBreak)),
            Event::HardBreak => self.push(Node::new(NodeKind::HardBreak)),
            Event::Rule => self.push(Node::new(NodeKind::ThematicBreak)),
            Event::TaskListMarker(_)
            | Event::FootnoteReference(_)
            | Event::InlineMath(_)
            | Event::DisplayMath(_) => {
                // Not supported
            }
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        let kind = match tag {
            Tag::Paragraph => NodeKind::Paragraph,
            Tag::Heading { level, .. } => NodeKind::Heading(Heading {
                depth: heading_level_to_num(level),
                legal: false,
                number: None,
            }),
            Tag::BlockQuote(_) => NodeKind::BlockQuote,
            Tag::CodeBlock(kind) => NodeKind::CodeBlock {
                info: match kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                },
                literal: String::new(),
            },
            Tag::List(start) => NodeKind::List {
                ordered: start.is_some(),
                start,
            },
            Tag::Item => NodeKind::ListItem,
            Tag::Emphasis => NodeKind::Emphasis,
            Tag::Strong => NodeKind::Strong,
            Tag::Link {
                dest_url, title, ..
            } => NodeKind::Link {
                url: self.protected.restore(&dest_url),
                title: self.protected.restore(&title),
            },
            Tag::Image {
                dest_url, title, ..
            } => NodeKind::Image {
                url: self.protected.restore(&dest_url),
                title: self.protected.restore(&title),
            },
            Tag::HtmlBlock => {
                self.in_html_block = true;
                return;
            }
            // Remaining tags need parser extensions that are never enabled
            _ => return,
        };
        self.stack.push(Node::new(kind));
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::BlockQuote(_)
            | TagEnd::CodeBlock
            | TagEnd::List(_)
            | TagEnd::Item
            | TagEnd::Emphasis
            | TagEnd::Strong
            | TagEnd::Link
            | TagEnd::Image => {
                if self.stack.len() > 1 {
                    if let Some(mut node) = self.stack.pop() {
                        node.merge_adjacent_text();
                        self.push(node);
                    }
                }
            }
            TagEnd::HtmlBlock => self.in_html_block = false,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let text = self.protected.restore(text);
        if let Some(Node {
            kind: NodeKind::CodeBlock { literal, .. },
            ..
        }) = self.stack.last_mut()
        {
            literal.push_str(&text);
            return;
        }
        self.push(Node::text(text));
    }

    fn raw(&mut self, html: &str) {
        let html = self.protected.restore(html);
        if self.in_html_block {
            if let Some(NodeKind::RawMarkup(prev)) = self
                .stack
                .last_mut()
                .and_then(|top| top.children.last_mut())
                .map(|last| &mut last.kind)
            {
                prev.push_str(&html);
                return;
            }
        }
        self.push(Node::raw(html));
    }

    fn push(&mut self, node: Node) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(node);
        }
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            if let Some(node) = self.stack.pop() {
                self.push(node);
            }
        }
        let mut root = self.stack.pop().unwrap_or_else(|| Node::root(Vec::new()));
        root.merge_adjacent_text();
        root
    }
}

fn heading_level_to_num(level: pulldown_cmark::HeadingLevel) -> u8 {
    match level {
        pulldown_cmark::HeadingLevel::H1 => 1,
        pulldown_cmark::HeadingLevel::H2 => 2,
        pulldown_cmark::HeadingLevel::H3 => 3,
        pulldown_cmark::HeadingLevel::H4 => 4,
        pulldown_cmark::HeadingLevel::H5 => 5,
        pulldown_cmark::HeadingLevel::H6 => 6,
    }
}
