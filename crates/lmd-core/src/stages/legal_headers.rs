//! Legal header markers (`l.`, `ll.`, ... `lllllllll.`).
//!
//! A paragraph may mix marker lines with ordinary lines. Such a paragraph is
//! split into an interleaved run of headings and paragraphs in source order.

use std::sync::LazyLock;

use regex::Regex;

use super::{Context, LEGAL_HEADERS, Transform};
use crate::error::PipelineError;
use crate::tree::{Node, NodeKind, ReferenceKind, merge_adjacent_text};

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(l{1,9})\.\s+").expect("invalid legal header regex"));

static TRAILING_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\|([\w.-]+)\|\s*$").expect("invalid cross-reference marker regex")
});

/// Converts marker lines into legal headings.
#[derive(Debug, Default)]
pub struct LegalHeaders;

impl Transform for LegalHeaders {
    fn name(&self) -> &'static str {
        LEGAL_HEADERS
    }

    fn run(&self, root: &mut Node, _ctx: &mut Context<'_>) -> Result<(), PipelineError> {
        let count = process_blocks(&mut root.children);
        tracing::debug!(headers = count, "Parsed legal headers");
        Ok(())
    }
}

fn process_blocks(blocks: &mut Vec<Node>) -> usize {
    let mut count = 0;
    let mut out = Vec::with_capacity(blocks.len());
    for mut node in blocks.drain(..) {
        if matches!(node.kind, NodeKind::Paragraph) && has_marker_line(&node.children) {
            let split = split_legal_lines(std::mem::take(&mut node.children));
            count += split.iter().filter(|n| n.heading().is_some()).count();
            out.extend(split);
        } else {
            if node.is_block_container() {
                count += process_blocks(&mut node.children);
            }
            out.push(node);
        }
    }
    *blocks = out;
    count
}

fn has_marker_line(inline: &[Node]) -> bool {
    let mut at_line_start = true;
    for node in inline {
        match &node.kind {
            NodeKind::SoftBreak | NodeKind::HardBreak => at_line_start = true,
            NodeKind::Text(text) if at_line_start && MARKER.is_match(text) => return true,
            _ => at_line_start = false,
        }
    }
    false
}

/// Split a paragraph's inline children into headings and paragraphs.
///
/// Lines starting with a marker become legal headings whose depth is the
/// number of `l`s. A trailing `|key|` on a heading line becomes a definition
/// reference. Consecutive ordinary lines stay together in one paragraph.
#[must_use]
pub fn split_legal_lines(inline: Vec<Node>) -> Vec<Node> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<Node> = Vec::new();
    let mut line: Vec<Node> = Vec::new();

    for node in inline {
        if matches!(node.kind, NodeKind::SoftBreak | NodeKind::HardBreak) {
            flush_line(&mut line, Some(node), &mut paragraph, &mut blocks);
        } else {
            line.push(node);
        }
    }
    if !line.is_empty() {
        flush_line(&mut line, None, &mut paragraph, &mut blocks);
    }
    finish_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn flush_line(
    line: &mut Vec<Node>,
    brk: Option<Node>,
    paragraph: &mut Vec<Node>,
    blocks: &mut Vec<Node>,
) {
    match heading_from_line(std::mem::take(line)) {
        Ok(heading) => {
            finish_paragraph(paragraph, blocks);
            blocks.push(heading);
        }
        Err(content) => {
            paragraph.extend(content);
            paragraph.extend(brk);
        }
    }
}

fn finish_paragraph(paragraph: &mut Vec<Node>, blocks: &mut Vec<Node>) {
    while paragraph
        .last()
        .is_some_and(|n| matches!(n.kind, NodeKind::SoftBreak | NodeKind::HardBreak))
    {
        paragraph.pop();
    }
    if !paragraph.is_empty() {
        let mut children = std::mem::take(paragraph);
        merge_adjacent_text(&mut children);
        blocks.push(Node::paragraph(children));
    }
}

/// Build a heading from one line, or hand the line back unchanged.
fn heading_from_line(mut line: Vec<Node>) -> Result<Node, Vec<Node>> {
    let Some((depth, marker_len)) = line.first().and_then(Node::as_text).and_then(|text| {
        let caps = MARKER.captures(text)?;
        let marker_len = caps.get(0)?.end();
        let has_content = marker_len < text.len() || line.len() > 1;
        has_content.then_some((caps[1].len(), marker_len))
    }) else {
        return Err(line);
    };

    if let Some(NodeKind::Text(text)) = line.first_mut().map(|n| &mut n.kind) {
        text.drain(..marker_len);
    }

    let mut key = None;
    if let Some(NodeKind::Text(text)) = line.last_mut().map(|n| &mut n.kind) {
        if let Some(caps) = TRAILING_KEY.captures(text) {
            key = Some(caps[1].to_owned());
            let start = caps.get(0).map_or(text.len(), |m| m.start());
            text.truncate(start);
        } else {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
        }
    }

    merge_adjacent_text(&mut line);
    if let Some(key) = key {
        line.push(Node::reference(key, ReferenceKind::Definition));
    }

    #[allow(clippy::cast_possible_truncation)]
    Ok(Node::legal_heading(depth as u8, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::parse_markdown;
    use crate::metadata::Metadata;
    use crate::pipeline::ProcessingOptions;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> Node {
        let mut root = parse_markdown(source);
        let options = ProcessingOptions::new();
        let mut ctx = Context::new(Metadata::new(), &options);
        LegalHeaders.run(&mut root, &mut ctx).unwrap();
        root
    }

    fn strong(children: Vec<Node>) -> Node {
        Node::with_children(NodeKind::Strong, children)
    }

    #[test]
    fn test_single_header() {
        let root = run("l. Definitions\n");
        assert_eq!(
            root,
            Node::root(vec![Node::legal_heading(1, vec![Node::text("Definitions")])])
        );
    }

    #[test]
    fn test_interleaved_lines() {
        let root = run("l. First\nBody line one\nline two\nll. Second\nTail\n");
        assert_eq!(
            root.children,
            vec![
                Node::legal_heading(1, vec![Node::text("First")]),
                Node::paragraph(vec![
                    Node::text("Body line one"),
                    Node::new(NodeKind::SoftBreak),
                    Node::text("line two"),
                ]),
                Node::legal_heading(2, vec![Node::text("Second")]),
                Node::paragraph(vec![Node::text("Tail")]),
            ]
        );
    }

    #[test]
    fn test_depth_from_marker_length() {
        let root = run("lllllllll. Ninth\n");
        assert_eq!(root.children[0].heading().map(|h| h.depth), Some(9));
        // Ten ls is not a marker.
        let root = run("llllllllll. Too deep\n");
        assert!(root.children[0].heading().is_none());
    }

    #[test]
    fn test_inline_formatting_and_fields() {
        let root = run("l. **Bold** terms for {{party.legal_name}}\n");
        assert_eq!(
            root.children[0],
            Node::legal_heading(
                1,
                vec![
                    strong(vec![Node::text("Bold")]),
                    Node::text(" terms for {{party.legal_name}}"),
                ]
            )
        );
    }

    #[test]
    fn test_trailing_definition_marker() {
        let root = run("ll. Definitions |def1|\n");
        assert_eq!(
            root.children[0],
            Node::legal_heading(
                2,
                vec![
                    Node::text("Definitions"),
                    Node::reference("def1", ReferenceKind::Definition),
                ]
            )
        );
    }

    #[test]
    fn test_text_before_first_marker() {
        let root = run("Preamble\nl. Heading\n");
        assert_eq!(root.children[0], Node::paragraph(vec![Node::text("Preamble")]));
        assert_eq!(root.children[1].heading().map(|h| h.depth), Some(1));
    }

    #[test]
    fn test_marker_mid_line_untouched() {
        let root = run("Text with l. inside\n");
        assert_eq!(root.children.len(), 1);
        assert!(matches!(root.children[0].kind, NodeKind::Paragraph));
    }

    #[test]
    fn test_markdown_heading_not_legal() {
        let root = run("# l. Title\n");
        assert_eq!(root.children[0].heading().map(|h| h.legal), Some(false));
    }

    #[test]
    fn test_nested_in_block_quote() {
        let root = run("> l. Quoted\n");
        let quote = &root.children[0];
        assert_eq!(quote.children[0].heading().map(|h| h.legal), Some(true));
    }
}
