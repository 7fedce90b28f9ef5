//! Inline markdown parser and serializer.
//!
//! Stages that rewrite inline content textually (clause expansion) serialize
//! the inline nodes, rewrite the string and parse it back through
//! [`parse_markdown`]. Both directions treat `{{...}}` regions as opaque:
//! nothing inside them is escaped on the way out or interpreted on the way in.

use std::sync::LazyLock;

use regex::Regex;

use crate::markdown::parse_markdown;
use crate::tree::{Node, NodeKind, ReferenceKind, merge_adjacent_text};

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("invalid entity regex")
});

/// Parse inline markdown into inline nodes.
///
/// Text that markdown reads as more than one block (a line starting with
/// `- ` or `# ` inside rewritten content) is flattened: the inline content
/// of every block is kept in order, separated by soft breaks.
#[must_use]
pub fn parse_inline(source: &str) -> Vec<Node> {
    let root = parse_markdown(source);
    match <[Node; 1]>::try_from(root.children) {
        Ok([block]) if matches!(block.kind, NodeKind::Paragraph) => block.children,
        Ok([block]) => flatten(vec![block]),
        Err(blocks) => flatten(blocks),
    }
}

fn flatten(blocks: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::new();
    for block in blocks {
        collect_inline(block, &mut out);
    }
    merge_adjacent_text(&mut out);
    out
}

fn collect_inline(block: Node, out: &mut Vec<Node>) {
    let leaf = match &block.kind {
        NodeKind::CodeBlock { literal, .. } => Some(Node::text(literal.trim_end())),
        NodeKind::RawMarkup(markup) => Some(Node::raw(markup.trim_end())),
        _ => None,
    };
    if let Some(leaf) = leaf {
        push_break(out);
        out.push(leaf);
    } else if block.is_inline() {
        out.push(block);
    } else if block.has_inline_children() {
        push_break(out);
        out.extend(block.children);
    } else {
        for child in block.children {
            collect_inline(child, out);
        }
    }
}

fn push_break(out: &mut Vec<Node>) {
    if !out.is_empty() {
        out.push(Node::new(NodeKind::SoftBreak));
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize inline nodes back to markdown.
#[must_use]
pub fn serialize_inline(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match &node.kind {
        NodeKind::Text(text) => out.push_str(&escape_text(text)),
        NodeKind::RawMarkup(markup) => out.push_str(markup),
        NodeKind::Reference {
            kind: ReferenceKind::Usage,
            resolved: Some(value),
            ..
        } => out.push_str(&escape_text(value)),
        NodeKind::Reference { key, .. } => {
            out.push('|');
            out.push_str(key);
            out.push('|');
        }
        NodeKind::Emphasis => wrap(node, "*", out),
        NodeKind::Strong => wrap(node, "**", out),
        NodeKind::InlineCode(code) => {
            let longest = longest_run(code, '`');
            let fence = "`".repeat(longest + 1);
            let pad = if code.starts_with('`') || code.ends_with('`') {
                " "
            } else {
                ""
            };
            out.push_str(&fence);
            out.push_str(pad);
            out.push_str(code);
            out.push_str(pad);
            out.push_str(&fence);
        }
        NodeKind::Link { url, title } | NodeKind::Image { url, title } => {
            if matches!(node.kind, NodeKind::Image { .. }) {
                out.push('!');
            }
            out.push('[');
            for child in &node.children {
                write_node(child, out);
            }
            out.push_str("](");
            if url.contains(' ') {
                out.push('<');
                out.push_str(url);
                out.push('>');
            } else {
                out.push_str(url);
            }
            if !title.is_empty() {
                out.push_str(" \"");
                out.push_str(title);
                out.push('"');
            }
            out.push(')');
        }
        NodeKind::SoftBreak => out.push('\n'),
        NodeKind::HardBreak => out.push_str("\\\n"),
        _ => {
            for child in &node.children {
                write_node(child, out);
            }
        }
    }
}

fn wrap(node: &Node, delimiter: &str, out: &mut String) {
    out.push_str(delimiter);
    for child in &node.children {
        write_node(child, out);
    }
    out.push_str(delimiter);
}

fn longest_run(text: &str, ch: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == ch {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Escape characters the inline parser would interpret, leaving `{{...}}`
/// regions untouched.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        if rest.starts_with("{{") {
            let end = rest.find("}}").map_or(rest.len(), |off| off + 2);
            out.push_str(&rest[..end]);
            pos += end;
            continue;
        }
        let Some(c) = rest.chars().next() else {
            break;
        };
        let needs_escape = match c {
            '\\' | '*' | '_' | '`' => true,
            '<' => rest[1..]
                .chars()
                .next()
                .is_some_and(|n| n.is_ascii_alphabetic() || n == '/' || n == '!'),
            '[' => rest.contains("]("),
            '!' => rest[1..].starts_with('['),
            '&' => ENTITY.is_match(rest),
            _ => false,
        };
        if needs_escape {
            out.push('\\');
        }
        out.push(c);
        pos += c.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn em(children: Vec<Node>) -> Node {
        Node::with_children(NodeKind::Emphasis, children)
    }

    fn strong(children: Vec<Node>) -> Node {
        Node::with_children(NodeKind::Strong, children)
    }

    #[test]
    fn test_emphasis_and_strong() {
        assert_eq!(
            parse_inline("**bold** and *it*"),
            vec![
                strong(vec![Node::text("bold")]),
                Node::text(" and "),
                em(vec![Node::text("it")]),
            ]
        );
    }

    #[test]
    fn test_field_regions_are_opaque() {
        assert_eq!(
            parse_inline("{{party.legal_name}} and {{_x_}}"),
            vec![Node::text("{{party.legal_name}} and {{_x_}}")]
        );
    }

    #[test]
    fn test_entities_match_document_parser() {
        let source = "a &copy; b";
        assert_eq!(parse_inline(source), vec![Node::text("a \u{a9} b")]);
        assert_eq!(
            parse_inline(source),
            parse_markdown(source).children[0].children
        );
    }

    #[test]
    fn test_block_syntax_is_flattened() {
        assert_eq!(
            parse_inline("- A\n- B"),
            vec![
                Node::text("A"),
                Node::new(NodeKind::SoftBreak),
                Node::text("B"),
            ]
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let source = "Hello **World** and *x* `code` [l](u) {{a_b}} <br>";
        assert_eq!(serialize_inline(&parse_inline(source)), source);
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a*b_c {{x_y}}"), r"a\*b\_c {{x_y}}");
        assert_eq!(escape_text("1 < 2 <b>"), r"1 < 2 \<b>");
        assert_eq!(escape_text("Tom & Jerry &amp;"), r"Tom & Jerry \&amp;");
        for literal in ["*literal*", "&copy; kept"] {
            assert_eq!(parse_inline(&escape_text(literal)), vec![Node::text(literal)]);
        }
    }

    #[test]
    fn test_serialize_references() {
        let nodes = vec![
            Node::text("See "),
            Node::reference("def1", ReferenceKind::Usage),
        ];
        assert_eq!(serialize_inline(&nodes), "See |def1|");
    }
}
