//! Document tree shared by every pipeline stage.
//!
//! The tree is an owned, ordered structure: each [`Node`] owns its children and
//! there are no parent back-pointers. Stages that replace nodes do so through
//! the parent's `children` vector, which keeps sibling order intact.

/// Whether a cross-reference marker defines a key or uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Trailing `|key|` on a heading.
    Definition,
    /// `|key|` anywhere else in the content.
    Usage,
}

/// Heading attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Depth, 1..=9 for legal headers and 1..=6 for markdown headings.
    pub depth: u8,
    /// Set when the heading came from the `l.` marker grammar.
    pub legal: bool,
    /// Rendered section number, set by header numbering.
    pub number: Option<String>,
}

/// Discriminated node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Heading(Heading),
    Paragraph,
    Text(String),
    /// Opaque markup (inline or block HTML) that must not be escaped.
    RawMarkup(String),
    Reference {
        key: String,
        kind: ReferenceKind,
        resolved: Option<String>,
    },
    Emphasis,
    Strong,
    InlineCode(String),
    Link {
        url: String,
        title: String,
    },
    Image {
        url: String,
        title: String,
    },
    List {
        ordered: bool,
        start: Option<u64>,
    },
    ListItem,
    BlockQuote,
    CodeBlock {
        info: String,
        literal: String,
    },
    ThematicBreak,
    SoftBreak,
    HardBreak,
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    /// Create a node without children.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    /// Create a node with the given children.
    #[must_use]
    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }

    #[must_use]
    pub fn root(children: Vec<Node>) -> Self {
        Self::with_children(NodeKind::Root, children)
    }

    #[must_use]
    pub fn paragraph(children: Vec<Node>) -> Self {
        Self::with_children(NodeKind::Paragraph, children)
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Text(value.into()))
    }

    #[must_use]
    pub fn raw(value: impl Into<String>) -> Self {
        Self::new(NodeKind::RawMarkup(value.into()))
    }

    /// Create a legal heading at `depth` with inline children.
    #[must_use]
    pub fn legal_heading(depth: u8, children: Vec<Node>) -> Self {
        Self::with_children(
            NodeKind::Heading(Heading {
                depth,
                legal: true,
                number: None,
            }),
            children,
        )
    }

    /// Create a cross-reference node.
    #[must_use]
    pub fn reference(key: impl Into<String>, kind: ReferenceKind) -> Self {
        Self::new(NodeKind::Reference {
            key: key.into(),
            kind,
            resolved: None,
        })
    }

    /// Heading attributes, if this node is a heading.
    #[must_use]
    pub fn heading(&self) -> Option<&Heading> {
        match &self.kind {
            NodeKind::Heading(h) => Some(h),
            _ => None,
        }
    }

    /// Mutable heading attributes, if this node is a heading.
    pub fn heading_mut(&mut self) -> Option<&mut Heading> {
        match &mut self.kind {
            NodeKind::Heading(h) => Some(h),
            _ => None,
        }
    }

    /// Text value, if this node is a text run.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Whether this node holds block-level children (root, list, quote...).
    #[must_use]
    pub fn is_block_container(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Root | NodeKind::List { .. } | NodeKind::ListItem | NodeKind::BlockQuote
        )
    }

    /// Whether this node's children are inline content.
    ///
    /// List items are included: tight list items hold inline content directly.
    #[must_use]
    pub fn has_inline_children(&self) -> bool {
        match self.kind {
            NodeKind::Paragraph
            | NodeKind::Heading(_)
            | NodeKind::Emphasis
            | NodeKind::Strong
            | NodeKind::Link { .. }
            | NodeKind::Image { .. } => true,
            NodeKind::ListItem => self.children.iter().all(Node::is_inline),
            _ => false,
        }
    }

    /// Whether this node is inline content.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Text(_)
                | NodeKind::RawMarkup(_)
                | NodeKind::Reference { .. }
                | NodeKind::Emphasis
                | NodeKind::Strong
                | NodeKind::InlineCode(_)
                | NodeKind::Link { .. }
                | NodeKind::Image { .. }
                | NodeKind::SoftBreak
                | NodeKind::HardBreak
        )
    }

    /// Whether this is a definition-kind reference node.
    #[must_use]
    pub fn is_reference_definition(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Reference {
                kind: ReferenceKind::Definition,
                ..
            }
        )
    }

    /// Key of the first definition reference among this node's children.
    #[must_use]
    pub fn definition_key(&self) -> Option<&str> {
        self.children.iter().find_map(|c| match &c.kind {
            NodeKind::Reference {
                key,
                kind: ReferenceKind::Definition,
                ..
            } => Some(key.as_str()),
            _ => None,
        })
    }

    /// Concatenated visible text of this subtree.
    ///
    /// Definition references contribute nothing; usages contribute their
    /// resolved value or the original `|key|` marker.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Text(t) | NodeKind::InlineCode(t) => out.push_str(t),
            NodeKind::CodeBlock { literal, .. } => out.push_str(literal),
            NodeKind::Reference {
                key,
                kind: ReferenceKind::Usage,
                resolved,
            } => match resolved {
                Some(value) => out.push_str(value),
                None => {
                    out.push('|');
                    out.push_str(key);
                    out.push('|');
                }
            },
            NodeKind::SoftBreak | NodeKind::HardBreak => out.push('\n'),
            _ => {}
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Visit every node in document order (pre-order).
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Visit every node mutably in document order (pre-order).
    ///
    /// The callback may rewrite a node's own children; the traversal then
    /// descends into the rewritten list.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    /// Visit every heading mutably in document order.
    pub fn for_each_heading_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        self.walk_mut(&mut |node| {
            if matches!(node.kind, NodeKind::Heading(_)) {
                f(node);
            }
        });
    }

    /// Merge adjacent text runs among this node's direct children.
    pub fn merge_adjacent_text(&mut self) {
        merge_adjacent_text(&mut self.children);
    }
}

/// Merge adjacent `Text` nodes in a sibling list, dropping empty runs.
pub fn merge_adjacent_text(nodes: &mut Vec<Node>) {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes.drain(..) {
        if let NodeKind::Text(t) = &node.kind {
            if t.is_empty() {
                continue;
            }
            if let Some(NodeKind::Text(prev)) = merged.last_mut().map(|n| &mut n.kind) {
                prev.push_str(t);
                continue;
            }
        }
        merged.push(node);
    }
    *nodes = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_skips_definitions() {
        let heading = Node::legal_heading(
            1,
            vec![
                Node::text("Definitions"),
                Node::reference("def1", ReferenceKind::Definition),
            ],
        );
        assert_eq!(heading.plain_text(), "Definitions");
        assert_eq!(heading.definition_key(), Some("def1"));
    }

    #[test]
    fn test_plain_text_usage_falls_back_to_marker() {
        let para = Node::paragraph(vec![
            Node::text("See "),
            Node::reference("def1", ReferenceKind::Usage),
        ]);
        assert_eq!(para.plain_text(), "See |def1|");
    }

    #[test]
    fn test_merge_adjacent_text() {
        let mut nodes = vec![
            Node::text("a"),
            Node::text(""),
            Node::text("b"),
            Node::raw("<br>"),
            Node::text("c"),
        ];
        merge_adjacent_text(&mut nodes);
        assert_eq!(
            nodes,
            vec![Node::text("ab"), Node::raw("<br>"), Node::text("c")]
        );
    }

    #[test]
    fn test_walk_is_document_order() {
        let root = Node::root(vec![
            Node::legal_heading(1, vec![Node::text("One")]),
            Node::paragraph(vec![Node::text("body")]),
            Node::legal_heading(2, vec![Node::text("Two")]),
        ]);
        let mut seen = Vec::new();
        root.walk(&mut |n| {
            if let Some(t) = n.as_text() {
                seen.push(t.to_owned());
            }
        });
        assert_eq!(seen, vec!["One", "body", "Two"]);
    }

    #[test]
    fn test_tight_list_item_has_inline_children() {
        let item = Node::with_children(NodeKind::ListItem, vec![Node::text("x")]);
        assert!(item.has_inline_children());
        let loose = Node::with_children(
            NodeKind::ListItem,
            vec![Node::paragraph(vec![Node::text("x")])],
        );
        assert!(!loose.has_inline_children());
    }
}
