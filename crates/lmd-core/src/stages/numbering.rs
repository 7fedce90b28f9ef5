//! Hierarchical numbering of legal headings.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{Context, Transform, HEADER_NUMBERING};
use crate::error::PipelineError;
use crate::metadata::Metadata;
use crate::numeral::{to_alpha, to_roman};
use crate::tree::{Node, NodeKind};

/// Number of heading levels the marker grammar supports.
pub const MAX_LEVEL: usize = 9;

/// Frontmatter keys for the per-level formats, level 1 first.
pub const LEVEL_KEYS: [&str; MAX_LEVEL] = [
    "level-one",
    "level-two",
    "level-three",
    "level-four",
    "level-five",
    "level-six",
    "level-seven",
    "level-eight",
    "level-nine",
];

const DEFAULT_FORMATS: [&str; 5] = ["Article %n.", "Section %n.", "(%n)", "(%n%c)", "(%n%c%r)"];

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%(0\d+)?(l[1-9]|[nAacrRo])").expect("invalid numbering placeholder regex")
});

static ALREADY_NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:Article|Section|Chapter)\s+[0-9IVXLCDMivxlcdm]+\.?|\d+(?:\.\d+)*\.|[A-Za-z]\.|[IVXLCDMivxlcdm]+\.|\([0-9A-Za-z]+\)|\{\{undefined-level-\d\}\})(?:\s|$)",
    )
    .expect("invalid numbering detection regex")
});

/// Per-level formats and counter policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderOptions {
    /// Format template per level; `None` renders an undefined-level marker.
    pub formats: [Option<String>; MAX_LEVEL],
    /// Keep deeper counters running when a shallower level increments.
    pub no_reset: bool,
    /// Skip the two-spaces-per-level indentation.
    pub no_indent: bool,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        let mut formats: [Option<String>; MAX_LEVEL] = Default::default();
        for (slot, format) in formats.iter_mut().zip(DEFAULT_FORMATS) {
            *slot = Some(format.to_owned());
        }
        Self {
            formats,
            no_reset: false,
            no_indent: false,
        }
    }
}

impl HeaderOptions {
    /// Format template for a 1-based depth.
    #[must_use]
    pub fn format(&self, depth: usize) -> Option<&str> {
        self.formats.get(depth.checked_sub(1)?)?.as_deref()
    }

    /// Set or clear the format for a 1-based depth. Out-of-range depths are ignored.
    pub fn set_format(&mut self, depth: usize, format: Option<String>) {
        if let Some(slot) = depth
            .checked_sub(1)
            .and_then(|index| self.formats.get_mut(index))
        {
            *slot = format;
        }
    }

    /// Apply `level-*`, `no-reset` and `no-indent` document keys on top.
    ///
    /// A `null` level value unsets that level.
    #[must_use]
    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        for (index, key) in LEVEL_KEYS.iter().enumerate() {
            match metadata.get(key) {
                None => {}
                Some(Value::Null) => self.formats[index] = None,
                Some(Value::String(s)) => self.formats[index] = Some(s.clone()),
                Some(other) => self.formats[index] = Some(other.to_string()),
            }
        }
        if let Some(flag) = metadata.get_flag("no-reset") {
            self.no_reset = flag;
        }
        if let Some(flag) = metadata.get_flag("no-indent") {
            self.no_indent = flag;
        }
        self
    }
}

/// Nine hierarchical counters.
#[derive(Debug)]
pub struct NumberingState<'a> {
    options: &'a HeaderOptions,
    counters: [u32; MAX_LEVEL],
}

impl<'a> NumberingState<'a> {
    #[must_use]
    pub fn new(options: &'a HeaderOptions) -> Self {
        Self {
            options,
            counters: [0; MAX_LEVEL],
        }
    }

    /// Increment the counter at `depth` and reset deeper ones.
    pub fn advance(&mut self, depth: usize) {
        let index = depth.clamp(1, MAX_LEVEL) - 1;
        self.counters[index] += 1;
        if !self.options.no_reset {
            for counter in &mut self.counters[index + 1..] {
                *counter = 0;
            }
        }
    }

    /// Render the number for `depth` from the current counters.
    #[must_use]
    pub fn render(&self, depth: usize) -> String {
        match self.options.format(depth) {
            Some(format) => render_template(format, depth, &self.counters),
            None => format!("{{{{undefined-level-{depth}}}}}"),
        }
    }

    /// Leading whitespace for a heading at `depth`.
    #[must_use]
    pub fn indent(&self, depth: usize) -> String {
        if self.options.no_indent {
            String::new()
        } else {
            "  ".repeat(depth.saturating_sub(1))
        }
    }

    #[must_use]
    pub fn counter(&self, depth: usize) -> u32 {
        depth
            .checked_sub(1)
            .and_then(|index| self.counters.get(index))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Number,
    Level(usize),
    Alpha { upper: bool },
    Roman { upper: bool },
}

impl Placeholder {
    fn parse(code: &str) -> Option<Self> {
        match code {
            "n" | "o" => Some(Self::Number),
            "A" => Some(Self::Alpha { upper: true }),
            "a" | "c" => Some(Self::Alpha { upper: false }),
            "r" => Some(Self::Roman { upper: false }),
            "R" => Some(Self::Roman { upper: true }),
            _ => code
                .strip_prefix('l')
                .and_then(|n| n.parse::<usize>().ok())
                .map(Self::Level),
        }
    }
}

fn is_alpha(placeholder: Placeholder) -> bool {
    matches!(placeholder, Placeholder::Alpha { .. })
}

fn is_roman(placeholder: Placeholder) -> bool {
    matches!(placeholder, Placeholder::Roman { .. })
}

struct Token {
    start: usize,
    end: usize,
    width: usize,
    placeholder: Placeholder,
}

/// Render a numbering template at `depth` against `counters`.
///
/// At depth 4 a `%n` directly followed by an alphabetic placeholder takes
/// the level-3 counter (`(%n%c)` → `(1a)`). At depth 5 the compound
/// `%n` + alpha + roman takes levels 3, 4 and 5 (`(%n%c%r)` → `(1ai)`).
#[must_use]
pub fn render_template(format: &str, depth: usize, counters: &[u32; MAX_LEVEL]) -> String {
    let tokens: Vec<Token> = PLACEHOLDER
        .captures_iter(format)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let placeholder = Placeholder::parse(caps.get(2)?.as_str())?;
            let width = caps
                .get(1)
                .and_then(|w| w.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            Some(Token {
                start: whole.start(),
                end: whole.end(),
                width,
                placeholder,
            })
        })
        .collect();

    let level = |d: usize| -> u32 {
        d.checked_sub(1)
            .and_then(|i| counters.get(i))
            .copied()
            .unwrap_or(0)
    };
    let adjacent = |i: usize, pred: fn(Placeholder) -> bool| {
        tokens
            .get(i + 1)
            .is_some_and(|next| next.start == tokens[i].end && pred(next.placeholder))
    };

    let mut out = String::with_capacity(format.len() + 8);
    let mut last = 0;
    let mut compound: Option<(usize, usize)> = None;

    for (i, token) in tokens.iter().enumerate() {
        out.push_str(&format[last..token.start]);
        last = token.end;

        let value = match token.placeholder {
            Placeholder::Number => {
                if depth == 5 && adjacent(i, is_alpha) && adjacent(i + 1, is_roman) {
                    compound = Some((i + 1, i + 2));
                    level(3)
                } else if depth == 4 && adjacent(i, is_alpha) {
                    compound = Some((i + 1, usize::MAX));
                    level(3)
                } else {
                    level(depth)
                }
            }
            Placeholder::Level(d) => level(d),
            Placeholder::Alpha { .. } if compound.is_some_and(|(alpha, _)| alpha == i) => level(4),
            Placeholder::Roman { .. } if compound.is_some_and(|(_, roman)| roman == i) => level(5),
            Placeholder::Alpha { .. } | Placeholder::Roman { .. } => level(depth),
        };

        match token.placeholder {
            Placeholder::Number | Placeholder::Level(_) => {
                out.push_str(&format!("{value:0width$}", width = token.width));
            }
            Placeholder::Alpha { upper } => {
                let label = to_alpha(value);
                if upper {
                    out.push_str(&label.to_uppercase());
                } else {
                    out.push_str(&label);
                }
            }
            Placeholder::Roman { upper } => out.push_str(&to_roman(value, !upper)),
        }
    }
    out.push_str(&format[last..]);
    out
}

/// Whether heading text already starts with a numbering prefix.
#[must_use]
pub fn is_already_numbered(text: &str) -> bool {
    ALREADY_NUMBERED.is_match(text)
}

/// Numbers legal headings in document order.
#[derive(Debug, Default)]
pub struct HeaderNumbering;

impl Transform for HeaderNumbering {
    fn name(&self) -> &'static str {
        HEADER_NUMBERING
    }

    fn run(&self, root: &mut Node, ctx: &mut Context<'_>) -> Result<(), PipelineError> {
        let mut state = NumberingState::new(&ctx.headers);
        let mut numbered = 0usize;

        root.for_each_heading_mut(&mut |node| {
            let Some(heading) = node.heading() else {
                return;
            };
            if !heading.legal {
                return;
            }
            let depth = usize::from(heading.depth);
            state.advance(depth);

            if heading.number.is_some() || is_already_numbered(&node.plain_text()) {
                tracing::debug!(depth, "Heading already numbered");
                return;
            }

            let number = state.render(depth);
            let prefix = format!("{}{number} ", state.indent(depth));
            match node.children.first_mut().map(|c| &mut c.kind) {
                Some(NodeKind::Text(text)) => text.insert_str(0, &prefix),
                Some(_) => node.children.insert(0, Node::text(prefix)),
                None => node.children.push(Node::text(prefix.trim_end())),
            }
            if let Some(heading) = node.heading_mut() {
                heading.number = Some(number);
            }
            numbered += 1;
        });

        tracing::debug!(headings = numbered, "Numbered legal headings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use crate::pipeline::ProcessingOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn counters(values: &[u32]) -> [u32; MAX_LEVEL] {
        let mut out = [0; MAX_LEVEL];
        out[..values.len()].copy_from_slice(values);
        out
    }

    fn number(root: &mut Node, options: &HeaderOptions) {
        let processing = ProcessingOptions::new().with_headers(options.clone());
        let mut ctx = Context::new(Metadata::new(), &processing);
        HeaderNumbering.run(root, &mut ctx).unwrap();
    }

    fn heading_texts(root: &Node) -> Vec<String> {
        root.children
            .iter()
            .filter(|n| n.heading().is_some())
            .map(Node::plain_text)
            .collect()
    }

    #[test]
    fn test_render_template_placeholders() {
        assert_eq!(render_template("Article %n.", 1, &counters(&[3])), "Article 3.");
        assert_eq!(render_template("%l1.%n", 2, &counters(&[1, 2])), "1.2");
        assert_eq!(render_template("%02n", 1, &counters(&[7])), "07");
        assert_eq!(render_template("%02l1-%n", 2, &counters(&[4, 1])), "04-1");
        assert_eq!(render_template("%A.", 2, &counters(&[1, 3])), "C.");
        assert_eq!(render_template("(%a)", 3, &counters(&[1, 1, 2])), "(b)");
        assert_eq!(render_template("%R.", 1, &counters(&[4])), "IV.");
        assert_eq!(render_template("%r", 2, &counters(&[1, 9])), "ix");
        assert_eq!(render_template("%o", 2, &counters(&[1, 5])), "5");
    }

    #[test]
    fn test_render_template_compounds() {
        assert_eq!(render_template("(%n%c)", 4, &counters(&[1, 1, 1, 1])), "(1a)");
        assert_eq!(render_template("(%n%A)", 4, &counters(&[1, 1, 2, 3])), "(2C)");
        assert_eq!(
            render_template("(%n%c%r)", 5, &counters(&[1, 1, 1, 2, 3])),
            "(1biii)"
        );
        // Not adjacent: %n is the current level.
        assert_eq!(render_template("%n-%c", 4, &counters(&[1, 1, 1, 2])), "2-b");
    }

    #[test]
    fn test_three_level_one_headers() {
        let mut root = Node::root(vec![
            Node::legal_heading(1, vec![Node::text("One")]),
            Node::legal_heading(1, vec![Node::text("Two")]),
            Node::legal_heading(1, vec![Node::text("Three")]),
        ]);
        number(&mut root, &HeaderOptions::default());
        assert_eq!(
            heading_texts(&root),
            vec!["Article 1. One", "Article 2. Two", "Article 3. Three"]
        );
        assert_eq!(
            root.children[1].heading().and_then(|h| h.number.clone()),
            Some("Article 2.".to_owned())
        );
    }

    fn reset_fixture() -> Node {
        Node::root(vec![
            Node::legal_heading(1, vec![Node::text("A")]),
            Node::legal_heading(2, vec![Node::text("a1")]),
            Node::legal_heading(2, vec![Node::text("a2")]),
            Node::legal_heading(1, vec![Node::text("B")]),
            Node::legal_heading(2, vec![Node::text("b1")]),
        ])
    }

    #[test]
    fn test_deeper_levels_reset() {
        let mut root = reset_fixture();
        let options = HeaderOptions {
            no_indent: true,
            ..HeaderOptions::default()
        };
        number(&mut root, &options);
        assert_eq!(
            heading_texts(&root),
            vec![
                "Article 1. A",
                "Section 1. a1",
                "Section 2. a2",
                "Article 2. B",
                "Section 1. b1",
            ]
        );
    }

    #[test]
    fn test_no_reset_continues() {
        let mut root = reset_fixture();
        let options = HeaderOptions {
            no_reset: true,
            no_indent: true,
            ..HeaderOptions::default()
        };
        number(&mut root, &options);
        assert_eq!(heading_texts(&root)[4], "Section 3. b1");
    }

    #[test]
    fn test_indentation() {
        let mut root = Node::root(vec![
            Node::legal_heading(1, vec![Node::text("A")]),
            Node::legal_heading(3, vec![Node::text("c")]),
        ]);
        number(&mut root, &HeaderOptions::default());
        assert_eq!(heading_texts(&root), vec!["Article 1. A", "    (1) c"]);
    }

    #[test]
    fn test_heading_starting_with_formatting_keeps_space() {
        let mut root = Node::root(vec![Node::legal_heading(
            1,
            vec![
                Node::with_children(NodeKind::Strong, vec![Node::text("Bold")]),
                Node::text(" terms"),
            ],
        )]);
        number(&mut root, &HeaderOptions::default());
        assert_eq!(heading_texts(&root), vec!["Article 1. Bold terms"]);
        assert_eq!(root.children[0].children[0].as_text(), Some("Article 1. "));
    }

    #[test]
    fn test_empty_heading_gets_bare_number() {
        let mut root = Node::root(vec![Node::legal_heading(1, Vec::new())]);
        number(&mut root, &HeaderOptions::default());
        assert_eq!(heading_texts(&root), vec!["Article 1."]);
    }

    #[test]
    fn test_undefined_level() {
        let mut root = Node::root(vec![Node::legal_heading(6, vec![Node::text("Deep")])]);
        let options = HeaderOptions {
            no_indent: true,
            ..HeaderOptions::default()
        };
        number(&mut root, &options);
        assert_eq!(heading_texts(&root), vec!["{{undefined-level-6}} Deep"]);
    }

    #[test]
    fn test_already_numbered_is_skipped() {
        let mut root = Node::root(vec![
            Node::legal_heading(1, vec![Node::text("Article 7. Existing")]),
            Node::legal_heading(1, vec![Node::text("Fresh")]),
        ]);
        number(&mut root, &HeaderOptions::default());
        assert_eq!(heading_texts(&root), vec!["Article 7. Existing", "Article 2. Fresh"]);

        // A second pass leaves everything as is.
        number(&mut root, &HeaderOptions::default());
        assert_eq!(heading_texts(&root), vec!["Article 7. Existing", "Article 2. Fresh"]);
    }

    #[test]
    fn test_detection_patterns() {
        assert!(is_already_numbered("Section 2. Payment"));
        assert!(is_already_numbered("1.2. Scope"));
        assert!(is_already_numbered("b. Item"));
        assert!(is_already_numbered("IV. Term"));
        assert!(is_already_numbered("(a) Item"));
        assert!(!is_already_numbered("Sections of the agreement"));
        assert!(!is_already_numbered("e.g. example"));
        assert!(!is_already_numbered("Payment"));
    }

    #[test]
    fn test_markdown_headings_untouched() {
        let mut root = Node::root(vec![Node::with_children(
            NodeKind::Heading(crate::tree::Heading {
                depth: 1,
                legal: false,
                number: None,
            }),
            vec![Node::text("Title")],
        )]);
        number(&mut root, &HeaderOptions::default());
        assert_eq!(heading_texts(&root), vec!["Title"]);
    }

    #[test]
    fn test_options_from_metadata() {
        let metadata = Metadata::from_value(json!({
            "level-one": "Chapter %R",
            "level-two": null,
            "level-six": "%n)",
            "no-reset": true,
        }));
        let options = HeaderOptions::default().with_metadata(&metadata);
        assert_eq!(options.format(1), Some("Chapter %R"));
        assert_eq!(options.format(2), None);
        assert_eq!(options.format(3), Some("(%n)"));
        assert_eq!(options.format(6), Some("%n)"));
        assert!(options.no_reset);
        assert!(!options.no_indent);
    }
}
