//! HTML backend.
//!
//! Produces HTML fragments. Raw markup from the tree, including field
//! tracking spans, is passed through unescaped.

use std::fmt::Write;

use lmd_core::Heading;

use crate::backend::RenderBackend;
use crate::state::escape_html;

/// HTML render backend.
///
/// Legal headings deeper than six levels render as `<h6>`; the original
/// depth is kept in the `level-N` class.
pub struct HtmlBackend;

impl RenderBackend for HtmlBackend {
    const BLOCK_SEPARATOR: &'static str = "\n";

    fn text(text: &str, out: &mut String) {
        out.push_str(&escape_html(text));
    }

    fn emphasis(content: &str, out: &mut String) {
        write!(out, "<em>{content}</em>").unwrap();
    }

    fn strong(content: &str, out: &mut String) {
        write!(out, "<strong>{content}</strong>").unwrap();
    }

    fn inline_code(code: &str, out: &mut String) {
        write!(out, "<code>{}</code>", escape_html(code)).unwrap();
    }

    fn link(url: &str, title: &str, content: &str, out: &mut String) {
        let title_attr = if title.is_empty() {
            String::new()
        } else {
            format!(r#" title="{}""#, escape_html(title))
        };
        write!(
            out,
            r#"<a href="{}"{title_attr}>{content}</a>"#,
            escape_html(url)
        )
        .unwrap();
    }

    fn image(url: &str, title: &str, alt: &str, out: &mut String) {
        let title_attr = if title.is_empty() {
            String::new()
        } else {
            format!(r#" title="{}""#, escape_html(title))
        };
        write!(
            out,
            r#"<img src="{}"{title_attr} alt="{}">"#,
            escape_html(url),
            escape_html(alt)
        )
        .unwrap();
    }

    fn soft_break(out: &mut String) {
        out.push('\n');
    }

    fn hard_break(out: &mut String) {
        out.push_str("<br>\n");
    }

    fn paragraph(content: &str, out: &mut String) {
        write!(out, "<p>{content}</p>").unwrap();
    }

    fn heading(heading: &Heading, content: &str, out: &mut String) {
        let level = heading.depth.clamp(1, 6);
        if heading.legal {
            write!(
                out,
                r#"<h{level} class="legal-header level-{}">{content}</h{level}>"#,
                heading.depth
            )
            .unwrap();
        } else {
            write!(out, "<h{level}>{content}</h{level}>").unwrap();
        }
    }

    fn code_block(info: &str, literal: &str, out: &mut String) {
        let lang = info.split_whitespace().next().unwrap_or_default();
        if lang.is_empty() {
            write!(out, "<pre><code>{}</code></pre>", escape_html(literal)).unwrap();
        } else {
            write!(
                out,
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                escape_html(lang),
                escape_html(literal)
            )
            .unwrap();
        }
    }

    fn blockquote(content: &str, out: &mut String) {
        write!(out, "<blockquote>\n{content}\n</blockquote>").unwrap();
    }

    fn list(ordered: bool, start: Option<u64>, items: &[String], out: &mut String) {
        match (ordered, start) {
            (true, Some(n)) if n != 1 => write!(out, r#"<ol start="{n}">"#).unwrap(),
            (true, _) => out.push_str("<ol>"),
            (false, _) => out.push_str("<ul>"),
        }
        out.push('\n');
        for item in items {
            writeln!(out, "<li>{item}</li>").unwrap();
        }
        out.push_str(if ordered { "</ol>" } else { "</ul>" });
    }

    fn thematic_break(out: &mut String) {
        out.push_str("<hr>");
    }
}
