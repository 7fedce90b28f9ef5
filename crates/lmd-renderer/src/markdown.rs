//! Markdown backend.
//!
//! Writes processed documents back as plain CommonMark: legal headings become
//! `#` headings (capped at six) that keep their rendered number, definition
//! markers disappear and resolved references become text.

use std::fmt::Write;

use lmd_core::Heading;
use lmd_core::inline::escape_text;

use crate::backend::RenderBackend;

/// Markdown render backend.
pub struct MarkdownBackend;

impl RenderBackend for MarkdownBackend {
    const BLOCK_SEPARATOR: &'static str = "\n\n";

    fn text(text: &str, out: &mut String) {
        out.push_str(&escape_text(text));
    }

    fn emphasis(content: &str, out: &mut String) {
        write!(out, "*{content}*").unwrap();
    }

    fn strong(content: &str, out: &mut String) {
        write!(out, "**{content}**").unwrap();
    }

    fn inline_code(code: &str, out: &mut String) {
        let fence = "`".repeat(longest_run(code, '`') + 1);
        let pad = if code.starts_with('`') || code.ends_with('`') {
            " "
        } else {
            ""
        };
        write!(out, "{fence}{pad}{code}{pad}{fence}").unwrap();
    }

    fn link(url: &str, title: &str, content: &str, out: &mut String) {
        write!(out, "[{content}]({})", destination(url, title)).unwrap();
    }

    fn image(url: &str, title: &str, alt: &str, out: &mut String) {
        write!(out, "![{}]({})", escape_text(alt), destination(url, title)).unwrap();
    }

    fn soft_break(out: &mut String) {
        out.push('\n');
    }

    fn hard_break(out: &mut String) {
        out.push_str("\\\n");
    }

    fn paragraph(content: &str, out: &mut String) {
        out.push_str(content);
    }

    fn heading(heading: &Heading, content: &str, out: &mut String) {
        let hashes = "#".repeat(usize::from(heading.depth.clamp(1, 6)));
        write!(out, "{hashes} {}", content.replace('\n', " ")).unwrap();
    }

    fn code_block(info: &str, literal: &str, out: &mut String) {
        let fence = "`".repeat((longest_run(literal, '`') + 1).max(3));
        write!(out, "{fence}{info}\n{literal}").unwrap();
        if !literal.is_empty() && !literal.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&fence);
    }

    fn blockquote(content: &str, out: &mut String) {
        let quoted: Vec<String> = content
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_owned()
                } else {
                    format!("> {line}")
                }
            })
            .collect();
        out.push_str(&quoted.join("\n"));
    }

    fn list(ordered: bool, start: Option<u64>, items: &[String], out: &mut String) {
        let mut number = start.unwrap_or(1);
        let rendered: Vec<String> = items
            .iter()
            .map(|item| {
                let marker = if ordered {
                    let marker = format!("{number}. ");
                    number += 1;
                    marker
                } else {
                    "- ".to_owned()
                };
                indent_item(&marker, item)
            })
            .collect();
        out.push_str(&rendered.join("\n"));
    }

    fn thematic_break(out: &mut String) {
        out.push_str("---");
    }
}

fn destination(url: &str, title: &str) -> String {
    let mut dest = if url.contains(' ') {
        format!("<{url}>")
    } else {
        url.to_owned()
    };
    if !title.is_empty() {
        write!(dest, " \"{}\"", title.replace('"', "\\\"")).unwrap();
    }
    dest
}

/// Prefix the first line with `marker` and indent continuation lines.
fn indent_item(marker: &str, item: &str) -> String {
    let pad = " ".repeat(marker.len());
    let mut out = String::with_capacity(item.len() + marker.len());
    for (i, line) in item.lines().enumerate() {
        if i == 0 {
            out.push_str(marker);
            out.push_str(line);
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&pad);
                out.push_str(line);
            }
        }
    }
    if out.is_empty() {
        out.push_str(marker.trim_end());
    }
    out
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
