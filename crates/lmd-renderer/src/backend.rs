//! Output syntax hooks.

use lmd_core::Heading;

/// Format-specific rendering of tree elements.
///
/// The generic renderer renders children first and hands the finished
/// content to the backend, so every hook appends one complete element.
pub trait RenderBackend {
    /// Written between sibling blocks.
    const BLOCK_SEPARATOR: &'static str;

    /// Plain text, escaped for the output format.
    fn text(text: &str, out: &mut String);

    /// Opaque markup written verbatim.
    fn raw_markup(markup: &str, out: &mut String) {
        out.push_str(markup);
    }

    fn emphasis(content: &str, out: &mut String);

    fn strong(content: &str, out: &mut String);

    fn inline_code(code: &str, out: &mut String);

    fn link(url: &str, title: &str, content: &str, out: &mut String);

    fn image(url: &str, title: &str, alt: &str, out: &mut String);

    fn soft_break(out: &mut String);

    fn hard_break(out: &mut String);

    fn paragraph(content: &str, out: &mut String);

    fn heading(heading: &Heading, content: &str, out: &mut String);

    fn code_block(info: &str, literal: &str, out: &mut String);

    fn blockquote(content: &str, out: &mut String);

    /// A list whose items are already rendered.
    fn list(ordered: bool, start: Option<u64>, items: &[String], out: &mut String);

    fn thematic_break(out: &mut String);
}
