//! `{{field}}` and `@today` resolution over text runs.

use super::{Context, TEMPLATE_FIELDS, Transform};
use crate::error::PipelineError;
use crate::fields::{
    FieldResolver, FieldTracker, Piece, SPAN_CLOSE, contains_fields, is_span_open,
};
use crate::tree::{Node, NodeKind, merge_adjacent_text};

/// Resolves template fields in every text run outside code.
#[derive(Debug, Default)]
pub struct TemplateFields;

impl Transform for TemplateFields {
    fn name(&self) -> &'static str {
        TEMPLATE_FIELDS
    }

    fn run(&self, root: &mut Node, ctx: &mut Context<'_>) -> Result<(), PipelineError> {
        let resolver =
            FieldResolver::new(&ctx.metadata, ctx.env).with_spans(ctx.options.field_tracking);
        let before = ctx.tracker.len();
        resolve_node(root, &resolver, &mut ctx.tracker);
        tracing::debug!(fields = ctx.tracker.len() - before, "Resolved template fields");
        Ok(())
    }
}

pub(super) fn resolve_node(
    node: &mut Node,
    resolver: &FieldResolver<'_>,
    tracker: &mut FieldTracker,
) {
    match &mut node.kind {
        NodeKind::CodeBlock { .. } | NodeKind::InlineCode(_) => return,
        NodeKind::Link { url, .. } | NodeKind::Image { url, .. } if url.contains("{{") => {
            *url = resolver.resolve_plain(url);
        }
        _ => {}
    }

    if !node.children.iter().any(|c| c.as_text().is_some_and(contains_fields)) {
        for child in &mut node.children {
            resolve_node(child, resolver, tracker);
        }
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
            NodeKind::Text(text) if span_depth == 0 && contains_fields(text) => {
                out.extend(
                    resolver
                        .resolve_text(text, tracker)
                        .into_iter()
                        .map(|piece| match piece {
                            Piece::Text(t) => Node::text(t),
                            Piece::Markup(m) => Node::raw(m),
                        }),
                );
                continue;
            }
            _ => resolve_node(&mut child, resolver, tracker),
        }
        out.push(child);
    }
    merge_adjacent_text(&mut out);
    node.children = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldStatus;
    use crate::markdown::parse_markdown;
    use crate::metadata::Metadata;
    use crate::pipeline::ProcessingOptions;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn metadata() -> Metadata {
        Metadata::from_value(json!({
            "client": { "name": "Acme", "legal_name": "Acme_Corp" },
            "url": "https://example.com",
        }))
    }

    fn run(source: &str, tracking: bool) -> (Node, FieldTracker) {
        let mut root = parse_markdown(source);
        let options = ProcessingOptions::new()
            .with_field_tracking(tracking)
            .with_today(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        let mut ctx = Context::new(metadata(), &options);
        TemplateFields.run(&mut root, &mut ctx).unwrap();
        (root, ctx.tracker)
    }

    #[test]
    fn test_resolves_in_nested_inline() {
        let (root, tracker) = run("Client *{{client.legal_name}}* on @today[us]", false);
        assert_eq!(
            root.children[0].children,
            vec![
                Node::text("Client "),
                Node::with_children(NodeKind::Emphasis, vec![Node::text("Acme_Corp")]),
                Node::text(" on 01/15/2024"),
            ]
        );
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_code_is_untouched() {
        let (root, tracker) = run("`{{client.name}}`\n\n```\n{{client.name}}\n```\n", false);
        assert_eq!(
            root.children[0].children,
            vec![Node::new(NodeKind::InlineCode("{{client.name}}".to_owned()))]
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_link_url() {
        let (root, _) = run("[site]({{url}}/terms)", false);
        assert!(matches!(
            &root.children[0].children[0].kind,
            NodeKind::Link { url, .. } if url == "https://example.com/terms"
        ));
    }

    #[test]
    fn test_tracking_spans() {
        let (root, tracker) = run("Hi {{client.name}} {{nope}}", true);
        let children = &root.children[0].children;
        assert_eq!(
            children[1],
            Node::raw("<span class=\"legal-field imported-value\" data-field=\"client.name\">")
        );
        assert_eq!(children[2], Node::text("Acme"));
        assert_eq!(children[3], Node::raw(SPAN_CLOSE));
        assert_eq!(
            tracker.get("nope").map(|f| f.status),
            Some(FieldStatus::MissingValue)
        );
    }

    #[test]
    fn test_spanned_text_is_not_resolved_twice() {
        let mut root = Node::root(vec![Node::paragraph(vec![
            Node::raw("<span class=\"legal-field missing-value\" data-field=\"x\">"),
            Node::text("{{x}}"),
            Node::raw(SPAN_CLOSE),
        ])]);
        let options = ProcessingOptions::new().with_field_tracking(true);
        let mut ctx = Context::new(metadata(), &options);
        TemplateFields.run(&mut root, &mut ctx).unwrap();
        assert_eq!(root.children[0].children[1], Node::text("{{x}}"));
        assert!(ctx.tracker.is_empty());
    }
}
