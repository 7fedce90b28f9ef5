//! Tree-rewriting pipeline stages.
//!
//! Every stage implements [`Transform`] and runs against the shared document
//! tree plus a per-run [`Context`]. Stage order is never assumed: the
//! orchestrator validates it against [`builtin_registry`].

mod clauses;
mod cross_refs;
mod imports;
mod legal_headers;
mod numbering;
mod template_fields;

use std::time::{Duration, Instant};

use chrono::NaiveDate;

pub use clauses::{Clauses, expand_text};
pub use cross_refs::{CrossReference, CrossReferences};
pub use imports::Imports;
pub use legal_headers::{LegalHeaders, split_legal_lines};
pub use numbering::{
    HeaderNumbering, HeaderOptions, LEVEL_KEYS, MAX_LEVEL, NumberingState, is_already_numbered,
    render_template,
};
pub use template_fields::TemplateFields;

use crate::dates::{Locale, parse_date};
use crate::error::PipelineError;
use crate::fields::FieldTracker;
use crate::helpers::HelperEnv;
use crate::metadata::Metadata;
use crate::pipeline::ProcessingOptions;
use crate::plugins::{PluginMetadata, PluginRegistry};
use crate::tree::Node;

pub const IMPORTS: &str = "imports";
pub const LEGAL_HEADERS: &str = "legal-headers";
pub const CLAUSES: &str = "clauses";
pub const TEMPLATE_FIELDS: &str = "template-fields";
pub const HEADER_NUMBERING: &str = "header-numbering";
pub const CROSS_REFERENCES: &str = "cross-references";

/// A pipeline stage.
pub trait Transform: Send + Sync {
    /// Registry name of the stage.
    fn name(&self) -> &'static str;

    /// Rewrite `root` in place.
    fn run(&self, root: &mut Node, ctx: &mut Context<'_>) -> Result<(), PipelineError>;
}

/// State shared by the stages of one run.
pub struct Context<'a> {
    pub options: &'a ProcessingOptions,
    pub metadata: Metadata,
    /// Header formats after document overrides.
    pub headers: HeaderOptions,
    pub env: HelperEnv,
    pub tracker: FieldTracker,
    pub cross_references: Vec<CrossReference>,
    started: Instant,
}

impl<'a> Context<'a> {
    /// Create the context for one run.
    ///
    /// Document keys `level-*`, `no-reset`, `no-indent`, `today` and `locale`
    /// take precedence over `options`.
    #[must_use]
    pub fn new(metadata: Metadata, options: &'a ProcessingOptions) -> Self {
        let headers = options.headers.clone().with_metadata(&metadata);
        let env = helper_env(&metadata, options);
        Self {
            options,
            metadata,
            headers,
            env,
            tracker: FieldTracker::new(),
            cross_references: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Re-read `today` and `locale` after the metadata has changed.
    pub fn refresh_env(&mut self) {
        self.env = helper_env(&self.metadata, self.options);
    }

    /// Whether resolved values are wrapped in tracking spans.
    #[must_use]
    pub fn field_tracking(&self) -> bool {
        self.options.field_tracking
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail once the run has exceeded the configured timeout.
    pub fn check_deadline(&self) -> Result<(), PipelineError> {
        let elapsed = self.elapsed();
        if elapsed > self.options.import_timeout {
            return Err(PipelineError::Timeout {
                elapsed,
                limit: self.options.import_timeout,
            });
        }
        Ok(())
    }
}

fn helper_env(metadata: &Metadata, options: &ProcessingOptions) -> HelperEnv {
    let today = metadata
        .get_str("today")
        .and_then(parse_date)
        .or(options.today)
        .unwrap_or_else(local_today);
    let locale = metadata
        .get_str("locale")
        .map_or(Locale::En, Locale::from_code);
    HelperEnv { today, locale }
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Ordering declarations of the built-in stages.
#[must_use]
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(
        PluginMetadata::new(IMPORTS)
            .with_description("Expand @import directives and merge imported frontmatter")
            .with_run_before(&[LEGAL_HEADERS, CLAUSES, TEMPLATE_FIELDS]),
    );
    registry.register(
        PluginMetadata::new(LEGAL_HEADERS)
            .with_description("Turn l. markers into legal headings")
            .with_run_after(&[IMPORTS])
            .with_run_before(&[HEADER_NUMBERING])
            .with_required(true),
    );
    registry.register(
        PluginMetadata::new(CLAUSES)
            .with_description("Expand conditional clauses and loops")
            .with_run_after(&[IMPORTS])
            .with_run_before(&[TEMPLATE_FIELDS, HEADER_NUMBERING]),
    );
    registry.register(
        PluginMetadata::new(TEMPLATE_FIELDS)
            .with_description("Resolve {{field}} expressions and @today tokens")
            .with_run_after(&[CLAUSES]),
    );
    registry.register(
        PluginMetadata::new(HEADER_NUMBERING)
            .with_description("Number legal headings")
            .with_run_after(&[LEGAL_HEADERS, CLAUSES])
            .with_run_before(&[CROSS_REFERENCES])
            .with_required(true),
    );
    registry.register(
        PluginMetadata::new(CROSS_REFERENCES)
            .with_description("Resolve |key| cross-references")
            .with_run_after(&[HEADER_NUMBERING]),
    );
    registry
}

/// Built-in stage names in their default order.
pub const DEFAULT_ORDER: [&str; 6] = [
    IMPORTS,
    LEGAL_HEADERS,
    CLAUSES,
    TEMPLATE_FIELDS,
    HEADER_NUMBERING,
    CROSS_REFERENCES,
];

/// Instantiate a built-in stage by name.
#[must_use]
pub fn builtin_stage(name: &str) -> Option<Box<dyn Transform>> {
    let stage: Box<dyn Transform> = match name {
        IMPORTS => Box::new(Imports),
        LEGAL_HEADERS => Box::new(LegalHeaders),
        CLAUSES => Box::new(Clauses),
        TEMPLATE_FIELDS => Box::new(TemplateFields),
        HEADER_NUMBERING => Box::new(HeaderNumbering),
        CROSS_REFERENCES => Box::new(CrossReferences),
        _ => return None,
    };
    Some(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::ValidationOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_default_order_is_valid() {
        let result = builtin_registry()
            .validate(&DEFAULT_ORDER, &ValidationOptions::default())
            .unwrap();
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_builtin_stage_names_match() {
        for name in DEFAULT_ORDER {
            assert_eq!(builtin_stage(name).map(|s| s.name()), Some(name));
        }
        assert!(builtin_stage("mixins").is_none());
    }

    #[test]
    fn test_context_document_overrides() {
        let options = ProcessingOptions::new()
            .with_today(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        let metadata = Metadata::from_value(json!({
            "today": "2024-06-30",
            "locale": "fr",
            "level-one": "Titre %n.",
        }));
        let ctx = Context::new(metadata, &options);
        assert_eq!(ctx.env.today, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert_eq!(ctx.env.locale, Locale::Fr);
        assert_eq!(ctx.headers.format(1), Some("Titre %n."));
    }

    #[test]
    fn test_context_uses_option_today() {
        let today = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let options = ProcessingOptions::new().with_today(today);
        let ctx = Context::new(Metadata::new(), &options);
        assert_eq!(ctx.env.today, today);
        assert!(ctx.check_deadline().is_ok());
    }
}
