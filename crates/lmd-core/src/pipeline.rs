//! Orchestration of one processing run.
//!
//! A [`Pipeline`] holds a validated stage list and the [`ProcessingOptions`]
//! shared by every run. Each call to [`Pipeline::process`] allocates fresh
//! metadata, numbering state and field tracker, runs the stages in order and
//! returns the rewritten tree.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::error::PipelineError;
use crate::fields::TrackedField;
use crate::frontmatter;
use crate::markdown::parse_markdown;
use crate::metadata::{CROSS_REFERENCES_KEY, FIELD_MAPPINGS_KEY, Metadata};
use crate::plugins::{IssueKind, OrderError, PluginRegistry, ValidationOptions};
use crate::stages::{
    Context, CrossReference, DEFAULT_ORDER, HeaderOptions, Transform, builtin_registry,
    builtin_stage,
};
use crate::tree::Node;

/// Function type for reading imported files.
pub type ReadFileFn = dyn Fn(&Path) -> io::Result<String> + Send + Sync;

/// Options shared by every run of a [`Pipeline`].
pub struct ProcessingOptions {
    /// Header formats and reset/indent policy before document overrides.
    pub headers: HeaderOptions,
    /// Wrap resolved values in `legal-field` spans.
    pub field_tracking: bool,
    /// Directory that top-level imports resolve against.
    pub base_dir: PathBuf,
    /// Path of the document being processed, relative to `base_dir`.
    ///
    /// Used to reject imports of the document itself.
    pub source_path: Option<PathBuf>,
    /// Maximum import nesting.
    ///
    /// Default: 10
    pub max_import_depth: usize,
    /// Wall-clock limit for import expansion.
    ///
    /// Default: 30 seconds
    pub import_timeout: Duration,
    /// Date used for `@today`; the local date when unset.
    pub today: Option<NaiveDate>,
    /// Custom file reader. Defaults to [`std::fs::read_to_string`].
    pub read_file: Option<Box<ReadFileFn>>,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            headers: HeaderOptions::default(),
            field_tracking: false,
            base_dir: PathBuf::from("."),
            source_path: None,
            max_import_depth: 10,
            import_timeout: Duration::from_secs(30),
            today: None,
            read_file: None,
        }
    }
}

impl fmt::Debug for ProcessingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingOptions")
            .field("headers", &self.headers)
            .field("field_tracking", &self.field_tracking)
            .field("base_dir", &self.base_dir)
            .field("source_path", &self.source_path)
            .field("max_import_depth", &self.max_import_depth)
            .field("import_timeout", &self.import_timeout)
            .field("today", &self.today)
            .field("read_file", &self.read_file.as_ref().map(|_| ".."))
            .finish()
    }
}

impl ProcessingOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderOptions) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_field_tracking(mut self, enabled: bool) -> Self {
        self.field_tracking = enabled;
        self
    }

    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }

    #[must_use]
    pub fn with_import_timeout(mut self, timeout: Duration) -> Self {
        self.import_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Set a custom file reader for imports.
    #[must_use]
    pub fn with_read_file<F>(mut self, read_file: F) -> Self
    where
        F: Fn(&Path) -> io::Result<String> + Send + Sync + 'static,
    {
        self.read_file = Some(Box::new(read_file));
        self
    }

    /// Read a file through the configured reader.
    pub fn read(&self, path: &Path) -> io::Result<String> {
        match &self.read_file {
            Some(read_file) => read_file(path),
            None => std::fs::read_to_string(path),
        }
    }
}

/// Result of one processing run.
#[derive(Debug)]
pub struct ProcessedDocument {
    pub tree: Node,
    /// Final metadata, including `_cross_references` and, with tracking,
    /// `_field_mappings`.
    pub metadata: Metadata,
    /// Tracked fields in resolution order (empty without tracking).
    pub fields: Vec<TrackedField>,
    pub cross_references: Vec<CrossReference>,
}

/// A validated sequence of stages.
pub struct Pipeline {
    options: ProcessingOptions,
    stages: Vec<Box<dyn Transform>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("stages", &self.order())
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline running every built-in stage.
    pub fn new(options: ProcessingOptions) -> Result<Self, PipelineError> {
        Self::with_order(options, &DEFAULT_ORDER)
    }

    /// Create a pipeline running the named built-in stages.
    ///
    /// An order that breaks a declared constraint is replaced by the
    /// suggested order. Cycles and conflicts fail with [`PipelineError::Order`].
    pub fn with_order<S: AsRef<str>>(
        options: ProcessingOptions,
        names: &[S],
    ) -> Result<Self, PipelineError> {
        let stages = names
            .iter()
            .map(|name| {
                builtin_stage(name.as_ref()).ok_or_else(|| PipelineError::UnknownStage {
                    name: name.as_ref().to_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_stages(options, &builtin_registry(), stages)
    }

    /// Create a pipeline from arbitrary stages checked against `registry`.
    pub fn from_stages(
        options: ProcessingOptions,
        registry: &PluginRegistry,
        stages: Vec<Box<dyn Transform>>,
    ) -> Result<Self, PipelineError> {
        let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
        let validation = ValidationOptions {
            throw_on_error: false,
            log_warnings: true,
            strict_mode: false,
        };
        let result = registry.validate(&names, &validation)?;
        if result.valid {
            return Ok(Self { options, stages });
        }

        let repairable = result
            .errors
            .iter()
            .all(|e| e.kind == IssueKind::DependencyViolation);
        let suggested = match result.suggested_order.clone() {
            Some(suggested) if repairable => suggested,
            _ => return Err(OrderError::from_result(result).into()),
        };
        tracing::warn!(
            given = %names.join(", "),
            suggested = %suggested.join(", "),
            "Stage order violates dependencies, using suggested order"
        );

        let mut slots: Vec<Option<Box<dyn Transform>>> = stages.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(slots.len());
        for name in &suggested {
            if let Some(stage) = slots
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|s| s.name() == name))
                .and_then(Option::take)
            {
                ordered.push(stage);
            }
        }
        Ok(Self {
            options,
            stages: ordered,
        })
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn order(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    /// Process a document with optional YAML frontmatter.
    pub fn process(&self, source: &str) -> Result<ProcessedDocument, PipelineError> {
        let (frontmatter, body) = frontmatter::parse(source)?;
        self.process_with_metadata(body, Metadata::from_map(frontmatter))
    }

    /// Process a markdown body against an existing metadata map.
    pub fn process_with_metadata(
        &self,
        markdown: &str,
        metadata: Metadata,
    ) -> Result<ProcessedDocument, PipelineError> {
        let mut root = parse_markdown(markdown);
        let mut ctx = Context::new(metadata, &self.options);

        for stage in &self.stages {
            tracing::debug!(stage = stage.name(), "Running stage");
            stage.run(&mut root, &mut ctx)?;
        }

        let references: Vec<Value> = ctx
            .cross_references
            .iter()
            .map(|r| {
                json!({
                    "key": r.key,
                    "sectionNumber": r.section_number,
                    "headerText": r.header_text,
                    "level": r.level,
                })
            })
            .collect();
        ctx.metadata.insert(CROSS_REFERENCES_KEY, Value::Array(references));
        if ctx.field_tracking() {
            ctx.metadata.insert(FIELD_MAPPINGS_KEY, ctx.tracker.to_value());
        }
        tracing::debug!(
            elapsed = ?ctx.elapsed(),
            fields = ctx.tracker.len(),
            references = ctx.cross_references.len(),
            "Processed document"
        );

        Ok(ProcessedDocument {
            tree: root,
            metadata: ctx.metadata,
            fields: ctx.tracker.into_fields(),
            cross_references: ctx.cross_references,
        })
    }
}
