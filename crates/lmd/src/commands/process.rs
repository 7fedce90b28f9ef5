//! `lmd process` command implementation.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use lmd_config::{CliSettings, Config, OutputFormat};
use lmd_core::{FieldStatus, Pipeline, ProcessedDocument};
use lmd_renderer::{DocumentRenderer, HtmlBackend, MarkdownBackend};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the process command.
#[derive(Args)]
pub(crate) struct ProcessArgs {
    /// Input legal markdown file.
    input: PathBuf,

    /// Output file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (overrides config).
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Path to configuration file (default: auto-discover legal-md.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base directory for imports (default: the input file's directory).
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Wrap field values in tracking spans.
    #[arg(long)]
    field_tracking: bool,

    /// Keep numbering running across higher-level headers.
    #[arg(long)]
    no_reset: bool,

    /// Do not indent numbered headers.
    #[arg(long)]
    no_indent: bool,

    /// Enable verbose output (stage timing and import warnings).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ProcessArgs {
    /// Execute the process command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, reading the input,
    /// processing or writing the output fails.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let cli_settings = CliSettings {
            field_tracking: self.field_tracking.then_some(true),
            no_reset: self.no_reset.then_some(true),
            no_indent: self.no_indent.then_some(true),
            format: self.format,
            base_dir: self.base_dir.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Loaded configuration");
        }

        let source = std::fs::read_to_string(&self.input)?;
        let doc = process_source(&config, &self.input, &source)?;
        if !doc.fields.is_empty() {
            output.fields(&FieldCounts::new(&doc));
        }

        let rendered = render(&doc, config.format);
        match &self.output {
            Some(path) => {
                std::fs::write(path, rendered)?;
                output.success(&format!("Wrote {} ({})", path.display(), config.format));
            }
            None => std::io::stdout().lock().write_all(rendered.as_bytes())?,
        }
        Ok(())
    }
}

/// Run the pipeline over `source` read from `input`.
fn process_source(
    config: &Config,
    input: &Path,
    source: &str,
) -> Result<ProcessedDocument, CliError> {
    let input = std::path::absolute(input)?;
    let input_dir = input.parent().unwrap_or_else(|| Path::new("."));
    let options = config
        .processing_options(input_dir)
        .with_source_path(input);
    let pipeline = Pipeline::new(options)?;
    Ok(pipeline.process(source)?)
}

/// Render a processed document in the requested format.
fn render(doc: &ProcessedDocument, format: OutputFormat) -> String {
    match format {
        OutputFormat::Html => DocumentRenderer::<HtmlBackend>::new().render(&doc.tree),
        OutputFormat::Markdown => DocumentRenderer::<MarkdownBackend>::new().render(&doc.tree),
    }
    .output
}

/// Tracked fields grouped by outcome.
pub(crate) struct FieldCounts<'a> {
    pub(crate) imported: usize,
    pub(crate) computed: usize,
    pub(crate) missing: Vec<&'a str>,
}

impl<'a> FieldCounts<'a> {
    fn new(doc: &'a ProcessedDocument) -> Self {
        let mut counts = Self {
            imported: 0,
            computed: 0,
            missing: Vec::new(),
        };
        for field in &doc.fields {
            match field.status {
                FieldStatus::ImportedValue => counts.imported += 1,
                FieldStatus::Highlight => counts.computed += 1,
                FieldStatus::MissingValue => counts.missing.push(&field.field_name),
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(format: OutputFormat) -> Config {
        let mut config = Config::default();
        config.format = format;
        config
    }

    #[test]
    fn test_process_with_import_relative_to_input() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("parties.md"), "ll. Parties\n").unwrap();
        let input = dir.path().join("contract.md");
        let source = "l. Agreement\n\n@import parties.md\n";
        std::fs::write(&input, source).unwrap();

        let config = config(OutputFormat::Markdown);
        let doc = process_source(&config, &input, source).unwrap();
        assert_eq!(
            render(&doc, OutputFormat::Markdown),
            "# Article 1. Agreement\n\n## Section 1. Parties\n"
        );
    }

    #[test]
    fn test_html_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("contract.md");
        let config = config(OutputFormat::Html);
        let doc = process_source(&config, &input, "l. Scope\n").unwrap();
        assert_eq!(
            render(&doc, config.format),
            "<h1 class=\"legal-header level-1\">Article 1. Scope</h1>\n"
        );
    }

    #[test]
    fn test_field_counts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("contract.md");
        let mut config = config(OutputFormat::Html);
        config.processing_resolved.field_tracking = true;
        let source = "---\nclient: Acme\n---\n{{client}} {{upper(client)}} {{missing}} {{other}}\n";
        let doc = process_source(&config, &input, source).unwrap();
        let counts = FieldCounts::new(&doc);
        assert_eq!(counts.imported, 1);
        assert_eq!(counts.computed, 1);
        assert_eq!(counts.missing, vec!["missing", "other"]);
    }

    #[test]
    fn test_self_import_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("loop.md");
        let source = "@import loop.md\n";
        std::fs::write(&input, source).unwrap();

        let config = config(OutputFormat::Html);
        let err = process_source(&config, &input, source).unwrap_err();
        assert!(err.to_string().contains("loop.md"), "{err}");
    }
}
