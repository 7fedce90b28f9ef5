//! Colored terminal output for command reports.

use console::{Style, Term};
use lmd_core::{PluginMetadata, ValidationResult};

use crate::commands::process::FieldCounts;

/// Terminal reporter writing to stderr.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    bold: Style,
    dim: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            bold: Style::new().bold(),
            dim: Style::new().dim(),
        }
    }

    fn line(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    pub(crate) fn info(&self, msg: &str) {
        self.line(msg);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.line(&self.green.apply_to(msg).to_string());
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(&self.red.apply_to(msg).to_string());
    }

    /// A stage and its position in the execution order, optionally followed
    /// by its ordering constraints.
    pub(crate) fn stage(&self, position: usize, meta: &PluginMetadata, long: bool) {
        let name = format!("{:<20}", meta.name);
        self.line(&format!(
            "{position:>2}. {} {}",
            self.bold.apply_to(name),
            meta.description
        ));
        if !long {
            return;
        }
        for (label, names) in [("after", &meta.run_after), ("before", &meta.run_before)] {
            if !names.is_empty() {
                let detail = format!("      {label}: {}", names.join(", "));
                self.line(&self.dim.apply_to(detail).to_string());
            }
        }
    }

    /// Errors, warnings and the suggested order of a validation run.
    pub(crate) fn validation(&self, result: &ValidationResult) {
        for issue in &result.errors {
            let msg = format!("error[{}]: {}", issue.kind, issue.message);
            self.line(&self.red.apply_to(msg).to_string());
        }
        for issue in &result.warnings {
            let msg = format!("warning[{}]: {}", issue.kind, issue.message);
            self.line(&self.yellow.apply_to(msg).to_string());
        }
        if let Some(order) = &result.suggested_order {
            self.line(&format!("Suggested order: {}", order.join(" ")));
        }
    }

    /// Field tracking totals; missing fields are listed in yellow.
    pub(crate) fn fields(&self, counts: &FieldCounts<'_>) {
        self.line(&format!(
            "Fields: {} imported, {} computed, {} missing",
            counts.imported,
            counts.computed,
            counts.missing.len()
        ));
        if !counts.missing.is_empty() {
            let msg = format!("Missing fields: {}", counts.missing.join(", "));
            self.line(&self.yellow.apply_to(msg).to_string());
        }
    }
}
