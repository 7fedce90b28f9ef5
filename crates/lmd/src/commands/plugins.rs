//! `lmd plugins` command implementation.

use clap::Args;
use lmd_core::{DEFAULT_ORDER, PluginMetadata, PluginRegistry, ValidationOptions, builtin_registry};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the plugins command.
#[derive(Args)]
pub(crate) struct PluginsArgs {
    /// Show ordering constraints for each stage.
    #[arg(short, long)]
    long: bool,
}

impl PluginsArgs {
    /// Execute the plugins command.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in order fails validation.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let registry = builtin_registry();
        registry
            .validate(&DEFAULT_ORDER, &ValidationOptions::default())
            .map_err(|err| CliError::Validation(err.to_string()))?;

        output.info("Built-in stages (execution order):");
        for (position, meta) in ordered(&registry) {
            output.stage(position, meta, self.long);
        }
        Ok(())
    }
}

/// Registered stages of [`DEFAULT_ORDER`] with their 1-based positions.
fn ordered(registry: &PluginRegistry) -> Vec<(usize, &PluginMetadata)> {
    DEFAULT_ORDER
        .iter()
        .filter_map(|name| registry.get(name))
        .enumerate()
        .map(|(index, meta)| (index + 1, meta))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ordered_follows_default_order() {
        let registry = builtin_registry();
        let stages = ordered(&registry);
        let names: Vec<&str> = stages.iter().map(|(_, meta)| meta.name.as_str()).collect();
        assert_eq!(names, DEFAULT_ORDER.to_vec());
        assert_eq!(stages[0].0, 1);
        assert_eq!(stages[5].0, 6);
    }
}
