//! `lmd check-order` command implementation.

use clap::Args;
use lmd_core::{ValidationOptions, ValidationResult, builtin_registry};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check-order command.
#[derive(Args)]
pub(crate) struct CheckOrderArgs {
    /// Stage names in the order they should run.
    #[arg(required = true)]
    names: Vec<String>,

    /// Warn about stages that are not registered.
    #[arg(long)]
    strict: bool,
}

impl CheckOrderArgs {
    /// Execute the check-order command.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is invalid.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let result = validate(&self.names, self.strict)?;
        output.validation(&result);
        verdict(&result)?;
        output.success(&format!("Order is valid: {}", self.names.join(" ")));
        Ok(())
    }
}

fn validate(names: &[String], strict: bool) -> Result<ValidationResult, CliError> {
    let options = ValidationOptions {
        throw_on_error: false,
        log_warnings: false,
        strict_mode: strict,
    };
    builtin_registry()
        .validate(names, &options)
        .map_err(|err| CliError::Validation(err.to_string()))
}

fn verdict(result: &ValidationResult) -> Result<(), CliError> {
    if result.valid {
        Ok(())
    } else {
        Err(CliError::Validation(format!(
            "invalid stage order ({} error(s))",
            result.errors.len()
        )))
    }
}
