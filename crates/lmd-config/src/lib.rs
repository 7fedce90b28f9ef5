//! Configuration management for Legal Markdown.
//!
//! Parses `legal-md.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `processing.base_dir` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use lmd_core::stages::MAX_LEVEL;
use lmd_core::{HeaderOptions, ProcessingOptions};
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override field tracking.
    pub field_tracking: Option<bool>,
    /// Override counter reset suppression.
    pub no_reset: Option<bool>,
    /// Override heading indentation suppression.
    pub no_indent: Option<bool>,
    /// Override output format.
    pub format: Option<OutputFormat>,
    /// Override import base directory.
    pub base_dir: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "legal-md.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Header format configuration.
    pub headers: HeadersConfig,
    /// Processing configuration (paths are relative strings from TOML).
    processing: ProcessingConfigRaw,
    /// Output configuration.
    output: OutputConfigRaw,

    /// Resolved processing configuration (set after loading).
    #[serde(skip)]
    pub processing_resolved: ProcessingConfig,
    /// Resolved output format (set after loading).
    #[serde(skip)]
    pub format: OutputFormat,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Header numbering configuration.
///
/// An absent level keeps the built-in default; an empty string leaves the
/// level without a format.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HeadersConfig {
    pub level_one: Option<String>,
    pub level_two: Option<String>,
    pub level_three: Option<String>,
    pub level_four: Option<String>,
    pub level_five: Option<String>,
    pub level_six: Option<String>,
    pub level_seven: Option<String>,
    pub level_eight: Option<String>,
    pub level_nine: Option<String>,
    /// Keep deeper counters running across shallower headings.
    pub no_reset: bool,
    /// Do not indent deeper headings.
    pub no_indent: bool,
}

impl HeadersConfig {
    fn levels(&self) -> [Option<&String>; MAX_LEVEL] {
        [
            self.level_one.as_ref(),
            self.level_two.as_ref(),
            self.level_three.as_ref(),
            self.level_four.as_ref(),
            self.level_five.as_ref(),
            self.level_six.as_ref(),
            self.level_seven.as_ref(),
            self.level_eight.as_ref(),
            self.level_nine.as_ref(),
        ]
    }

    /// Header options with configured levels applied over the defaults.
    #[must_use]
    pub fn header_options(&self) -> HeaderOptions {
        let mut options = HeaderOptions {
            no_reset: self.no_reset,
            no_indent: self.no_indent,
            ..HeaderOptions::default()
        };
        for (index, level) in self.levels().into_iter().enumerate() {
            if let Some(format) = level {
                let format = (!format.is_empty()).then(|| format.clone());
                options.set_format(index + 1, format);
            }
        }
        options
    }
}

/// Raw processing configuration as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProcessingConfigRaw {
    field_tracking: Option<bool>,
    max_import_depth: Option<usize>,
    import_timeout_secs: Option<u64>,
    base_dir: Option<String>,
}

/// Resolved processing configuration.
#[derive(Debug)]
pub struct ProcessingConfig {
    /// Wrap resolved values in tracking spans.
    pub field_tracking: bool,
    /// Maximum import nesting.
    pub max_import_depth: usize,
    /// Wall-clock limit for import expansion.
    pub import_timeout: Duration,
    /// Base directory for imports; the input file's directory when unset.
    pub base_dir: Option<PathBuf>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            field_tracking: false,
            max_import_depth: 10,
            import_timeout: Duration::from_secs(30),
            base_dir: None,
        }
    }
}

/// Raw output configuration as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputConfigRaw {
    format: Option<String>,
}

/// Output format of rendered documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Html,
    Markdown,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
        }
    }

    /// Conventional file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "md",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(ConfigError::Validation(format!(
                "output.format must be \"html\" or \"markdown\", got \"{other}\""
            ))),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`processing.base_dir`").
        field: String,
        /// Error message (e.g., "${`LEGAL_MD_HOME`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `legal-md.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(field_tracking) = settings.field_tracking {
            self.processing_resolved.field_tracking = field_tracking;
        }
        if let Some(no_reset) = settings.no_reset {
            self.headers.no_reset = no_reset;
        }
        if let Some(no_indent) = settings.no_indent {
            self.headers.no_indent = no_indent;
        }
        if let Some(format) = settings.format {
            self.format = format;
        }
        if let Some(base_dir) = &settings.base_dir {
            self.processing_resolved.base_dir = Some(base_dir.clone());
        }
    }

    /// Processing options for the pipeline.
    ///
    /// `default_base_dir` is used when neither the config nor the CLI set a
    /// base directory.
    #[must_use]
    pub fn processing_options(&self, default_base_dir: &Path) -> ProcessingOptions {
        let processing = &self.processing_resolved;
        ProcessingOptions::new()
            .with_headers(self.headers.header_options())
            .with_field_tracking(processing.field_tracking)
            .with_max_import_depth(processing.max_import_depth)
            .with_import_timeout(processing.import_timeout)
            .with_base_dir(
                processing
                    .base_dir
                    .clone()
                    .unwrap_or_else(|| default_base_dir.to_path_buf()),
            )
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref base_dir) = self.processing.base_dir {
            self.processing.base_dir = Some(expand::expand_env(base_dir, "processing.base_dir")?);
        }
        Ok(())
    }

    /// Validate raw values and resolve them against the config directory.
    fn resolve(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let raw = &self.processing;
        let defaults = ProcessingConfig::default();

        let max_import_depth = raw.max_import_depth.unwrap_or(defaults.max_import_depth);
        if max_import_depth == 0 {
            return Err(ConfigError::Validation(
                "processing.max_import_depth must be greater than 0".to_owned(),
            ));
        }
        let import_timeout = match raw.import_timeout_secs {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "processing.import_timeout_secs must be greater than 0".to_owned(),
                ));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.import_timeout,
        };

        self.processing_resolved = ProcessingConfig {
            field_tracking: raw.field_tracking.unwrap_or(defaults.field_tracking),
            max_import_depth,
            import_timeout,
            base_dir: raw.base_dir.as_deref().map(|dir| config_dir.join(dir)),
        };
        self.format = match &self.output.format {
            Some(format) => format.parse()?,
            None => OutputFormat::default(),
        };

        Ok(())
    }
}
