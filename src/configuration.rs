//! Unified configuration system.
//!
//! Combines CLI arguments and an optional configuration file into a
//! single validated object. Flags given on the command line win over
//! values read from the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{HopTraceError, Result};
use crate::report::OutputFormat;
use crate::Args;

/// Output settings as they appear in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputFileConfig {
    pub format: Option<String>,
    pub pretty: Option<bool>,
    pub verbose: Option<bool>,
}

/// On-disk configuration file layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub output: OutputFileConfig,
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub pretty: bool,
    pub verbose: bool,
    pub config_file: Option<PathBuf>,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(HopTraceError::ConfigError {
                message: "An input file must be specified".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for creating [`Configuration`] instances from multiple
/// sources. Apply the configuration file first and the CLI arguments
/// second so the command line takes precedence.
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    pretty: Option<bool>,
    verbose: Option<bool>,
    config_file: Option<PathBuf>,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure from parsed CLI arguments. Boolean flags only override
    /// earlier sources when actually given.
    pub fn from_args(mut self, args: &Args) -> Self {
        self.input = Some(args.input.clone());
        if args.output.is_some() {
            self.output = args.output.clone();
        }
        if args.javascript {
            self.format = Some(OutputFormat::Javascript);
        }
        if args.pretty {
            self.pretty = Some(true);
        }
        if args.verbose {
            self.verbose = Some(true);
        }
        self
    }

    /// Configure from a YAML, JSON or TOML configuration file. The
    /// format is detected by extension, falling back to JSON when the
    /// content starts with a brace.
    pub fn from_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| HopTraceError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let extension = path.extension().and_then(|s| s.to_str());
        let mut builder = if extension == Some("toml") {
            self.from_toml_str(&content)?
        } else if extension == Some("json") || content.trim_start().starts_with('{') {
            self.from_json_str(&content)?
        } else {
            self.from_yaml_str(&content)?
        };

        builder.config_file = Some(path.to_path_buf());
        Ok(builder)
    }

    pub fn from_yaml_str(self, yaml: &str) -> Result<Self> {
        let config: ConfigFile =
            serde_yaml::from_str(yaml).map_err(|e| HopTraceError::ConfigError {
                message: format!("Failed to parse YAML config: {}", e),
            })?;
        self.apply(config)
    }

    pub fn from_json_str(self, json: &str) -> Result<Self> {
        let config: ConfigFile =
            serde_json::from_str(json).map_err(|e| HopTraceError::ConfigError {
                message: format!("Failed to parse JSON config: {}", e),
            })?;
        self.apply(config)
    }

    pub fn from_toml_str(self, toml: &str) -> Result<Self> {
        let config: ConfigFile = toml::from_str(toml).map_err(|e| HopTraceError::ConfigError {
            message: format!("Failed to parse TOML config: {}", e),
        })?;
        self.apply(config)
    }

    fn apply(mut self, config: ConfigFile) -> Result<Self> {
        if let Some(format) = config.output.format {
            self.format = Some(OutputFormat::from_str(&format)?);
        }
        if let Some(pretty) = config.output.pretty {
            self.pretty = Some(pretty);
        }
        if let Some(verbose) = config.output.verbose {
            self.verbose = Some(verbose);
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Configuration> {
        let input = self.input.ok_or_else(|| HopTraceError::ConfigError {
            message: "An input file must be specified".to_string(),
        })?;

        let config = Configuration {
            input,
            output: self.output,
            format: self.format.unwrap_or(OutputFormat::Json),
            pretty: self.pretty.unwrap_or(false),
            verbose: self.verbose.unwrap_or(false),
            config_file: self.config_file,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(input: &str) -> Args {
        Args {
            input: PathBuf::from(input),
            output: None,
            javascript: false,
            pretty: false,
            verbose: false,
            config: None,
        }
    }

    mod config_file_parsing {
        use super::*;

        #[test]
        fn should_parse_yaml_config() {
            let config = Configuration::builder()
                .from_yaml_str("output:\n  format: javascript\n  pretty: true\n")
                .unwrap()
                .from_args(&args("records.jsonl"))
                .build()
                .unwrap();

            assert_eq!(config.format, OutputFormat::Javascript);
            assert!(config.pretty);
            assert!(!config.verbose);
        }

        #[test]
        fn should_parse_json_config() {
            let config = Configuration::builder()
                .from_json_str(r#"{"output": {"verbose": true}}"#)
                .unwrap()
                .from_args(&args("records.jsonl"))
                .build()
                .unwrap();

            assert_eq!(config.format, OutputFormat::Json);
            assert!(config.verbose);
        }

        #[test]
        fn should_parse_toml_config() {
            let config = Configuration::builder()
                .from_toml_str("[output]\nformat = \"json\"\npretty = true\n")
                .unwrap()
                .from_args(&args("records.jsonl"))
                .build()
                .unwrap();

            assert_eq!(config.format, OutputFormat::Json);
            assert!(config.pretty);
        }

        #[test]
        fn should_reject_unknown_output_formats() {
            let result = Configuration::builder().from_yaml_str("output:\n  format: xml\n");
            assert!(result.is_err());
        }

        #[test]
        fn should_reject_unparsable_content() {
            let result = Configuration::builder().from_yaml_str("output: [not, a, table]");
            assert!(result
                .err()
                .unwrap()
                .to_string()
                .contains("Failed to parse YAML config"));
        }

        #[test]
        fn should_detect_file_format_by_extension() {
            let directory = tempfile::tempdir().unwrap();
            let path = directory.path().join("hop-trace.toml");
            let mut file = fs::File::create(&path).unwrap();
            writeln!(file, "[output]\nformat = \"javascript\"").unwrap();

            let config = Configuration::builder()
                .from_config_file(&path)
                .unwrap()
                .from_args(&args("records.jsonl"))
                .build()
                .unwrap();

            assert_eq!(config.format, OutputFormat::Javascript);
            assert_eq!(config.config_file, Some(path));
        }

        #[test]
        fn should_report_missing_config_files() {
            let result = Configuration::builder().from_config_file("/nonexistent/hop-trace.yaml");
            assert!(result
                .err()
                .unwrap()
                .to_string()
                .contains("Failed to read config file"));
        }
    }

    mod builder {
        use super::*;

        #[test]
        fn should_require_an_input_file() {
            let result = Configuration::builder().build();
            assert!(result.is_err());
        }

        #[test]
        fn should_apply_defaults() {
            let config = Configuration::builder()
                .from_args(&args("records.jsonl"))
                .build()
                .unwrap();

            assert_eq!(config.input, PathBuf::from("records.jsonl"));
            assert_eq!(config.output, None);
            assert_eq!(config.format, OutputFormat::Json);
            assert!(!config.pretty);
            assert!(!config.verbose);
        }

        #[test]
        fn should_let_cli_flags_override_file_values() {
            let mut cli = args("records.jsonl");
            cli.pretty = true;

            let config = Configuration::builder()
                .from_yaml_str("output:\n  format: javascript\n  pretty: false\n")
                .unwrap()
                .from_args(&cli)
                .build()
                .unwrap();

            assert!(config.pretty);
            assert_eq!(config.format, OutputFormat::Javascript);
        }

        #[test]
        fn should_keep_file_values_the_cli_leaves_unset() {
            let config = Configuration::builder()
                .from_yaml_str("output:\n  verbose: true\n")
                .unwrap()
                .from_args(&args("records.jsonl"))
                .build()
                .unwrap();

            assert!(config.verbose);
        }
    }
}
