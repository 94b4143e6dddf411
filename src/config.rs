use config::{self, FileFormat};
use log::{debug, warn};
use serde::Deserialize;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::error::{Result, RunnerError};
use crate::pipeline::{DEFAULT_PARALLELISM, PipelineConfig};

/// Prefix of environment variables read into [`RunnerConfig`]
pub const ENV_PREFIX: &str = "PARAMRUN";

/// Logging level
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    #[default]
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

/// Runner configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Number of concurrent workers
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Add worker id and resolved program to every result
    #[serde(default)]
    pub debug: bool,
    /// Logging level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            debug: false,
            log_level: LogLevel::default(),
        }
    }
}

impl RunnerConfig {
    /// Load defaults, then `file` if given, then `PARAMRUN__*` environment variables
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut sources: Vec<ConfigSource> = file
            .map(|path| ConfigSource::File(path.to_path_buf()))
            .into_iter()
            .collect();
        sources.push(ConfigSource::Environment(ENV_PREFIX.to_string()));
        load_config(sources)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.pipeline().validate()
    }

    /// The part of the configuration the pipeline needs
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            parallelism: self.parallelism,
            debug: self.debug,
        }
    }
}

/// Source of configuration
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path (TOML format)
    File(PathBuf),
    /// Environment variables with a prefix
    Environment(String),
}

/// Helper function to load configuration from various sources
///
/// Later sources override earlier ones.
pub fn load_config<T>(sources: Vec<ConfigSource>) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    let mut builder = config::Config::builder();

    for source in sources {
        match source {
            ConfigSource::File(path) => {
                if !path.exists() {
                    warn!("Configuration file not found: {}", path.display());
                    continue;
                }

                debug!("Loading TOML configuration from file: {}", path.display());
                builder = builder
                    .add_source(config::File::from(path.as_path()).format(FileFormat::Toml));
            }
            ConfigSource::Environment(prefix) => {
                debug!("Loading configuration from environment with prefix: {}", prefix);
                builder = builder.add_source(
                    config::Environment::with_prefix(&prefix)
                        .separator("__")
                        .try_parsing(true),
                );
            }
        }
    }

    let config = builder
        .build()
        .map_err(|e| RunnerError::Config(format!("Failed to build configuration: {}", e)))?;

    let result = config
        .try_deserialize()
        .map_err(|e| RunnerError::Config(format!("Failed to deserialize configuration: {}", e)))?;

    debug!("Configuration loaded successfully: {:?}", result);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load_toml(contents: &str) -> Result<RunnerConfig> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", contents).unwrap();
        load_config(vec![ConfigSource::File(file.path().to_path_buf())])
    }

    #[test]
    fn test_defaults() {
        let config = load_config::<RunnerConfig>(Vec::new()).unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert_eq!(config.parallelism, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let config = load_toml(
            r#"
            parallelism = 3
            debug = true
            log_level = "trace"
        "#,
        )
        .unwrap();
        assert_eq!(config.parallelism, 3);
        assert!(config.debug);
        assert_eq!(config.log_level, LogLevel::Trace);
    }

    #[test]
    fn test_load_with_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "debug = true").unwrap();

        let config = RunnerConfig::load(Some(file.path())).unwrap();
        assert!(config.debug);
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunnerConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_multiple_sources() {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "parallelism = 2\ndebug = true").unwrap();
        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "parallelism = 16").unwrap();

        // Later sources override earlier ones
        let config: RunnerConfig = load_config(vec![
            ConfigSource::File(first.path().to_path_buf()),
            ConfigSource::File(second.path().to_path_buf()),
        ])
        .unwrap();

        assert_eq!(config.parallelism, 16);
        assert!(config.debug);
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let config = load_toml("parallelism = 0").unwrap();
        assert!(matches!(config.validate(), Err(RunnerError::Config(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(load_toml("parallelism = -1"), Err(RunnerError::Config(_))));
        assert!(matches!(load_toml(r#"log_level = "loud""#), Err(RunnerError::Config(_))));
    }

    #[test]
    fn test_pipeline_config() {
        let config = RunnerConfig {
            parallelism: 5,
            debug: true,
            log_level: LogLevel::Warn,
        };
        assert_eq!(
            config.pipeline(),
            PipelineConfig {
                parallelism: 5,
                debug: true
            }
        );
    }
}
