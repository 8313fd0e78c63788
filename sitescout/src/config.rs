use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ScoutError, ScoutResult};

/// Concurrency cap used when none is configured
pub const DEFAULT_CONCURRENCY: usize = 20;
/// Per-request timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// How response bodies that are not valid UTF-8 are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Record an error for the target
    FailFast,
    /// Search the raw bytes anyway
    #[default]
    Lossy,
}

impl std::str::FromStr for EncodingMode {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failfast" | "fail-fast" => Ok(Self::FailFast),
            "lossy" => Ok(Self::Lossy),
            other => Err(ScoutError::config_error(format!(
                "Unknown encoding mode '{}' (expected failfast or lossy)",
                other
            ))),
        }
    }
}

/// Configuration for a scouting run.
///
/// # Configuration Locations
///
/// Values are layered, later sources winning:
/// 1. Global `$HOME/.config/sitescout/config.yaml`
/// 2. Local `.sitescout.yaml` in the current directory
/// 3. Custom config file given with `--config`
/// 4. Command-line flags (see [`ScoutConfig::merge_with_cli`])
///
/// # Configuration Format
///
/// ```yaml
/// input_path: "urls.txt"       # CSV, header row, target in the second column
/// output_path: "results.txt"
/// pattern: "Treasure"          # regex unless `literal` is set
/// literal: false
/// case_insensitive: false
/// concurrency: 20              # max fetch+match tasks in flight
/// timeout_secs: 10             # per request
/// target_column: 1             # zero-based
/// default_scheme: "http"       # used for bare hostnames
/// fail_on_status: false        # treat non-2xx responses as errors
/// encoding_mode: "lossy"       # or "failfast"
/// show_progress: false
/// log_level: "warn"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// CSV file listing the targets
    pub input_path: PathBuf,

    /// Where the results CSV is written
    pub output_path: PathBuf,

    /// The search term, compiled once into a pattern
    pub pattern: String,

    /// Match the search term literally instead of as a regex
    pub literal: bool,

    pub case_insensitive: bool,

    /// Maximum number of targets fetched and searched at the same time
    pub concurrency: NonZeroUsize,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Zero-based CSV column holding the target
    pub target_column: usize,

    /// Scheme prepended to targets that do not carry one
    pub default_scheme: String,

    /// Record non-success HTTP statuses as errors instead of searching the body
    pub fail_on_status: bool,

    pub encoding_mode: EncodingMode,

    /// Show a progress spinner on stderr
    pub show_progress: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("urls.txt"),
            output_path: PathBuf::from("results.txt"),
            pattern: "Treasure".to_string(),
            literal: false,
            case_insensitive: false,
            concurrency: default_concurrency(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            target_column: 1,
            default_scheme: "http".to_string(),
            fail_on_status: false,
            encoding_mode: EncodingMode::default(),
            show_progress: false,
            log_level: "warn".to_string(),
        }
    }
}

fn default_concurrency() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN)
}

/// Values given on the command line; `None` leaves the configured value alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub pattern: Option<String>,
    pub literal: bool,
    pub case_insensitive: bool,
    pub concurrency: Option<NonZeroUsize>,
    pub timeout_secs: Option<u64>,
    pub target_column: Option<usize>,
    pub default_scheme: Option<String>,
    pub fail_on_status: bool,
    pub encoding_mode: Option<EncodingMode>,
    pub show_progress: bool,
    pub log_level: Option<String>,
}

impl ScoutConfig {
    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> ScoutResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("sitescout/config.yaml")),
            Some(PathBuf::from(".sitescout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly requested file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: ScoutConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(path) = cli.input_path {
            self.input_path = path;
        }
        if let Some(path) = cli.output_path {
            self.output_path = path;
        }
        if let Some(pattern) = cli.pattern {
            self.pattern = pattern;
        }
        if cli.literal {
            self.literal = true;
        }
        if cli.case_insensitive {
            self.case_insensitive = true;
        }
        if let Some(concurrency) = cli.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(timeout) = cli.timeout_secs {
            self.timeout_secs = timeout;
        }
        if let Some(column) = cli.target_column {
            self.target_column = column;
        }
        if let Some(scheme) = cli.default_scheme {
            self.default_scheme = scheme;
        }
        if cli.fail_on_status {
            self.fail_on_status = true;
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if cli.show_progress {
            self.show_progress = true;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Rejects values that would make the run meaningless
    pub fn validate(&self) -> ScoutResult<()> {
        if self.timeout_secs == 0 {
            return Err(ScoutError::config_error("timeout_secs must be greater than 0"));
        }
        let scheme = self.default_scheme.as_str();
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
        {
            return Err(ScoutError::config_error(format!(
                "Invalid default scheme '{}'",
                self.default_scheme
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            input_path: "targets.csv"
            output_path: "out.csv"
            pattern: "Treasure|Gold"
            concurrency: 4
            timeout_secs: 3
            target_column: 0
            default_scheme: "https"
            fail_on_status: true
            encoding_mode: "failfast"
            log_level: "debug"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = ScoutConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.input_path, PathBuf::from("targets.csv"));
        assert_eq!(config.output_path, PathBuf::from("out.csv"));
        assert_eq!(config.pattern, "Treasure|Gold");
        assert_eq!(config.concurrency, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.target_column, 0);
        assert_eq!(config.default_scheme, "https");
        assert!(config.fail_on_status);
        assert_eq!(config.encoding_mode, EncodingMode::FailFast);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"pattern: \"needle\"\n").unwrap();

        let config = ScoutConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.pattern, "needle");
        assert_eq!(config.input_path, PathBuf::from("urls.txt"));
        assert_eq!(config.output_path, PathBuf::from("results.txt"));
        assert_eq!(config.concurrency.get(), DEFAULT_CONCURRENCY);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.target_column, 1);
        assert_eq!(config.default_scheme, "http");
        assert!(!config.literal);
        assert!(!config.fail_on_status);
        assert_eq!(config.encoding_mode, EncodingMode::Lossy);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = ScoutConfig {
            pattern: "Treasure".to_string(),
            concurrency: NonZeroUsize::new(4).unwrap(),
            output_path: PathBuf::from("from_file.csv"),
            ..ScoutConfig::default()
        };

        let cli = CliOverrides {
            pattern: Some("Gold".to_string()),
            concurrency: Some(NonZeroUsize::new(8).unwrap()),
            timeout_secs: Some(2),
            literal: true,
            ..CliOverrides::default()
        };

        let merged = file_config.merge_with_cli(cli);
        assert_eq!(merged.pattern, "Gold"); // CLI value
        assert_eq!(merged.concurrency.get(), 8); // CLI value
        assert_eq!(merged.timeout_secs, 2); // CLI value
        assert!(merged.literal); // CLI value
        assert_eq!(merged.output_path, PathBuf::from("from_file.csv")); // File value
        assert_eq!(merged.input_path, PathBuf::from("urls.txt")); // Default
    }

    #[test]
    fn test_invalid_config() {
        let config_content = r#"
            concurrency: 0
            timeout_secs: "soon"
        "#;

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let result = ScoutConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ScoutConfig {
            timeout_secs: 0,
            ..ScoutConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScoutError::Config(_))
        ));

        let config = ScoutConfig {
            default_scheme: "ht tp".to_string(),
            ..ScoutConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_encoding_mode_from_str() {
        assert_eq!("lossy".parse::<EncodingMode>().unwrap(), EncodingMode::Lossy);
        assert_eq!(
            "FailFast".parse::<EncodingMode>().unwrap(),
            EncodingMode::FailFast
        );
        assert!("utf16".parse::<EncodingMode>().is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ScoutConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }
}
