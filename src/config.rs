//! Configuration management for sync-indicator
//!
//! Settings come from built-in defaults, an optional TOML file, environment
//! variables and finally command-line flags, each layer overriding the last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::reconciler::{StatusClassifier, DEFAULT_TRANSFER_PATTERN, DEFAULT_UP_TO_DATE_PATTERN};

/// Global configuration for sync-indicator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// External status command
    pub sampler: SamplerConfig,
    /// Polling loop
    pub watcher: WatcherConfig,
    /// Status line patterns
    pub patterns: PatternConfig,
    /// Paths handed to the presentation layer
    pub presentation: PresentationConfig,
}

/// Configuration for the external status command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Program to run
    pub command: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Kill the command if it runs longer than this, in milliseconds
    pub timeout_ms: u64,
}

/// Configuration for the polling loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Pause between polls in seconds
    pub interval_secs: u64,
}

/// Case-insensitive regexes used to classify status lines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub up_to_date: String,
    pub transfer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    /// Log file maintained by the sync client
    pub log_file: Option<PathBuf>,
    /// Directory holding the indicator icons
    pub icon_dir: Option<PathBuf>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            command: "jotta-cli".to_string(),
            args: vec!["status".to_string()],
            timeout_ms: 10_000,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            up_to_date: DEFAULT_UP_TO_DATE_PATTERN.to_string(),
            transfer: DEFAULT_TRANSFER_PATTERN.to_string(),
        }
    }
}

impl SamplerConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Replace command and args from a single command line
    pub fn set_command_line(&mut self, line: &str) -> Result<(), String> {
        let mut parts = split_command_line(line)?.into_iter();
        match parts.next() {
            Some(command) => {
                self.command = command;
                self.args = parts.collect();
                Ok(())
            }
            None => Err("command must not be empty".to_string()),
        }
    }
}

/// Split a command line into words the way a POSIX shell does for simple
/// commands: whitespace separates words, single quotes are literal, double
/// quotes and backslashes escape. No expansion is performed.
pub fn split_command_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(format!("unterminated single quote in: {}", line)),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(format!("unterminated double quote in: {}", line)),
                        },
                        Some(c) => current.push(c),
                        None => return Err(format!("unterminated double quote in: {}", line)),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(c) => current.push(c),
                    None => return Err(format!("trailing backslash in: {}", line)),
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }
    Ok(words)
}

impl WatcherConfig {
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl PatternConfig {
    pub fn classifier(&self) -> Result<StatusClassifier> {
        StatusClassifier::new(&self.up_to_date, &self.transfer)
    }
}

impl PresentationConfig {
    /// Configured log file, or `~/.jottad/jottabackup.log`
    pub fn log_file_path(&self) -> PathBuf {
        if let Some(path) = &self.log_file {
            return path.clone();
        }

        let relative = Path::new(".jottad").join("jottabackup.log");
        match directories::BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(relative),
            None => relative,
        }
    }
}

impl IndicatorConfig {
    /// Default location of the configuration file
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "sync-indicator", "sync-indicator")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, or from the default location if it exists.
    /// An explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::config_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path),
                _ => {
                    tracing::debug!("No configuration file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: IndicatorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override with environment variables if present
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("SYNC_INDICATOR_COMMAND") {
            if let Err(err) = self.sampler.set_command_line(&val) {
                tracing::warn!("Ignoring SYNC_INDICATOR_COMMAND: {}", err);
            }
        }

        if let Ok(val) = std::env::var("SYNC_INDICATOR_INTERVAL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.watcher.interval_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("SYNC_INDICATOR_TIMEOUT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.sampler.timeout_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("SYNC_INDICATOR_LOG_FILE") {
            if !val.is_empty() {
                self.presentation.log_file = Some(PathBuf::from(val));
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.sampler.command.trim().is_empty() {
            return Err("command must not be empty".to_string());
        }

        if self.sampler.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }

        if self.watcher.interval_secs == 0 {
            return Err("interval_secs must be greater than 0".to_string());
        }

        if let Err(err) = self.patterns.classifier() {
            return Err(format!("{:#}", err));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = IndicatorConfig::default();

        assert_eq!(config.sampler.command, "jotta-cli");
        assert_eq!(config.sampler.args, vec!["status"]);
        assert_eq!(config.watcher.interval_secs, 5);
        assert_eq!(config.patterns.up_to_date, "up to date");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = IndicatorConfig::default();

        config.watcher.interval_secs = 0;
        assert!(config.validate().is_err());

        config.watcher.interval_secs = 5;
        config.sampler.timeout_ms = 0;
        assert!(config.validate().is_err());

        config.sampler.timeout_ms = 1000;
        config.sampler.command = "  ".to_string();
        assert!(config.validate().is_err());

        config.sampler.command = "jotta-cli".to_string();
        config.patterns.transfer = "(broken".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("transfer pattern"));
    }

    #[test]
    fn test_duration_conversions() {
        let config = IndicatorConfig::default();

        assert_eq!(config.watcher.interval_duration(), Duration::from_secs(5));
        assert_eq!(config.sampler.timeout_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[sampler]\ncommand = \"mysync\"\n\n[watcher]\ninterval_secs = 30\n",
        )
        .unwrap();

        let config = IndicatorConfig::load(Some(path.as_path())).unwrap();

        assert_eq!(config.sampler.command, "mysync");
        assert_eq!(config.sampler.args, vec!["status"]);
        assert_eq!(config.watcher.interval_secs, 30);
        assert_eq!(config.patterns.transfer, DEFAULT_TRANSFER_PATTERN);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");
        assert!(IndicatorConfig::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_log_file_override() {
        let mut presentation = PresentationConfig::default();
        assert!(presentation.log_file_path().ends_with(".jottad/jottabackup.log"));

        presentation.log_file = Some(PathBuf::from("/var/log/sync.log"));
        assert_eq!(presentation.log_file_path(), PathBuf::from("/var/log/sync.log"));
    }

    #[test]
    fn test_env_config_loading() {
        std::env::set_var("SYNC_INDICATOR_COMMAND", "mysync status --label 'My Files'");
        std::env::set_var("SYNC_INDICATOR_INTERVAL_SECS", "12");
        std::env::set_var("SYNC_INDICATOR_TIMEOUT_MS", "not-a-number");

        let config = IndicatorConfig::from_env();

        assert_eq!(config.sampler.command, "mysync");
        assert_eq!(config.sampler.args, vec!["status", "--label", "My Files"]);
        assert_eq!(config.watcher.interval_secs, 12);
        assert_eq!(config.sampler.timeout_ms, 10_000);

        // Cleanup
        std::env::remove_var("SYNC_INDICATOR_COMMAND");
        std::env::remove_var("SYNC_INDICATOR_INTERVAL_SECS");
        std::env::remove_var("SYNC_INDICATOR_TIMEOUT_MS");
    }

    #[test]
    fn test_split_command_line_honours_quotes() {
        let words = split_command_line(r#"sh -c 'printf "Status: Up to date\n"'"#).unwrap();
        assert_eq!(words, vec!["sh", "-c", r#"printf "Status: Up to date\n""#]);

        let words = split_command_line(r#"  a\ b "c \"d\" e"   ''  "#).unwrap();
        assert_eq!(words, vec!["a b", r#"c "d" e"#, ""]);

        assert_eq!(split_command_line("jotta-cli   status").unwrap(), vec!["jotta-cli", "status"]);
        assert!(split_command_line("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_command_line_rejects_unterminated_quotes() {
        assert!(split_command_line("sh -c 'printf").is_err());
        assert!(split_command_line(r#"echo "open"#).is_err());
        assert!(split_command_line("echo \\").is_err());
    }

    #[test]
    fn test_set_command_line() {
        let mut sampler = SamplerConfig::default();

        sampler.set_command_line("sh -c 'exit 0'").unwrap();
        assert_eq!(sampler.command, "sh");
        assert_eq!(sampler.args, vec!["-c", "exit 0"]);

        assert!(sampler.set_command_line("  ").is_err());
        assert_eq!(sampler.command, "sh");
    }
}
