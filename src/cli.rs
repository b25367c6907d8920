use std::path::PathBuf;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::config::{split_command_line, IndicatorConfig};

#[derive(Parser)]
#[command(name = "sync-indicator")]
#[command(author = "sync-indicator contributors")]
#[command(version)]
#[command(about = "Polls a sync client's status and reports it as an indicator state")]
#[command(long_about = "sync-indicator runs the sync client's status command on a fixed cadence, reduces its status lines to OK, ACTIVE or ERROR, and reports every change. Use it headless, from scripts, or as the backend of a tray icon.")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    /// Status command, overriding the configured one
    #[arg(long, value_name = "CMD", help = "Status command to run, split with shell quoting (e.g. \"sh -c 'jotta-cli status'\")")]
    pub command: Option<String>,

    /// Seconds between polls
    #[arg(short, long, value_name = "SECS", help = "Polling interval in seconds")]
    pub interval: Option<u64>,

    /// Status command timeout
    #[arg(long, value_name = "MS", help = "Status command timeout in ms")]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, default_value = "text", help = "Output format")]
    pub output: OutputFormat,

    /// Poll once and exit
    #[arg(long, help = "Poll once; exit code 0 = ok, 1 = active, 2 = error")]
    pub once: bool,

    /// Print the full status output
    #[arg(long, help = "Print the raw status command output and exit")]
    pub raw: bool,

    /// Print the log file location
    #[arg(long, help = "Print the sync client's log file path and exit")]
    pub log_path: bool,

    /// Open the log file
    #[arg(long, help = "Open the sync client's log file and exit")]
    pub open_log: bool,

    /// Icon directory
    #[arg(long, value_name = "DIR", help = "Directory with indicator icons; prints the icon for each change")]
    pub icons: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Timestamped, colored lines (default)
    Text,
    /// JSON output for scripting
    Json,
    /// Compact single-line format
    Compact,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded config
    pub fn apply_to(&self, config: &mut IndicatorConfig) {
        if let Some(command) = &self.command {
            if let Err(err) = config.sampler.set_command_line(command) {
                tracing::warn!("Ignoring --command: {}", err);
            }
        }

        if let Some(interval) = self.interval {
            config.watcher.interval_secs = interval;
        }

        if let Some(timeout) = self.timeout {
            config.sampler.timeout_ms = timeout;
        }

        if let Some(icons) = &self.icons {
            config.presentation.icon_dir = Some(icons.clone());
        }
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        // Logs go to stderr so JSON on stdout stays parseable
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(!self.no_color)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(config) = &self.config {
            if !config.is_file() {
                return Err(format!("Config file does not exist: {}", config.display()));
            }
        }

        if let Some(command) = &self.command {
            match split_command_line(command) {
                Ok(words) if words.is_empty() => {
                    return Err("Command must not be empty".to_string())
                }
                Ok(_) => {}
                Err(err) => return Err(format!("Invalid command: {}", err)),
            }
        }

        if self.interval == Some(0) {
            return Err("Interval must be greater than 0".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be greater than 0".to_string());
        }

        if let Some(icons) = &self.icons {
            if !icons.is_dir() {
                return Err(format!("Icon directory does not exist: {}", icons.display()));
            }
        }

        Ok(())
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: None,
            command: None,
            interval: None,
            timeout: None,
            output: OutputFormat::Text,
            once: false,
            raw: false,
            log_path: false,
            open_log: false,
            icons: None,
            verbose: false,
            no_color: false,
        }
    }
}
