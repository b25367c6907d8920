use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::SamplerConfig;

/// Leading token that marks a line as sync status
pub const STATUS_PREFIX: &str = "status";

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One trimmed line of status output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusLine(String);

impl StatusLine {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusLine {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Keep only the lines starting with "status" (any case), trimmed and in order
pub fn extract_status_lines(output: &str) -> Vec<StatusLine> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.to_lowercase().starts_with(STATUS_PREFIX))
        .map(StatusLine::new)
        .collect()
}

/// Anything that can produce the sync client's status text.
///
/// `None` means no usable output: the source could not run, timed out, or
/// printed nothing.
pub trait StatusSource: Send {
    fn read_status(&mut self) -> Option<String>;
}

impl<F> StatusSource for F
where
    F: FnMut() -> Option<String> + Send,
{
    fn read_status(&mut self) -> Option<String> {
        self()
    }
}

/// Runs an external command and captures its standard output
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSource {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: SamplerConfig::default().timeout_duration(),
        }
    }

    pub fn from_config(config: &SamplerConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone()).with_timeout(config.timeout_duration())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command once, killing it if it outlives the timeout.
    ///
    /// The timeout covers both reading stdout and waiting for exit. Only the
    /// direct child is killed; a grandchild that inherited stdout keeps the
    /// reader thread alive until it exits, but never blocks the caller.
    pub fn run(&self) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to run `{}`", self.command_line()))?;

        let mut stdout = child
            .stdout
            .take()
            .context("Child process has no stdout handle")?;

        // Read on a helper thread so the wait below can time out
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let result = stdout.read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(result);
        });

        let bytes = match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err).context("Failed to read status command output");
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                bail!("`{}` timed out after {:?}", self.command_line(), self.timeout)
            }
        };

        // Stdout is closed, but the process may still be running
        loop {
            match child.try_wait().context("Failed to wait for status command")? {
                Some(status) => {
                    if !status.success() {
                        tracing::debug!("`{}` exited with {}", self.command_line(), status);
                    }
                    return Ok(String::from_utf8_lossy(&bytes).into_owned());
                }
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    bail!(
                        "`{}` did not exit within {:?}",
                        self.command_line(),
                        self.timeout
                    )
                }
                None => thread::sleep(EXIT_POLL_INTERVAL),
            }
        }
    }
}

impl StatusSource for CommandSource {
    fn read_status(&mut self) -> Option<String> {
        match self.run() {
            Ok(output) if !output.trim().is_empty() => Some(output),
            Ok(_) => {
                tracing::warn!("`{}` produced no output", self.command_line());
                None
            }
            Err(err) => {
                tracing::warn!("Status source unavailable: {:#}", err);
                None
            }
        }
    }
}

/// Samples the status source and extracts its status lines
pub struct StatusSampler {
    source: Box<dyn StatusSource>,
}

impl StatusSampler {
    pub fn new<S: StatusSource + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub fn from_config(config: &SamplerConfig) -> Self {
        Self::new(CommandSource::from_config(config))
    }

    /// The full, unfiltered output of one invocation
    pub fn capture(&mut self) -> Option<String> {
        self.source.read_status()
    }

    /// Status lines of one invocation. Empty when the source is unavailable.
    pub fn sample(&mut self) -> Vec<StatusLine> {
        self.capture()
            .map(|output| extract_status_lines(&output))
            .unwrap_or_default()
    }
}
