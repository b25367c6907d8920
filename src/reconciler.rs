//! Status line classification and state reconciliation
//!
//! Every status line is put into one of three categories, and the categories
//! of one poll are collapsed into a single indicator state. The only thing
//! carried between polls is the alternation bit that animates the synced icon.

use std::fmt;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::events::PollResult;
use crate::sampler::StatusLine;

pub const DEFAULT_UP_TO_DATE_PATTERN: &str = r"up to date";
pub const DEFAULT_TRANSFER_PATTERN: &str = r"(uploading|download|performing)";

/// Category of a single status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineCategory {
    UpToDate,
    Transferring,
    Unknown,
}

/// Overall indicator state for one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateState {
    /// Every status line reports "up to date"
    Ok,
    /// At least one line reports an upload, download or other activity
    Active,
    /// No status lines, or lines nobody recognizes
    Error,
}

impl AggregateState {
    pub fn label(&self) -> &'static str {
        match self {
            AggregateState::Ok => "OK",
            AggregateState::Active => "ACTIVE",
            AggregateState::Error => "ERROR",
        }
    }

    pub fn short_code(&self) -> &'static str {
        match self {
            AggregateState::Ok => "O",
            AggregateState::Active => "A",
            AggregateState::Error => "E",
        }
    }

    /// Process exit code used by single-shot polling
    pub fn exit_code(&self) -> i32 {
        match self {
            AggregateState::Ok => 0,
            AggregateState::Active => 1,
            AggregateState::Error => 2,
        }
    }
}

impl fmt::Display for AggregateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Case-insensitive pattern rules for status lines.
///
/// The up-to-date rule is tested first, so a line matching both rules
/// counts as `UpToDate`.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    up_to_date: Regex,
    transfer: Regex,
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_UP_TO_DATE_PATTERN, DEFAULT_TRANSFER_PATTERN)
            .expect("built-in status patterns are valid")
    }
}

impl StatusClassifier {
    pub fn new(up_to_date: &str, transfer: &str) -> Result<Self> {
        Ok(Self {
            up_to_date: compile_pattern(up_to_date)
                .with_context(|| format!("Invalid up-to-date pattern: {}", up_to_date))?,
            transfer: compile_pattern(transfer)
                .with_context(|| format!("Invalid transfer pattern: {}", transfer))?,
        })
    }

    pub fn classify(&self, line: &str) -> LineCategory {
        if self.up_to_date.is_match(line) {
            LineCategory::UpToDate
        } else if self.transfer.is_match(line) {
            LineCategory::Transferring
        } else {
            LineCategory::Unknown
        }
    }

    /// Collapse one poll's lines into a single state. First match wins:
    /// no lines, all up to date, any transfer, otherwise error.
    pub fn aggregate(&self, lines: &[StatusLine]) -> AggregateState {
        if lines.is_empty() {
            return AggregateState::Error;
        }

        let categories: Vec<LineCategory> = lines
            .iter()
            .map(|line| self.classify(line.as_str()))
            .collect();

        if categories.iter().all(|c| *c == LineCategory::UpToDate) {
            AggregateState::Ok
        } else if categories.contains(&LineCategory::Transferring) {
            AggregateState::Active
        } else {
            AggregateState::Error
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Turns sampled lines into poll results, one tick at a time
#[derive(Debug, Clone)]
pub struct StateReconciler {
    classifier: StatusClassifier,
    alternation: bool,
    previous: Option<AggregateState>,
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new(StatusClassifier::default())
    }
}

impl StateReconciler {
    pub fn new(classifier: StatusClassifier) -> Self {
        Self {
            classifier,
            alternation: false,
            previous: None,
        }
    }

    /// Pure reconciliation: the aggregate state plus the next alternation
    /// bit. The bit flips on `Ok` and is left alone otherwise.
    pub fn reconcile(
        &self,
        lines: &[StatusLine],
        previous_alternation: bool,
    ) -> (AggregateState, bool) {
        let state = self.classifier.aggregate(lines);
        let alternation = if state == AggregateState::Ok {
            !previous_alternation
        } else {
            previous_alternation
        };
        (state, alternation)
    }

    pub fn tick(&mut self, lines: &[StatusLine]) -> PollResult {
        let (state, alternation) = self.reconcile(lines, self.alternation);
        let result = PollResult::new(lines.len(), state, alternation, self.previous);

        self.alternation = alternation;
        self.previous = Some(state);
        result
    }

    pub fn alternation(&self) -> bool {
        self.alternation
    }

    pub fn previous_state(&self) -> Option<AggregateState> {
        self.previous
    }

    pub fn classifier(&self) -> &StatusClassifier {
        &self.classifier
    }
}
