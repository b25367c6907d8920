use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::icons::IndicatorIcon;
use crate::reconciler::AggregateState;

/// Outcome of one sample-then-reconcile tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    /// Number of status lines the sampler extracted
    pub line_count: usize,
    pub state: AggregateState,
    /// Alternation bit after this tick; only advances on `Ok`
    pub alternation: bool,
    /// State of the previous tick, `None` on the first one
    pub previous_state: Option<AggregateState>,
    pub polled_at: DateTime<Local>,
}

impl PollResult {
    pub fn new(
        line_count: usize,
        state: AggregateState,
        alternation: bool,
        previous_state: Option<AggregateState>,
    ) -> Self {
        Self {
            line_count,
            state,
            alternation,
            previous_state,
            polled_at: Local::now(),
        }
    }

    pub fn is_transition(&self) -> bool {
        self.previous_state != Some(self.state)
    }

    /// Whether the indicator has to be redrawn. `Ok` ticks always do,
    /// since the synced icon alternates between its two renderings.
    pub fn needs_redraw(&self) -> bool {
        self.is_transition() || self.state == AggregateState::Ok
    }

    pub fn icon(&self) -> IndicatorIcon {
        IndicatorIcon::select(self.state, self.alternation)
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The indicator should be redrawn
    StateChanged(PollResult),
    /// A tick that left the indicator as it was
    Polled(PollResult),
}

impl AppEvent {
    pub fn from_result(result: PollResult) -> Self {
        if result.needs_redraw() {
            AppEvent::StateChanged(result)
        } else {
            AppEvent::Polled(result)
        }
    }

    pub fn result(&self) -> &PollResult {
        match self {
            AppEvent::StateChanged(result) | AppEvent::Polled(result) => result,
        }
    }
}
