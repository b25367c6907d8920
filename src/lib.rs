pub mod cli;
pub mod config;
pub mod events;
pub mod icons;
pub mod reconciler;
pub mod sampler;
pub mod watcher;

pub use config::IndicatorConfig;
pub use events::*;
pub use icons::{IconSet, IndicatorIcon};
pub use reconciler::{AggregateState, LineCategory, StateReconciler, StatusClassifier};
pub use sampler::{extract_status_lines, CommandSource, StatusLine, StatusSampler, StatusSource};
pub use watcher::{LatestResult, StatusWatcher};
