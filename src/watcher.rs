use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::IndicatorConfig;
use crate::events::{AppEvent, PollResult};
use crate::reconciler::StateReconciler;
use crate::sampler::StatusSampler;

/// Most recent poll result, replaced as a whole on every tick
#[derive(Debug, Clone, Default)]
pub struct LatestResult {
    slot: Arc<Mutex<Option<PollResult>>>,
}

impl LatestResult {
    pub fn get(&self) -> Option<PollResult> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, result: PollResult) {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(result);
    }
}

/// Polls the status source on a background thread.
///
/// Each tick publishes its result to [`LatestResult`] and sends one
/// [`AppEvent`]. The stop flag is checked before every tick, so a running
/// status command is never interrupted.
pub struct StatusWatcher {
    event_rx: Receiver<AppEvent>,
    latest: LatestResult,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatusWatcher {
    pub fn new(config: &IndicatorConfig) -> Result<Self> {
        let reconciler = StateReconciler::new(config.patterns.classifier()?);
        let sampler = StatusSampler::from_config(&config.sampler);
        Self::spawn(sampler, reconciler, config.watcher.interval_duration())
    }

    pub fn spawn(
        mut sampler: StatusSampler,
        mut reconciler: StateReconciler,
        interval: Duration,
    ) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel::<AppEvent>();
        let latest = LatestResult::default();
        let running = Arc::new(AtomicBool::new(true));

        let latest_clone = latest.clone();
        let running_clone = running.clone();

        let handle = thread::Builder::new()
            .name("status-poller".to_string())
            .spawn(move || {
                while running_clone.load(Ordering::SeqCst) {
                    let lines = sampler.sample();
                    let result = reconciler.tick(&lines);

                    tracing::debug!(
                        "Polled {} status line(s): {} (alternation {})",
                        result.line_count,
                        result.state,
                        result.alternation
                    );
                    if result.is_transition() {
                        match result.previous_state {
                            Some(previous) => {
                                tracing::info!("Sync state changed: {} -> {}", previous, result.state)
                            }
                            None => tracing::info!("Initial sync state: {}", result.state),
                        }
                    }

                    latest_clone.set(result.clone());

                    if event_tx.send(AppEvent::from_result(result)).is_err() {
                        break; // Receiver dropped, exit thread
                    }

                    thread::sleep(interval);
                }
                tracing::debug!("Status poller stopped");
            })
            .context("Failed to spawn status polling thread")?;

        Ok(Self {
            event_rx,
            latest,
            running,
            handle: Some(handle),
        })
    }

    pub fn try_recv(&self) -> Result<AppEvent, mpsc::TryRecvError> {
        self.event_rx.try_recv()
    }

    pub fn recv(&self) -> Result<AppEvent, mpsc::RecvError> {
        self.event_rx.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, mpsc::RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    /// Latest poll result, if any tick has completed
    pub fn latest(&self) -> Option<PollResult> {
        self.latest.get()
    }

    /// Shared handle to the latest result for readers on other threads
    pub fn latest_handle(&self) -> LatestResult {
        self.latest.clone()
    }

    /// Flag that keeps the loop alive; clearing it requests a stop
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the loop to finish after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop and wait for the polling thread to exit
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Status polling thread panicked");
            }
        }
    }
}

impl Drop for StatusWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::AggregateState;

    #[test]
    fn test_latest_result_replaces_value() {
        let latest = LatestResult::default();
        assert!(latest.get().is_none());

        latest.set(PollResult::new(1, AggregateState::Ok, true, None));
        latest.set(PollResult::new(0, AggregateState::Error, true, Some(AggregateState::Ok)));

        let result = latest.get().unwrap();
        assert_eq!(result.state, AggregateState::Error);
        assert_eq!(result.line_count, 0);
    }

    #[test]
    fn test_watcher_publishes_latest() {
        let sampler = StatusSampler::new(|| Some("Status: Up to date".to_string()));
        let watcher =
            StatusWatcher::spawn(sampler, StateReconciler::default(), Duration::from_millis(10))
                .unwrap();

        let event = watcher.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, AppEvent::StateChanged(_)));
        assert_eq!(event.result().state, AggregateState::Ok);

        let latest = watcher.latest().unwrap();
        assert_eq!(latest.state, AggregateState::Ok);

        watcher.join();
    }

    #[test]
    fn test_stop_ends_event_stream() {
        let sampler = StatusSampler::new(|| None::<String>);
        let watcher =
            StatusWatcher::spawn(sampler, StateReconciler::default(), Duration::from_millis(5))
                .unwrap();

        watcher.recv_timeout(Duration::from_secs(2)).unwrap();
        watcher.stop();
        assert!(!watcher.is_running());

        // Drain until the thread drops its sender
        let mut disconnected = false;
        for _ in 0..100 {
            match watcher.recv_timeout(Duration::from_millis(50)) {
                Ok(_) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
            }
        }
        assert!(disconnected);
    }
}
