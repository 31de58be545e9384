use std::cell::OnceCell;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::{is_valid_duration, resolve_duration, DEFAULT_DURATION_SECS};
use crate::corpus::SampleCorpus;
use crate::history::{HistoryStore, HistoryView};
use crate::metrics::{SessionResult, StatsSnapshot};
use crate::session::{SessionState, SessionStatus, StopReason};
use crate::stats_worker::StatsPublisher;

/// What the presentation layer needs to draw the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub status: SessionStatus,
    pub sample_text: String,
    pub typed_index: usize,
    pub time_remaining: i64,
}

/// Callbacks fired by [`SessionController`]. Every method defaults to a no-op.
pub trait SessionListener {
    fn on_view(&mut self, _view: &SessionView) {}
    fn on_stats(&mut self, _stats: StatsSnapshot) {}
    fn on_result(&mut self, _result: &SessionResult) {}
    fn on_history(&mut self, _history: &HistoryView) {}
}

pub struct NoopListener;

impl SessionListener for NoopListener {}

/// Owns the active session and routes input, ticks, stats and results
pub struct SessionController {
    state: SessionState,
    corpus: SampleCorpus,
    history: HistoryStore,
    /// Filled on first access so pruning uses the configured clock
    history_view: OnceCell<HistoryView>,
    stats: StatsPublisher,
    clock: Box<dyn Clock>,
    listener: Box<dyn SessionListener>,
    selected_duration: u64,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("history", &self.history)
            .field("stats", &self.stats)
            .field("selected_duration", &self.selected_duration)
            .finish()
    }
}

impl SessionController {
    pub fn new(corpus: SampleCorpus, history: HistoryStore) -> Self {
        Self {
            state: SessionState::new(),
            corpus,
            history,
            history_view: OnceCell::new(),
            stats: StatsPublisher::sync(),
            clock: Box::new(SystemClock),
            listener: Box::new(NoopListener),
            selected_duration: DEFAULT_DURATION_SECS,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Box::new(clock);
        self.history_view = OnceCell::new();
        self
    }

    pub fn with_stats(mut self, stats: StatsPublisher) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_listener(mut self, listener: impl SessionListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    /// Out of range values keep the current duration
    pub fn with_duration(mut self, secs: u64) -> Self {
        if is_valid_duration(secs) {
            self.selected_duration = secs;
        }
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn selected_duration(&self) -> u64 {
        self.selected_duration
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.latest()
    }

    pub fn last_result(&self) -> Option<SessionResult> {
        self.state.last_result
    }

    pub fn history_available(&self) -> bool {
        self.history.is_available()
    }

    /// Last week of history, loaded and pruned on first access
    pub fn history(&self) -> &HistoryView {
        self.history_view.get_or_init(|| {
            let entries = self.history.current(self.clock.now());
            self.history.render(&entries)
        })
    }

    pub fn view(&self) -> SessionView {
        let time_remaining = match self.state.status {
            SessionStatus::Running | SessionStatus::Ended => self.state.time_remaining,
            SessionStatus::Idle | SessionStatus::Stopped => {
                i64::try_from(self.selected_duration).unwrap_or(i64::MAX)
            }
        };
        SessionView {
            status: self.state.status,
            sample_text: self.state.sample_text().to_string(),
            typed_index: self.state.typed_index,
            time_remaining,
        }
    }

    /// Begin a new attempt on a randomly chosen sample text
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let text = self.corpus.pick();
        let now = self.clock.now();
        self.state.start(text, self.selected_duration, now);
        self.publish_reset();
        self.publish_view();
    }

    pub fn stop(&mut self, reason: StopReason) {
        if !self.is_running() {
            return;
        }

        let now = self.clock.now();
        match self.state.stop(reason, now) {
            Some(result) => self.finish(result, now),
            None => {
                self.publish_reset();
                self.publish_view();
            }
        }
    }

    /// Abandon whatever is running and begin again
    pub fn restart(&mut self) {
        self.stop(StopReason::Stopped);
        self.start();
    }

    /// Feed the complete current value of the input field.
    ///
    /// Returns the value the field should hold afterwards (clipped to the
    /// sample length).
    pub fn on_input(&mut self, current: &str) -> String {
        if !self.is_running() {
            return current.to_string();
        }

        let typed = self.state.truncate_input(current);
        let now = self.clock.now();
        let finished = self.state.consume_input(&typed, now);
        self.request_stats();
        self.publish_view();
        if let Some(result) = finished {
            self.finish(result, now);
        }
        typed
    }

    /// One second of the countdown; call only at a 1 second cadence
    pub fn on_tick(&mut self) {
        if !self.is_running() {
            return;
        }

        let now = self.clock.now();
        let finished = self.state.tick(now);
        self.request_stats();
        self.publish_view();
        if let Some(result) = finished {
            self.finish(result, now);
        }
    }

    /// Apply a user selected duration. Invalid input, or any change while a
    /// session is running, keeps the previous value.
    pub fn set_duration(&mut self, raw: &str) -> u64 {
        if !self.is_running() {
            self.selected_duration = resolve_duration(raw, self.selected_duration);
            self.publish_view();
        }
        self.selected_duration
    }

    pub fn set_duration_secs(&mut self, secs: u64) -> u64 {
        self.set_duration(&secs.to_string())
    }

    /// Apply any stats the worker has produced since the last poll
    pub fn poll_stats(&mut self) -> Option<StatsSnapshot> {
        let snapshot = self.stats.poll()?;
        self.listener.on_stats(snapshot);
        Some(snapshot)
    }

    /// Block up to `timeout` for an outstanding worker response
    pub fn wait_stats(&mut self, timeout: std::time::Duration) -> Option<StatsSnapshot> {
        let snapshot = self.stats.wait(timeout)?;
        self.listener.on_stats(snapshot);
        Some(snapshot)
    }

    pub fn refresh_history(&mut self) {
        let entries = self.history.current(self.clock.now());
        self.set_history_view(self.history.render(&entries));
    }

    fn finish(&mut self, result: SessionResult, now: chrono::DateTime<chrono::Utc>) {
        debug!(wpm = result.wpm, accuracy = result.accuracy, "recording result");
        self.publish_view();
        self.listener.on_result(&result);

        let entries = self.history.append(result, now);
        self.set_history_view(self.history.render(&entries));
    }

    fn set_history_view(&mut self, view: HistoryView) {
        self.listener.on_history(&view);
        self.history_view = OnceCell::from(view);
    }

    fn request_stats(&mut self) {
        let s = &self.state;
        let now = self.clock.now();
        let snapshot = self.stats.request(s.total_typed, s.correct_count, s.started_at, now);
        if let Some(snapshot) = snapshot {
            self.listener.on_stats(snapshot);
        }
    }

    fn publish_reset(&mut self) {
        self.stats.reset(StatsSnapshot::default());
        self.listener.on_stats(StatsSnapshot::default());
    }

    fn publish_view(&mut self) {
        let view = self.view();
        self.listener.on_view(&view);
    }
}
