use chrono::{DateTime, Utc};
use tracing::debug;

use crate::metrics::{self, SessionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionStatus {
    Idle,
    Running,
    Ended,
    Stopped,
}

/// Why a running session was brought to a halt
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum StopReason {
    /// Natural end: text finished or time ran out. Produces a result.
    Completed,
    /// Manual abort. The attempt is discarded.
    Stopped,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// One typing attempt against a sample text.
///
/// Progress counters are always re-derived from the full current input (see
/// [`SessionState::consume_input`]) so arbitrary edits can never make them
/// drift apart.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: SessionStatus,
    sample_text: String,
    sample_chars: Vec<char>,
    pub typed_index: usize,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub total_typed: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_secs: u64,
    pub time_remaining: i64,
    pub last_result: Option<SessionResult>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            sample_text: String::new(),
            sample_chars: Vec::new(),
            typed_index: 0,
            correct_count: 0,
            incorrect_count: 0,
            total_typed: 0,
            started_at: None,
            duration_secs: 0,
            time_remaining: 0,
            last_result: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_text(&self) -> &str {
        &self.sample_text
    }

    pub fn sample_len(&self) -> usize {
        self.sample_chars.len()
    }

    pub fn expected_char(&self, idx: usize) -> Option<char> {
        self.sample_chars.get(idx).copied()
    }

    pub fn outcome_at(&self, idx: usize, typed: char) -> Option<Outcome> {
        self.expected_char(idx).map(|expected| {
            if expected == typed {
                Outcome::Correct
            } else {
                Outcome::Incorrect
            }
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Fraction of the sample covered by the input, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.sample_chars.is_empty() {
            0.0
        } else {
            self.typed_index as f64 / self.sample_chars.len() as f64
        }
    }

    /// Input clipped to the length of the sample text
    pub fn truncate_input(&self, typed: &str) -> String {
        typed.chars().take(self.sample_chars.len()).collect()
    }

    pub fn start(&mut self, sample_text: String, duration_secs: u64, now: DateTime<Utc>) {
        if self.is_running() {
            return;
        }

        self.sample_chars = sample_text.chars().collect();
        self.sample_text = sample_text;
        self.typed_index = 0;
        self.correct_count = 0;
        self.incorrect_count = 0;
        self.total_typed = 0;
        self.started_at = Some(now);
        self.duration_secs = duration_secs;
        self.time_remaining = secs_to_i64(duration_secs);
        self.last_result = None;
        self.status = SessionStatus::Running;

        debug!(
            duration_secs,
            sample_len = self.sample_chars.len(),
            "session started"
        );
    }

    /// One second of the countdown. Ends the session once time is up.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<SessionResult> {
        if !self.is_running() {
            return None;
        }

        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining <= 0 {
            debug!("session timed out");
            return self.end(now);
        }
        None
    }

    /// Re-derive progress from the complete current input value.
    ///
    /// Input past the end of the sample is ignored. Covering the whole sample
    /// ends the session.
    pub fn consume_input(&mut self, typed: &str, now: DateTime<Utc>) -> Option<SessionResult> {
        if !self.is_running() {
            return None;
        }

        let mut compared = 0;
        let mut correct = 0;
        for (typed_char, expected) in typed.chars().zip(self.sample_chars.iter()) {
            compared += 1;
            if typed_char == *expected {
                correct += 1;
            }
        }

        self.typed_index = compared;
        self.total_typed = compared;
        self.correct_count = correct;
        self.incorrect_count = compared - correct;

        if compared == self.sample_chars.len() {
            debug!("sample text completed");
            return self.end(now);
        }
        None
    }

    pub fn stop(&mut self, reason: StopReason, now: DateTime<Utc>) -> Option<SessionResult> {
        if !self.is_running() {
            return None;
        }

        match reason {
            StopReason::Stopped => {
                self.status = SessionStatus::Stopped;
                self.time_remaining = secs_to_i64(self.duration_secs);
                debug!(typed = self.total_typed, "session stopped, attempt discarded");
                None
            }
            StopReason::Completed => {
                self.status = SessionStatus::Ended;
                let started_at = self.started_at.unwrap_or(now);
                let result =
                    metrics::finalize(self.total_typed, self.correct_count, started_at, now);
                self.last_result = Some(result);
                debug!(
                    wpm = result.wpm,
                    accuracy = result.accuracy,
                    secs = result.time_taken_secs,
                    "session completed"
                );
                Some(result)
            }
        }
    }

    fn end(&mut self, now: DateTime<Utc>) -> Option<SessionResult> {
        self.stop(StopReason::Completed, now)
    }
}

fn secs_to_i64(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
