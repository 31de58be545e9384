use chrono::{DateTime, Utc};

/// Characters that make up one "word" for wpm purposes
pub const CHARS_PER_WORD: f64 = 5.0;

/// Live figures shown while a session is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub wpm: u32,
    pub accuracy: u8,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            wpm: 0,
            accuracy: 100,
        }
    }
}

/// Figures of a naturally completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionResult {
    pub wpm: u32,
    pub accuracy: u8,
    pub time_taken_secs: u64,
}

fn elapsed_ms(started_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - started_at).num_milliseconds() as f64
}

fn accuracy_pct(total_typed: usize, correct_count: usize) -> u8 {
    if total_typed == 0 {
        return 100;
    }
    let pct = (correct_count as f64 / total_typed as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Live wpm/accuracy from a value snapshot of the session counters.
///
/// Elapsed time is floored at one second so the figure does not explode
/// right after the session starts.
pub fn compute(
    total_typed: usize,
    correct_count: usize,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> StatsSnapshot {
    let Some(started_at) = started_at else {
        return StatsSnapshot::default();
    };

    let elapsed_minutes = (elapsed_ms(started_at, now) / 60_000.0).max(1.0 / 60.0);
    let words_typed = total_typed as f64 / CHARS_PER_WORD;
    let wpm = if total_typed > 0 {
        (words_typed / elapsed_minutes).round().max(0.0) as u32
    } else {
        0
    };

    StatsSnapshot {
        wpm,
        accuracy: accuracy_pct(total_typed, correct_count),
    }
}

/// Final figures for a session that ran from `started_at` until `now`
pub fn finalize(
    total_typed: usize,
    correct_count: usize,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> SessionResult {
    let elapsed_secs = (elapsed_ms(started_at, now) / 1000.0).max(1.0);
    let words_typed = total_typed as f64 / CHARS_PER_WORD;
    let wpm = (words_typed / (elapsed_secs / 60.0)).round().max(0.0) as u32;

    SessionResult {
        wpm,
        accuracy: accuracy_pct(total_typed, correct_count),
        time_taken_secs: elapsed_secs.round() as u64,
    }
}

pub fn performance_message(wpm: u32, accuracy: u8) -> &'static str {
    match (wpm, accuracy) {
        (w, a) if w >= 60 && a >= 95 => "Outstanding! You're a typing champion!",
        (w, a) if w >= 45 && a >= 90 => "Great job! You have excellent typing skills!",
        (w, a) if w >= 30 && a >= 80 => "Good work! Keep practicing to improve further!",
        (w, a) if w >= 20 && a >= 70 => "Not bad! With more practice, you'll get even better!",
        _ => "Keep practicing! Every expert was once a beginner!",
    }
}

/// Short badge shown next to a history entry
pub fn performance_label(wpm: u32) -> &'static str {
    match wpm {
        60.. => "Fast paws!",
        45..=59 => "Speedy kitten",
        30..=44 => "Good rhythm",
        20..=29 => "Warming up",
        _ => "Keep practicing",
    }
}
