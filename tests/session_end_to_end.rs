use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use copycat::{
    clock::ManualClock,
    controller::SessionController,
    corpus::SampleCorpus,
    history::{HistoryEntry, HistoryStore, HISTORY_KEY},
    metrics::SessionResult,
    session::{SessionStatus, StopReason},
    storage::{FileStorage, Storage},
};
use tempfile::tempdir;

const SAMPLE: &str = "Copy cat, copy cat.";

fn setup(dir: &std::path::Path, secs: u64) -> (SessionController, ManualClock) {
    let clock = ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
    let controller = SessionController::new(
        SampleCorpus::custom(SAMPLE),
        HistoryStore::new(Box::new(FileStorage::new(dir))),
    )
    .with_clock(clock.clone())
    .with_duration(secs);
    (controller, clock)
}

#[test]
fn full_text_within_time_is_recorded() {
    let dir = tempdir().unwrap();
    let (mut controller, clock) = setup(dir.path(), 5);

    controller.start();
    assert_eq!(controller.view().sample_text, SAMPLE);

    // two mistakes, typed in three seconds with a tick in between
    let typed = "Copy cat, cepy cat,";
    let half = typed.len() / 2;
    controller.on_input(&typed[..half]);
    clock.advance(Duration::seconds(1));
    controller.on_tick();
    clock.advance(Duration::milliseconds(2_400));
    controller.on_input(typed);

    assert_eq!(controller.status(), SessionStatus::Ended);
    let state = controller.state();
    assert_eq!(state.correct_count, 17);
    assert_eq!(state.incorrect_count, 2);

    let result = controller.last_result().unwrap();
    assert_matches!(
        result,
        SessionResult {
            accuracy: 89,
            time_taken_secs: 3,
            ..
        }
    );

    let raw = FileStorage::new(dir.path()).get(HISTORY_KEY).unwrap().unwrap();
    let stored: Vec<HistoryEntry> = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].accuracy, 89);
    assert!(stored[0].time_taken_secs >= 1);
    assert_eq!(stored[0].timestamp, clock_now_ms(&clock));
}

#[test]
fn manual_stop_leaves_no_history() {
    let dir = tempdir().unwrap();
    let (mut controller, clock) = setup(dir.path(), 5);

    controller.start();
    controller.on_input("Copy");
    clock.advance(Duration::seconds(2));
    controller.stop(StopReason::Stopped);

    assert_eq!(controller.status(), SessionStatus::Stopped);
    assert_eq!(controller.last_result(), None);
    assert!(!dir.path().join(format!("{HISTORY_KEY}.json")).exists());
}

#[test]
fn timeout_with_half_typed_uses_partial_counts() {
    let dir = tempdir().unwrap();
    let (mut controller, clock) = setup(dir.path(), 4);

    controller.start();
    // 10 of 19 chars, one wrong
    controller.on_input("Copy kat, ");
    for _ in 0..4 {
        clock.advance(Duration::seconds(1));
        controller.on_tick();
    }

    assert_eq!(controller.status(), SessionStatus::Ended);
    let result = controller.last_result().unwrap();
    // 10 chars = 2 words in 4 seconds
    assert_eq!(result.wpm, 30);
    assert_eq!(result.accuracy, 90);
    assert_eq!(result.time_taken_secs, 4);
    assert_eq!(controller.history().len(), 1);
}

#[test]
fn history_survives_restart_and_expires() {
    let dir = tempdir().unwrap();
    let (mut controller, clock) = setup(dir.path(), 30);
    controller.start();
    controller.on_input(SAMPLE);
    assert_eq!(controller.history().len(), 1);

    // a new process a few days later still sees it
    clock.advance(Duration::days(3));
    let (reopened, _) = setup(dir.path(), 30);
    let reopened = reopened.with_clock(clock.clone());
    assert_eq!(reopened.history().len(), 1);

    // and a week after that it is gone, from disk too
    clock.advance(Duration::days(5));
    let (expired, _) = setup(dir.path(), 30);
    let expired = expired.with_clock(clock.clone());
    assert!(expired.history().is_empty());
    let raw = FileStorage::new(dir.path()).get(HISTORY_KEY).unwrap().unwrap();
    assert_eq!(raw, "[]");
}

#[test]
fn corrupt_history_file_is_treated_as_empty() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(format!("{HISTORY_KEY}.json")), "{{{").unwrap();

    let (mut controller, _) = setup(dir.path(), 30);
    assert!(controller.history_available());
    assert!(controller.history().is_empty());

    controller.start();
    controller.on_input(SAMPLE);
    assert_eq!(controller.history().len(), 1);
}

fn clock_now_ms(clock: &ManualClock) -> i64 {
    use copycat::clock::Clock;
    clock.now().timestamp_millis()
}
