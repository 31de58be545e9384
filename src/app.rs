use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};

use crate::config::{next_choice, prev_choice, Config, ConfigStore};
use crate::controller::{SessionController, SessionListener};
use crate::metrics::SessionResult;
use crate::session::StopReason;

/// Writes finished sessions to the log
pub struct TraceListener;

impl SessionListener for TraceListener {
    fn on_result(&mut self, result: &SessionResult) {
        info!(
            wpm = result.wpm,
            accuracy = result.accuracy,
            secs = result.time_taken_secs,
            "session finished"
        );
    }
}

/// Terminal front end state: the text field plus the session controller
pub struct App {
    pub controller: SessionController,
    pub input: String,
    pub should_quit: bool,
    config_store: Option<Box<dyn ConfigStore>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("controller", &self.controller)
            .field("input", &self.input)
            .field("should_quit", &self.should_quit)
            .finish()
    }
}

impl App {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            input: String::new(),
            should_quit: false,
            config_store: None,
        }
    }

    /// Persist duration changes made from the UI
    pub fn with_config_store(mut self, store: impl ConfigStore + 'static) -> Self {
        self.config_store = Some(Box::new(store));
        self
    }

    /// Returns true when the key started a new session
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let running = self.controller.is_running();

        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                if running {
                    self.controller.stop(StopReason::Stopped);
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Tab => {
                self.controller.restart();
                self.input.clear();
                return true;
            }
            KeyCode::Enter if !running => {
                self.controller.start();
                self.input.clear();
                return true;
            }
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right if !running => {
                self.change_duration(next_choice(self.controller.selected_duration()));
            }
            KeyCode::Char('-') | KeyCode::Left if !running => {
                self.change_duration(prev_choice(self.controller.selected_duration()));
            }
            _ if !running => {}
            KeyCode::Backspace => {
                let mut value = self.input.clone();
                value.pop();
                self.set_input(value);
            }
            KeyCode::Char('w') if ctrl => {
                self.set_input(delete_last_word(&self.input));
            }
            KeyCode::Char('u') if ctrl => {
                self.set_input(String::new());
            }
            KeyCode::Char(c) if !ctrl => {
                let mut value = self.input.clone();
                value.push(c);
                self.set_input(value);
            }
            _ => {}
        }
        false
    }

    /// Replace the whole text field (typing, paste, deletions)
    pub fn set_input(&mut self, value: String) {
        self.input = self.controller.on_input(&value);
    }

    pub fn on_tick(&mut self) {
        self.controller.on_tick();
    }

    /// Pick up async stats; true when there is something new to draw
    pub fn on_poll(&mut self) -> bool {
        self.controller.poll_stats().is_some()
    }

    fn change_duration(&mut self, secs: u64) {
        let secs = self.controller.set_duration_secs(secs);
        if let Some(store) = &self.config_store {
            if let Err(e) = store.save(&Config { duration_secs: secs }) {
                warn!(error = %e, "failed to save config");
            }
        }
    }
}

/// Input with its last word (and the whitespace after it) removed
pub fn delete_last_word(input: &str) -> String {
    let trimmed = input.trim_end();
    match trimmed.rfind(char::is_whitespace) {
        Some(idx) => {
            // keep the separator itself
            let sep_len = trimmed[idx..].chars().next().map_or(1, char::len_utf8);
            trimmed[..idx + sep_len].to_string()
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::FileConfigStore;
    use crate::corpus::SampleCorpus;
    use crate::history::HistoryStore;
    use crate::session::SessionStatus;
    use crate::storage::MemoryStorage;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn test_app(prompt: &str) -> (App, ManualClock) {
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        let controller = SessionController::new(
            SampleCorpus::custom(prompt),
            HistoryStore::new(Box::new(MemoryStorage::new())),
        )
        .with_clock(clock.clone())
        .with_listener(TraceListener)
        .with_duration(30);
        (App::new(controller), clock)
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_enter_starts_and_typing_completes() {
        let (mut app, clock) = test_app("hi you");
        assert!(!app.handle_key(key(KeyCode::Char('h'))));
        assert_eq!(app.input, "");

        assert!(app.handle_key(key(KeyCode::Enter)));
        assert!(app.controller.is_running());

        type_str(&mut app, "hi yo");
        clock.advance(Duration::seconds(2));
        type_str(&mut app, "u");
        assert_eq!(app.controller.status(), SessionStatus::Ended);
        assert_eq!(app.controller.history().len(), 1);

        // further typing is ignored once ended
        type_str(&mut app, "x");
        assert_eq!(app.input, "hi you");
    }

    #[test]
    fn test_backspace_and_word_deletion() {
        let (mut app, _) = test_app("one two three");
        app.handle_key(key(KeyCode::Enter));

        type_str(&mut app, "one twx");
        assert_eq!(app.controller.state().incorrect_count, 1);

        app.handle_key(key(KeyCode::Backspace));
        assert_eq!(app.input, "one tw");
        assert_eq!(app.controller.state().incorrect_count, 0);

        app.handle_key(ctrl('w'));
        assert_eq!(app.input, "one ");
        assert_eq!(app.controller.state().total_typed, 4);

        app.handle_key(ctrl('u'));
        assert_eq!(app.input, "");
        assert_eq!(app.controller.state().total_typed, 0);
    }

    #[test]
    fn test_paste_longer_than_sample_is_clipped() {
        let (mut app, _) = test_app("abc");
        app.handle_key(key(KeyCode::Enter));
        app.set_input("abcdef".to_string());
        assert_eq!(app.input, "abc");
        assert_eq!(app.controller.status(), SessionStatus::Ended);
    }

    #[test]
    fn test_escape_stops_then_quits() {
        let (mut app, _) = test_app("hello");
        app.handle_key(key(KeyCode::Enter));
        type_str(&mut app, "he");

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.controller.status(), SessionStatus::Stopped);
        assert!(!app.should_quit);
        assert!(app.controller.history().is_empty());

        app.handle_key(key(KeyCode::Esc));
        assert!(app.should_quit);
    }

    #[test]
    fn test_ctrl_c_quits_while_running() {
        let (mut app, _) = test_app("hello");
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(ctrl('c'));
        assert!(app.should_quit);
        assert_eq!(app.input, "");
    }

    #[test]
    fn test_tab_restarts() {
        let (mut app, _) = test_app("hello");
        app.handle_key(key(KeyCode::Enter));
        type_str(&mut app, "hel");
        assert!(app.handle_key(key(KeyCode::Tab)));
        assert!(app.controller.is_running());
        assert_eq!(app.input, "");
        assert_eq!(app.controller.state().typed_index, 0);
    }

    #[test]
    fn test_duration_keys_cycle_and_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (app, _) = test_app("hello");
        let mut app = app.with_config_store(FileConfigStore::with_path(&path));

        app.handle_key(key(KeyCode::Char('+')));
        assert_eq!(app.controller.selected_duration(), 60);
        app.handle_key(key(KeyCode::Char('-')));
        app.handle_key(key(KeyCode::Char('-')));
        assert_eq!(app.controller.selected_duration(), 15);
        assert_eq!(FileConfigStore::with_path(&path).load().duration_secs, 15);

        // while running '+' is just a character
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(key(KeyCode::Char('+')));
        assert_eq!(app.controller.selected_duration(), 15);
        assert_eq!(app.input, "+");
    }

    #[test]
    fn test_ticks_drive_timeout() {
        let (mut app, clock) = test_app("hello world");
        app.controller.set_duration("2");
        app.handle_key(key(KeyCode::Enter));
        type_str(&mut app, "hello");
        for _ in 0..2 {
            clock.advance(Duration::seconds(1));
            app.on_tick();
        }
        assert_eq!(app.controller.status(), SessionStatus::Ended);
        assert_eq!(app.controller.last_result().unwrap().time_taken_secs, 2);
        assert!(!app.on_poll());
    }

    #[test]
    fn test_delete_last_word() {
        assert_eq!(delete_last_word("one two"), "one ");
        assert_eq!(delete_last_word("one two  "), "one ");
        assert_eq!(delete_last_word("one"), "");
        assert_eq!(delete_last_word(""), "");
        assert_eq!(delete_last_word("a\u{2014}b c"), "a\u{2014}b ");
    }
}
