use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::App,
    metrics::performance_message,
    session::{Outcome, SessionStatus},
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const HISTORY_ROWS: usize = 7;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let controller = &self.controller;
        let view = controller.view();
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let show_results =
            view.status == SessionStatus::Ended && controller.last_result().is_some();
        let show_history = controller.history_available();
        let history_height = if show_history {
            HISTORY_ROWS as u16 + 2
        } else {
            0
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                // title
                Constraint::Length(1),
                // timer and live stats
                Constraint::Length(1),
                // progress
                Constraint::Length(1),
                // sample text
                Constraint::Min(3),
                Constraint::Length(if show_results { 4 } else { 0 }),
                Constraint::Length(history_height),
                // legend
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(Span::styled(
            "Copy Cat! Typing Test",
            bold_style.fg(Color::Magenta),
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        let stats = controller.stats();
        Paragraph::new(Line::from(vec![
            Span::styled(format!("{}s", view.time_remaining), bold_style),
            Span::raw("   "),
            Span::styled(format!("{} wpm", stats.wpm), bold_style),
            Span::raw("   "),
            Span::styled(format!("{}% acc", stats.accuracy), bold_style),
        ]))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        Gauge::default()
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(controller.state().progress().clamp(0.0, 1.0))
            .label("")
            .render(chunks[2], buf);

        render_prompt(self, chunks[3], buf);

        if show_results {
            if let Some(result) = controller.last_result() {
                let lines = vec![
                    Line::from(Span::styled(
                        format!(
                            "{} wpm   {}% acc   {}s",
                            result.wpm, result.accuracy, result.time_taken_secs
                        ),
                        bold_style,
                    )),
                    Line::from(Span::styled(
                        performance_message(result.wpm, result.accuracy),
                        italic_style.fg(Color::Cyan),
                    )),
                ];
                Paragraph::new(lines)
                    .block(Block::default().borders(Borders::TOP).title("Results"))
                    .alignment(Alignment::Center)
                    .render(chunks[4], buf);
            }
        }

        if show_history {
            let history = controller.history();
            let lines: Vec<Line> = if history.is_empty() {
                vec![Line::from(Span::styled(
                    "No sessions in the last 7 days",
                    dim_style,
                ))]
            } else {
                history
                    .rows
                    .iter()
                    .take(HISTORY_ROWS)
                    .map(|row| {
                        Line::from(vec![
                            Span::styled(format!("{:<18}", row.date), bold_style),
                            Span::raw(format!(
                                "acc {:>3}% · {:>4}s   ",
                                row.entry.accuracy, row.entry.time_taken_secs
                            )),
                            Span::styled(format!("{:>3} wpm ", row.entry.wpm), bold_style),
                            Span::styled(row.label, italic_style),
                        ])
                    })
                    .collect()
            };
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("History"))
                .render(chunks[5], buf);
        }

        let legend = match view.status {
            SessionStatus::Running => "(esc) stop / (tab) restart / (ctrl+w) delete word",
            _ => "(enter) start / (+/-) duration / (esc) quit",
        };
        Paragraph::new(Span::styled(legend, italic_style)).render(chunks[6], buf);
    }
}

fn render_prompt(app: &App, area: Rect, buf: &mut Buffer) {
    let state = app.controller.state();
    if state.status == SessionStatus::Idle {
        Paragraph::new(Span::styled(
            format!(
                "Press enter to start a {}s test",
                app.controller.selected_duration()
            ),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
        return;
    }

    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let correct_style = bold_style.fg(Color::Green);
    let incorrect_style = bold_style
        .fg(Color::Red)
        .add_modifier(Modifier::UNDERLINED);
    let current_style = bold_style.add_modifier(Modifier::REVERSED);
    let pending_style = bold_style.add_modifier(Modifier::DIM);

    let typed: Vec<char> = app.input.chars().take(state.sample_len()).collect();
    let spans: Vec<Span> = state
        .sample_text()
        .chars()
        .enumerate()
        .map(|(idx, expected)| {
            let style = match typed.get(idx) {
                Some(&c) => match state.outcome_at(idx, c) {
                    Some(Outcome::Correct) => correct_style,
                    _ => incorrect_style,
                },
                None if idx == typed.len() && state.is_running() => current_style,
                None => pending_style,
            };
            Span::styled(expected.to_string(), style)
        })
        .collect();

    let fits_one_line = state.sample_text().width() <= area.width as usize;
    Paragraph::new(Line::from(spans))
        .alignment(if fits_one_line {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::controller::SessionController;
    use crate::corpus::SampleCorpus;
    use crate::history::HistoryStore;
    use crate::storage::MemoryStorage;
    use chrono::{Duration, TimeZone, Utc};
    use ratatui::{backend::TestBackend, Terminal};

    fn test_app(prompt: &str, history: HistoryStore) -> (App, ManualClock) {
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        let controller = SessionController::new(SampleCorpus::custom(prompt), history)
            .with_clock(clock.clone())
            .with_duration(30);
        (App::new(controller), clock)
    }

    fn rendered(app: &App) -> String {
        let area = Rect::new(0, 0, 100, 30);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer.content.iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_idle_screen() {
        let (app, _) = test_app("hello world", HistoryStore::new(Box::new(MemoryStorage::new())));
        let content = rendered(&app);
        assert!(content.contains("Copy Cat! Typing Test"));
        assert!(content.contains("Press enter to start a 30s test"));
        assert!(content.contains("30s"));
        assert!(content.contains("0 wpm"));
        assert!(content.contains("100% acc"));
        assert!(content.contains("No sessions in the last 7 days"));
    }

    #[test]
    fn test_running_screen_highlights_prompt() {
        let (mut app, _) = test_app("hello world", HistoryStore::disabled());
        app.controller.start();
        app.set_input("hex".to_string());

        let area = Rect::new(0, 0, 100, 30);
        let mut buffer = Buffer::empty(area);
        (&app).render(area, &mut buffer);
        let content: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(content.contains("hello world"));
        assert!(content.contains("(esc) stop"));
        // history section is hidden when storage is unavailable
        assert!(!content.contains("History"));

        let cell_of = |ch: &str| {
            buffer
                .content
                .iter()
                .position(|c| c.symbol() == ch)
                .unwrap()
        };
        let h = cell_of("h");
        assert_eq!(buffer.content[h].fg, Color::Green);
        // the third char ('l' expected, 'x' typed) is marked wrong
        assert_eq!(buffer.content[h + 2].fg, Color::Red);
        assert!(buffer.content[h + 3]
            .modifier
            .contains(Modifier::REVERSED));
    }

    #[test]
    fn test_results_and_history_after_completion() {
        let (mut app, clock) =
            test_app("cat", HistoryStore::new(Box::new(MemoryStorage::new())));
        app.controller.start();
        clock.advance(Duration::seconds(3));
        app.set_input("cat".to_string());

        let content = rendered(&app);
        assert!(content.contains("Results"));
        assert!(content.contains("12 wpm"));
        assert!(content.contains("Keep practicing! Every expert was once a beginner!"));
        assert!(content.contains("History"));
        assert!(content.contains("Keep practicing"));
        assert!(!content.contains("No sessions in the last 7 days"));
    }

    #[test]
    fn test_draw_through_terminal() {
        let (app, _) = test_app("hello", HistoryStore::disabled());
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| f.render_widget(&app, f.area())).unwrap();

        let content: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Press enter"));
    }
}
