use chrono::Utc;
use clap::{error::ErrorKind, CommandFactory, Parser};
use copycat::{
    app::{App, TraceListener},
    app_dirs::AppDirs,
    config::{resolve_duration, ConfigStore, FileConfigStore},
    controller::SessionController,
    corpus::SampleCorpus,
    history::HistoryStore,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner, POLL_INTERVAL},
    stats_worker::StatsPublisher,
    storage::FileStorage,
};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
};
use tracing::warn;

/// typing-speed trainer with live wpm, accuracy and a week of history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Type a random passage against the clock. Live wpm and accuracy are shown while you type; completed sessions are kept for seven days."
)]
pub struct Cli {
    /// session length in seconds, 1 to 86400 (invalid values fall back to the saved
    /// duration, 60 unless changed)
    #[clap(short = 's', long = "secs")]
    secs: Option<String>,

    /// custom text to type instead of the built-in passages
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// directory holding the session history
    #[clap(long)]
    history_dir: Option<PathBuf>,

    /// do not read or write session history
    #[clap(long)]
    no_history: bool,

    /// print the last seven days of history and exit
    #[clap(long)]
    print_history: bool,

    /// compute live stats on the main thread instead of a worker
    #[clap(long)]
    sync_stats: bool,

    /// log debug output to the log file
    #[clap(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn history_store(&self) -> HistoryStore {
        if self.no_history {
            return HistoryStore::disabled();
        }
        match self.history_dir.clone().or_else(AppDirs::state_dir) {
            Some(dir) => HistoryStore::new(Box::new(FileStorage::new(dir))),
            None => {
                warn!("no state directory, history disabled");
                HistoryStore::disabled()
            }
        }
    }

    /// `--secs` if valid, otherwise the saved duration
    fn duration(&self, saved: u64) -> u64 {
        match self.secs.as_deref() {
            Some(raw) => resolve_duration(raw, saved),
            None => saved,
        }
    }

    fn corpus(&self) -> SampleCorpus {
        self.prompt
            .as_deref()
            .map(SampleCorpus::custom)
            .unwrap_or_default()
    }
}

fn init_tracing(verbose: bool) {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("COPYCAT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // stdout is the UI; logs go to the file only
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

fn print_history(history: &HistoryStore) {
    if !history.is_available() {
        println!("history is unavailable");
        return;
    }
    let view = history.render(&history.current(Utc::now()));
    if view.is_empty() {
        println!("No sessions in the last 7 days");
        return;
    }
    for row in &view.rows {
        println!(
            "{:<18} {:>3} wpm  acc {:>3}%  {:>4}s  {}",
            row.date, row.entry.wpm, row.entry.accuracy, row.entry.time_taken_secs, row.label
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_store = FileConfigStore::new();
    let config = config_store.load();
    let duration = cli.duration(config.duration_secs);

    let history = cli.history_store();
    if cli.print_history {
        print_history(&history);
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let stats = if cli.sync_stats {
        StatsPublisher::sync()
    } else {
        StatsPublisher::with_worker()
    };
    let controller = SessionController::new(cli.corpus(), history)
        .with_stats(stats)
        .with_listener(TraceListener)
        .with_duration(duration);
    let mut app = App::new(controller).with_config_store(config_store);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default())
        .with_poll_interval(POLL_INTERVAL);

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    while !app.should_quit {
        let mut redraw = match runner.step() {
            AppEvent::Key(key) => {
                if app.handle_key(key) {
                    // the countdown starts with the session
                    runner.reset_tick();
                }
                true
            }
            AppEvent::Resize => true,
            AppEvent::Tick => {
                let running = app.controller.is_running();
                app.on_tick();
                running
            }
            AppEvent::Idle => false,
        };
        redraw |= app.on_poll();

        if redraw && !app.should_quit {
            terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        }
    }

    Ok(())
}
