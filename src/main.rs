use std::io;
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use nguctl_core::logger::{self, LogRecord};
use nguctl_core::platform::create_platform;
use nguctl_core::settings::Settings;
use nguctl_core::stats::StatsStore;

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    logger::init(&cwd.join("logs"));

    let settings_path = cwd.join("settings.json");
    let settings = Settings::load(&settings_path);
    let stats = StatsStore::load(&cwd.join("stats.json"));

    let platform = create_platform(force_stub, &settings);

    let (log_tx, log_rx) = mpsc::channel::<LogRecord>();
    logger::set_tui_sender(log_tx);
    logger::info(&format!(
        "nguctl started, {} lifetime snipes",
        stats.stats.itopod_snipes
    ));

    let mut app = nguctl_tui::App::new(platform, settings, settings_path, stats, log_rx);
    app.discover();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = nguctl_tui::event::run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}
