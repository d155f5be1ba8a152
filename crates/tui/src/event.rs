use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::ui;
use crate::App;

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.drain_logs();
        app.drain_progress();

        terminal.draw(|f| ui::draw(f, app))?;

        // 100ms keeps the elapsed timer ticking
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(dialog) = app.confirm.as_mut() {
                    if let Some(yes) = dialog.handle_key(key.code) {
                        app.confirm_quit(yes);
                    }
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => app.request_quit(),
                    KeyCode::Char(' ') => app.toggle_run(),
                    KeyCode::Char('s') | KeyCode::Char('S') => app.stop(),
                    KeyCode::Char('m') | KeyCode::Char('M') | KeyCode::Tab => app.cycle_mode(),
                    KeyCode::Char('w') | KeyCode::Char('W') => app.discover(),
                    KeyCode::Char('a') | KeyCode::Char('A') => app.activate(),
                    KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_log(),
                    KeyCode::PageUp => app.scroll_log_up(10),
                    KeyCode::PageDown => app.scroll_log_down(10),
                    _ => {}
                }
            }
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollUp => app.scroll_log_up(3),
                MouseEventKind::ScrollDown => app.scroll_log_down(3),
                _ => {}
            },
            _ => {}
        }
    }
}
