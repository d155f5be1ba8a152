use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

use nguctl_core::format::{format_elapsed, human_format};
use nguctl_core::logger::{self, Level, LogRecord};
use nguctl_core::types::{RunMode, RunState};

use crate::App;

/// Counter and rate names shown for each mode, in display order.
fn run_fields(mode: RunMode) -> [(&'static str, &'static str); 4] {
    match mode {
        RunMode::Questing => [("exp", "Exp"), ("qp", "QP"), ("xph", "Exp/h"), ("qph", "QP/h")],
        RunMode::ItopodSniping => [("exp", "Exp"), ("pp", "PP"), ("xph", "Exp/h"), ("pph", "PP/h")],
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // banner
            Constraint::Length(2), // keys
            Constraint::Length(8), // run panel
            Constraint::Length(3), // gauge
            Constraint::Length(4), // lifetime
            Constraint::Length(1), // notice
            Constraint::Min(0),
        ])
        .split(chunks[0]);

    draw_banner(f, app, left[0]);
    draw_keys(f, left[1]);
    draw_run(f, app, left[2]);
    draw_gauge(f, app, left[3]);
    draw_lifetime(f, app, left[4]);
    draw_notice(f, app, left[5]);

    if app.log_visible && chunks.len() > 1 {
        draw_logs(f, app, chunks[1]);
    }

    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

fn draw_banner(f: &mut Frame, app: &App, area: Rect) {
    let mode = app.mode.label();
    let (label, bg) = match (app.target, app.runner.state()) {
        (None, _) => ("NO GAME WINDOW (w to retry)".to_string(), Color::Red),
        (_, RunState::Idle) => (format!("READY {} (space to run)", mode), Color::Cyan),
        (_, RunState::Running) => (format!("RUNNING {} (space to pause)", mode), Color::Green),
        (_, RunState::Paused) => (format!("PAUSED {} (space to resume)", mode), Color::Yellow),
        (_, RunState::Stopped) => (format!("STOPPED {} (space to run)", mode), Color::Red),
    };
    let label = match app.target {
        Some(t) => format!("{}  @ {}", label, t.origin),
        None => label,
    };

    let width = area.width as usize;
    let pad_total = width.saturating_sub(label.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;
    let centered = format!("{}{}{}", " ".repeat(pad_left), label, " ".repeat(pad_right));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered,
        Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, area);
}

fn key(k: &'static str) -> Span<'static> {
    Span::styled(k, Style::default().fg(Color::Yellow))
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(vec![
            key(" space"),
            Span::raw(" run/pause  "),
            key("s"),
            Span::raw(" stop  "),
            key("m"),
            Span::raw(" mode  "),
            key("q"),
            Span::raw(" quit"),
        ]),
        Line::from(vec![
            key(" w"),
            Span::raw(" find window  "),
            key("a"),
            Span::raw(" show game  "),
            key("l"),
            Span::raw(" logs"),
        ]),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

fn field_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {:<8}", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
    ])
}

fn draw_run(f: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    for (name, label) in run_fields(app.mode) {
        let value = app
            .view
            .counter(name)
            .map(|n| n as f64)
            .or_else(|| app.view.rate(name))
            .map_or_else(|| "-".to_string(), human_format);
        lines.push(field_line(label, value));
    }
    let task = if app.view.label.is_empty() { "-".to_string() } else { app.view.label.clone() };
    lines.push(field_line("Task", task));
    lines.push(field_line("Elapsed", format_elapsed(app.elapsed())));

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::TOP)
            .title(format!(" {} ", app.mode.label()))
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(panel, area);
}

fn draw_gauge(f: &mut Frame, app: &App, area: Rect) {
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .ratio(app.view.fraction);
    f.render_widget(gauge, area);
}

fn draw_lifetime(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats.stats;
    let lines = vec![
        field_line("Snipes", human_format(stats.itopod_snipes as f64)),
        field_line("Saved", stats.itopod_time_saved.clone()),
    ];
    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Lifetime ")
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(panel, area);
}

fn draw_notice(f: &mut Frame, app: &App, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let color = if notice.is_error { Color::Red } else { Color::Green };
    let line = Line::from(Span::styled(format!(" {}", notice.text), Style::default().fg(color)));
    f.render_widget(Paragraph::new(line), area);
}

fn draw_logs(f: &mut Frame, app: &App, area: Rect) {
    let visible_height = area.height.saturating_sub(2) as usize;
    let total = app.log_messages.len();
    let max_scroll = total.saturating_sub(visible_height);
    let scroll = app.log_scroll.min(max_scroll);
    let start = total.saturating_sub(visible_height + scroll);
    let end = total.saturating_sub(scroll);
    let log_lines: Vec<Line> = app.log_messages[start..end].iter().map(log_line).collect();

    let log_panel = Paragraph::new(log_lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Logs ")
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(log_panel, area);
}

fn log_line(rec: &LogRecord) -> Line<'_> {
    let color = match rec.color {
        logger::COLOR_GRAY => Color::DarkGray,
        logger::COLOR_BLUE => Color::LightBlue,
        logger::COLOR_GREEN => Color::Green,
        _ => Color::White,
    };

    let mut spans = vec![
        Span::styled(rec.timestamp.as_str(), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];
    match rec.level {
        Level::Error => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        Level::Warn => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        Level::Info => {}
    }
    if !rec.prefix.is_empty() {
        spans.push(Span::styled(
            rec.prefix.as_str(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(rec.message.as_str(), Style::default().fg(color)));
    Line::from(spans)
}
