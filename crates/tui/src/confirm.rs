use crossterm::event::KeyCode;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// Modal Yes/No question drawn over the main screen.
#[derive(Debug, Clone)]
pub struct ConfirmDialog {
    pub title: String,
    pub message: String,
    pub yes_selected: bool,
}

impl ConfirmDialog {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            yes_selected: false, // default to No
        }
    }

    pub fn toggle(&mut self) {
        self.yes_selected = !self.yes_selected;
    }

    /// `Some(answer)` once the key settles the question.
    pub fn handle_key(&mut self, code: KeyCode) -> Option<bool> {
        match code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => {
                self.toggle();
                None
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
            KeyCode::Enter => Some(self.yes_selected),
            _ => None,
        }
    }

    pub fn render(&self, f: &mut Frame) {
        let width = (self.message.len() as u16 + 6).max(40);
        let area = centered_rect(width, 7, f.area());
        f.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" {} ", self.title));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1), // message
                Constraint::Length(1),
                Constraint::Length(1), // buttons
            ])
            .split(inner);

        let msg = Paragraph::new(Line::from(Span::styled(&self.message, Style::default().fg(Color::White))))
            .alignment(Alignment::Center);
        f.render_widget(msg, rows[1]);

        let (yes_style, no_style) = if self.yes_selected {
            (
                Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD),
                Style::default().fg(Color::DarkGray),
            )
        } else {
            (
                Style::default().fg(Color::DarkGray),
                Style::default().fg(Color::Black).bg(Color::Red).add_modifier(Modifier::BOLD),
            )
        };
        let buttons = Line::from(vec![
            Span::styled("  [Yes]  ", yes_style),
            Span::raw("   "),
            Span::styled("  [No]  ", no_style),
        ]);
        f.render_widget(Paragraph::new(buttons).alignment(Alignment::Center), rows[3]);
    }
}

/// A `width` x `height` rect centred in `area`, clipped to it.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no() {
        let mut d = ConfirmDialog::new("Quit", "Sure?");
        assert_eq!(d.handle_key(KeyCode::Enter), Some(false));
        assert_eq!(d.handle_key(KeyCode::Right), None);
        assert_eq!(d.handle_key(KeyCode::Enter), Some(true));
        assert_eq!(d.handle_key(KeyCode::Esc), Some(false));
    }

    #[test]
    fn centered_rect_clips() {
        let r = centered_rect(40, 7, Rect::new(0, 0, 20, 5));
        assert_eq!(r, Rect::new(0, 0, 20, 5));
    }
}
