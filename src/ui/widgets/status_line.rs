use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;

use crate::ui::theme;

/// Project name on the left, last notice on the right
pub struct StatusLine<'a> {
    pub project: &'a str,
    pub message: Option<&'a str>,
}

impl Widget for StatusLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }
        let (x, _) = buf.set_stringn(
            area.x + 1,
            area.y,
            self.project,
            area.width.saturating_sub(1) as usize,
            Style::default().fg(theme::DIM),
        );
        if let Some(message) = self.message {
            let room = (area.x + area.width).saturating_sub(x + 2);
            buf.set_stringn(x + 2, area.y, message, room as usize, Style::default().fg(theme::RECORD_RED));
        }
    }
}
