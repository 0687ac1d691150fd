use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;

use crate::ui::theme;

/// Footer line of `key:action` pairs; pairs that do not fit are dropped.
pub struct KeyHintFooter<'a> {
    pub hints: &'a [(&'static str, &'static str)],
}

impl Widget for KeyHintFooter<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }
        let right = area.x + area.width;
        let mut x = area.x + 1;

        for &(key, desc) in self.hints {
            let width = (key.chars().count() + desc.chars().count() + 2) as u16;
            if x + width > right {
                break;
            }
            let (next, _) = buf.set_stringn(x, area.y, key, width as usize, Style::default().fg(theme::ACCENT));
            let (next, _) = buf.set_stringn(next, area.y, ":", 1, Style::default().fg(theme::DIM));
            let (next, _) = buf.set_stringn(next, area.y, desc, width as usize, Style::default().fg(theme::FG));
            x = next + 2;
        }
    }
}
