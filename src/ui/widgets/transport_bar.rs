use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;

use crate::app::AppState;
use crate::audio::transport::TransportState;
use crate::ui::theme;

pub struct TransportBarWidget<'a> {
    pub state: &'a AppState,
}

impl Widget for TransportBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }
        let status = &self.state.status;
        let y = area.y;
        buf.set_style(Rect::new(area.x, y, area.width, 1), Style::default().bg(theme::HEADER_BG));

        let (icon, icon_color) = match (status.state, status.capturing) {
            (TransportState::Playing, true) => ("● REC ", theme::RECORD_RED),
            (TransportState::Playing, false) => ("▶ PLAY", theme::PLAYING_GREEN),
            (TransportState::Stopped, _) => ("■ STOP", theme::DIM),
        };
        buf.set_string(area.x + 1, y, icon, Style::default().fg(icon_color));

        let clock = format!(
            "  {} / {}  ",
            self.state.position_display(),
            self.state.length_display()
        );
        buf.set_string(area.x + 8, y, &clock, Style::default().fg(theme::ACCENT));

        let mut x = area.x + 8 + clock.chars().count() as u16;
        let (rec, rec_color) = if status.record_enabled {
            ("REC-ENABLE", theme::RECORD_RED)
        } else {
            ("rec-safe  ", theme::DIM)
        };
        buf.set_string(x, y, rec, Style::default().fg(rec_color));
        x += rec.len() as u16 + 2;

        let counters = format!(
            "xrun out:{} in:{}  offset:{}",
            status.counters.underruns, status.counters.overruns, status.record_offset
        );
        let counter_color = if status.counters.underruns > 0 || status.counters.overruns > 0 {
            theme::MUTE_YELLOW
        } else {
            theme::DIM
        };
        if x < area.x + area.width {
            let room = (area.x + area.width - x) as usize;
            buf.set_stringn(x, y, &counters, room, Style::default().fg(counter_color));
        }

        if area.height > 1 {
            let info = format!(
                " {} channels  {} Hz  frame {}",
                status.channels, status.sample_rate, status.position
            );
            buf.set_stringn(area.x, y + 1, &info, area.width as usize, Style::default().fg(theme::DIM));
        }
    }
}
