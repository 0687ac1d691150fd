use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Paragraph;

use crate::app::AppState;
use crate::audio::engine::TrackStatus;
use crate::constants::SILENCE_STEP;
use crate::ui::layout::RowLayout;
use crate::ui::theme;
use crate::ui::views::View;

const METER_CELLS: usize = 8;

/// One row per channel: attenuation per leg, mute and arm state
pub struct RoutingView;

impl View for RoutingView {
    fn render(&self, state: &AppState, frame: &mut Frame, area: Rect) {
        let rows = area.height as usize;
        if rows == 0 {
            return;
        }
        let selected = state.status.selected;
        let first = (selected + 1).saturating_sub(rows);

        for (offset, (index, track)) in state.status.tracks.iter().enumerate().skip(first).take(rows).enumerate() {
            let row = Rect::new(area.x, area.y + offset as u16, area.width, 1);
            render_row(frame, row, index, track, index == selected);
        }
    }
}

/// Bar length for an attenuation step, full at 0 and empty at silence.
fn meter(step: u8) -> String {
    let audible = SILENCE_STEP.saturating_sub(step) as usize;
    let filled = (audible * METER_CELLS).div_ceil(SILENCE_STEP as usize);
    format!("{}{}", "█".repeat(filled), "░".repeat(METER_CELLS - filled))
}

fn render_row(frame: &mut Frame, area: Rect, index: usize, track: &TrackStatus, selected: bool) {
    let layout = RowLayout::new(area);
    let base = if selected {
        Style::default().fg(theme::FG).bg(theme::SELECTED_BG)
    } else {
        Style::default().fg(theme::FG)
    };

    frame.render_widget(
        Paragraph::new(if selected { ">" } else { " " }).style(base.fg(theme::ACCENT)),
        layout.cursor,
    );
    frame.render_widget(Paragraph::new(format!("Track {:02}", index + 1)).style(base), layout.name);

    let legs = format!(
        "A {} {:>2}  B {} {:>2}",
        meter(track.mix[0]),
        track.mix[0],
        meter(track.mix[1]),
        track.mix[1]
    );
    let leg_color = if track.muted { theme::DIM } else { theme::LEG_COLORS[0] };
    frame.render_widget(Paragraph::new(legs).style(base.fg(leg_color)), layout.legs);

    let (mute, mute_color) = if track.muted {
        ("MUTE", theme::MUTE_YELLOW)
    } else {
        ("PLAY", theme::PLAYING_GREEN)
    };
    frame.render_widget(Paragraph::new(mute).style(base.fg(mute_color)), layout.mute);

    let arm = format!(
        "{} {} {}",
        if track.armed[0] { "REC-A" } else { "     " },
        if track.armed[1] { "REC-B" } else { "     " },
        if track.recording { "●" } else { " " }
    );
    let mut arm_style = base.fg(theme::RECORD_RED);
    if track.recording {
        arm_style = arm_style.add_modifier(Modifier::BOLD);
    }
    frame.render_widget(Paragraph::new(arm).style(arm_style), layout.arm);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_spans_full_to_silent() {
        assert_eq!(meter(0), "████████");
        assert_eq!(meter(8), "████░░░░");
        assert_eq!(meter(15), "█░░░░░░░");
        assert_eq!(meter(SILENCE_STEP), "░░░░░░░░");
    }
}
