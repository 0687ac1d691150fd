use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::audio::mixer::{Leg, Pan};
use crate::messages::Action;

/// Larger seek on PageUp/PageDown
const PAGE_SEEKS: i64 = 10;

/// Map a key press to an engine action. `seek_step` is in frames.
pub fn handle_key(key: KeyEvent, seek_step: u64) -> Option<Action> {
    let step = i64::try_from(seek_step).unwrap_or(i64::MAX);
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        // Ctrl-C quits even in raw mode
        return (key.code == KeyCode::Char('c')).then_some(Action::Quit);
    }
    let action = match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Action::Quit,
        KeyCode::Down => Action::SelectNext,
        KeyCode::Up => Action::SelectPrevious,
        KeyCode::Char('+') | KeyCode::Char('=') => Action::Louder,
        KeyCode::Char('-') => Action::Quieter,
        KeyCode::Char('l') => Action::Pan(Pan::Left),
        KeyCode::Char('r') => Action::Pan(Pan::Right),
        KeyCode::Char('c') => Action::Pan(Pan::Center),
        KeyCode::Char('L') => Action::PanPadded(Pan::Left),
        KeyCode::Char('R') => Action::PanPadded(Pan::Right),
        KeyCode::Char('C') => Action::PanPadded(Pan::Center),
        KeyCode::Char('m') => Action::ToggleMute,
        KeyCode::Char('M') => Action::ToggleMuteAll,
        KeyCode::Char('a') => Action::ToggleArm(Leg::A),
        KeyCode::Char('b') => Action::ToggleArm(Leg::B),
        KeyCode::Char('e') => Action::ToggleRecordEnable,
        KeyCode::Char(' ') => Action::ToggleTransport,
        KeyCode::Home => Action::SeekHome,
        KeyCode::End => Action::SeekEnd,
        KeyCode::Left => Action::Seek(-step),
        KeyCode::Right => Action::Seek(step),
        KeyCode::PageUp => Action::Seek(-step.saturating_mul(PAGE_SEEKS)),
        KeyCode::PageDown => Action::Seek(step.saturating_mul(PAGE_SEEKS)),
        KeyCode::Char('z') => Action::ClearCounters,
        _ => return None,
    };
    Some(action)
}

/// Footer hints
pub fn key_hints() -> Vec<(&'static str, &'static str)> {
    vec![
        ("↑↓", "Select"),
        ("+/-", "Level"),
        ("l/r/c", "Pan"),
        ("L/R/C", "Pad"),
        ("m/M", "Mute/All"),
        ("a/b", "Arm"),
        ("e", "Rec"),
        ("Space", "Start/Stop"),
        ("←→", "Seek"),
        ("Home/End", "Jump"),
        ("z", "Clear"),
        ("q", "Quit"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> Option<Action> {
        handle_key(KeyEvent::new(code, KeyModifiers::NONE), 441)
    }

    #[test]
    fn routing_keys() {
        assert_eq!(press(KeyCode::Char('a')), Some(Action::ToggleArm(Leg::A)));
        assert_eq!(press(KeyCode::Char('b')), Some(Action::ToggleArm(Leg::B)));
        assert_eq!(press(KeyCode::Char('R')), Some(Action::PanPadded(Pan::Right)));
        assert_eq!(press(KeyCode::Char('M')), Some(Action::ToggleMuteAll));
        assert_eq!(press(KeyCode::Char('x')), None);
    }

    #[test]
    fn seek_keys_scale_the_step() {
        assert_eq!(press(KeyCode::Left), Some(Action::Seek(-441)));
        assert_eq!(press(KeyCode::PageDown), Some(Action::Seek(4410)));
        assert_eq!(press(KeyCode::End), Some(Action::SeekEnd));
    }

    #[test]
    fn control_c_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(key, 1), Some(Action::Quit));
        assert_eq!(press(KeyCode::Char('c')), Some(Action::Pan(Pan::Center)));
    }
}
