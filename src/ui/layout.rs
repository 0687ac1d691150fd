use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Main screen layout regions
pub struct ScreenLayout {
    pub header: Rect,
    pub main: Rect,
    pub status: Rect,
    pub footer: Rect,
}

impl ScreenLayout {
    pub fn new(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Transport bar
                Constraint::Min(4),    // Routing list
                Constraint::Length(1), // Messages
                Constraint::Length(1), // Key hints
            ])
            .split(area);

        Self {
            header: chunks[0],
            main: chunks[1],
            status: chunks[2],
            footer: chunks[3],
        }
    }
}

/// Columns of one routing row
pub struct RowLayout {
    pub cursor: Rect,
    pub name: Rect,
    pub legs: Rect,
    pub mute: Rect,
    pub arm: Rect,
}

impl RowLayout {
    pub fn new(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(9),
                Constraint::Length(24),
                Constraint::Length(6),
                Constraint::Min(12),
            ])
            .split(area);

        Self {
            cursor: chunks[0],
            name: chunks[1],
            legs: chunks[2],
            mute: chunks[3],
            arm: chunks[4],
        }
    }
}
