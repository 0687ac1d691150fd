use ratatui::style::Color;

pub const FG: Color = Color::Rgb(200, 200, 210);
pub const DIM: Color = Color::Rgb(80, 80, 90);
pub const ACCENT: Color = Color::Rgb(0, 200, 150);
pub const RECORD_RED: Color = Color::Rgb(220, 50, 50);
pub const PLAYING_GREEN: Color = Color::Rgb(50, 220, 100);
pub const MUTE_YELLOW: Color = Color::Rgb(220, 200, 50);
pub const LEG_COLORS: [Color; 2] = [
    Color::Rgb(100, 200, 255), // Leg A
    Color::Rgb(255, 150, 100), // Leg B
];
pub const HEADER_BG: Color = Color::Rgb(35, 35, 45);
pub const SELECTED_BG: Color = Color::Rgb(40, 45, 55);
