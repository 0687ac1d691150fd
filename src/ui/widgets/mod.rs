pub mod keyboard_hint;
pub mod status_line;
pub mod transport_bar;
