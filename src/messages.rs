use crate::audio::mixer::{Leg, Pan};

/// Control actions, produced by the input layer and applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectNext,
    SelectPrevious,
    Louder,
    Quieter,
    /// Route the selected track to one leg, keeping its level
    Pan(Pan),
    /// Route the selected track at the padded attenuation
    PanPadded(Pan),
    ToggleMute,
    ToggleMuteAll,
    ToggleArm(Leg),
    ToggleRecordEnable,
    ToggleTransport,
    SeekHome,
    SeekEnd,
    /// Relative seek in frames
    Seek(i64),
    ClearCounters,
    Quit,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::SelectNext => "next",
            Action::SelectPrevious => "previous",
            Action::Louder => "louder",
            Action::Quieter => "quieter",
            Action::Pan(Pan::Left) => "pan A",
            Action::Pan(Pan::Right) => "pan B",
            Action::Pan(Pan::Center) => "pan A+B",
            Action::PanPadded(Pan::Left) => "pad A",
            Action::PanPadded(Pan::Right) => "pad B",
            Action::PanPadded(Pan::Center) => "pad A+B",
            Action::ToggleMute => "mute",
            Action::ToggleMuteAll => "mute all",
            Action::ToggleArm(Leg::A) => "arm A",
            Action::ToggleArm(Leg::B) => "arm B",
            Action::ToggleRecordEnable => "record",
            Action::ToggleTransport => "start/stop",
            Action::SeekHome => "home",
            Action::SeekEnd => "end",
            Action::Seek(_) => "seek",
            Action::ClearCounters => "clear counters",
            Action::Quit => "quit",
        }
    }
}
