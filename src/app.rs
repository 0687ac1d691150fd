use crate::audio::engine::EngineStatus;

/// What the control surface shows, refreshed from the engine every frame
pub struct AppState {
    pub project: String,
    pub status: EngineStatus,
    /// Last error or notice, shown in the status line
    pub message: Option<String>,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(project: String, status: EngineStatus) -> Self {
        Self {
            project,
            status,
            message: None,
            should_quit: false,
        }
    }

    pub fn position_secs(&self) -> f64 {
        frames_to_secs(self.status.position, self.status.sample_rate)
    }

    pub fn position_display(&self) -> String {
        format_clock(self.position_secs())
    }

    pub fn length_display(&self) -> String {
        format_clock(frames_to_secs(self.status.last_frame, self.status.sample_rate))
    }
}

fn frames_to_secs(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 / sample_rate.max(1) as f64
}

/// `mm:ss.cc`
pub fn format_clock(secs: f64) -> String {
    let mins = (secs / 60.0) as u32;
    let s = secs % 60.0;
    format!("{:02}:{:05.2}", mins, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0.0), "00:00.00");
        assert_eq!(format_clock(61.5), "01:01.50");
        assert_eq!(format_clock(3599.99), "59:59.99");
    }
}
