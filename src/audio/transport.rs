#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
}

pub struct Transport {
    pub state: TransportState,
    /// Playhead in frames
    pub position: u64,
    /// Capture trails the playhead by this many frames (capture + playback latency)
    pub record_offset: u64,
    /// Orthogonal to `state`; capture runs only while playing with this set
    pub record_enabled: bool,
    /// Frame count of the project file as of the last stop
    last_frame: u64,
}

impl Transport {
    pub fn new(record_offset: u64) -> Self {
        Self {
            state: TransportState::Stopped,
            position: 0,
            record_offset,
            record_enabled: false,
            last_frame: 0,
        }
    }

    pub fn play(&mut self) {
        self.state = TransportState::Playing;
    }

    /// Stop; `last_frame` picks up any growth. The playhead stays put unless
    /// it ran past the end while capturing.
    pub fn stop(&mut self, last_frame: u64) {
        self.state = TransportState::Stopped;
        self.last_frame = last_frame;
        self.position = self.position.min(last_frame);
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Clamp and store a new playhead; returns the clamped value.
    pub fn seek(&mut self, pos: u64) -> u64 {
        self.position = pos.min(self.last_frame);
        self.position
    }

    pub fn seek_by(&mut self, delta: i64) -> u64 {
        let target = if delta < 0 {
            self.position.saturating_sub(delta.unsigned_abs())
        } else {
            self.position.saturating_add(delta as u64)
        };
        self.seek(target)
    }

    pub fn advance(&mut self, frames: u64) {
        self.position += frames;
    }

    pub fn last_frame(&self) -> u64 {
        self.last_frame
    }

    pub fn set_last_frame(&mut self, last_frame: u64) {
        self.last_frame = last_frame;
    }

    /// File frame that capture writes for a period played from `head`, once
    /// the latency-compensated start has been reached.
    pub fn capture_target(&self, head: u64) -> Option<u64> {
        head.checked_sub(self.record_offset)
    }
}
