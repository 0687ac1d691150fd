use crate::constants::{DEFAULT_STEP, LEG_COUNT, MAX_TRACKS, SILENCE_STEP};

/// Monitor output leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    A,
    B,
}

impl Leg {
    pub fn index(self) -> usize {
        match self {
            Leg::A => 0,
            Leg::B => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Leg::A => "A",
            Leg::B => "B",
        }
    }
}

/// One channel of the project file as heard on the monitor mix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track {
    /// Attenuation per leg in 6 dB steps, `SILENCE_STEP` mutes the leg
    pub mix: [u8; LEG_COUNT],
    pub muted: bool,
    /// Armed and the capture device is open
    pub recording: bool,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            mix: [DEFAULT_STEP; LEG_COUNT],
            muted: true,
            recording: false,
        }
    }
}

impl Track {
    #[inline]
    fn contribution(&self, sample: i16, leg: usize) -> i16 {
        let step = self.mix[leg];
        if self.muted || self.recording || step >= SILENCE_STEP {
            return 0;
        }
        sample >> step
    }

    /// Contribution to the left output
    #[inline]
    pub fn mix_a(&self, sample: i16) -> i16 {
        self.contribution(sample, 0)
    }

    /// Contribution to the right output
    #[inline]
    pub fn mix_b(&self, sample: i16) -> i16 {
        self.contribution(sample, 1)
    }

    pub fn louder(&mut self) {
        if self.mix.iter().all(|&s| s >= SILENCE_STEP) {
            self.mix = [SILENCE_STEP - 1; LEG_COUNT];
            return;
        }
        for step in &mut self.mix {
            if *step < SILENCE_STEP {
                *step = step.saturating_sub(1);
            }
        }
    }

    pub fn quieter(&mut self) {
        for step in &mut self.mix {
            *step = (*step + 1).min(SILENCE_STEP);
        }
    }

    /// Route the track to one leg only, at `step` attenuation.
    pub fn pan(&mut self, pan: Pan, step: u8) {
        let step = step.min(SILENCE_STEP);
        self.mix = match pan {
            Pan::Left => [step, SILENCE_STEP],
            Pan::Right => [SILENCE_STEP, step],
            Pan::Center => [step; LEG_COUNT],
        };
    }

    /// Loudest non-silent leg, used as the level when re-panning.
    pub fn level(&self) -> u8 {
        self.mix.iter().copied().min().unwrap_or(SILENCE_STEP)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pan {
    Left,
    Right,
    Center,
}

/// Validated index into the track arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelIndex(usize);

impl ChannelIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

/// Fixed-capacity track arena. Only the first `channels` entries are live;
/// the rest keep their settings for the next project.
pub struct Tracks {
    tracks: [Track; MAX_TRACKS],
    channels: usize,
}

impl Tracks {
    pub fn new() -> Self {
        Self {
            tracks: [Track::default(); MAX_TRACKS],
            channels: 0,
        }
    }

    /// Number of live tracks
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn set_channels(&mut self, channels: usize) {
        self.channels = channels.min(MAX_TRACKS);
    }

    /// Validate a raw channel number against the live range.
    pub fn channel(&self, index: usize) -> Option<ChannelIndex> {
        (index < self.channels).then_some(ChannelIndex(index))
    }

    pub fn get(&self, ch: ChannelIndex) -> &Track {
        &self.tracks[ch.0]
    }

    pub fn get_mut(&mut self, ch: ChannelIndex) -> &mut Track {
        &mut self.tracks[ch.0]
    }

    /// Slot access for session loading, regardless of the live range.
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn live(&self) -> &[Track] {
        &self.tracks[..self.channels]
    }

    pub fn all(&self) -> &[Track; MAX_TRACKS] {
        &self.tracks
    }

    /// Mute everything if the first track is audible, otherwise unmute all.
    pub fn toggle_mute_all(&mut self) {
        let mute = !self.tracks[0].muted;
        for track in &mut self.tracks[..self.channels] {
            track.muted = mute;
        }
    }

    pub fn clear_recording(&mut self) {
        for track in &mut self.tracks {
            track.recording = false;
        }
    }

    pub fn recording_count(&self) -> usize {
        self.live().iter().filter(|t| t.recording).count()
    }
}

impl Default for Tracks {
    fn default() -> Self {
        Self::new()
    }
}

/// Attenuation that keeps a full-scale sum of `channels` tracks from clipping.
pub fn padded_step(channels: usize) -> u8 {
    let mut step = 0u8;
    while (1usize << step) < channels && step < SILENCE_STEP - 1 {
        step += 1;
    }
    step
}

/// Mix one period of interleaved frames into an interleaved stereo buffer.
/// `input` holds whole frames of `channels` little-endian samples; `out`
/// receives one left/right pair per frame and is overwritten.
pub fn mix_period(tracks: &[Track], channels: usize, input: &[u8], out: &mut [i16]) -> usize {
    let frame_size = channels * 2;
    let frames = (input.len() / frame_size).min(out.len() / 2);
    for (frame, pair) in input
        .chunks_exact(frame_size)
        .zip(out.chunks_exact_mut(2))
        .take(frames)
    {
        let mut left = 0i16;
        let mut right = 0i16;
        for (track, bytes) in tracks.iter().zip(frame.chunks_exact(2)) {
            let sample = i16::from_le_bytes([bytes[0], bytes[1]]);
            left = left.saturating_add(track.mix_a(sample));
            right = right.saturating_add(track.mix_b(sample));
        }
        pair[0] = left;
        pair[1] = right;
    }
    frames
}
