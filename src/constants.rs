/// Capacity of the track arena; container files may carry fewer channels.
pub const MAX_TRACKS: usize = 16;
/// Attenuation step that silences a leg entirely.
pub const SILENCE_STEP: u8 = 16;
/// Default attenuation for freshly loaded tracks (mid-scale).
pub const DEFAULT_STEP: u8 = 8;
/// Monitor legs: A feeds the left output, B the right.
pub const LEG_COUNT: usize = 2;
/// Bytes per sample; only 16-bit linear PCM is handled.
pub const SAMPLE_BYTES: usize = 2;
pub const SAMPLE_RATE: u32 = 44_100;
pub const PERIOD_FRAMES: usize = 256;
/// UI refresh rate target
pub const UI_FPS: u64 = 30;
/// Queue depth for stream error reports from device callbacks
pub const CHANNEL_CAPACITY: usize = 64;
