use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::audio::capture::capture_period;
use crate::audio::device::{DeviceError, InputDevice, OutputDevice, StreamSpec};
use crate::audio::mixer::{padded_step, ChannelIndex, Leg, Track, Tracks};
use crate::audio::playback::play_period;
use crate::audio::transport::{Transport, TransportState};
use crate::constants::{LEG_COUNT, MAX_TRACKS, SAMPLE_BYTES};
use crate::container::{Container, ContainerError};
use crate::messages::Action;
use crate::project::config::EngineConfig;
use crate::project::session::Session;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("No project is open")]
    NoProject,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Fault counters shown to the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultCounters {
    pub underruns: u32,
    pub overruns: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackStatus {
    pub mix: [u8; LEG_COUNT],
    pub muted: bool,
    /// Legs this channel is armed on
    pub armed: [bool; LEG_COUNT],
    pub recording: bool,
}

/// Snapshot of everything the control surface displays
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub state: TransportState,
    pub record_enabled: bool,
    pub capturing: bool,
    pub position: u64,
    pub last_frame: u64,
    pub record_offset: u64,
    pub counters: FaultCounters,
    pub channels: usize,
    pub sample_rate: u32,
    pub selected: usize,
    pub tracks: Vec<TrackStatus>,
    pub project: Option<PathBuf>,
}

/// Owns the whole recorder: tracks, transport, project file, devices and the
/// period buffers. Everything runs on the caller's thread; one [`Engine::step`]
/// plays one period and captures one period.
pub struct Engine {
    pub(crate) tracks: Tracks,
    pub(crate) transport: Transport,
    pub(crate) container: Option<Container>,
    pub(crate) output: Box<dyn OutputDevice>,
    pub(crate) input: Box<dyn InputDevice>,
    /// Channel armed on each input leg
    pub(crate) armed: [Option<ChannelIndex>; LEG_COUNT],
    pub(crate) counters: FaultCounters,
    pub(crate) period_frames: usize,
    pub(crate) selected: usize,
    auto_mute_on_arm: bool,
    pad_steps: Option<u8>,
    new_channels: u16,
    new_sample_rate: u32,
    pub(crate) read_buf: Vec<u8>,
    pub(crate) mix_buf: Vec<i16>,
    pub(crate) capture_buf: Vec<i16>,
    pub(crate) splice_buf: Vec<u8>,
}

impl Engine {
    pub fn new(config: &EngineConfig, output: Box<dyn OutputDevice>, input: Box<dyn InputDevice>) -> Self {
        let period = config.period_frames.max(1);
        let max_period_bytes = period * MAX_TRACKS * SAMPLE_BYTES;
        Self {
            tracks: Tracks::new(),
            transport: Transport::new(config.record_offset()),
            container: None,
            output,
            input,
            armed: [None; LEG_COUNT],
            counters: FaultCounters::default(),
            period_frames: period,
            selected: 0,
            auto_mute_on_arm: config.auto_mute_on_arm,
            pad_steps: config.pad_steps,
            new_channels: config.channels,
            new_sample_rate: config.sample_rate,
            read_buf: vec![0; max_period_bytes],
            mix_buf: vec![0; period * LEG_COUNT],
            capture_buf: vec![0; period * LEG_COUNT],
            splice_buf: vec![0; max_period_bytes],
        }
    }

    /// Open the project file at `path`, creating an empty one if it does not
    /// exist. Reopening the current project does nothing.
    pub fn open_project(&mut self, path: &Path) -> EngineResult<()> {
        if let Some(container) = &self.container {
            if container.is_open() && container.path() == path {
                return Ok(());
            }
        }
        self.close_project()?;

        let container = if path.exists() {
            Container::open(path)?
        } else {
            log::info!("Creating project {}", path.display());
            Container::create(path, self.new_channels, self.new_sample_rate)?
        };
        let channels = container.channels();
        self.tracks.set_channels(channels);
        for slot in &mut self.armed {
            if slot.is_some_and(|ch| ch.get() >= channels) {
                *slot = None;
            }
        }
        if self.selected >= channels {
            self.selected = 0;
        }
        self.transport.set_last_frame(container.last_frame());
        self.transport.seek(self.transport.position);
        log::debug!(
            "Project {} audio spans bytes {}..{}",
            path.display(),
            container.data_start(),
            container.data_end()
        );
        self.container = Some(container);
        self.seek_container();
        Ok(())
    }

    /// Stop and close the project file, fixing up its header.
    pub fn close_project(&mut self) -> EngineResult<()> {
        self.stop();
        if let Some(mut container) = self.container.take() {
            container.close()?;
        }
        Ok(())
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.container.as_ref().map(|c| c.path())
    }

    /// Apply saved mix settings, record offset and playhead.
    pub fn load_session(&mut self, session: &Session) {
        for (i, saved) in session.tracks.iter().enumerate() {
            if let Some(track) = self.tracks.slot_mut(i) {
                *track = Track {
                    recording: false,
                    ..*saved
                };
            }
        }
        self.refresh_recording();
        self.transport.record_offset = session.record_offset;
        self.seek(session.position);
    }

    pub fn session(&self) -> Session {
        let mut tracks = *self.tracks.all();
        for track in &mut tracks {
            track.recording = false;
        }
        Session {
            tracks,
            position: self.transport.position,
            record_offset: self.transport.record_offset,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    fn any_armed(&self) -> bool {
        self.armed.iter().any(Option::is_some)
    }

    fn wants_input(&self) -> bool {
        self.transport.record_enabled && self.any_armed()
    }

    /// Capture runs this period
    pub fn capture_active(&self) -> bool {
        self.transport.is_playing()
            && self.transport.record_enabled
            && self.container.is_some()
            && self.any_armed()
            && self.input.is_open()
    }

    fn stream_spec(&self, sample_rate: u32) -> StreamSpec {
        StreamSpec {
            sample_rate,
            channels: LEG_COUNT as u16,
            period_frames: self.period_frames,
        }
    }

    fn seek_container(&mut self) {
        if let Some(container) = self.container.as_mut() {
            container.seek_frame(self.transport.position);
        }
    }

    /// Recording flags mirror the arm set while the input is open.
    pub(crate) fn refresh_recording(&mut self) {
        self.tracks.clear_recording();
        if !self.input.is_open() {
            return;
        }
        for ch in self.armed.into_iter().flatten() {
            self.tracks.get_mut(ch).recording = true;
        }
    }

    /// Start playback, and capture when record is enabled with a channel
    /// armed. A device that fails to open leaves the engine stopped.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.is_playing() {
            return Ok(());
        }
        let sample_rate = self.container.as_ref().ok_or(EngineError::NoProject)?.sample_rate();
        let spec = self.stream_spec(sample_rate);

        self.output.open(&spec)?;
        if self.wants_input() {
            if let Err(e) = self.input.open(&spec) {
                log::error!("Capture unavailable, start aborted: {}", e);
                self.output.close();
                return Err(e.into());
            }
        }
        self.seek_container();
        self.transport.play();
        self.refresh_recording();
        log::info!(
            "Started at frame {}, {} channel(s) recording",
            self.transport.position,
            self.tracks.recording_count()
        );
        Ok(())
    }

    /// Stop from any state: close both devices, clear recording flags and
    /// pick up any growth of the project file.
    pub fn stop(&mut self) {
        let was_playing = self.is_playing();
        self.output.close();
        self.input.close();
        self.tracks.clear_recording();
        let last_frame = self
            .container
            .as_ref()
            .map_or(self.transport.last_frame(), |c| c.last_frame());
        self.transport.stop(last_frame);
        if was_playing {
            log::info!("Stopped at frame {} of {}", self.transport.position, last_frame);
        }
    }

    /// Move the playhead, clamped to the project length.
    pub fn seek(&mut self, frame: u64) -> u64 {
        let pos = self.transport.seek(frame);
        self.seek_container();
        pos
    }

    /// One period of playback then one of capture. Stops the transport and
    /// returns `false` at the end of the data.
    pub fn step(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        let head = self.transport.position;
        let more = play_period(self);
        capture_period(self, head);
        if !more {
            self.stop();
        }
        more
    }

    /// Open or close the input to match the arm set and record-enable while
    /// playing. Recording flags follow.
    fn sync_input(&mut self) -> EngineResult<()> {
        if !self.is_playing() {
            return Ok(());
        }
        let result = if self.wants_input() {
            let sample_rate = self.container.as_ref().map_or(self.new_sample_rate, |c| c.sample_rate());
            let spec = self.stream_spec(sample_rate);
            self.input.open(&spec)
        } else {
            self.input.close();
            Ok(())
        };
        self.refresh_recording();
        result.map_err(EngineError::from)
    }

    fn selected_channel(&self) -> Option<ChannelIndex> {
        self.tracks.channel(self.selected)
    }

    fn toggle_arm(&mut self, leg: Leg) -> EngineResult<()> {
        let Some(ch) = self.selected_channel() else {
            return Ok(());
        };
        let slot = leg.index();
        let previous_arm = self.armed[slot];
        let previous_mute = self.tracks.get(ch).muted;

        let armed = previous_arm != Some(ch);
        self.armed[slot] = armed.then_some(ch);
        if self.auto_mute_on_arm {
            self.tracks.get_mut(ch).muted = armed;
        }
        if let Err(e) = self.sync_input() {
            log::error!("Arm {} on channel {} reverted: {}", leg.label(), ch.get() + 1, e);
            self.armed[slot] = previous_arm;
            self.tracks.get_mut(ch).muted = previous_mute;
            self.refresh_recording();
            return Err(e);
        }
        Ok(())
    }

    fn toggle_record_enable(&mut self) -> EngineResult<()> {
        self.transport.record_enabled = !self.transport.record_enabled;
        if let Err(e) = self.sync_input() {
            log::error!("Record enable reverted: {}", e);
            self.transport.record_enabled = !self.transport.record_enabled;
            self.refresh_recording();
            return Err(e);
        }
        Ok(())
    }

    fn pad_step(&self) -> u8 {
        self.pad_steps.unwrap_or_else(|| padded_step(self.tracks.channels()))
    }

    fn with_selected(&mut self, f: impl FnOnce(&mut Track)) {
        if let Some(ch) = self.selected_channel() {
            f(self.tracks.get_mut(ch));
        }
    }

    pub fn apply(&mut self, action: Action) -> EngineResult<()> {
        let channels = self.tracks.channels().max(1);
        match action {
            Action::SelectNext => self.selected = (self.selected + 1) % channels,
            Action::SelectPrevious => self.selected = (self.selected + channels - 1) % channels,
            Action::Louder => self.with_selected(Track::louder),
            Action::Quieter => self.with_selected(Track::quieter),
            Action::Pan(pan) => self.with_selected(|t| t.pan(pan, t.level())),
            Action::PanPadded(pan) => {
                let step = self.pad_step();
                self.with_selected(|t| t.pan(pan, step));
            }
            Action::ToggleMute => self.with_selected(|t| t.muted = !t.muted),
            Action::ToggleMuteAll => self.tracks.toggle_mute_all(),
            Action::ToggleArm(leg) => self.toggle_arm(leg)?,
            Action::ToggleRecordEnable => self.toggle_record_enable()?,
            Action::ToggleTransport => {
                if self.is_playing() {
                    self.stop();
                } else {
                    self.start()?;
                }
            }
            Action::SeekHome => {
                self.seek(0);
            }
            Action::SeekEnd => {
                self.seek(u64::MAX);
            }
            Action::Seek(delta) => {
                self.transport.seek_by(delta);
                self.seek_container();
            }
            Action::ClearCounters => self.counters = FaultCounters::default(),
            Action::Quit => {}
        }
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        let channels = self.tracks.channels();
        let tracks = self
            .tracks
            .live()
            .iter()
            .enumerate()
            .map(|(i, t)| TrackStatus {
                mix: t.mix,
                muted: t.muted,
                armed: self.armed.map(|a| a.is_some_and(|ch| ch.get() == i)),
                recording: t.recording,
            })
            .collect();
        EngineStatus {
            state: self.transport.state,
            record_enabled: self.transport.record_enabled,
            capturing: self.capture_active(),
            position: self.transport.position,
            last_frame: self
                .container
                .as_ref()
                .map_or(self.transport.last_frame(), |c| c.last_frame()),
            record_offset: self.transport.record_offset,
            counters: self.counters,
            channels,
            sample_rate: self.container.as_ref().map_or(self.new_sample_rate, |c| c.sample_rate()),
            selected: self.selected,
            tracks,
            project: self.container.as_ref().map(|c| c.path().to_path_buf()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tempfile::TempDir;

    use super::Engine;
    use crate::audio::device::memory::{InputLog, MemoryInput, MemoryOutput, OutputLog};
    use crate::constants::SAMPLE_RATE;
    use crate::container::Container;
    use crate::project::config::EngineConfig;

    pub fn config(period: usize) -> EngineConfig {
        EngineConfig {
            period_frames: period,
            ..EngineConfig::default()
        }
    }

    /// Engine over a fresh project file filled by `init`, with in-memory devices.
    pub fn engine_with_file(
        channels: u16,
        period: usize,
        init: impl FnOnce(&mut Container),
    ) -> (Engine, TempDir, Rc<RefCell<OutputLog>>, Rc<RefCell<InputLog>>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.wav");
        let mut container = Container::create(&path, channels, SAMPLE_RATE).unwrap();
        init(&mut container);
        container.close().unwrap();

        let (output, out_log) = MemoryOutput::new();
        let (input, in_log) = MemoryInput::new();
        let mut engine = Engine::new(&config(period), Box::new(output), Box::new(input));
        engine.open_project(&path).unwrap();
        (engine, dir, out_log, in_log)
    }

    /// Append frames to the end of `container`.
    pub fn write_frames(container: &mut Container, frames: &[Vec<i16>]) {
        let start = container.last_frame();
        let bytes: Vec<u8> = frames.iter().flatten().flat_map(|s| s.to_le_bytes()).collect();
        container.extend(bytes.len()).unwrap();
        container.write_at(start, &bytes).unwrap();
    }

    /// Read `count` frames starting at `start` without moving the playhead.
    pub fn read_frames(engine: &mut Engine, start: u64, count: usize) -> Vec<Vec<i16>> {
        let container = engine.container.as_mut().unwrap();
        let channels = container.channels();
        let mut bytes = vec![0u8; count * container.frame_size()];
        let frames = container.read_at(start, &mut bytes).unwrap();
        bytes[..frames * channels * 2]
            .chunks_exact(channels * 2)
            .map(|f| f.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect())
            .collect()
    }
}
