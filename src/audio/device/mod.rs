//! Audio device abstraction
//!
//! The engine drives devices one period at a time: playback pushes an
//! interleaved stereo period, capture pulls one. Both calls complete within
//! roughly one hardware period and report transient trouble as a
//! [`DeviceFault`], which the caller hands to [`recovery::recover`].
//! Opening and closing are idempotent.

pub mod cpal_device;
#[cfg(test)]
pub mod memory;
pub mod recovery;

use thiserror::Error;

/// Errors that abort the action that opened or reconfigured a device
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No {0} device available")]
    NoDevice(&'static str),

    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enumerate devices: {0}")]
    Enumerate(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start audio stream: {0}")]
    StreamPlay(String),

    #[error("Device is not open")]
    NotOpen,
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Transient runtime faults, recovered in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    /// The stream handle is gone (device unplugged or never opened)
    BadDescriptor,
    /// Playback ran dry or capture overflowed
    Xrun,
    /// The stream stopped delivering periods
    Suspended,
}

impl DeviceFault {
    pub fn label(self) -> &'static str {
        match self {
            DeviceFault::BadDescriptor => "bad descriptor",
            DeviceFault::Xrun => "xrun",
            DeviceFault::Suspended => "suspended",
        }
    }
}

/// Stream parameters shared by both directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    /// Interleaved channels per frame; the monitor mix and capture are stereo
    pub channels: u16,
    pub period_frames: usize,
}

pub trait Device {
    fn name(&self) -> &str;

    /// Open the device. Opening an open device succeeds without effect.
    fn open(&mut self, spec: &StreamSpec) -> DeviceResult<()>;

    /// Close the device. Closing a closed device does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Device-level recovery primitive for `fault`.
    fn recover(&mut self, fault: DeviceFault) -> DeviceResult<()>;
}

pub trait OutputDevice: Device {
    /// Submit interleaved frames; returns the frame count accepted.
    fn write_period(&mut self, samples: &[i16]) -> Result<usize, DeviceFault>;
}

pub trait InputDevice: Device {
    /// Fill `samples` with interleaved frames; returns the frame count read.
    fn read_period(&mut self, samples: &mut [i16]) -> Result<usize, DeviceFault>;
}
