//! CPAL-backed devices
//!
//! CPAL delivers audio through callbacks on its own thread, while the engine
//! works in whole periods on the main loop. Each device bridges the two with
//! an `rtrb` ring buffer a few periods deep. The callbacks only touch the
//! ring, an atomic xrun flag and a fault channel; engine state never leaves
//! the main thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig, StreamError};
use crossbeam_channel::{bounded, Receiver, Sender};
use rtrb::{Consumer, Producer, RingBuffer};

use super::{Device, DeviceError, DeviceFault, DeviceResult, InputDevice, OutputDevice, StreamSpec};
use crate::constants::CHANNEL_CAPACITY;

/// Ring depth in periods
const QUEUE_PERIODS: usize = 4;
/// A period that cannot complete within this many period durations counts
/// as a stalled stream.
const STALL_PERIODS: u32 = 4;

fn find_device(host: &cpal::Host, name: Option<&str>, output: bool) -> DeviceResult<cpal::Device> {
    let kind = if output { "output" } else { "input" };
    let Some(name) = name else {
        let device = if output {
            host.default_output_device()
        } else {
            host.default_input_device()
        };
        return device.ok_or(DeviceError::NoDevice(kind));
    };

    let mut devices = if output {
        host.output_devices()
    } else {
        host.input_devices()
    }
    .map_err(|e| DeviceError::Enumerate(e.to_string()))?;

    devices
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| DeviceError::DeviceNotFound(name.to_string()))
}

fn stream_config(spec: &StreamSpec, fixed: bool) -> StreamConfig {
    StreamConfig {
        channels: spec.channels,
        sample_rate: SampleRate(spec.sample_rate),
        buffer_size: if fixed {
            BufferSize::Fixed(spec.period_frames as u32)
        } else {
            BufferSize::Default
        },
    }
}

fn classify(err: &StreamError) -> DeviceFault {
    match err {
        StreamError::DeviceNotAvailable => DeviceFault::BadDescriptor,
        _ => DeviceFault::Suspended,
    }
}

fn error_callback(label: &'static str, tx: Sender<DeviceFault>) -> impl FnMut(StreamError) + Send + 'static {
    move |err| {
        log::error!("{} stream error: {}", label, err);
        let _ = tx.try_send(classify(&err));
    }
}

fn period_duration(spec: &StreamSpec) -> Duration {
    Duration::from_secs_f64(spec.period_frames as f64 / spec.sample_rate.max(1) as f64)
}

#[inline]
fn to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Monitor output
pub struct CpalOutput {
    label: String,
    device_name: Option<String>,
    spec: Option<StreamSpec>,
    stream: Option<Stream>,
    producer: Option<Producer<i16>>,
    /// Set by the callback when it had to pad with silence
    starved: Arc<AtomicBool>,
    /// Starvation only counts once the engine has started feeding
    feeding: Arc<AtomicBool>,
    faults_tx: Sender<DeviceFault>,
    faults_rx: Receiver<DeviceFault>,
}

impl CpalOutput {
    pub fn new(device_name: Option<String>) -> Self {
        let (faults_tx, faults_rx) = bounded(CHANNEL_CAPACITY);
        Self {
            label: device_name.clone().unwrap_or_else(|| "default output".to_string()),
            device_name,
            spec: None,
            stream: None,
            producer: None,
            starved: Arc::new(AtomicBool::new(false)),
            feeding: Arc::new(AtomicBool::new(false)),
            faults_tx,
            faults_rx,
        }
    }

    fn build(&mut self, device: &cpal::Device, spec: &StreamSpec, fixed: bool) -> DeviceResult<Stream> {
        let (producer, mut consumer) = RingBuffer::<i16>::new(spec.period_frames * spec.channels as usize * QUEUE_PERIODS);
        let starved = Arc::clone(&self.starved);
        let feeding = Arc::clone(&self.feeding);

        let stream = device
            .build_output_stream(
                &stream_config(spec, fixed),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut short = false;
                    for out in data.iter_mut() {
                        *out = match consumer.pop() {
                            Ok(s) => to_f32(s),
                            Err(_) => {
                                short = true;
                                0.0
                            }
                        };
                    }
                    if short && feeding.load(Ordering::Relaxed) {
                        starved.store(true, Ordering::Relaxed);
                    }
                },
                error_callback("Output", self.faults_tx.clone()),
                None,
            )
            .map_err(|e| DeviceError::StreamBuild(e.to_string()))?;
        self.producer = Some(producer);
        Ok(stream)
    }

    fn prime(&mut self, frames: usize) {
        if let Some(producer) = self.producer.as_mut() {
            let n = (frames * 2).min(producer.slots());
            for _ in 0..n {
                let _ = producer.push(0);
            }
        }
    }
}

impl Device for CpalOutput {
    fn name(&self) -> &str {
        &self.label
    }

    fn open(&mut self, spec: &StreamSpec) -> DeviceResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let host = cpal::default_host();
        let device = find_device(&host, self.device_name.as_deref(), true)?;
        let stream = match self.build(&device, spec, true) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("{}: fixed period of {} frames refused ({}), using device default", self.label, spec.period_frames, e);
                self.build(&device, spec, false)?
            }
        };
        stream.play().map_err(|e| DeviceError::StreamPlay(e.to_string()))?;

        while self.faults_rx.try_recv().is_ok() {}
        self.starved.store(false, Ordering::Relaxed);
        self.feeding.store(false, Ordering::Relaxed);
        self.stream = Some(stream);
        self.spec = Some(*spec);
        log::info!(
            "{}: opened at {} Hz, {} frames/period",
            self.label,
            spec.sample_rate,
            spec.period_frames
        );
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("{}: pause on close failed: {}", self.label, e);
            }
            log::info!("{}: closed", self.label);
        }
        self.producer = None;
        self.feeding.store(false, Ordering::Relaxed);
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn recover(&mut self, fault: DeviceFault) -> DeviceResult<()> {
        match fault {
            DeviceFault::Xrun => {
                self.starved.store(false, Ordering::Relaxed);
                let frames = self.spec.map(|s| s.period_frames).unwrap_or(0);
                self.prime(frames);
                Ok(())
            }
            DeviceFault::Suspended => {
                let stream = self.stream.as_ref().ok_or(DeviceError::NotOpen)?;
                stream.play().map_err(|e| DeviceError::StreamPlay(e.to_string()))
            }
            DeviceFault::BadDescriptor => {
                let spec = self.spec.ok_or(DeviceError::NotOpen)?;
                self.close();
                self.open(&spec)
            }
        }
    }
}

impl OutputDevice for CpalOutput {
    fn write_period(&mut self, samples: &[i16]) -> Result<usize, DeviceFault> {
        let Some(spec) = self.spec else {
            return Err(DeviceFault::BadDescriptor);
        };
        if let Ok(fault) = self.faults_rx.try_recv() {
            return Err(fault);
        }
        if self.starved.swap(false, Ordering::Relaxed) {
            return Err(DeviceFault::Xrun);
        }
        let Some(producer) = self.producer.as_mut() else {
            return Err(DeviceFault::BadDescriptor);
        };

        // Block until the ring has room, like a blocking PCM write.
        let period = period_duration(&spec);
        let deadline = Instant::now() + period * STALL_PERIODS;
        let mut written = 0;
        while written < samples.len() {
            let free = producer.slots();
            if free == 0 {
                if Instant::now() >= deadline {
                    return Err(DeviceFault::Suspended);
                }
                thread::sleep(period / 4);
                continue;
            }
            let n = free.min(samples.len() - written);
            for &s in &samples[written..written + n] {
                let _ = producer.push(s);
            }
            written += n;
        }
        self.feeding.store(true, Ordering::Relaxed);
        Ok(samples.len() / spec.channels as usize)
    }
}

/// Capture input
pub struct CpalInput {
    label: String,
    device_name: Option<String>,
    spec: Option<StreamSpec>,
    stream: Option<Stream>,
    consumer: Option<Consumer<i16>>,
    /// Set by the callback when the ring was full
    overrun: Arc<AtomicBool>,
    faults_tx: Sender<DeviceFault>,
    faults_rx: Receiver<DeviceFault>,
}

impl CpalInput {
    pub fn new(device_name: Option<String>) -> Self {
        let (faults_tx, faults_rx) = bounded(CHANNEL_CAPACITY);
        Self {
            label: device_name.clone().unwrap_or_else(|| "default input".to_string()),
            device_name,
            spec: None,
            stream: None,
            consumer: None,
            overrun: Arc::new(AtomicBool::new(false)),
            faults_tx,
            faults_rx,
        }
    }

    fn build(&mut self, device: &cpal::Device, spec: &StreamSpec, fixed: bool) -> DeviceResult<Stream> {
        let (mut producer, consumer) = RingBuffer::<i16>::new(spec.period_frames * spec.channels as usize * QUEUE_PERIODS);
        let overrun = Arc::clone(&self.overrun);

        let stream = device
            .build_input_stream(
                &stream_config(spec, fixed),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &s in data {
                        if producer.push(to_i16(s)).is_err() {
                            overrun.store(true, Ordering::Relaxed);
                            break;
                        }
                    }
                },
                error_callback("Input", self.faults_tx.clone()),
                None,
            )
            .map_err(|e| DeviceError::StreamBuild(e.to_string()))?;
        self.consumer = Some(consumer);
        Ok(stream)
    }

    fn drain(&mut self) {
        if let Some(consumer) = self.consumer.as_mut() {
            while consumer.pop().is_ok() {}
        }
    }
}

impl Device for CpalInput {
    fn name(&self) -> &str {
        &self.label
    }

    fn open(&mut self, spec: &StreamSpec) -> DeviceResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let host = cpal::default_host();
        let device = find_device(&host, self.device_name.as_deref(), false)?;
        let stream = match self.build(&device, spec, true) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("{}: fixed period of {} frames refused ({}), using device default", self.label, spec.period_frames, e);
                self.build(&device, spec, false)?
            }
        };
        stream.play().map_err(|e| DeviceError::StreamPlay(e.to_string()))?;

        while self.faults_rx.try_recv().is_ok() {}
        self.overrun.store(false, Ordering::Relaxed);
        self.stream = Some(stream);
        self.spec = Some(*spec);
        log::info!(
            "{}: opened at {} Hz, {} frames/period",
            self.label,
            spec.sample_rate,
            spec.period_frames
        );
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("{}: pause on close failed: {}", self.label, e);
            }
            log::info!("{}: closed", self.label);
        }
        self.consumer = None;
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn recover(&mut self, fault: DeviceFault) -> DeviceResult<()> {
        match fault {
            DeviceFault::Xrun => {
                // stale samples would land late; resynchronise on fresh input
                self.drain();
                self.overrun.store(false, Ordering::Relaxed);
                Ok(())
            }
            DeviceFault::Suspended => {
                let stream = self.stream.as_ref().ok_or(DeviceError::NotOpen)?;
                stream.play().map_err(|e| DeviceError::StreamPlay(e.to_string()))
            }
            DeviceFault::BadDescriptor => {
                let spec = self.spec.ok_or(DeviceError::NotOpen)?;
                self.close();
                self.open(&spec)
            }
        }
    }
}

impl InputDevice for CpalInput {
    fn read_period(&mut self, samples: &mut [i16]) -> Result<usize, DeviceFault> {
        let Some(spec) = self.spec else {
            return Err(DeviceFault::BadDescriptor);
        };
        if let Ok(fault) = self.faults_rx.try_recv() {
            return Err(fault);
        }
        if self.overrun.swap(false, Ordering::Relaxed) {
            return Err(DeviceFault::Xrun);
        }
        let Some(consumer) = self.consumer.as_mut() else {
            return Err(DeviceFault::BadDescriptor);
        };

        let channels = spec.channels as usize;
        let period = period_duration(&spec);
        let deadline = Instant::now() + period * STALL_PERIODS;
        while consumer.slots() < samples.len() && Instant::now() < deadline {
            thread::sleep(period / 4);
        }

        let available = consumer.slots().min(samples.len());
        let available = available - available % channels;
        if available == 0 {
            return Err(DeviceFault::Suspended);
        }
        for s in samples[..available].iter_mut() {
            *s = consumer.pop().unwrap_or(0);
        }
        Ok(available / channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_conversion_round_trips_within_one_step() {
        for v in [i16::MIN + 1, -1000, 0, 1000, i16::MAX] {
            let back = to_i16(to_f32(v));
            assert!((back as i32 - v as i32).abs() <= 1, "{v} -> {back}");
        }
        assert_eq!(to_i16(2.0), i16::MAX);
        assert_eq!(to_i16(-2.0), -i16::MAX);
    }

    #[test]
    fn closed_devices_report_bad_descriptor() {
        let mut out = CpalOutput::new(None);
        assert_eq!(out.write_period(&[0; 4]), Err(DeviceFault::BadDescriptor));
        out.close();
        out.close();
        assert!(!out.is_open());

        let mut input = CpalInput::new(None);
        let mut buf = [0i16; 4];
        assert_eq!(input.read_period(&mut buf), Err(DeviceFault::BadDescriptor));
        input.close();
        assert!(!input.is_open());
    }

    #[test]
    fn stream_errors_are_classified() {
        assert_eq!(classify(&StreamError::DeviceNotAvailable), DeviceFault::BadDescriptor);
    }
}
