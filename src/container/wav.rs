//! Interleaved multitrack WAV container
//!
//! A project is a single RIFF/WAVE file whose `data` chunk holds every track
//! as one channel of interleaved 16-bit little-endian PCM. The engine reads it
//! one period at a time for playback and patches individual channels in place
//! while recording, growing the file when capture runs past its end.
//!
//! Files are normalised on open to the canonical 44-byte layout
//! (`RIFF`, `WAVE`, 16-byte `fmt `, `data` as the last chunk) so that growth
//! is a plain append and closing only rewrites two length fields.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::constants::{MAX_TRACKS, SAMPLE_BYTES};

/// Byte offset of the sample payload in a canonical file.
pub const CANONICAL_DATA_START: u64 = 44;

const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;
/// Payload is moved in slices of this size during compaction.
const COMPACT_CHUNK: usize = 1 << 20;
const ZEROS: [u8; 4096] = [0; 4096];
/// Highest sample rate accepted from a header.
const MAX_SAMPLE_RATE: u32 = 768_000;
/// Chunk ids that may legitimately follow `data`. Anything else there is
/// taken to be unfinalised audio.
const TRAILING_CHUNK_IDS: [&[u8; 4]; 16] = [
    b"fmt ", b"data", b"LIST", b"fact", b"cue ", b"id3 ", b"ID3 ", b"bext",
    b"smpl", b"inst", b"PEAK", b"JUNK", b"junk", b"iXML", b"acid", b"cart",
];

/// Container errors
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// File ends inside a header or chunk descriptor
    #[error("File truncated in {0}")]
    Truncated(&'static str),

    #[error("Missing required chunk: {0}")]
    MissingChunk(&'static str),

    #[error("Unsupported sample format: tag {format_tag:#06x}, {bits} bits")]
    UnsupportedFormat { format_tag: u16, bits: u16 },

    #[error("Unsupported channel count: {0} (1..={max})", max = MAX_TRACKS)]
    UnsupportedChannelCount(u16),

    #[error("Write of {len} bytes at frame {frame} runs past the end of data")]
    OutOfRange { frame: u64, len: usize },

    #[error("Container is closed")]
    Closed,
}

pub type ContainerResult<T> = Result<T, ContainerError>;

/// Contents of the `fmt ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// 16-bit PCM with the given layout
    pub fn pcm16(channels: u16, sample_rate: u32) -> Self {
        let block_align = channels * SAMPLE_BYTES as u16;
        Self {
            format_tag: FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate: sample_rate.saturating_mul(block_align as u32),
            block_align,
            bits_per_sample: 16,
        }
    }

    fn parse(payload: &[u8]) -> Self {
        Self {
            format_tag: u16::from_le_bytes([payload[0], payload[1]]),
            channels: u16::from_le_bytes([payload[2], payload[3]]),
            sample_rate: u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
            byte_rate: u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]),
            block_align: u16::from_le_bytes([payload[12], payload[13]]),
            bits_per_sample: u16::from_le_bytes([payload[14], payload[15]]),
        }
    }

    fn validate(&self) -> ContainerResult<()> {
        let tag_ok = self.format_tag == FORMAT_PCM || self.format_tag == FORMAT_EXTENSIBLE;
        if !tag_ok || self.bits_per_sample != 16 {
            return Err(ContainerError::UnsupportedFormat {
                format_tag: self.format_tag,
                bits: self.bits_per_sample,
            });
        }
        if self.channels == 0 || self.channels as usize > MAX_TRACKS {
            return Err(ContainerError::UnsupportedChannelCount(self.channels));
        }
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(ContainerError::InvalidFormat(format!(
                "sample rate {} outside 1..={}",
                self.sample_rate, MAX_SAMPLE_RATE
            )));
        }
        Ok(())
    }
}

/// Write the canonical 44-byte header at the start of `file`.
fn write_header(file: &mut File, format: &AudioFormat, data_len: u64) -> ContainerResult<()> {
    let data_len = length_field(data_len);
    let riff_len = length_field(CANONICAL_DATA_START - 8 + data_len as u64);

    let mut header = [0u8; CANONICAL_DATA_START as usize];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_len.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align.to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header)?;
    Ok(())
}

/// RIFF length fields are 32-bit; larger files keep the maximum.
fn length_field(len: u64) -> u32 {
    match u32::try_from(len) {
        Ok(v) => v,
        Err(_) => {
            log::warn!("Container exceeds 4 GiB; length field saturated");
            u32::MAX
        }
    }
}

fn read_exact_at(file: &mut File, offset: u64, buf: &mut [u8], what: &'static str) -> ContainerResult<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ContainerError::Truncated(what),
        _ => ContainerError::Io(e),
    })
}

/// Whether a known chunk header sits at `pos`. A stale `data` length
/// (file grown but never closed) leaves raw samples there instead.
fn chunk_follows(file: &mut File, pos: u64, file_len: u64) -> ContainerResult<bool> {
    if pos + 8 > file_len {
        return Ok(false);
    }
    let mut header = [0u8; 8];
    read_exact_at(file, pos, &mut header, "chunk header")?;
    let id_ok = TRAILING_CHUNK_IDS.iter().any(|id| header[0..4] == id[..]);
    let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;
    Ok(id_ok && pos + 8 + size <= file_len)
}

/// Move `len` payload bytes from `src` to `dst` within the file, in bounded
/// slices, choosing the direction so that overlapping ranges stay intact.
fn move_payload<F: FnMut(u64, u64)>(
    file: &mut File,
    src: u64,
    dst: u64,
    len: u64,
    progress: &mut F,
) -> ContainerResult<()> {
    if src == dst || len == 0 {
        return Ok(());
    }
    let mut buf = vec![0u8; COMPACT_CHUNK.min(len as usize)];
    let mut done = 0u64;
    while done < len {
        let n = (len - done).min(buf.len() as u64);
        // Towards the start: copy front to back. Towards the end: back to front.
        let offset = if dst < src { done } else { len - done - n };
        let slice = &mut buf[..n as usize];
        read_exact_at(file, src + offset, slice, "data")?;
        file.seek(SeekFrom::Start(dst + offset))?;
        file.write_all(slice)?;
        done += n;
        progress(done, len);
    }
    Ok(())
}

/// An open project file
pub struct Container {
    path: PathBuf,
    file: Option<File>,
    format: AudioFormat,
    frame_size: usize,
    data_start: u64,
    data_end: u64,
    /// Byte offset of the next sequential read
    cursor: u64,
}

impl Container {
    /// Create an empty canonical container, replacing any existing file.
    pub fn create<P: AsRef<Path>>(path: P, channels: u16, sample_rate: u32) -> ContainerResult<Self> {
        let format = AudioFormat::pcm16(channels, sample_rate);
        format.validate()?;
        let mut file = File::create(path.as_ref())?;
        write_header(&mut file, &format, 0)?;
        file.sync_all()?;
        drop(file);
        log::info!(
            "Created {} ({} channels, {} Hz)",
            path.as_ref().display(),
            channels,
            sample_rate
        );
        Self::open(path)
    }

    /// Open a container, compacting legacy layouts with progress logged.
    pub fn open<P: AsRef<Path>>(path: P) -> ContainerResult<Self> {
        let mut last_logged = 0u64;
        Self::open_with_progress(path, |done, total| {
            let percent = done * 100 / total.max(1);
            if percent >= last_logged + 10 || done == total {
                last_logged = percent;
                log::info!("Compacting container: {}%", percent);
            }
        })
    }

    /// Open a container; `progress(done, total)` reports compaction bytes.
    pub fn open_with_progress<P, F>(path: P, mut progress: F) -> ContainerResult<Self>
    where
        P: AsRef<Path>,
        F: FnMut(u64, u64),
    {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();

        let mut riff = [0u8; 12];
        read_exact_at(&mut file, 0, &mut riff, "RIFF header")?;
        if &riff[0..4] != b"RIFF" {
            return Err(ContainerError::InvalidFormat("Not a RIFF file".into()));
        }
        if &riff[8..12] != b"WAVE" {
            return Err(ContainerError::InvalidFormat("Not a WAVE file".into()));
        }

        // Scan chunks in whatever order they appear
        let mut format: Option<AudioFormat> = None;
        let mut data: Option<(u64, u64)> = None;
        let mut data_is_last = false;
        let mut pos = 12u64;
        while pos + 8 <= file_len {
            let mut chunk = [0u8; 8];
            read_exact_at(&mut file, pos, &mut chunk, "chunk header")?;
            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as u64;
            let payload = pos + 8;
            let next = payload + size + (size & 1);

            match &chunk[0..4] {
                b"fmt " => {
                    if size < 16 {
                        return Err(ContainerError::InvalidFormat("fmt chunk too small".into()));
                    }
                    let mut fmt = [0u8; 16];
                    read_exact_at(&mut file, payload, &mut fmt, "fmt chunk")?;
                    format = Some(AudioFormat::parse(&fmt));
                }
                b"data" => {
                    data_is_last = next >= file_len || !chunk_follows(&mut file, next, file_len)?;
                    let len = if data_is_last {
                        file_len - payload
                    } else {
                        size
                    };
                    if data_is_last && len != size {
                        log::warn!(
                            "{}: data chunk declares {} bytes, file holds {}",
                            path.display(),
                            size,
                            len
                        );
                    }
                    data = Some((payload, len));
                    if data_is_last {
                        break;
                    }
                }
                other => {
                    log::debug!("Skipping chunk {:?} ({} bytes)", String::from_utf8_lossy(other), size);
                }
            }
            pos = next;
        }

        let format = format.ok_or(ContainerError::MissingChunk("fmt"))?;
        format.validate()?;
        let (mut data_start, data_len) = data.ok_or(ContainerError::MissingChunk("data"))?;

        let frame_size = format.channels as usize * SAMPLE_BYTES;
        let data_len = data_len - data_len % frame_size as u64;
        let format = AudioFormat::pcm16(format.channels, format.sample_rate);

        if data_start != CANONICAL_DATA_START || !data_is_last {
            log::info!(
                "{}: relocating {} bytes of audio from offset {} to {}",
                path.display(),
                data_len,
                data_start,
                CANONICAL_DATA_START
            );
            move_payload(&mut file, data_start, CANONICAL_DATA_START, data_len, &mut progress)?;
            write_header(&mut file, &format, data_len)?;
            file.set_len(CANONICAL_DATA_START + data_len)?;
            file.sync_all()?;
            data_start = CANONICAL_DATA_START;
        } else if file_len > data_start + data_len {
            // drop a trailing partial frame
            file.set_len(data_start + data_len)?;
        }

        log::info!(
            "Opened {}: {} channels, {} Hz, {} frames",
            path.display(),
            format.channels,
            format.sample_rate,
            data_len / frame_size as u64
        );

        Ok(Self {
            path,
            file: Some(file),
            format,
            frame_size,
            data_start,
            data_end: data_start + data_len,
            cursor: data_start,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channels(&self) -> usize {
        self.format.channels as usize
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Bytes per interleaved frame
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    pub fn data_end(&self) -> u64 {
        self.data_end
    }

    /// Number of whole frames in the data chunk
    pub fn last_frame(&self) -> u64 {
        (self.data_end - self.data_start) / self.frame_size as u64
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn frame_offset(&self, frame: u64) -> u64 {
        self.data_start + frame * self.frame_size as u64
    }

    fn file_mut(&mut self) -> ContainerResult<&mut File> {
        self.file.as_mut().ok_or(ContainerError::Closed)
    }

    /// Position the sequential read cursor at `frame`.
    pub fn seek_frame(&mut self, frame: u64) {
        self.cursor = self.frame_offset(frame);
    }

    /// Read whole frames at the cursor, advancing it. Never reads past the
    /// end of data; returns the number of frames read.
    pub fn read_frames(&mut self, buf: &mut [u8]) -> ContainerResult<usize> {
        let start = self.cursor;
        let frames = self.read_span(start, buf)?;
        self.cursor += (frames * self.frame_size) as u64;
        Ok(frames)
    }

    /// Read whole frames starting at `frame` without touching the cursor.
    pub fn read_at(&mut self, frame: u64, buf: &mut [u8]) -> ContainerResult<usize> {
        let start = self.frame_offset(frame);
        self.read_span(start, buf)
    }

    fn read_span(&mut self, start: u64, buf: &mut [u8]) -> ContainerResult<usize> {
        let available = self.data_end.saturating_sub(start);
        let wanted = (buf.len() / self.frame_size * self.frame_size) as u64;
        let len = wanted.min(available) as usize;
        let len = len - len % self.frame_size;
        if len == 0 {
            return Ok(0);
        }
        let file = self.file_mut()?;
        read_exact_at(file, start, &mut buf[..len], "data")?;
        Ok(len / self.frame_size)
    }

    /// Overwrite whole frames starting at `frame`. The span must lie inside
    /// the current data extent; grow with [`Container::extend`] first.
    pub fn write_at(&mut self, frame: u64, buf: &[u8]) -> ContainerResult<()> {
        let start = self.frame_offset(frame);
        if buf.len() % self.frame_size != 0 || start + buf.len() as u64 > self.data_end {
            return Err(ContainerError::OutOfRange { frame, len: buf.len() });
        }
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(start))?;
        file.write_all(buf)?;
        Ok(())
    }

    /// Append `n_bytes` of silence (rounded up to whole frames) at the end of
    /// data. Returns the new frame count.
    pub fn extend(&mut self, n_bytes: usize) -> ContainerResult<u64> {
        let frame_size = self.frame_size;
        let n_bytes = n_bytes.div_ceil(frame_size) * frame_size;
        let end = self.data_end;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(end))?;
        let mut remaining = n_bytes;
        while remaining > 0 {
            let n = remaining.min(ZEROS.len());
            file.write_all(&ZEROS[..n])?;
            remaining -= n;
        }
        self.data_end += n_bytes as u64;
        Ok(self.last_frame())
    }

    /// Rewrite the RIFF and data lengths to match the current extent and
    /// release the file. Calling it again is a no-op.
    pub fn close(&mut self) -> ContainerResult<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        let riff_len = length_field(self.data_end - 8);
        let data_len = length_field(self.data_end - self.data_start);
        file.seek(SeekFrom::Start(4))?;
        file.write_all(&riff_len.to_le_bytes())?;
        file.seek(SeekFrom::Start(self.data_start - 4))?;
        file.write_all(&data_len.to_le_bytes())?;
        file.sync_all()?;
        log::info!("Closed {} at {} frames", self.path.display(), self.last_frame());
        Ok(())
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Failed to finalise {}: {}", self.path.display(), e);
        }
    }
}
