//! Per-project mix settings
//!
//! Stored next to the project file as plain text, one setting per line:
//!
//! ```text
//! 00L=8      attenuation of channel 0 on leg A
//! 00R=16     attenuation of channel 0 on leg B
//! 00M=1      channel 0 muted
//! Pos=44100  playhead
//! Rof=1024   record offset
//! ```
//!
//! Unknown lines and out-of-range channels are skipped.

use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;

use crate::audio::mixer::Track;
use crate::constants::{MAX_TRACKS, SILENCE_STEP};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to read session {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to write session {0}")]
    Write(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub tracks: [Track; MAX_TRACKS],
    pub position: u64,
    pub record_offset: u64,
}

impl Session {
    pub fn new(record_offset: u64) -> Self {
        Self {
            tracks: [Track::default(); MAX_TRACKS],
            position: 0,
            record_offset,
        }
    }

    pub fn parse(text: &str, record_offset: u64) -> Self {
        let mut session = Self::new(record_offset);
        for line in text.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key {
                "Pos" => {
                    if let Ok(v) = value.parse() {
                        session.position = v;
                    }
                }
                "Rof" => {
                    if let Ok(v) = value.parse() {
                        session.record_offset = v;
                    }
                }
                _ => session.apply_channel_line(key, value),
            }
        }
        session
    }

    fn apply_channel_line(&mut self, key: &str, value: &str) {
        if key.len() != 3 || !key.is_ascii() {
            return;
        }
        let (index, field) = key.split_at(2);
        if !index.bytes().all(|b| b.is_ascii_digit()) {
            return;
        }
        let Ok(index) = index.parse::<usize>() else {
            return;
        };
        let Some(track) = self.tracks.get_mut(index) else {
            return;
        };
        let Ok(value) = value.parse::<u32>() else {
            return;
        };
        let step = value.min(SILENCE_STEP as u32) as u8;
        match field {
            "L" => track.mix[0] = step,
            "R" => track.mix[1] = step,
            "M" => track.muted = value != 0,
            _ => {}
        }
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path, record_offset: u64) -> Result<Self, SessionError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                log::info!("Loaded session {}", path.display());
                Ok(Self::parse(&text, record_offset))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new(record_offset)),
            Err(e) => Err(SessionError::Read(e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        std::fs::write(path, self.to_text()).map_err(SessionError::Write)?;
        log::info!("Saved session {}", path.display());
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, track) in self.tracks.iter().enumerate() {
            let _ = writeln!(out, "{:02}L={}", i, track.mix[0]);
            let _ = writeln!(out, "{:02}R={}", i, track.mix[1]);
            let _ = writeln!(out, "{:02}M={}", i, u8::from(track.muted));
        }
        let _ = writeln!(out, "Pos={}", self.position);
        let _ = writeln!(out, "Rof={}", self.record_offset);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_STEP;

    #[test]
    fn parses_channel_and_transport_lines() {
        let text = "03L=2\n03R=16\n03M=0\nPos=4410\nRof=300\n";
        let session = Session::parse(text, 1024);
        assert_eq!(session.tracks[3].mix, [2, 16]);
        assert!(!session.tracks[3].muted);
        assert_eq!(session.position, 4410);
        assert_eq!(session.record_offset, 300);
        assert_eq!(session.tracks[0], Track::default());
    }

    #[test]
    fn ignores_junk_and_bad_indices() {
        let text = "hello\n99L=1\nxxL=1\n1L=3\n02Q=4\n02L=abc\n-1M=0\n05L=40\n";
        let session = Session::parse(text, 7);
        assert!(session.tracks.iter().enumerate().all(|(i, t)| i == 5 || *t == Track::default()));
        assert_eq!(session.tracks[5].mix, [SILENCE_STEP, DEFAULT_STEP]);
        assert_eq!(session.record_offset, 7);
    }

    #[test]
    fn save_then_load_restores_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.cfg");
        let mut session = Session::new(512);
        session.tracks[15].mix = [0, 3];
        session.tracks[15].muted = false;
        session.position = 123_456;
        session.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("15L=0\n15R=3\n15M=0\n"));
        assert_eq!(Session::load(&path, 0).unwrap(), session);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load(&dir.path().join("none.cfg"), 64).unwrap();
        assert_eq!(session, Session::new(64));
    }
}
