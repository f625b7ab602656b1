//! Acquisition data model: finished assets and in-flight requests.

use crate::audio::wav;
use crate::defaults;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Which source produced an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Microphone,
    File,
    Remote,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Microphone => "microphone",
            Self::File => "file",
            Self::Remote => "remote",
        })
    }
}

/// Declared kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Kind from a MIME type such as `video/mp4`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let top = mime.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// Guess the kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" | "wave" | "mp3" | "ogg" | "oga" | "opus" | "flac" | "m4a" | "aac" | "aif"
            | "aiff" | "caf" => Some(Self::Audio),
            "mp4" | "m4v" | "mov" | "mkv" | "webm" | "avi" | "mpeg" | "mpg" | "3gp" => {
                Some(Self::Video)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    /// Accepts `audio`/`video` or a MIME type with either top-level type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other if other.contains('/') => {
                Self::from_mime(other).ok_or_else(|| trimmed.to_string())
            }
            _ => Err(trimmed.to_string()),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format tag carried by an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetFormat {
    /// PCM WAV, 44.1kHz, stereo, 16-bit.
    CanonicalWav,
    /// Caller bytes kept as-is, with the MIME type sniffed from the payload.
    Passthrough { mime: String },
}

impl AssetFormat {
    /// Tag for a payload, sniffed from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        if wav::is_canonical(bytes) {
            Self::CanonicalWav
        } else {
            Self::Passthrough {
                mime: sniff_mime(bytes).to_string(),
            }
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            Self::CanonicalWav => defaults::CANONICAL_MIME,
            Self::Passthrough { mime } => mime,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::CanonicalWav)
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CanonicalWav => write!(f, "{} (pcm_s16le, 44100Hz, stereo)", defaults::CANONICAL_MIME),
            Self::Passthrough { mime } => f.write_str(mime),
        }
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => "audio/wav",
        [b'I', b'D', b'3', ..] => "audio/mpeg",
        [0xFF, b, ..] if b & 0xE0 == 0xE0 => "audio/mpeg",
        [b'O', b'g', b'g', b'S', ..] => "audio/ogg",
        [b'f', b'L', b'a', b'C', ..] => "audio/flac",
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => "audio/mp4",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "audio/webm",
        [b'F', b'O', b'R', b'M', ..] => "audio/aiff",
        _ => "application/octet-stream",
    }
}

/// One acquired audio result.
///
/// Immutable once built; clones share the payload.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    payload: Arc<[u8]>,
    format: AssetFormat,
    sequence: u64,
    provenance: Provenance,
}

impl AudioAsset {
    /// Wrap canonical WAV bytes produced by the pipeline.
    pub fn canonical(payload: Vec<u8>, sequence: u64, provenance: Provenance) -> Self {
        Self {
            payload: payload.into(),
            format: AssetFormat::CanonicalWav,
            sequence,
            provenance,
        }
    }

    /// Wrap caller bytes without conversion, tagging the sniffed format.
    pub fn passthrough(payload: Vec<u8>, sequence: u64, provenance: Provenance) -> Self {
        let format = AssetFormat::detect(&payload);
        Self {
            payload: payload.into(),
            format,
            sequence,
            provenance,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn format(&self) -> &AssetFormat {
        &self.format
    }

    pub fn mime(&self) -> &str {
        self.format.mime()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Playback length, known only for WAV payloads.
    pub fn duration(&self) -> Option<Duration> {
        wav::inspect(&self.payload).ok().map(|info| info.duration())
    }
}

/// Source of one acquisition attempt.
///
/// File payloads are moved into the engine, so only their size is kept here.
#[derive(Debug, Clone)]
pub enum SourcePayload {
    Microphone,
    File { size: usize, kind: MediaKind },
    Remote { reference: String },
}

impl SourcePayload {
    pub fn provenance(&self) -> Provenance {
        match self {
            Self::Microphone => Provenance::Microphone,
            Self::File { .. } => Provenance::File,
            Self::Remote { .. } => Provenance::Remote,
        }
    }
}

/// One call into the coordinator, alive until the attempt resolves.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub sequence: u64,
    pub source: SourcePayload,
    pub issued_at: SystemTime,
}

impl AcquisitionRequest {
    pub fn new(sequence: u64, source: SourcePayload) -> Self {
        Self {
            sequence,
            source,
            issued_at: SystemTime::now(),
        }
    }

    /// Time since the request was issued.
    pub fn elapsed(&self) -> Duration {
        self.issued_at.elapsed().unwrap_or_default()
    }
}
