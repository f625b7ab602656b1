//! Canonical WAV encoding and PCM layout normalization.
//!
//! Every acquisition path ends here: interleaved i16 samples in whatever
//! layout the source produced are mapped to stereo, resampled to 44.1kHz and
//! wrapped in a standard 44-byte RIFF/WAVE header.

use crate::defaults::{BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE, WAV_HEADER_LEN};
use crate::error::WavError;
use std::io::Cursor;
use std::time::Duration;

/// Format summary of a parsed WAV payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub is_float: bool,
    /// Number of sample frames (one sample per channel).
    pub frames: u32,
}

impl WavInfo {
    /// True when this is 44.1kHz stereo 16-bit integer PCM.
    pub fn is_canonical(&self) -> bool {
        self.sample_rate == SAMPLE_RATE
            && self.channels == CHANNELS
            && self.bits_per_sample == BITS_PER_SAMPLE
            && !self.is_float
    }

    /// Playback length.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }
}

fn canonical_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode interleaved stereo 44.1kHz samples as canonical WAV bytes.
///
/// A trailing partial frame is dropped so the data chunk always holds whole
/// frames. An empty slice yields a valid header-only file.
pub fn encode_canonical(samples: &[i16]) -> Result<Vec<u8>, WavError> {
    let whole = samples.len() - samples.len() % CHANNELS as usize;
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + whole * 2));

    let mut writer = hound::WavWriter::new(&mut cursor, canonical_spec())
        .map_err(|e| WavError::Write(e.to_string()))?;
    for &sample in &samples[..whole] {
        writer
            .write_sample(sample)
            .map_err(|e| WavError::Write(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| WavError::Write(e.to_string()))?;

    Ok(cursor.into_inner())
}

/// Parse the header of a WAV payload.
pub fn inspect(bytes: &[u8]) -> Result<WavInfo, WavError> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| WavError::Parse(e.to_string()))?;
    let spec = reader.spec();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        is_float: spec.sample_format == hound::SampleFormat::Float,
        frames: reader.duration(),
    })
}

/// True when `bytes` parse as canonical PCM WAV.
pub fn is_canonical(bytes: &[u8]) -> bool {
    inspect(bytes).is_ok_and(|info| info.is_canonical())
}

/// Read the interleaved samples of a canonical WAV payload.
pub fn read_canonical(bytes: &[u8]) -> Result<Vec<i16>, WavError> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| WavError::Parse(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE
        || spec.channels != CHANNELS
        || spec.bits_per_sample != BITS_PER_SAMPLE
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(WavError::NotCanonical {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
        });
    }

    reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| WavError::Parse(e.to_string()))
}

/// Map interleaved samples of any channel count and rate to canonical layout.
///
/// Mono is duplicated to both sides; more than two channels keep the first
/// two (front left/right). Then each side is resampled to 44.1kHz.
pub fn to_canonical_layout(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<i16> {
    let mut converter = CanonicalConverter::new(channels, sample_rate);
    let mut out = converter.push(samples);
    out.extend(converter.finish());
    out
}

fn map_to_stereo(samples: &[i16], channels: u16) -> Vec<i16> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples[..samples.len() - samples.len() % 2].to_vec(),
        n => samples
            .chunks_exact(n as usize)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Incremental conversion of interleaved PCM to canonical layout.
///
/// Linear interpolation whose position is tracked as an exact output frame
/// index, with the last input frame carried into the next `push`. A signal
/// fed in pieces converts to the same frames as the whole signal at once.
#[derive(Debug, Clone)]
pub struct CanonicalConverter {
    channels: u16,
    from_rate: u32,
    /// Index of the next output frame.
    emitted: u64,
    /// Input frame index of `previous`.
    base: u64,
    previous: Option<[i16; 2]>,
}

impl CanonicalConverter {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            from_rate: sample_rate,
            emitted: 0,
            base: 0,
            previous: None,
        }
    }

    fn passthrough(&self) -> bool {
        self.from_rate == SAMPLE_RATE || self.from_rate == 0
    }

    /// Convert the next chunk, returning every output frame it completes.
    pub fn push(&mut self, samples: &[i16]) -> Vec<i16> {
        let stereo = map_to_stereo(samples, self.channels);
        if self.passthrough() {
            return stereo;
        }

        let frames: Vec<[i16; 2]> = self
            .previous
            .into_iter()
            .chain(stereo.chunks_exact(2).map(|f| [f[0], f[1]]))
            .collect();
        let Some(&last) = frames.last() else {
            return Vec::new();
        };

        let from = u64::from(self.from_rate);
        let to = u64::from(SAMPLE_RATE);
        let mut out = Vec::with_capacity(stereo.len() * to as usize / from as usize + 4);
        loop {
            let position = self.emitted * from;
            let index = (position / to - self.base) as usize;
            if index + 1 >= frames.len() {
                break;
            }
            let remainder = (position % to) as i64;
            let (left, right) = (frames[index], frames[index + 1]);
            for ch in 0..2 {
                let a = i64::from(left[ch]);
                let b = i64::from(right[ch]);
                out.push((a + (b - a) * remainder / to as i64) as i16);
            }
            self.emitted += 1;
        }

        self.base += frames.len() as u64 - 1;
        self.previous = Some(last);
        out
    }

    /// Flush the frames that fall after the last input frame.
    pub fn finish(self) -> Vec<i16> {
        if self.passthrough() {
            return Vec::new();
        }
        let Some(last) = self.previous else {
            return Vec::new();
        };

        let from = u64::from(self.from_rate);
        let end = (self.base + 1) * u64::from(SAMPLE_RATE);
        let mut out = Vec::new();
        let mut emitted = self.emitted;
        while emitted * from < end {
            out.extend_from_slice(&last);
            emitted += 1;
        }
        out
    }
}

/// Interleaved sample count holding `duration` of canonical audio.
pub fn samples_for(duration: Duration) -> usize {
    let frames = (duration.as_secs_f64() * SAMPLE_RATE as f64).round() as usize;
    frames * CHANNELS as usize
}

/// Decode little-endian 16-bit PCM bytes. A trailing odd byte is dropped.
pub fn pcm_s16le_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Convert float samples in [-1.0, 1.0] to i16 with clamping.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}
