//! Default configuration constants for voxclip.
//!
//! The canonical audio format is fixed; every acquisition path converges on it
//! so downstream consumers never branch on sample layout.

/// Canonical output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Canonical output channel count (interleaved stereo).
pub const CHANNELS: u16 = 2;

/// Canonical output bit depth (signed little-endian PCM).
pub const BITS_PER_SAMPLE: u16 = 16;

/// Size of the canonical RIFF/WAVE header in bytes.
pub const WAV_HEADER_LEN: usize = 44;

/// MIME type of canonical audio.
pub const CANONICAL_MIME: &str = "audio/wav";

/// How often a capture session moves chunks from the device into its buffer.
pub const CAPTURE_PUMP_INTERVAL_MS: u64 = 50;

/// Transcoding engine used when the config does not name one.
pub const DEFAULT_ENGINE: &str = "symphonia";

/// ffmpeg binary looked up on `PATH`.
pub const FFMPEG_BINARY: &str = "ffmpeg";

/// Resolving proxy for remote media references.
///
/// Called as `<proxy>?url=<reference>`; answers with the audio stream.
pub const REMOTE_PROXY_URL: &str = "https://youtube-dl-proxy.herokuapp.com/download";

/// Remote fetch timeout in seconds (resolution + transfer).
pub const REMOTE_TIMEOUT_SECS: u64 = 120;

/// Largest remote body accepted, in bytes.
pub const REMOTE_MAX_BYTES: u64 = 256 * 1024 * 1024;

/// Agent the live voice session connects to when none is configured.
pub const DEFAULT_AGENT_ID: &str = "LAPzJ3YjC5oh2WdZVSD4";

/// Bytes per second of canonical audio.
pub const fn canonical_byte_rate() -> u32 {
    SAMPLE_RATE * CHANNELS as u32 * (BITS_PER_SAMPLE as u32 / 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_byte_rate_is_cd_quality() {
        assert_eq!(canonical_byte_rate(), 176_400);
    }
}
