//! voxclip - Voice audio acquisition
//!
//! Microphone capture, local media files and remote media references, all
//! normalized to canonical PCM WAV (44.1kHz, stereo, 16-bit).

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod asset;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod collab;
pub mod config;
pub mod coordinator;
pub mod defaults;
#[cfg(feature = "cli")]
pub mod diagnostics;
pub mod error;
#[cfg(feature = "cli")]
pub mod output;
pub mod playback;
pub mod remote;
pub mod sink;
pub mod transcode;

// Composition root - needs everything
#[cfg(all(feature = "cpal-audio", feature = "remote", feature = "cli"))]
pub mod app;

// Core capabilities (device → engine/extractor → sink)
pub use audio::{CaptureSession, InputDevice, InputStream};
pub use remote::RemoteExtractor;
pub use sink::{AssetSink, CollectorSink, WavFileSink};
pub use transcode::TranscodeEngine;

// Coordinator
pub use coordinator::{AcquisitionCoordinator, AcquisitionState};
pub use playback::{PlaybackMonitor, PlaybackState};

// Data model
pub use asset::{AcquisitionRequest, AssetFormat, AudioAsset, MediaKind, Provenance, SourcePayload};

// Error handling
pub use error::{AcquireError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_hash_only_when_embedded() {
        let ver = version_string();
        match option_env!("GIT_HASH").filter(|h| !h.is_empty()) {
            Some(hash) => assert!(ver.ends_with(&format!("+{}", hash)), "got: {}", ver),
            None => assert_eq!(ver, env!("CARGO_PKG_VERSION")),
        }
    }
}
