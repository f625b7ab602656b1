//! Error types for voxclip.
//!
//! Leaf components (engine, extractor, device) have their own enums; the
//! coordinator wraps them unchanged in [`AcquireError`].

use crate::coordinator::AcquisitionState;
use thiserror::Error;

/// Failures building or parsing WAV payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WavError {
    #[error("Failed to parse WAV data: {0}")]
    Parse(String),

    #[error("Failed to write WAV data: {0}")]
    Write(String),

    #[error(
        "WAV is not canonical: {sample_rate}Hz/{channels}ch/{bits_per_sample}-bit (expected 44100Hz/2ch/16-bit)"
    )]
    NotCanonical {
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    },
}

/// Failures of the transcoding engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("Unsupported codec: {message}")]
    UnsupportedCodec { message: String },

    #[error("Corrupt input: {message}")]
    CorruptInput { message: String },

    #[error("Transcoding engine failed to initialize: {message}")]
    EngineInitFailed { message: String },
}

/// Failures of the remote extractor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Reference rejected: {reference}: {message}")]
    ReferenceRejected { reference: String, message: String },

    #[error("No compatible audio stream for {reference}: {message}")]
    ResolutionFailed { reference: String, message: String },

    #[error("Transfer failed for {reference}: {message}")]
    TransferFailed { reference: String, message: String },
}

/// Failures of the input device capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Audio input access denied: {message}")]
    Denied { message: String },

    #[error("Audio device not found: {device}")]
    NotFound { device: String },

    #[error("Audio stream error: {message}")]
    Stream { message: String },
}

/// Failures of the voice-cloning collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloneError {
    #[error("Voice cloning authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("Voice cloning service error: {message}")]
    RemoteServiceError { message: String },
}

/// Failures of the live voice session collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Voice session authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("Voice session needs the microphone")]
    DeviceUnavailable(#[source] DeviceError),

    #[error("Voice session already active for agent {agent_id}")]
    AlreadyActive { agent_id: String },
}

/// Failures surfaced by the acquisition coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("Another acquisition is in progress ({state})")]
    Busy { state: AcquisitionState },

    #[error("Audio input device unavailable")]
    DeviceUnavailable(#[source] DeviceError),

    #[error("No active capture to stop")]
    NoActiveCapture,

    #[error("Failed to encode captured audio")]
    EncodeFailed(#[source] WavError),

    #[error("Unsupported media kind: {kind} (expected audio or video)")]
    UnsupportedMediaKind { kind: String },

    #[error("Transcoding failed")]
    TranscodeFailed(#[source] TranscodeError),

    #[error("Invalid remote media reference: {reference}")]
    InvalidReference { reference: String },

    #[error("Remote extraction failed")]
    ExtractionFailed(#[source] ExtractError),

    #[error("Transcoding engine unavailable")]
    EngineInitFailed(#[source] TranscodeError),

    #[error("Acquisition #{sequence} was abandoned")]
    Abandoned { sequence: u64 },
}

impl AcquireError {
    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Busy { .. } => "busy",
            Self::DeviceUnavailable(_) => "device_unavailable",
            Self::NoActiveCapture => "no_active_capture",
            Self::EncodeFailed(_) => "encode_failed",
            Self::UnsupportedMediaKind { .. } => "unsupported_media_kind",
            Self::TranscodeFailed(_) => "transcode_failed",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::EngineInitFailed(_) => "engine_init_failed",
            Self::Abandoned { .. } => "abandoned",
        }
    }
}

impl From<TranscodeError> for AcquireError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::EngineInitFailed { .. } => Self::EngineInitFailed(err),
            other => Self::TranscodeFailed(other),
        }
    }
}

impl From<WavError> for TranscodeError {
    fn from(err: WavError) -> Self {
        Self::CorruptInput {
            message: err.to_string(),
        }
    }
}

impl From<WavError> for AcquireError {
    fn from(err: WavError) -> Self {
        Self::EncodeFailed(err)
    }
}

impl From<ExtractError> for AcquireError {
    fn from(err: ExtractError) -> Self {
        Self::ExtractionFailed(err)
    }
}

impl From<DeviceError> for AcquireError {
    fn from(err: DeviceError) -> Self {
        Self::DeviceUnavailable(err)
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, AcquireError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_busy_display() {
        let error = AcquireError::Busy {
            state: AcquisitionState::Capturing,
        };
        assert_eq!(
            error.to_string(),
            "Another acquisition is in progress (capturing)"
        );
    }

    #[test]
    fn test_unsupported_media_kind_display() {
        let error = AcquireError::UnsupportedMediaKind {
            kind: "image".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unsupported media kind: image (expected audio or video)"
        );
    }

    #[test]
    fn test_transcode_error_converts_by_kind() {
        let init = TranscodeError::EngineInitFailed {
            message: "ffmpeg not found".to_string(),
        };
        assert!(matches!(
            AcquireError::from(init),
            AcquireError::EngineInitFailed(_)
        ));

        let corrupt = TranscodeError::CorruptInput {
            message: "truncated".to_string(),
        };
        assert!(matches!(
            AcquireError::from(corrupt),
            AcquireError::TranscodeFailed(TranscodeError::CorruptInput { .. })
        ));
    }

    #[test]
    fn test_extraction_failed_keeps_cause_in_source_chain() {
        let error: AcquireError = ExtractError::ResolutionFailed {
            reference: "https://youtu.be/abc123".to_string(),
            message: "no audio".to_string(),
        }
        .into();

        let source = error.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("No compatible audio stream"));
        assert!(source.contains("abc123"));
    }

    #[test]
    fn test_device_error_converts_to_device_unavailable() {
        let error: AcquireError = DeviceError::Denied {
            message: "permission denied".to_string(),
        }
        .into();
        assert_eq!(error.kind(), "device_unavailable");
        assert!(error.source().is_some());
    }

    #[test]
    fn test_busy_carries_matchable_state() {
        let error = AcquireError::Busy {
            state: AcquisitionState::Processing,
        };
        assert!(matches!(
            error,
            AcquireError::Busy {
                state: AcquisitionState::Processing
            }
        ));
    }

    #[test]
    fn test_wav_error_is_encode_failure_not_device_failure() {
        let error: AcquireError = WavError::Write("data chunk too large".to_string()).into();

        assert_eq!(error.kind(), "encode_failed");
        assert!(!matches!(error, AcquireError::DeviceUnavailable(_)));
        let source = error.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("data chunk too large"));
    }

    #[test]
    fn test_kind_names_are_distinct() {
        let errors = [
            AcquireError::Busy {
                state: AcquisitionState::Processing,
            },
            AcquireError::NoActiveCapture,
            AcquireError::EncodeFailed(WavError::Write(String::new())),
            AcquireError::UnsupportedMediaKind {
                kind: String::new(),
            },
            AcquireError::InvalidReference {
                reference: String::new(),
            },
            AcquireError::Abandoned { sequence: 1 },
        ];
        let mut kinds: Vec<&str> = errors.iter().map(AcquireError::kind).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<AcquireError>();
        assert_sync::<AcquireError>();
    }
}
