//! Transcoding through an external `ffmpeg` binary.

use super::TranscodeEngine;
use crate::audio::wav;
use crate::defaults;
use crate::error::TranscodeError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;

/// stderr fragments that mean the input itself is damaged or truncated.
const CORRUPT_MARKERS: &[&str] = &["Invalid data", "moov atom not found", "End of file"];

/// stderr fragments that mean ffmpeg understood the input but found no
/// usable audio.
const UNSUPPORTED_MARKERS: &[&str] = &[
    "does not contain any stream",
    "matches no streams",
    "Unknown decoder",
    "Decoder not found",
    "Output file #0 does not contain",
];

/// Runs `ffmpeg` once per payload and reads raw PCM from its stdout.
#[derive(Debug)]
pub struct FfmpegEngine {
    binary: PathBuf,
    version: OnceCell<Result<String, TranscodeError>>,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new(defaults::FFMPEG_BINARY)
    }
}

impl FfmpegEngine {
    /// Engine using `binary` (a name on PATH or an absolute path).
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            version: OnceCell::new(),
        }
    }

    /// First line of `ffmpeg -version`, once initialized.
    pub fn version(&self) -> Option<&str> {
        self.version.get().and_then(|v| v.as_deref().ok())
    }

    async fn query_version(&self) -> Result<String, TranscodeError> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TranscodeError::EngineInitFailed {
                message: format!("failed to run '{}': {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(TranscodeError::EngineInitFailed {
                message: format!(
                    "'{} -version' exited with {}",
                    self.binary.display(),
                    output.status
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or("ffmpeg").trim().to_string();
        tracing::debug!(%version, "ffmpeg engine initialized");
        Ok(version)
    }
}

#[async_trait::async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn initialize(&self) -> Result<(), TranscodeError> {
        self.version
            .get_or_init(|| self.query_version())
            .await
            .clone()
            .map(|_| ())
    }

    async fn transcode(&self, payload: Vec<u8>) -> Result<Vec<u8>, TranscodeError> {
        self.initialize().await?;

        if payload.is_empty() {
            return Err(TranscodeError::CorruptInput {
                message: "empty payload".to_string(),
            });
        }

        let input_len = payload.len();
        let staged = tokio::task::spawn_blocking(move || stage_payload(&payload))
            .await
            .map_err(|e| TranscodeError::CorruptInput {
                message: format!("staging task failed: {}", e),
            })??;

        let rate = defaults::SAMPLE_RATE.to_string();
        let channels = defaults::CHANNELS.to_string();
        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-i"])
            .arg(staged.path())
            .args([
                "-vn",
                "-acodec",
                "pcm_s16le",
                "-ar",
                rate.as_str(),
                "-ac",
                channels.as_str(),
                "-f",
                "s16le",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscodeError::EngineInitFailed {
                message: format!("failed to spawn '{}': {}", self.binary.display(), e),
            })?;
        drop(staged);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(status = %output.status, stderr = %stderr.trim(), "ffmpeg failed");
            return Err(classify_stderr(&stderr));
        }

        let samples = wav::pcm_s16le_to_samples(&output.stdout);
        tracing::debug!(input_len, samples = samples.len(), "ffmpeg transcode done");
        Ok(wav::encode_canonical(&samples)?)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_ready(&self) -> bool {
        matches!(self.version.get(), Some(Ok(_)))
    }
}

fn stage_payload(payload: &[u8]) -> Result<tempfile::NamedTempFile, TranscodeError> {
    let staging_failed = |e: std::io::Error| TranscodeError::CorruptInput {
        message: format!("failed to stage input: {}", e),
    };
    let mut file = tempfile::Builder::new()
        .prefix("voxclip-")
        .suffix(".media")
        .tempfile()
        .map_err(staging_failed)?;
    file.write_all(payload).map_err(staging_failed)?;
    file.flush().map_err(staging_failed)?;
    Ok(file)
}

/// Map ffmpeg's stderr to a transcode failure.
pub fn classify_stderr(stderr: &str) -> TranscodeError {
    let tail = stderr_tail(stderr);
    if UNSUPPORTED_MARKERS.iter().any(|m| stderr.contains(m)) {
        return TranscodeError::UnsupportedCodec { message: tail };
    }
    if CORRUPT_MARKERS.iter().any(|m| stderr.contains(m)) {
        return TranscodeError::CorruptInput { message: tail };
    }
    TranscodeError::CorruptInput {
        message: if tail.is_empty() {
            "ffmpeg failed without diagnostics".to_string()
        } else {
            tail
        },
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffmpeg_available() -> bool {
        std::process::Command::new("ffmpeg")
            .arg("-version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    #[test]
    fn test_classify_corrupt_input() {
        let err = classify_stderr("pipe:0: Invalid data found when processing input\n");
        assert!(matches!(err, TranscodeError::CorruptInput { .. }));

        let err = classify_stderr("[mov,mp4] moov atom not found\n");
        assert!(matches!(err, TranscodeError::CorruptInput { .. }));
    }

    #[test]
    fn test_classify_unsupported_codec() {
        let err = classify_stderr("Output file #0 does not contain any stream\n");
        assert!(matches!(err, TranscodeError::UnsupportedCodec { .. }));

        let err = classify_stderr("Stream map '0:a' matches no streams.\n");
        assert!(matches!(err, TranscodeError::UnsupportedCodec { .. }));
    }

    #[test]
    fn test_classify_unknown_keeps_tail() {
        match classify_stderr("line one\nline two\n\nline three\nline four\n") {
            TranscodeError::CorruptInput { message } => {
                assert_eq!(message, "line two; line three; line four");
            }
            other => panic!("Expected CorruptInput, got {other:?}"),
        }

        match classify_stderr("") {
            TranscodeError::CorruptInput { message } => assert!(message.contains("without")),
            other => panic!("Expected CorruptInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_init_failed() {
        let engine = FfmpegEngine::new("/nonexistent/ffmpeg-voxclip-test");

        let init = engine.initialize().await;
        let call = engine.transcode(vec![1, 2, 3]).await;

        assert!(matches!(init, Err(TranscodeError::EngineInitFailed { .. })));
        assert!(matches!(call, Err(TranscodeError::EngineInitFailed { .. })));
        assert!(!engine.is_ready());
        assert!(engine.version().is_none());
    }

    #[tokio::test]
    async fn test_garbage_payload_is_rejected() {
        if !ffmpeg_available() {
            eprintln!("skipping: ffmpeg not installed");
            return;
        }
        let engine = FfmpegEngine::default();

        let result = engine.transcode(b"not a media file at all".to_vec()).await;

        assert!(result.is_err());
        assert!(engine.is_ready());
        assert!(engine.version().is_some_and(|v| v.contains("ffmpeg")));
    }

    #[tokio::test]
    async fn test_wav_payload_is_resampled_to_canonical() {
        if !ffmpeg_available() {
            eprintln!("skipping: ffmpeg not installed");
            return;
        }
        let mut cursor = std::io::Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..16_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let output = FfmpegEngine::default()
            .transcode(cursor.into_inner())
            .await
            .unwrap();

        let info = wav::inspect(&output).unwrap();
        assert!(info.is_canonical());
        assert!((info.duration().as_secs_f64() - 1.0).abs() < 0.05);
    }
}
