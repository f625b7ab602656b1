//! Transcoding engines: arbitrary container/codec payloads to canonical WAV.

pub mod ffmpeg;
pub mod symphonia;

pub use self::ffmpeg::FfmpegEngine;
pub use self::symphonia::SymphoniaEngine;

use crate::audio::wav;
use crate::config::{EngineKind, TranscodeConfig};
use crate::error::TranscodeError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Converts media payloads to canonical PCM WAV (44.1kHz, stereo, 16-bit).
///
/// `initialize()` is a one-time load step; its outcome is cached and
/// `transcode()` runs it implicitly. An initialization failure is always
/// reported as `EngineInitFailed`, never as a per-call failure.
#[async_trait::async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Prepare the engine. Repeated calls return the cached outcome.
    async fn initialize(&self) -> Result<(), TranscodeError>;

    /// Transcode one payload.
    ///
    /// # Errors
    /// `UnsupportedCodec`, `CorruptInput`, or `EngineInitFailed`
    async fn transcode(&self, payload: Vec<u8>) -> Result<Vec<u8>, TranscodeError>;

    /// Engine name for logs and diagnostics
    fn name(&self) -> &str;

    /// True once initialization has succeeded
    fn is_ready(&self) -> bool;
}

#[async_trait::async_trait]
impl<T: TranscodeEngine + ?Sized> TranscodeEngine for Arc<T> {
    async fn initialize(&self) -> Result<(), TranscodeError> {
        (**self).initialize().await
    }

    async fn transcode(&self, payload: Vec<u8>) -> Result<Vec<u8>, TranscodeError> {
        (**self).transcode(payload).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Build the engine selected in configuration.
pub fn engine_from_config(config: &TranscodeConfig) -> Arc<dyn TranscodeEngine> {
    match config.engine {
        EngineKind::Symphonia => Arc::new(SymphoniaEngine::new()),
        EngineKind::Ffmpeg => Arc::new(FfmpegEngine::new(&config.ffmpeg_path)),
    }
}

/// Mock engine for testing.
///
/// Clones share the call counters.
#[derive(Debug, Clone)]
pub struct MockEngine {
    output: Vec<i16>,
    failure: Option<TranscodeError>,
    init_failure: Option<String>,
    delay: Duration,
    init_calls: Arc<AtomicUsize>,
    transcode_calls: Arc<AtomicUsize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Engine that returns one second of canonical silence
    pub fn new() -> Self {
        Self {
            output: vec![0; wav::samples_for(Duration::from_secs(1))],
            failure: None,
            init_failure: None,
            delay: Duration::ZERO,
            init_calls: Arc::new(AtomicUsize::new(0)),
            transcode_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the interleaved samples of the produced WAV
    pub fn with_output(mut self, samples: Vec<i16>) -> Self {
        self.output = samples;
        self
    }

    /// Configure every transcode call to fail
    pub fn with_failure(mut self, error: TranscodeError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Configure initialization to fail
    pub fn with_init_failure(mut self, message: &str) -> Self {
        self.init_failure = Some(message.to_string());
        self
    }

    /// Delay every transcode call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of transcode calls so far
    pub fn transcode_count(&self) -> usize {
        self.transcode_calls.load(Ordering::SeqCst)
    }

    /// Number of initialize calls so far
    pub fn init_count(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TranscodeEngine for MockEngine {
    async fn initialize(&self) -> Result<(), TranscodeError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        match &self.init_failure {
            Some(message) => Err(TranscodeError::EngineInitFailed {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn transcode(&self, _payload: Vec<u8>) -> Result<Vec<u8>, TranscodeError> {
        self.transcode_calls.fetch_add(1, Ordering::SeqCst);
        self.initialize().await?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(wav::encode_canonical(&self.output)?)
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn is_ready(&self) -> bool {
        self.init_failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_engine_counts_calls() {
        let engine = MockEngine::new();
        let handle = engine.clone();

        let bytes = engine.transcode(vec![1, 2, 3]).await.unwrap();

        assert!(wav::is_canonical(&bytes));
        assert_eq!(handle.transcode_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_engine_init_failure_is_engine_init_failed() {
        let engine = MockEngine::new().with_init_failure("missing binary");

        let result = engine.transcode(Vec::new()).await;

        assert!(matches!(
            result,
            Err(TranscodeError::EngineInitFailed { .. })
        ));
        assert!(!engine.is_ready());
    }

    #[tokio::test]
    async fn test_engine_from_config_selects_kind() {
        let mut config = TranscodeConfig::default();
        assert_eq!(engine_from_config(&config).name(), "symphonia");

        config.engine = EngineKind::Ffmpeg;
        assert_eq!(engine_from_config(&config).name(), "ffmpeg");
    }

    #[tokio::test]
    async fn test_arc_engine_delegates() {
        let engine: Arc<dyn TranscodeEngine> = Arc::new(MockEngine::new().with_output(vec![1, 2]));

        let bytes = engine.transcode(Vec::new()).await.unwrap();

        assert_eq!(wav::read_canonical(&bytes).unwrap(), vec![1, 2]);
    }
}
