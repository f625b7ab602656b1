//! Remote media extraction.

#[cfg(feature = "remote")]
pub mod proxy;
pub mod reference;

#[cfg(feature = "remote")]
pub use proxy::ProxyExtractor;
pub use reference::{is_remote_reference, media_id, require_media_id};

use crate::audio::wav;
use crate::error::ExtractError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Resolves a remote media reference to audio bytes.
///
/// Implementations re-validate the reference themselves; the caller's
/// syntactic check is not trusted.
#[async_trait::async_trait]
pub trait RemoteExtractor: Send + Sync {
    /// Fetch the audio stream named by `reference`.
    ///
    /// # Errors
    /// `ReferenceRejected`, `ResolutionFailed` (no audio-capable stream), or
    /// `TransferFailed` (network failure)
    async fn extract(&self, reference: &str) -> Result<Vec<u8>, ExtractError>;

    /// Strategy name for logs
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
impl<T: RemoteExtractor + ?Sized> RemoteExtractor for Arc<T> {
    async fn extract(&self, reference: &str) -> Result<Vec<u8>, ExtractError> {
        (**self).extract(reference).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, Clone)]
enum MockOutcome {
    Payload(Vec<u8>),
    NoCompatibleStream,
    TransferFailure(String),
}

/// Mock extractor for testing.
///
/// Performs the same authoritative reference check as real extractors.
#[derive(Debug, Clone)]
pub struct MockExtractor {
    outcome: MockOutcome,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExtractor {
    /// Extractor returning one second of canonical silence
    pub fn new() -> Self {
        let silence = vec![0i16; wav::samples_for(Duration::from_secs(1))];
        Self {
            outcome: MockOutcome::Payload(wav::encode_canonical(&silence).unwrap_or_default()),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the returned bytes
    pub fn with_payload(mut self, bytes: Vec<u8>) -> Self {
        self.outcome = MockOutcome::Payload(bytes);
        self
    }

    /// Configure resolution to find no audio-capable stream
    pub fn with_no_compatible_stream(mut self) -> Self {
        self.outcome = MockOutcome::NoCompatibleStream;
        self
    }

    /// Configure a network failure
    pub fn with_transfer_failure(mut self, message: &str) -> Self {
        self.outcome = MockOutcome::TransferFailure(message.to_string());
        self
    }

    /// Delay every extraction
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of extract calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteExtractor for MockExtractor {
    async fn extract(&self, reference: &str) -> Result<Vec<u8>, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        require_media_id(reference)?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            MockOutcome::Payload(bytes) => Ok(bytes.clone()),
            MockOutcome::NoCompatibleStream => Err(ExtractError::ResolutionFailed {
                reference: reference.to_string(),
                message: "no audio-capable stream".to_string(),
            }),
            MockOutcome::TransferFailure(message) => Err(ExtractError::TransferFailed {
                reference: reference.to_string(),
                message: message.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_extractor_revalidates_reference() {
        let extractor = MockExtractor::new();

        let result = extractor.extract("https://youtube.com/channel/x").await;

        assert!(matches!(
            result,
            Err(ExtractError::ReferenceRejected { .. })
        ));
        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_extractor_outcomes() {
        let ok = MockExtractor::new().with_payload(vec![9, 9]);
        assert_eq!(ok.extract("https://youtu.be/abc123").await.unwrap(), vec![9, 9]);

        let none = MockExtractor::new().with_no_compatible_stream();
        assert!(matches!(
            none.extract("https://youtu.be/abc123").await,
            Err(ExtractError::ResolutionFailed { .. })
        ));

        let net = MockExtractor::new().with_transfer_failure("connection reset");
        match net.extract("https://youtu.be/abc123").await {
            Err(ExtractError::TransferFailed { message, .. }) => {
                assert_eq!(message, "connection reset");
            }
            other => panic!("Expected TransferFailed, got {other:?}"),
        }
    }
}
