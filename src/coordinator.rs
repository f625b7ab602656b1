//! Acquisition coordinator.
//!
//! One entry point per source (microphone, local file, remote reference),
//! one state machine for all of them:
//!
//! ```text
//! Idle ──begin_capture──▶ Capturing ──end_capture──▶ Idle
//! Idle ──submit_file(video) / submit_remote──▶ Processing ──▶ Idle
//! ```
//!
//! At most one acquisition is in flight. A second request while not `Idle`
//! gets `Busy` and the in-flight one continues. Every attempt ends in `Idle`,
//! whether it succeeded, failed, was abandoned, or its future was dropped.

use crate::asset::{AcquisitionRequest, AudioAsset, MediaKind, Provenance, SourcePayload};
use crate::audio::device::InputDevice;
use crate::audio::session::CaptureSession;
use crate::audio::wav;
use crate::defaults;
use crate::error::{AcquireError, DeviceError, ExtractError, Result, TranscodeError};
use crate::remote::{RemoteExtractor, is_remote_reference};
use crate::sink::AssetSink;
use crate::transcode::TranscodeEngine;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Observable state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    Capturing,
    Processing,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Processing => "processing",
        })
    }
}

/// Internal phase. Several phases map onto one observable state.
enum Phase {
    Idle,
    /// Device being acquired; reads as `Capturing`.
    Negotiating { sequence: u64 },
    Capturing {
        request: AcquisitionRequest,
        session: CaptureSession,
    },
    /// Capture buffer being finalized; reads as `Capturing`.
    Closing { sequence: u64 },
    Processing {
        sequence: u64,
        cancel: CancellationToken,
    },
}

impl Phase {
    fn state(&self) -> AcquisitionState {
        match self {
            Self::Idle => AcquisitionState::Idle,
            Self::Negotiating { .. } | Self::Capturing { .. } | Self::Closing { .. } => {
                AcquisitionState::Capturing
            }
            Self::Processing { .. } => AcquisitionState::Processing,
        }
    }

    fn sequence(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Negotiating { sequence }
            | Self::Closing { sequence }
            | Self::Processing { sequence, .. } => Some(*sequence),
            Self::Capturing { request, .. } => Some(request.sequence),
        }
    }
}

/// Drives the capture session, transcoding engine and remote extractor
/// behind one contract.
pub struct AcquisitionCoordinator {
    device: Arc<dyn InputDevice>,
    engine: Arc<dyn TranscodeEngine>,
    extractor: Arc<dyn RemoteExtractor>,
    sink: Option<Arc<dyn AssetSink>>,
    pump_interval: Duration,
    phase: Mutex<Phase>,
    state_tx: watch::Sender<AcquisitionState>,
    next_sequence: AtomicU64,
    latest: Mutex<Option<AudioAsset>>,
}

impl AcquisitionCoordinator {
    pub fn new(
        device: Arc<dyn InputDevice>,
        engine: Arc<dyn TranscodeEngine>,
        extractor: Arc<dyn RemoteExtractor>,
    ) -> Self {
        let (state_tx, _) = watch::channel(AcquisitionState::Idle);
        Self {
            device,
            engine,
            extractor,
            sink: None,
            pump_interval: Duration::from_millis(defaults::CAPTURE_PUMP_INTERVAL_MS),
            phase: Mutex::new(Phase::Idle),
            state_tx,
            next_sequence: AtomicU64::new(1),
            latest: Mutex::new(None),
        }
    }

    /// Deliver every finished asset to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn AssetSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// How often the capture session drains the device.
    pub fn with_pump_interval(mut self, interval: Duration) -> Self {
        self.pump_interval = interval;
        self
    }

    /// Current state.
    pub fn state(&self) -> AcquisitionState {
        self.lock_phase().state()
    }

    /// Receiver of state changes.
    pub fn subscribe(&self) -> watch::Receiver<AcquisitionState> {
        self.state_tx.subscribe()
    }

    /// Most recent asset by sequence number.
    pub fn latest_asset(&self) -> Option<AudioAsset> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The transcoding engine in use.
    pub fn engine(&self) -> &Arc<dyn TranscodeEngine> {
        &self.engine
    }

    /// Open the input device and start buffering.
    ///
    /// # Returns
    /// Sequence number reserved for this capture
    ///
    /// # Errors
    /// `Busy` when not idle, `DeviceUnavailable` when the device cannot be
    /// obtained (never retried), `Abandoned` if `abandon()` was called while
    /// the device was being negotiated
    pub async fn begin_capture(&self) -> Result<u64> {
        let sequence = self.accept(|sequence| Phase::Negotiating { sequence })?;
        let request = AcquisitionRequest::new(sequence, SourcePayload::Microphone);
        let guard = PhaseGuard::new(self, sequence);

        tracing::debug!(sequence, device = %self.device.name(), "Negotiating input device");
        let device = Arc::clone(&self.device);
        let acquired = tokio::task::spawn_blocking(move || device.acquire())
            .await
            .unwrap_or_else(|e| {
                Err(DeviceError::Stream {
                    message: format!("device task failed: {}", e),
                })
            });

        let mut phase = self.lock_phase();
        if phase.sequence() != Some(sequence) {
            // abandoned while negotiating; dropping the stream releases it
            drop(phase);
            drop(acquired);
            guard.disarm();
            return Err(AcquireError::Abandoned { sequence });
        }

        let outcome = match acquired {
            Ok(stream) => {
                let session = CaptureSession::start(stream, self.pump_interval);
                self.transition(&mut phase, Phase::Capturing { request, session });
                tracing::info!(sequence, "Capture started");
                Ok(sequence)
            }
            Err(e) => {
                self.transition(&mut phase, Phase::Idle);
                tracing::warn!(sequence, error = %e, "Input device unavailable");
                Err(AcquireError::DeviceUnavailable(e))
            }
        };
        drop(phase);
        guard.disarm();
        outcome
    }

    /// Stop the active capture and produce a microphone asset.
    ///
    /// # Errors
    /// `NoActiveCapture` when idle (state untouched), `Busy` while the
    /// device is still being negotiated or a file/remote request runs,
    /// `EncodeFailed` if the buffered audio cannot be written as WAV
    pub async fn end_capture(&self) -> Result<AudioAsset> {
        let (request, session) = {
            let mut phase = self.lock_phase();
            // subscribers never see the placeholder; the lock is held throughout
            match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Capturing { request, session } => {
                    let sequence = request.sequence;
                    self.transition(&mut phase, Phase::Closing { sequence });
                    (request, session)
                }
                Phase::Idle => return Err(AcquireError::NoActiveCapture),
                other => {
                    let state = other.state();
                    *phase = other;
                    return Err(AcquireError::Busy { state });
                }
            }
        };

        let sequence = request.sequence;
        let guard = PhaseGuard::new(self, sequence);
        let closed = session.close().await;
        let still_current = self.finish(sequence);
        guard.disarm();

        if !still_current {
            return Err(AcquireError::Abandoned { sequence });
        }
        let bytes = closed.inspect_err(|e| {
            tracing::warn!(sequence, error = %e, "Failed to encode captured audio");
        })?;

        let asset = AudioAsset::canonical(bytes, sequence, Provenance::Microphone);
        self.publish(&request, &asset);
        Ok(asset)
    }

    /// Acquire audio from an uploaded file.
    ///
    /// `declared_kind` is `audio`, `video`, or a MIME type with one of those
    /// top-level types. Audio is passed through unchanged and never touches
    /// the engine; video is transcoded to canonical WAV.
    ///
    /// # Errors
    /// `UnsupportedMediaKind` (no state change), `Busy`, `TranscodeFailed`,
    /// `EngineInitFailed`, `Abandoned`
    pub async fn submit_file(&self, payload: Vec<u8>, declared_kind: &str) -> Result<AudioAsset> {
        let kind: MediaKind = declared_kind
            .parse()
            .map_err(|kind| AcquireError::UnsupportedMediaKind { kind })?;

        match kind {
            MediaKind::Audio => {
                let sequence = self.accept_instant()?;
                let request = AcquisitionRequest::new(
                    sequence,
                    SourcePayload::File {
                        size: payload.len(),
                        kind,
                    },
                );
                let asset = AudioAsset::passthrough(payload, sequence, Provenance::File);
                self.publish(&request, &asset);
                Ok(asset)
            }
            MediaKind::Video => {
                let cancel = CancellationToken::new();
                let sequence = self.accept(|sequence| Phase::Processing {
                    sequence,
                    cancel: cancel.clone(),
                })?;
                let request = AcquisitionRequest::new(
                    sequence,
                    SourcePayload::File {
                        size: payload.len(),
                        kind,
                    },
                );
                tracing::debug!(
                    sequence,
                    bytes = payload.len(),
                    engine = self.engine.name(),
                    "Transcoding video"
                );

                let engine = Arc::clone(&self.engine);
                let bytes = self
                    .run_processing(sequence, cancel, async move {
                        engine.transcode(payload).await.map_err(AcquireError::from)
                    })
                    .await?;

                let asset = AudioAsset::canonical(bytes, sequence, Provenance::File);
                self.publish(&request, &asset);
                Ok(asset)
            }
        }
    }

    /// Acquire audio from a remote media reference.
    ///
    /// The reference is checked syntactically before anything else; the
    /// extractor then re-validates it. Fetched bytes are normalized to
    /// canonical WAV.
    ///
    /// # Errors
    /// `InvalidReference` (no state change, no network), `Busy`,
    /// `ExtractionFailed` with `ReferenceRejected`, `ResolutionFailed` or
    /// `TransferFailed`, `EngineInitFailed`, `Abandoned`
    pub async fn submit_remote(&self, reference: &str) -> Result<AudioAsset> {
        if !is_remote_reference(reference) {
            return Err(AcquireError::InvalidReference {
                reference: reference.to_string(),
            });
        }

        let cancel = CancellationToken::new();
        let sequence = self.accept(|sequence| Phase::Processing {
            sequence,
            cancel: cancel.clone(),
        })?;
        let request = AcquisitionRequest::new(
            sequence,
            SourcePayload::Remote {
                reference: reference.to_string(),
            },
        );
        tracing::debug!(
            sequence,
            %reference,
            extractor = self.extractor.name(),
            "Extracting remote media"
        );

        let extractor = Arc::clone(&self.extractor);
        let engine = Arc::clone(&self.engine);
        let reference = reference.to_string();
        let bytes = self
            .run_processing(sequence, cancel, async move {
                let fetched = extractor.extract(&reference).await?;
                normalize_remote(engine.as_ref(), &reference, fetched).await
            })
            .await?;

        let asset = AudioAsset::canonical(bytes, sequence, Provenance::Remote);
        self.publish(&request, &asset);
        Ok(asset)
    }

    /// Abandon the in-flight acquisition.
    ///
    /// The state returns to `Idle` at once. A running file/remote request
    /// resolves to `Abandoned` and its late result is discarded; an active
    /// capture releases the device and drops its buffer.
    ///
    /// # Returns
    /// Whether anything was in flight
    pub fn abandon(&self) -> bool {
        let previous = {
            let mut phase = self.lock_phase();
            if matches!(*phase, Phase::Idle) {
                return false;
            }
            self.transition(&mut phase, Phase::Idle)
        };

        let sequence = previous.sequence().unwrap_or_default();
        match previous {
            Phase::Processing { cancel, .. } => cancel.cancel(),
            Phase::Capturing { session, .. } => session.discard(),
            Phase::Negotiating { .. } | Phase::Closing { .. } | Phase::Idle => {}
        }
        tracing::info!(sequence, "Acquisition abandoned");
        true
    }

    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the phase and notify subscribers if the observable state changed.
    fn transition(&self, phase: &mut Phase, next: Phase) -> Phase {
        let previous = std::mem::replace(phase, next);
        let state = phase.state();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::debug!(from = %previous.state(), to = %state, "Acquisition state changed");
        }
        previous
    }

    /// Reserve a sequence number and enter a non-idle phase, or fail with `Busy`.
    fn accept(&self, next: impl FnOnce(u64) -> Phase) -> Result<u64> {
        let mut phase = self.lock_phase();
        if !matches!(*phase, Phase::Idle) {
            return Err(AcquireError::Busy {
                state: phase.state(),
            });
        }
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.transition(&mut phase, next(sequence));
        Ok(sequence)
    }

    /// Reserve a sequence number for a request that completes without
    /// leaving `Idle`.
    fn accept_instant(&self) -> Result<u64> {
        let phase = self.lock_phase();
        if !matches!(*phase, Phase::Idle) {
            return Err(AcquireError::Busy {
                state: phase.state(),
            });
        }
        Ok(self.next_sequence.fetch_add(1, Ordering::SeqCst))
    }

    /// Return to `Idle` if `sequence` still owns the phase.
    ///
    /// False means the request was abandoned and its result must be dropped.
    fn finish(&self, sequence: u64) -> bool {
        let mut phase = self.lock_phase();
        if phase.sequence() != Some(sequence) {
            return false;
        }
        self.transition(&mut phase, Phase::Idle);
        true
    }

    async fn run_processing<F>(
        &self,
        sequence: u64,
        cancel: CancellationToken,
        work: F,
    ) -> Result<Vec<u8>>
    where
        F: Future<Output = Result<Vec<u8>>>,
    {
        let guard = PhaseGuard::new(self, sequence);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AcquireError::Abandoned { sequence }),
            result = work => result,
        };
        let still_current = self.finish(sequence);
        guard.disarm();

        if !still_current {
            tracing::debug!(sequence, "Discarding late completion");
            return Err(AcquireError::Abandoned { sequence });
        }
        if let Err(e) = &outcome {
            tracing::warn!(sequence, kind = e.kind(), error = %e, "Acquisition failed");
        }
        outcome
    }

    fn publish(&self, request: &AcquisitionRequest, asset: &AudioAsset) {
        {
            let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            let newer = latest
                .as_ref()
                .is_none_or(|current| asset.sequence() > current.sequence());
            if newer {
                *latest = Some(asset.clone());
            }
        }

        tracing::info!(
            sequence = asset.sequence(),
            provenance = %asset.provenance(),
            bytes = asset.len(),
            elapsed_ms = request.elapsed().as_millis() as u64,
            "Acquisition complete"
        );

        if let Some(sink) = &self.sink
            && let Err(e) = sink.handle(asset)
        {
            tracing::warn!(sink = sink.name(), error = %e, "Asset sink failed");
        }
    }
}

/// Bring remote bytes to canonical WAV.
///
/// Already canonical payloads skip the engine. A payload the engine cannot
/// decode means the proxy handed back no usable audio stream.
async fn normalize_remote(
    engine: &dyn TranscodeEngine,
    reference: &str,
    fetched: Vec<u8>,
) -> Result<Vec<u8>> {
    if wav::is_canonical(&fetched) {
        return Ok(fetched);
    }
    engine.transcode(fetched).await.map_err(|e| match e {
        TranscodeError::EngineInitFailed { .. } => AcquireError::EngineInitFailed(e),
        other => AcquireError::ExtractionFailed(ExtractError::ResolutionFailed {
            reference: reference.to_string(),
            message: format!("no compatible audio stream: {}", other),
        }),
    })
}

/// Resets the phase to `Idle` if an acquisition future is dropped mid-flight.
struct PhaseGuard<'a> {
    coordinator: &'a AcquisitionCoordinator,
    sequence: u64,
    armed: bool,
}

impl<'a> PhaseGuard<'a> {
    fn new(coordinator: &'a AcquisitionCoordinator, sequence: u64) -> Self {
        Self {
            coordinator,
            sequence,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let previous = {
            let mut phase = self.coordinator.lock_phase();
            if phase.sequence() != Some(self.sequence) {
                return;
            }
            self.coordinator.transition(&mut phase, Phase::Idle)
        };
        if let Phase::Processing { cancel, .. } = &previous {
            cancel.cancel();
        }
        tracing::debug!(sequence = self.sequence, "Acquisition dropped before completion");
        drop(previous);
    }
}
