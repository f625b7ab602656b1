//! Live capture session.
//!
//! Holds one input stream, pumps its chunks into an in-memory buffer on a
//! background task, and finalizes everything into canonical WAV on close.

use crate::audio::device::{InputDevice, InputStream};
use crate::audio::wav;
use crate::error::{DeviceError, WavError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound on reads during the final drain, so a device that keeps
/// producing cannot hold `close()` open.
const MAX_DRAIN_READS: usize = 64;

type SharedStream = Arc<Mutex<Option<Box<dyn InputStream>>>>;

#[derive(Debug, Default)]
struct CaptureBuffer {
    samples: Vec<i16>,
    chunks: usize,
}

/// One live capture, from `open()` to `close()`.
pub struct CaptureSession {
    stream: SharedStream,
    buffer: Arc<Mutex<CaptureBuffer>>,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Acquire a stream from `device` and start buffering.
    ///
    /// Blocks while the device is negotiated; call from the blocking pool
    /// in async contexts. Must run inside a tokio runtime.
    ///
    /// # Errors
    /// Returns the device's error when no stream could be obtained.
    pub fn open(device: &dyn InputDevice, pump_interval: Duration) -> Result<Self, DeviceError> {
        let stream = device.acquire()?;
        Ok(Self::start(stream, pump_interval))
    }

    /// Start buffering from an already acquired stream.
    pub fn start(stream: Box<dyn InputStream>, pump_interval: Duration) -> Self {
        let stream: SharedStream = Arc::new(Mutex::new(Some(stream)));
        let buffer = Arc::new(Mutex::new(CaptureBuffer::default()));
        let cancel = CancellationToken::new();

        let pump = tokio::spawn(pump_loop(
            Arc::clone(&stream),
            Arc::clone(&buffer),
            cancel.clone(),
            pump_interval,
        ));

        tracing::debug!(interval_ms = pump_interval.as_millis() as u64, "Capture session opened");

        Self {
            stream,
            buffer,
            cancel,
            pump: Some(pump),
        }
    }

    /// Move whatever the stream delivered so far into the buffer.
    ///
    /// # Returns
    /// Number of chunks moved
    pub fn pump(&self) -> Result<usize, DeviceError> {
        pump_once(&self.stream, &self.buffer)
    }

    /// Number of samples buffered so far (interleaved, both channels).
    pub fn buffered_samples(&self) -> usize {
        self.buffer.lock().map(|b| b.samples.len()).unwrap_or(0)
    }

    /// Number of chunks received so far.
    pub fn chunk_count(&self) -> usize {
        self.buffer.lock().map(|b| b.chunks).unwrap_or(0)
    }

    /// Stop the stream, release the device and return the buffered audio as
    /// canonical WAV.
    ///
    /// The device is released on every path. Zero buffered chunks yield a
    /// valid header-only WAV.
    pub async fn close(mut self) -> Result<Vec<u8>, WavError> {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take()
            && let Err(e) = pump.await
        {
            tracing::warn!(error = %e, "Capture pump task ended abnormally");
        }

        for _ in 0..MAX_DRAIN_READS {
            match pump_once(&self.stream, &self.buffer) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Final capture read failed");
                    break;
                }
            }
        }
        self.release();

        let buffer = self
            .buffer
            .lock()
            .map(|mut b| std::mem::take(&mut *b))
            .unwrap_or_default();

        tracing::debug!(
            chunks = buffer.chunks,
            samples = buffer.samples.len(),
            "Capture session closed"
        );
        wav::encode_canonical(&buffer.samples)
    }

    /// Stop buffering and release the device without producing audio.
    pub fn discard(mut self) {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.release();
        tracing::debug!("Capture session discarded");
    }

    fn release(&self) {
        match self.stream.lock() {
            Ok(mut slot) => {
                if let Some(mut stream) = slot.take() {
                    stream.release();
                }
            }
            Err(poisoned) => {
                if let Some(mut stream) = poisoned.into_inner().take() {
                    stream.release();
                }
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.release();
    }
}

fn pump_once(
    stream: &SharedStream,
    buffer: &Arc<Mutex<CaptureBuffer>>,
) -> Result<usize, DeviceError> {
    let chunks = {
        let mut slot = stream.lock().map_err(|e| DeviceError::Stream {
            message: format!("Failed to lock input stream: {}", e),
        })?;
        match slot.as_mut() {
            Some(stream) => stream.take_chunks()?,
            None => return Ok(0),
        }
    };

    if chunks.is_empty() {
        return Ok(0);
    }

    let mut buffer = buffer.lock().map_err(|e| DeviceError::Stream {
        message: format!("Failed to lock capture buffer: {}", e),
    })?;
    let count = chunks.len();
    for chunk in chunks {
        buffer.samples.extend_from_slice(&chunk);
    }
    buffer.chunks += count;
    Ok(count)
}

async fn pump_loop(
    stream: SharedStream,
    buffer: Arc<Mutex<CaptureBuffer>>,
    cancel: CancellationToken,
    interval: Duration,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        if let Err(e) = pump_once(&stream, &buffer) {
            tracing::warn!(error = %e, "Capture read failed, stopping pump");
            break;
        }
    }
}
