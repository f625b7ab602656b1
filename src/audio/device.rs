use crate::error::DeviceError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A live audio input stream handed out by an [`InputDevice`].
///
/// Samples are interleaved 16-bit PCM in canonical layout (44.1kHz stereo).
pub trait InputStream: Send {
    /// Take the chunks delivered since the last call, in arrival order.
    ///
    /// # Returns
    /// Possibly empty list of arbitrarily-sized chunks, or an error
    fn take_chunks(&mut self) -> Result<Vec<Vec<i16>>, DeviceError>;

    /// Stop the stream and give the device back.
    ///
    /// Must be idempotent; called on every close path.
    fn release(&mut self);
}

/// Device capability: hands out live input streams.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait InputDevice: Send + Sync {
    /// Open a live input stream.
    ///
    /// # Errors
    /// `DeviceError::Denied` when access is refused, `NotFound` when the
    /// device is missing.
    fn acquire(&self) -> Result<Box<dyn InputStream>, DeviceError>;

    /// Human-readable device name.
    fn name(&self) -> String {
        "input".to_string()
    }
}

impl<T: InputDevice + ?Sized> InputDevice for Arc<T> {
    fn acquire(&self) -> Result<Box<dyn InputStream>, DeviceError> {
        (**self).acquire()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Mock input device for testing.
///
/// Clones share state, so a test can keep one handle while the coordinator
/// owns another, push chunks into an open stream, and observe releases.
#[derive(Debug, Clone, Default)]
pub struct MockInputDevice {
    pending: Arc<Mutex<VecDeque<Vec<i16>>>>,
    denied: Option<String>,
    fail_reads: bool,
    acquisitions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    open: Arc<AtomicBool>,
}

impl MockInputDevice {
    /// Create a mock device with no queued audio
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue chunks that an open stream will deliver, one per read
    pub fn with_chunks(self, chunks: Vec<Vec<i16>>) -> Self {
        if let Ok(mut pending) = self.pending.lock() {
            pending.extend(chunks);
        }
        self
    }

    /// Configure the mock to refuse access
    pub fn with_denied(mut self, message: &str) -> Self {
        self.denied = Some(message.to_string());
        self
    }

    /// Configure open streams to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Deliver another chunk to the (current or next) stream
    pub fn push_chunk(&self, chunk: Vec<i16>) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(chunk);
        }
    }

    /// Number of successful acquisitions
    pub fn acquire_count(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of releases
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Whether a stream is currently held
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl InputDevice for MockInputDevice {
    fn acquire(&self) -> Result<Box<dyn InputStream>, DeviceError> {
        if let Some(message) = &self.denied {
            return Err(DeviceError::Denied {
                message: message.clone(),
            });
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        Ok(Box::new(MockInputStream {
            device: self.clone(),
            released: false,
        }))
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

struct MockInputStream {
    device: MockInputDevice,
    released: bool,
}

impl InputStream for MockInputStream {
    fn take_chunks(&mut self) -> Result<Vec<Vec<i16>>, DeviceError> {
        if self.device.fail_reads {
            return Err(DeviceError::Stream {
                message: "mock read failure".to_string(),
            });
        }
        if self.released {
            return Ok(Vec::new());
        }
        let mut pending = self.device.pending.lock().map_err(|e| DeviceError::Stream {
            message: format!("Failed to lock mock buffer: {e}"),
        })?;
        Ok(pending.pop_front().into_iter().collect())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.device.releases.fetch_add(1, Ordering::SeqCst);
            self.device.open.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for MockInputStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_delivers_chunks_in_order_one_per_read() {
        let device = MockInputDevice::new().with_chunks(vec![vec![1, 2], vec![3, 4, 5, 6]]);
        let mut stream = device.acquire().unwrap();

        assert_eq!(stream.take_chunks().unwrap(), vec![vec![1, 2]]);
        assert_eq!(stream.take_chunks().unwrap(), vec![vec![3, 4, 5, 6]]);
        assert!(stream.take_chunks().unwrap().is_empty());
    }

    #[test]
    fn test_mock_denied_does_not_open() {
        let device = MockInputDevice::new().with_denied("permission denied");

        match device.acquire() {
            Err(DeviceError::Denied { message }) => assert_eq!(message, "permission denied"),
            _ => panic!("Expected Denied error"),
        }
        assert_eq!(device.acquire_count(), 0);
        assert!(!device.is_open());
    }

    #[test]
    fn test_mock_release_is_idempotent() {
        let device = MockInputDevice::new();
        let mut stream = device.acquire().unwrap();
        assert!(device.is_open());

        stream.release();
        stream.release();

        assert!(!device.is_open());
        assert_eq!(device.release_count(), 1);
    }

    #[test]
    fn test_mock_push_chunk_reaches_open_stream() {
        let device = MockInputDevice::new();
        let handle = device.clone();
        let mut stream = device.acquire().unwrap();

        handle.push_chunk(vec![7, 8]);

        assert_eq!(stream.take_chunks().unwrap(), vec![vec![7, 8]]);
    }

    #[test]
    fn test_mock_read_failure() {
        let device = MockInputDevice::new().with_read_failure();
        let mut stream = device.acquire().unwrap();

        assert!(matches!(
            stream.take_chunks(),
            Err(DeviceError::Stream { .. })
        ));
    }

    #[test]
    fn test_input_device_trait_is_object_safe() {
        let device: Arc<dyn InputDevice> = Arc::new(MockInputDevice::new());
        assert_eq!(device.name(), "mock");
        let mut stream = device.acquire().unwrap();
        stream.release();
    }
}
