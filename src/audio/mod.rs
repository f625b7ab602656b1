//! Audio input and canonical WAV handling.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod device;
pub mod session;
pub mod wav;

pub use device::{InputDevice, InputStream, MockInputDevice};
pub use session::CaptureSession;
