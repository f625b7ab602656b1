//! Real microphone input using CPAL (Cross-Platform Audio Library).

use crate::audio::device::{InputDevice, InputStream};
use crate::audio::wav::{CanonicalConverter, f32_to_i16};
use crate::defaults;
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long to wait for the first data callback before falling back.
const FIRST_CALLBACK_WAIT: Duration = Duration::from_millis(200);

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA messages that occur during audio backend probing.
///
/// # Safety
/// This modifies environment variables which is safe when called before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for PipeWire/PulseAudio desktops.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List available audio input devices with filtering and recommendations.
///
/// Preferred devices are marked with "\[recommended\]"; surround channels,
/// HDMI and similar outputs are dropped.
///
/// # Errors
/// Returns `DeviceError::Stream` if device enumeration fails.
pub fn list_devices() -> Result<Vec<String>, DeviceError> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| DeviceError::Stream {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Resolve an input device by name, or pick the best default.
///
/// Without a name, PipeWire/PulseAudio are preferred over the system default
/// so the desktop's device selection is respected.
fn find_device(device_name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host.input_devices().map_err(|e| DeviceError::Stream {
                message: format!("Failed to enumerate devices: {}", e),
            })?;
            for dev in devices {
                if let Ok(dev_name) = dev.name()
                    && dev_name == name
                {
                    return Ok(dev);
                }
            }
            return Err(DeviceError::NotFound {
                device: name.to_string(),
            });
        }

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| DeviceError::NotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is owned by exactly one `CpalInputStream` and only
/// touched through `&mut self`, never shared between threads.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

type ChunkBuffer = Arc<Mutex<Vec<Vec<i16>>>>;

/// Microphone input through CPAL.
///
/// The device is resolved on every `acquire()`, so a device that appears or
/// disappears between captures is picked up.
#[derive(Debug, Clone, Default)]
pub struct CpalInputDevice {
    device_name: Option<String>,
}

impl CpalInputDevice {
    /// Create a CPAL device handle.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name. If None, uses the best default input device.
    pub fn new(device_name: Option<&str>) -> Self {
        Self {
            device_name: device_name.map(str::to_string),
        }
    }
}

/// Build an input stream in canonical layout.
///
/// Tries in order:
/// 1. i16/44.1kHz/stereo
/// 2. f32/44.1kHz/stereo
/// 3. Device default config with software channel mapping and resampling
fn build_stream(
    device: &cpal::Device,
    chunks: &ChunkBuffer,
    counter: &Arc<AtomicU64>,
) -> Result<cpal::Stream, DeviceError> {
    let preferred_config = cpal::StreamConfig {
        channels: defaults::CHANNELS,
        sample_rate: cpal::SampleRate(defaults::SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_callback = |err| {
        tracing::warn!(error = %err, "Audio stream error");
    };

    let buffer = Arc::clone(chunks);
    let count = Arc::clone(counter);
    if let Ok(stream) = device.build_input_stream(
        &preferred_config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            count.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut buf) = buffer.lock() {
                buf.push(data.to_vec());
            }
        },
        err_callback,
        None,
    ) {
        return Ok(stream);
    }

    let buffer = Arc::clone(chunks);
    let count = Arc::clone(counter);
    if let Ok(stream) = device.build_input_stream(
        &preferred_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            count.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut buf) = buffer.lock() {
                buf.push(f32_to_i16(data));
            }
        },
        err_callback,
        None,
    ) {
        return Ok(stream);
    }

    build_stream_native(device, chunks, counter)
}

/// Build a stream using the device's native config, converting in software.
///
/// Each callback owns one converter for the life of the stream, so
/// interpolation runs across callback boundaries.
fn build_stream_native(
    device: &cpal::Device,
    chunks: &ChunkBuffer,
    counter: &Arc<AtomicU64>,
) -> Result<cpal::Stream, DeviceError> {
    use cpal::SampleFormat;

    let default_config = device
        .default_input_config()
        .map_err(|e| DeviceError::Denied {
            message: format!("Failed to query default input config: {}", e),
        })?;

    let native_rate = default_config.sample_rate().0;
    let native_channels = default_config.channels();
    let stream_config: cpal::StreamConfig = default_config.clone().into();

    tracing::info!(
        channels = native_channels,
        rate = native_rate,
        format = ?default_config.sample_format(),
        "Using native audio format, converting in software"
    );

    let err_callback = |err| {
        tracing::warn!(error = %err, "Audio stream error");
    };

    let buffer = Arc::clone(chunks);
    let count = Arc::clone(counter);

    let built = match default_config.sample_format() {
        SampleFormat::I16 => {
            let mut converter = CanonicalConverter::new(native_channels, native_rate);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    count.fetch_add(1, Ordering::Relaxed);
                    let converted = converter.push(data);
                    if let Ok(mut buf) = buffer.lock() {
                        buf.push(converted);
                    }
                },
                err_callback,
                None,
            )
        }
        SampleFormat::F32 => {
            let mut converter = CanonicalConverter::new(native_channels, native_rate);
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    count.fetch_add(1, Ordering::Relaxed);
                    let converted = converter.push(&f32_to_i16(data));
                    if let Ok(mut buf) = buffer.lock() {
                        buf.push(converted);
                    }
                },
                err_callback,
                None,
            )
        }
        fmt => {
            return Err(DeviceError::Stream {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a device with --device.",
                    fmt
                ),
            });
        }
    };

    built.map_err(|e| DeviceError::Denied {
        message: format!("Failed to build native input stream: {}", e),
    })
}

impl InputDevice for CpalInputDevice {
    fn acquire(&self) -> Result<Box<dyn InputStream>, DeviceError> {
        let device = find_device(self.device_name.as_deref())?;
        let chunks: ChunkBuffer = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicU64::new(0));

        let stream = with_suppressed_stderr(|| build_stream(&device, &chunks, &counter))?;
        stream.play().map_err(|e| DeviceError::Denied {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Some PipeWire-ALSA setups accept non-native configs but never deliver data.
        std::thread::sleep(FIRST_CALLBACK_WAIT);

        let stream = if counter.load(Ordering::Relaxed) == 0 {
            drop(stream);
            if let Ok(mut buf) = chunks.lock() {
                buf.clear();
            }
            let native = build_stream_native(&device, &chunks, &counter)?;
            native.play().map_err(|e| DeviceError::Denied {
                message: format!("Failed to start native audio stream: {}", e),
            })?;
            native
        } else {
            stream
        };

        tracing::debug!(device = %self.name(), "Input stream acquired");

        Ok(Box::new(CpalInputStream {
            stream: Some(SendableStream(stream)),
            chunks,
        }))
    }

    fn name(&self) -> String {
        self.device_name
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }
}

struct CpalInputStream {
    stream: Option<SendableStream>,
    chunks: ChunkBuffer,
}

impl InputStream for CpalInputStream {
    fn take_chunks(&mut self) -> Result<Vec<Vec<i16>>, DeviceError> {
        let mut buffer = self.chunks.lock().map_err(|e| DeviceError::Stream {
            message: format!("Failed to lock audio buffer: {}", e),
        })?;
        Ok(std::mem::take(&mut *buffer))
    }

    fn release(&mut self) {
        if let Some(sendable) = self.stream.take() {
            if let Err(e) = sendable.0.pause() {
                tracing::warn!(error = %e, "Failed to pause input stream before release");
            }
            // dropping the stream closes the device
            drop(sendable);
            tracing::debug!("Input stream released");
        }
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        self.release();
    }
}
