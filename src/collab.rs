//! Downstream collaborators: voice cloning and the live voice session.
//!
//! Only the interface boundary lives here. The bundled implementations are
//! local stand-ins that enforce the credential and device contracts without a
//! network transport.

use crate::asset::AudioAsset;
use crate::audio::device::InputDevice;
use crate::config::{CloneConfig, SessionConfig};
use crate::error::{CloneError, DeviceError, SessionError};
use std::sync::{Arc, Mutex};

/// Voice-transformation service.
#[async_trait::async_trait]
pub trait VoiceCloner: Send + Sync {
    /// Transform `asset` with the configured credential and voice.
    ///
    /// # Errors
    /// `AuthFailed` for a missing or refused credential, `RemoteServiceError`
    /// for any other service failure
    async fn transform(
        &self,
        asset: &AudioAsset,
        config: &CloneConfig,
    ) -> Result<AudioAsset, CloneError>;
}

fn require_credential(api_key: Option<&str>) -> Option<&str> {
    api_key.map(str::trim).filter(|k| !k.is_empty())
}

/// Cloner that returns the input voice unchanged once the credential checks
/// out. Useful offline and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoCloner;

#[async_trait::async_trait]
impl VoiceCloner for EchoCloner {
    async fn transform(
        &self,
        asset: &AudioAsset,
        config: &CloneConfig,
    ) -> Result<AudioAsset, CloneError> {
        if require_credential(config.api_key.as_deref()).is_none() {
            return Err(CloneError::AuthFailed {
                message: "no API key configured".to_string(),
            });
        }
        if asset.is_empty() {
            return Err(CloneError::RemoteServiceError {
                message: "asset has no audio".to_string(),
            });
        }
        tracing::debug!(
            sequence = asset.sequence(),
            voice = config.voice_id.as_deref().unwrap_or("default"),
            "Echo clone"
        );
        Ok(asset.clone())
    }
}

/// Live two-way voice session.
#[async_trait::async_trait]
pub trait VoiceSession: Send + Sync {
    /// Start a session for the configured agent.
    async fn start(&self, config: &SessionConfig) -> Result<(), SessionError>;

    /// End the session. Returns false when none was active.
    async fn stop(&self) -> bool;

    /// Agent of the active session, if any.
    fn active_agent(&self) -> Option<String>;
}

/// Session stand-in that proves the microphone is reachable on start.
///
/// Shares the device capability with the coordinator; the check stream is
/// released before `start` returns.
pub struct DeviceCheckSession {
    device: Arc<dyn InputDevice>,
    active: Mutex<Option<String>>,
}

impl DeviceCheckSession {
    pub fn new(device: Arc<dyn InputDevice>) -> Self {
        Self {
            device,
            active: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl VoiceSession for DeviceCheckSession {
    async fn start(&self, config: &SessionConfig) -> Result<(), SessionError> {
        if let Some(agent_id) = self.active_agent() {
            return Err(SessionError::AlreadyActive { agent_id });
        }
        if require_credential(config.api_key.as_deref()).is_none() {
            return Err(SessionError::AuthFailed {
                message: "no API key configured".to_string(),
            });
        }

        let device = Arc::clone(&self.device);
        let checked = tokio::task::spawn_blocking(move || -> Result<(), DeviceError> {
            let mut stream = device.acquire()?;
            stream.release();
            Ok(())
        })
        .await
        .unwrap_or_else(|e| {
            Err(DeviceError::Stream {
                message: format!("device check task failed: {e}"),
            })
        });
        checked.map_err(SessionError::DeviceUnavailable)?;

        if let Ok(mut active) = self.active.lock() {
            *active = Some(config.agent_id.clone());
        }
        tracing::info!(agent_id = %config.agent_id, "Voice session started");
        Ok(())
    }

    async fn stop(&self) -> bool {
        let previous = self.active.lock().ok().and_then(|mut a| a.take());
        if let Some(agent_id) = &previous {
            tracing::info!(%agent_id, "Voice session ended");
        }
        previous.is_some()
    }

    fn active_agent(&self) -> Option<String> {
        self.active.lock().ok().and_then(|a| a.clone())
    }
}
