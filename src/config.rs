use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub transcode: TranscodeConfig,
    pub remote: RemoteConfig,
    pub clone: CloneConfig,
    pub session: SessionConfig,
}

/// Microphone capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: Option<String>,
    pub pump_interval_ms: u64,
}

/// Transcoding engine selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process demux/decode
    Symphonia,
    /// External ffmpeg binary
    Ffmpeg,
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symphonia" => Ok(Self::Symphonia),
            "ffmpeg" => Ok(Self::Ffmpeg),
            other => Err(format!(
                "unknown transcoding engine '{other}' (expected symphonia or ffmpeg)"
            )),
        }
    }
}

/// Transcoding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscodeConfig {
    pub engine: EngineKind,
    pub ffmpeg_path: String,
}

/// Remote extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub proxy_url: String,
    pub timeout_secs: u64,
    pub max_bytes: u64,
}

/// Voice-cloning collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CloneConfig {
    pub api_key: Option<String>,
    pub voice_id: Option<String>,
}

/// Live voice session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub agent_id: String,
    pub api_key: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            pump_interval_ms: defaults::CAPTURE_PUMP_INTERVAL_MS,
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Symphonia,
            ffmpeg_path: defaults::FFMPEG_BINARY.to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            proxy_url: defaults::REMOTE_PROXY_URL.to_string(),
            timeout_secs: defaults::REMOTE_TIMEOUT_SECS,
            max_bytes: defaults::REMOTE_MAX_BYTES,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_id: defaults::DEFAULT_AGENT_ID.to_string(),
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only a missing file yields defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXCLIP_DEVICE → capture.device
    /// - VOXCLIP_ENGINE → transcode.engine (ignored when unknown)
    /// - VOXCLIP_FFMPEG → transcode.ffmpeg_path
    /// - VOXCLIP_PROXY_URL → remote.proxy_url
    /// - VOXCLIP_API_KEY → clone.api_key and session.api_key
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("VOXCLIP_DEVICE")
            && !device.is_empty()
        {
            self.capture.device = Some(device);
        }

        if let Ok(engine) = std::env::var("VOXCLIP_ENGINE")
            && let Ok(kind) = engine.parse::<EngineKind>()
        {
            self.transcode.engine = kind;
        }

        if let Ok(path) = std::env::var("VOXCLIP_FFMPEG")
            && !path.is_empty()
        {
            self.transcode.ffmpeg_path = path;
        }

        if let Ok(url) = std::env::var("VOXCLIP_PROXY_URL")
            && !url.is_empty()
        {
            self.remote.proxy_url = url;
        }

        if let Ok(key) = std::env::var("VOXCLIP_API_KEY")
            && !key.is_empty()
        {
            self.clone.api_key = Some(key.clone());
            self.session.api_key = Some(key);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxclip/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("voxclip")
            .join("config.toml")
    }

    /// Serialize to TOML with credentials replaced by a placeholder.
    pub fn to_redacted_toml(&self) -> anyhow::Result<String> {
        let mut redacted = self.clone();
        for key in [&mut redacted.clone.api_key, &mut redacted.session.api_key] {
            if key.is_some() {
                *key = Some("<redacted>".to_string());
            }
        }
        Ok(toml::to_string_pretty(&redacted)?)
    }
}
