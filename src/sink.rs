use crate::asset::AudioAsset;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Pluggable receiver for finished assets.
///
/// The coordinator calls `handle` once per successful acquisition, after the
/// asset has become the latest one. Failures are logged, never turned into
/// acquisition failures.
pub trait AssetSink: Send + Sync {
    /// Handle one finished asset.
    fn handle(&self, asset: &AudioAsset) -> std::io::Result<()>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

impl<T: AssetSink + ?Sized> AssetSink for Arc<T> {
    fn handle(&self, asset: &AudioAsset) -> std::io::Result<()> {
        (**self).handle(asset)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Collects assets in memory. Clones share the collection.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    collected: Arc<Mutex<Vec<AudioAsset>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assets received so far, in delivery order.
    pub fn assets(&self) -> Vec<AudioAsset> {
        self.collected
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Sequence numbers received so far.
    pub fn sequences(&self) -> Vec<u64> {
        self.assets().iter().map(AudioAsset::sequence).collect()
    }
}

impl AssetSink for CollectorSink {
    fn handle(&self, asset: &AudioAsset) -> std::io::Result<()> {
        let mut collected = self
            .collected
            .lock()
            .map_err(|e| std::io::Error::other(format!("collector poisoned: {e}")))?;
        collected.push(asset.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Writes each asset's bytes to one file, replacing earlier contents.
///
/// Parent directories are created on first write.
#[derive(Debug, Clone)]
pub struct WavFileSink {
    path: PathBuf,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AssetSink for WavFileSink {
    fn handle(&self, asset: &AudioAsset) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, asset.bytes())?;
        tracing::debug!(
            path = %self.path.display(),
            bytes = asset.len(),
            "Asset written"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "wav-file"
    }
}
