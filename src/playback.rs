//! Playback state for the most recent asset.
//!
//! Tracks only whether the loaded asset is playing. Rendering audio belongs
//! to the presentation layer, which reports the natural end of an asset back
//! through [`PlaybackMonitor::finished`].

use crate::asset::AudioAsset;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing { sequence: u64 },
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Playing { sequence } => write!(f, "playing #{}", sequence),
        }
    }
}

/// Play/pause toggle bound to one loaded asset.
///
/// Independent of the acquisition state machine.
pub struct PlaybackMonitor {
    loaded: Mutex<Option<u64>>,
    state_tx: watch::Sender<PlaybackState>,
}

impl Default for PlaybackMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackMonitor {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            loaded: Mutex::new(None),
            state_tx,
        }
    }

    /// Load `asset` into the playback surface. Always resets to idle.
    pub fn load(&self, asset: &AudioAsset) {
        *self.loaded.lock().unwrap_or_else(PoisonError::into_inner) = Some(asset.sequence());
        self.set(PlaybackState::Idle);
        tracing::debug!(sequence = asset.sequence(), "Playback asset loaded");
    }

    /// Flip between idle and playing. With nothing loaded, stays idle.
    pub fn toggle(&self) -> PlaybackState {
        let loaded = *self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        let next = match (loaded, self.state()) {
            (None, _) => PlaybackState::Idle,
            (Some(_), PlaybackState::Playing { .. }) => PlaybackState::Idle,
            (Some(sequence), PlaybackState::Idle) => PlaybackState::Playing { sequence },
        };
        self.set(next);
        next
    }

    /// The asset with `sequence` reached its natural end.
    ///
    /// Ignored unless that asset is the one currently playing.
    pub fn finished(&self, sequence: u64) {
        if self.state() == (PlaybackState::Playing { sequence }) {
            self.set(PlaybackState::Idle);
        } else {
            tracing::debug!(sequence, "Ignoring stale playback end");
        }
    }

    /// Stop playback without unloading.
    pub fn stop(&self) {
        self.set(PlaybackState::Idle);
    }

    pub fn state(&self) -> PlaybackState {
        *self.state_tx.borrow()
    }

    /// Sequence number of the loaded asset.
    pub fn loaded(&self) -> Option<u64> {
        *self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    fn set(&self, next: PlaybackState) {
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
