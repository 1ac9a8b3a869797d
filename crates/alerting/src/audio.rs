//! Alert sound playback

use crate::machine::AlertEffect;
use crate::AlertError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// A loaded RIFF/WAVE alert sound
#[derive(Debug, Clone)]
pub struct SoundAsset {
    path: PathBuf,
    data: Arc<[u8]>,
}

impl SoundAsset {
    /// Load and check a WAV file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AlertError> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path).map_err(|e| AlertError::AssetLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(path, data)
    }

    pub fn from_bytes(path: PathBuf, data: Vec<u8>) -> Result<Self, AlertError> {
        if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
            return Err(AlertError::AssetLoad {
                path,
                reason: "not a RIFF/WAVE file".into(),
            });
        }
        info!("Loaded alert sound {} ({} bytes)", path.display(), data.len());
        Ok(Self {
            path,
            data: data.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Output device for the alert sound. Both calls must be idempotent.
pub trait AudioSink: Send {
    fn play(&mut self, asset: &SoundAsset) -> Result<(), AlertError>;
    fn stop(&mut self, asset: &SoundAsset) -> Result<(), AlertError>;
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn play(&mut self, asset: &SoundAsset) -> Result<(), AlertError> {
        (**self).play(asset)
    }

    fn stop(&mut self, asset: &SoundAsset) -> Result<(), AlertError> {
        (**self).stop(asset)
    }
}

/// Sink that only logs, for headless runs
#[derive(Debug, Default)]
pub struct LogSink {
    playing: bool,
}

impl AudioSink for LogSink {
    fn play(&mut self, asset: &SoundAsset) -> Result<(), AlertError> {
        if !self.playing {
            warn!("ALERT: playing {}", asset.path().display());
            self.playing = true;
        }
        Ok(())
    }

    fn stop(&mut self, asset: &SoundAsset) -> Result<(), AlertError> {
        if self.playing {
            info!("Alert stopped: {}", asset.path().display());
            self.playing = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Play,
    Stop,
}

/// Sink that records every call; clones share the log
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn push(&self, event: SinkEvent) -> Result<(), AlertError> {
        self.events
            .lock()
            .map_err(|e| AlertError::Playback(e.to_string()))?
            .push(event);
        Ok(())
    }
}

impl AudioSink for RecordingSink {
    fn play(&mut self, _asset: &SoundAsset) -> Result<(), AlertError> {
        self.push(SinkEvent::Play)
    }

    fn stop(&mut self, _asset: &SoundAsset) -> Result<(), AlertError> {
        self.push(SinkEvent::Stop)
    }
}

/// Applies state machine effects to a sink, in order
pub struct AlertPlayer<S: AudioSink> {
    sink: S,
    asset: SoundAsset,
}

impl<S: AudioSink> AlertPlayer<S> {
    pub fn new(sink: S, asset: SoundAsset) -> Self {
        Self { sink, asset }
    }

    pub fn apply(&mut self, effects: &[AlertEffect]) -> Result<(), AlertError> {
        for effect in effects {
            debug!("Applying alert effect {:?}", effect);
            match effect {
                AlertEffect::Play => self.sink.play(&self.asset)?,
                AlertEffect::Stop => self.sink.stop(&self.asset)?,
            }
        }
        Ok(())
    }

    /// Silence the sink, e.g. at session end
    pub fn silence(&mut self) -> Result<(), AlertError> {
        self.sink.stop(&self.asset)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
