//! Face detection and landmarks replayed from recorded annotations
//!
//! Each line of the annotation file is one frame:
//! `{"sequence": 12, "faces": [{"bbox": {...}, "landmarks": [{"x": .., "y": ..}, ...]}]}`.
//! Frames without a line have no face.

use crate::MonitorError;
use camera_capture::GrayFrame;
use dms::{DmsError, FaceBbox, FaceDetector, LandmarkPredictor, LandmarkSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedFace {
    pub bbox: FaceBbox,
    pub landmarks: LandmarkSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedFrame {
    pub sequence: u64,
    #[serde(default)]
    pub faces: Vec<AnnotatedFace>,
}

/// Annotations indexed by frame sequence
#[derive(Debug, Default)]
pub struct AnnotationReplay {
    frames: HashMap<u64, Vec<AnnotatedFace>>,
}

impl AnnotationReplay {
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>, MonitorError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| MonitorError::Annotation(format!("{}: {}", path.display(), e)))?;
        let replay = Self::from_reader(std::io::BufReader::new(file))?;
        info!("Loaded annotations for {} frames from {}", replay.len(), path.display());
        Ok(Arc::new(replay))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self, MonitorError> {
        let mut frames = HashMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: AnnotatedFrame = serde_json::from_str(&line)
                .map_err(|e| MonitorError::Annotation(format!("line {}: {}", idx + 1, e)))?;
            frames.insert(frame.sequence, frame.faces);
        }
        Ok(Self { frames })
    }

    pub fn from_frames(frames: impl IntoIterator<Item = AnnotatedFrame>) -> Self {
        Self {
            frames: frames.into_iter().map(|f| (f.sequence, f.faces)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn faces(&self, sequence: u64) -> &[AnnotatedFace] {
        self.frames.get(&sequence).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn detector(self: &Arc<Self>) -> ReplayDetector {
        ReplayDetector(Arc::clone(self))
    }

    pub fn predictor(self: &Arc<Self>) -> ReplayPredictor {
        ReplayPredictor(Arc::clone(self))
    }
}

pub struct ReplayDetector(Arc<AnnotationReplay>);

impl FaceDetector for ReplayDetector {
    fn detect(&mut self, frame: &GrayFrame) -> Result<Vec<FaceBbox>, DmsError> {
        Ok(self.0.faces(frame.sequence).iter().map(|f| f.bbox).collect())
    }
}

pub struct ReplayPredictor(Arc<AnnotationReplay>);

impl LandmarkPredictor for ReplayPredictor {
    fn predict(&mut self, frame: &GrayFrame, face: &FaceBbox) -> Result<LandmarkSet, DmsError> {
        self.0
            .faces(frame.sequence)
            .iter()
            .find(|f| f.bbox == *face)
            .map(|f| f.landmarks.clone())
            .ok_or_else(|| {
                DmsError::Detection(format!("no landmarks recorded for face in frame {}", frame.sequence))
            })
    }
}
