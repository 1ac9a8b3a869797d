//! Recorded frame sequence read from a directory of images

use crate::{CameraError, FrameSource, VideoFrame};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Frame source that replays image files in lexical order
pub struct ImageSequenceSource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    cursor: usize,
    open: bool,
    opened_at: Instant,
}

impl ImageSequenceSource {
    /// Open a directory of frames
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(CameraError::Open(format!("no frames found in {}", dir.display())));
        }

        info!("Opened frame sequence {} ({} frames)", dir.display(), frames.len());
        Ok(Self {
            dir,
            frames,
            cursor: 0,
            open: true,
            opened_at: Instant::now(),
        })
    }

    /// Number of frames in the sequence
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        let Some(path) = self.frames.get(self.cursor) else {
            return Err(CameraError::NoFrame);
        };

        let image = image::open(path)
            .map_err(|e| {
                warn!("Failed to decode {}: {}", path.display(), e);
                CameraError::Read(format!("{}: {}", path.display(), e))
            })?
            .to_rgb8();

        let sequence = self.cursor as u64;
        self.cursor += 1;
        debug!("Read frame {} from {}", sequence, path.display());

        let timestamp_ns = u64::try_from(self.opened_at.elapsed().as_nanos()).unwrap_or(u64::MAX);
        Ok(VideoFrame::from_image(image, timestamp_ns, sequence))
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}
