//! Frame source abstraction and scope-bound capture handle

use crate::{CameraError, VideoFrame};
use tracing::{debug, info};

/// Anything that yields raw color frames on request.
///
/// `read_frame` may block until the next frame is available.
pub trait FrameSource: Send {
    /// Read the next frame
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Release the underlying device; must be safe to call more than once
    fn release(&mut self);

    /// Whether the source is open and can deliver frames
    fn is_open(&self) -> bool;

    /// Human-readable description for logs
    fn describe(&self) -> String {
        "frame source".to_string()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        (**self).read_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Open capture with RAII release
pub struct Capture<S: FrameSource> {
    source: S,
    frames_read: u64,
}

impl<S: FrameSource> Capture<S> {
    /// Take ownership of an opened source
    pub fn open(source: S) -> Result<Self, CameraError> {
        if !source.is_open() {
            return Err(CameraError::NotInitialized);
        }
        info!("Capture opened on {}", source.describe());
        Ok(Self {
            source,
            frames_read: 0,
        })
    }

    /// Read the next frame (blocking)
    pub fn read(&mut self) -> Result<VideoFrame, CameraError> {
        let frame = self.source.read_frame()?;
        self.frames_read += 1;
        Ok(frame)
    }

    /// Number of frames delivered so far
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl<S: FrameSource> Drop for Capture<S> {
    fn drop(&mut self) {
        debug!("Releasing capture after {} frames", self.frames_read);
        self.source.release();
        info!("Capture released on {}", self.source.describe());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        remaining: u32,
        open: bool,
        releases: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            if self.remaining == 0 {
                return Err(CameraError::NoFrame);
            }
            self.remaining -= 1;
            Ok(VideoFrame::new(vec![0; 3], 1, 1, 0, u64::from(self.remaining)))
        }

        fn release(&mut self) {
            self.open = false;
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    #[test]
    fn test_capture_releases_on_drop() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let mut capture = Capture::open(CountingSource {
                remaining: 2,
                open: true,
                releases: releases.clone(),
            })
            .unwrap();
            capture.read().unwrap();
            capture.read().unwrap();
            assert!(matches!(capture.read(), Err(CameraError::NoFrame)));
            assert_eq!(capture.frames_read(), 2);
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capture_rejects_closed_source() {
        let releases = Arc::new(AtomicUsize::new(0));
        let result = Capture::open(CountingSource {
            remaining: 1,
            open: false,
            releases: releases.clone(),
        });
        assert!(matches!(result, Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_boxed_source_forwards() {
        let releases = Arc::new(AtomicUsize::new(0));
        let boxed: Box<dyn FrameSource> = Box::new(CountingSource {
            remaining: 1,
            open: true,
            releases: releases.clone(),
        });
        let mut capture = Capture::open(boxed).unwrap();
        assert!(capture.read().is_ok());
        drop(capture);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
