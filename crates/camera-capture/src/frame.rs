//! Video frame types and processing

use crate::CameraError;
use image::{imageops, RgbImage};

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since the source opened)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u64,
}

/// Single-channel frame handed to face detection and landmark prediction
#[derive(Debug, Clone)]
pub struct GrayFrame {
    /// Luminance data (width * height)
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ns: u64,
    pub sequence: u64,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded image
    pub fn from_image(image: RgbImage, timestamp_ns: u64, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Borrow the pixels as an `image` buffer
    pub fn to_image(&self) -> Result<RgbImage, CameraError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            CameraError::Format(format!(
                "{} bytes do not fill a {}x{} RGB frame",
                self.data.len(),
                self.width,
                self.height
            ))
        })
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Resize to `width`, deriving the height from the aspect ratio
    pub fn resize_to_width(&self, width: u32) -> Result<VideoFrame, CameraError> {
        if self.width == 0 || self.height == 0 || width == 0 {
            return Err(CameraError::Format(format!(
                "cannot resize {}x{} frame to width {}",
                self.width, self.height, width
            )));
        }
        if self.width == width {
            return Ok(self.clone());
        }

        let ratio = f64::from(width) / f64::from(self.width);
        let height = ((f64::from(self.height) * ratio) as u32).max(1);
        let resized = imageops::resize(&self.to_image()?, width, height, imageops::FilterType::Triangle);

        Ok(VideoFrame::from_image(resized, self.timestamp_ns, self.sequence))
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> GrayFrame {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        GrayFrame {
            data: gray,
            width: self.width,
            height: self.height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }
}

impl GrayFrame {
    /// Get luminance at (x, y)
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }
}
