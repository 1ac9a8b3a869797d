//! Telemetry renderers

use crate::MonitorError;
use camera_capture::VideoFrame;
use dms::FrameTelemetry;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const FACE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const POSE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const POSE_ALT_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
const ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Alert banner height in pixels
const BANNER_HEIGHT: u32 = 12;

/// Consumer of per-frame telemetry
pub trait TelemetrySink: Send {
    fn render(&mut self, frame: &VideoFrame, telemetry: &FrameTelemetry) -> Result<(), MonitorError>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn render(&mut self, frame: &VideoFrame, telemetry: &FrameTelemetry) -> Result<(), MonitorError> {
        (**self).render(frame, telemetry)
    }
}

/// Renders to every sink in order
impl TelemetrySink for Vec<Box<dyn TelemetrySink>> {
    fn render(&mut self, frame: &VideoFrame, telemetry: &FrameTelemetry) -> Result<(), MonitorError> {
        for sink in self.iter_mut() {
            sink.render(frame, telemetry)?;
        }
        Ok(())
    }
}

/// One JSON document per frame
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::BufWriter<std::fs::File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(std::io::BufWriter::new(file)))
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesSink<W> {
    fn render(&mut self, _frame: &VideoFrame, telemetry: &FrameTelemetry) -> Result<(), MonitorError> {
        serde_json::to_writer(&mut self.writer, telemetry).map_err(|e| MonitorError::Render(e.to_string()))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Draws the overlay onto each frame and saves it as PNG
pub struct OverlayWriter {
    dir: PathBuf,
}

impl OverlayWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, MonitorError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn frame_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", sequence))
    }
}

impl TelemetrySink for OverlayWriter {
    fn render(&mut self, frame: &VideoFrame, telemetry: &FrameTelemetry) -> Result<(), MonitorError> {
        let mut image = frame.to_image()?;
        draw_overlay(&mut image, telemetry);

        let path = self.frame_path(telemetry.sequence);
        image
            .save(&path)
            .map_err(|e| MonitorError::Render(format!("{}: {}", path.display(), e)))?;
        debug!("Wrote overlay {}", path.display());
        Ok(())
    }
}

/// Face boxes, landmark dots, pose lines and the alert banner
pub fn draw_overlay(image: &mut RgbImage, telemetry: &FrameTelemetry) {
    for face in &telemetry.faces {
        let (left, top, right, bottom) = face.bbox.corners();
        let width = (right - left).max(1) as u32;
        let height = (bottom - top).max(1) as u32;
        draw_hollow_rect_mut(image, Rect::at(left, top).of_size(width, height), FACE_COLOR);

        for &(x, y) in &face.landmarks {
            draw_filled_circle_mut(image, (x, y), 1, LANDMARK_COLOR);
        }

        if let Some(pose) = &face.pose {
            let start = (pose.start.0 as f32, pose.start.1 as f32);
            draw_line_segment_mut(image, start, (pose.end.0 as f32, pose.end.1 as f32), POSE_COLOR);
            draw_line_segment_mut(image, start, (pose.end_alt.0 as f32, pose.end_alt.1 as f32), POSE_ALT_COLOR);
        }
    }

    if telemetry.has_alerts() && image.width() > 0 {
        let height = BANNER_HEIGHT.min(image.height()).max(1);
        draw_filled_rect_mut(image, Rect::at(0, 0).of_size(image.width(), height), ALERT_COLOR);
    }
}
