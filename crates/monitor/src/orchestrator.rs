//! Frame Loop Orchestrator
//!
//! One tick: acquire, resize, grayscale, detect, then per face landmarks,
//! ratios, head pose, gating and the alert state machine; finally the
//! telemetry is rendered. The loop polls the session signal between ticks.

use crate::render::TelemetrySink;
use crate::session::SessionSignal;
use crate::settings::MonitorSettings;
use crate::MonitorError;
use alerting::{AlertPlayer, AlertStateMachine, AudioSink, SoundAsset};
use camera_capture::{Capture, FrameSource};
use chrono::{DateTime, Local};
use dms::telemetry::FaceTelemetry;
use dms::{
    CameraModel, DmsError, FaceDetector, FrameTelemetry, HeadPoseEstimator, LandmarkPredictor, PoseModel,
    RatioFunctions, SignalConditions, SignalGate,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Pluggable per-frame collaborators
pub struct Collaborators {
    pub detector: Box<dyn FaceDetector>,
    pub predictor: Box<dyn LandmarkPredictor>,
    pub ratios: RatioFunctions,
    pub audio: Box<dyn AudioSink>,
    pub telemetry: Box<dyn TelemetrySink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ExitReason {
    #[default]
    LoggedOut,
    SourceFailed,
    Failed,
}

/// Counters for one session
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionSummary {
    pub frames_processed: u64,
    pub no_face_frames: u64,
    pub pose_failures: u64,
    pub beep_count: u32,
    pub exit_reason: ExitReason,
}

/// The per-session frame loop. Owns the capture; dropping it releases the source.
pub struct FrameLoop<S: FrameSource> {
    capture: Capture<S>,
    detector: Box<dyn FaceDetector>,
    predictor: Box<dyn LandmarkPredictor>,
    ratios: RatioFunctions,
    gate: SignalGate,
    estimator: Option<HeadPoseEstimator>,
    machine: AlertStateMachine,
    player: AlertPlayer<Box<dyn AudioSink>>,
    telemetry: Box<dyn TelemetrySink>,
    canonical_width: u32,
    camera: Option<CameraModel>,
    summary: SessionSummary,
}

impl<S: FrameSource> FrameLoop<S> {
    pub fn new(
        capture: Capture<S>,
        parts: Collaborators,
        sound: SoundAsset,
        settings: &MonitorSettings,
    ) -> Result<Self, MonitorError> {
        settings.validate()?;
        let estimator = settings
            .dms
            .enable_pose
            .then(|| HeadPoseEstimator::new(PoseModel::canonical(), settings.dms.solver()));

        Ok(Self {
            capture,
            detector: parts.detector,
            predictor: parts.predictor,
            ratios: parts.ratios,
            gate: SignalGate::new(settings.dms.thresholds()),
            estimator,
            machine: AlertStateMachine::new(settings.alert)?,
            player: AlertPlayer::new(parts.audio, sound),
            telemetry: parts.telemetry,
            canonical_width: settings.capture.canonical_width,
            camera: None,
            summary: SessionSummary::default(),
        })
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn machine(&self) -> &AlertStateMachine {
        &self.machine
    }

    fn camera_for(&mut self, width: u32, height: u32) -> CameraModel {
        match self.camera {
            Some(camera) if camera.matches(width, height) => camera,
            _ => {
                let camera = CameraModel::for_frame(width, height);
                debug!("Camera model for {}x{}: f = {}", width, height, camera.focal_length);
                self.camera = Some(camera);
                camera
            }
        }
    }

    /// Process one frame
    pub fn tick(&mut self, now: Instant, wall_clock: DateTime<Local>) -> Result<FrameTelemetry, MonitorError> {
        let frame = self.capture.read()?;
        let frame = frame.resize_to_width(self.canonical_width)?;
        let gray = frame.to_grayscale();

        let faces = self.detector.detect(&gray)?;
        let camera = self.camera_for(frame.width, frame.height);
        let mut telemetry = FrameTelemetry::new(frame.sequence, frame.width, frame.height, wall_clock);

        if faces.is_empty() {
            self.summary.no_face_frames += 1;
            crate::metrics::record_no_face();
            let effects = self.machine.step(&SignalConditions::no_face(), now);
            self.player.apply(&effects)?;
        }

        for face in &faces {
            let landmarks = match self.predictor.predict(&gray, face) {
                Ok(landmarks) => landmarks,
                Err(e) => {
                    warn!("Frame {}: landmark prediction failed: {}", frame.sequence, e);
                    continue;
                }
            };

            let ear = self.ratios.ear(&landmarks);
            let mar = self.ratios.mar(&landmarks);

            let pose = match &self.estimator {
                Some(estimator) => match estimator.estimate_with_camera(&landmarks.pose_points(), &camera) {
                    Ok(pose) => Some(pose),
                    Err(e) => {
                        warn!("Frame {}: {}", frame.sequence, e);
                        self.summary.pose_failures += 1;
                        crate::metrics::record_pose_failure(match e {
                            DmsError::NumericalInstability { .. } => "numerical_instability",
                            _ => "solver",
                        });
                        None
                    }
                },
                None => None,
            };

            let conditions = self.gate.evaluate(faces.len(), ear, mar);
            let effects = self.machine.step(&conditions, now);
            self.player.apply(&effects)?;

            debug!(
                "Frame {}: EAR {:.3} MAR {:.3} {:?} -> {:?}",
                frame.sequence, ear, mar, conditions, effects
            );
            telemetry
                .faces
                .push(FaceTelemetry::new(*face, &landmarks, ear, mar, pose.as_ref()));
        }

        let state = self.machine.state();
        telemetry.alert = self.machine.label();
        telemetry.alert_playing = state.alert_playing;
        telemetry.beep_count = state.beep_count;

        self.telemetry.render(&frame, &telemetry)?;

        self.summary.frames_processed += 1;
        self.summary.beep_count = state.beep_count;
        crate::metrics::record_frame();
        Ok(telemetry)
    }

    /// Run until logout or a fatal error
    pub fn run(&mut self, signal: &SessionSignal) -> Result<SessionSummary, MonitorError> {
        info!("Frame loop started (canonical width {})", self.canonical_width);

        let result = loop {
            if !signal.is_active() {
                self.summary.exit_reason = ExitReason::LoggedOut;
                break Ok(());
            }
            match self.tick(Instant::now(), Local::now()) {
                Ok(_) => {}
                Err(e) => {
                    self.summary.exit_reason = match e {
                        MonitorError::VideoSource(_) => ExitReason::SourceFailed,
                        _ => ExitReason::Failed,
                    };
                    error!("Frame loop stopped: {}", e);
                    break Err(e);
                }
            }
        };

        if let Err(e) = self.player.silence() {
            warn!("Failed to silence alert: {}", e);
        }
        info!(
            "Frame loop ended after {} frames ({} beeps, {} pose failures)",
            self.summary.frames_processed, self.summary.beep_count, self.summary.pose_failures
        );
        result.map(|_| self.summary.clone())
    }
}
