//! Frame loop metrics.

use metrics::counter;

/// Metric name constants.
pub mod names {
    /// Frames that completed a full tick.
    pub const FRAMES_PROCESSED_TOTAL: &str = "dms_frames_processed_total";

    /// Faces whose head pose could not be estimated, by reason.
    pub const POSE_FAILURES_TOTAL: &str = "dms_pose_failures_total";

    /// Frames with no detected face.
    pub const NO_FACE_FRAMES_TOTAL: &str = "dms_no_face_frames_total";

    pub use alerting::ALERTS_TRIGGERED_TOTAL;
}

pub fn record_frame() {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(1);
}

pub fn record_pose_failure(reason: &'static str) {
    counter!(names::POSE_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn record_no_face() {
    counter!(names::NO_FACE_FRAMES_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::FRAMES_PROCESSED_TOTAL.starts_with("dms_"));
        assert!(names::POSE_FAILURES_TOTAL.contains("pose"));
        assert!(names::NO_FACE_FRAMES_TOTAL.contains("no_face"));
        assert!(names::ALERTS_TRIGGERED_TOTAL.contains("alerts"));
    }
}
