//! Alert State Machine
//!
//! Turns per-frame signal conditions into play/stop effects on the
//! alert sound. Time is passed in by the caller.

use crate::AlertError;
use dms::{AlertLabel, SignalConditions};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Counter of beeps, labelled by trigger kind
pub const ALERTS_TRIGGERED_TOTAL: &str = "dms_alerts_triggered_total";

/// Alert timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertTiming {
    /// Continuous eyes-closed time before the eyes alert fires (default: 1.5s)
    pub eyes_closed_secs: f64,
    /// Time after which a playing alert stops itself (default: 5s)
    pub auto_stop_secs: f64,
}

impl Default for AlertTiming {
    fn default() -> Self {
        Self {
            eyes_closed_secs: 1.5,
            auto_stop_secs: 5.0,
        }
    }
}

impl AlertTiming {
    pub fn eyes_closed_threshold(&self) -> Result<Duration, AlertError> {
        to_duration("eyes_closed_secs", self.eyes_closed_secs)
    }

    pub fn auto_stop(&self) -> Result<Duration, AlertError> {
        to_duration("auto_stop_secs", self.auto_stop_secs)
    }
}

fn to_duration(field: &str, secs: f64) -> Result<Duration, AlertError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| AlertError::InvalidTiming(format!("{} = {}: {}", field, secs, e)))
}

/// Coarse alert phase, used for labelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertPhase {
    #[default]
    Idle,
    EyesMonitoring,
    EyesAlertActive,
    MouthAlertActive,
    NoFaceAlertActive,
}

impl AlertPhase {
    /// Banner for the phase, if it is an active alert
    pub fn label(&self) -> Option<AlertLabel> {
        match self {
            AlertPhase::EyesAlertActive => Some(AlertLabel::EyesClosed),
            AlertPhase::MouthAlertActive => Some(AlertLabel::Yawning),
            AlertPhase::NoFaceAlertActive => Some(AlertLabel::NoFace),
            AlertPhase::Idle | AlertPhase::EyesMonitoring => None,
        }
    }
}

/// Per-session alert state.
///
/// `alert_start_time` is set exactly while `alert_playing` is true.
#[derive(Debug, Clone, Default)]
pub struct AlertState {
    pub phase: AlertPhase,
    pub eyes_closed_since: Option<Instant>,
    pub alert_playing: bool,
    pub alert_start_time: Option<Instant>,
    pub beep_count: u32,
}

/// Side effect on the alert sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEffect {
    Play,
    Stop,
}

/// What fired the trigger procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Eyes,
    Mouth,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Eyes => "eyes",
            AlertKind::Mouth => "mouth",
        }
    }

    fn active_phase(&self) -> AlertPhase {
        match self {
            AlertKind::Eyes => AlertPhase::EyesAlertActive,
            AlertKind::Mouth => AlertPhase::MouthAlertActive,
        }
    }
}

/// Alert state machine for one session
#[derive(Debug)]
pub struct AlertStateMachine {
    eyes_closed_threshold: Duration,
    auto_stop: Duration,
    state: AlertState,
}

impl AlertStateMachine {
    /// Create a machine starting from the default state
    pub fn new(timing: AlertTiming) -> Result<Self, AlertError> {
        let machine = Self {
            eyes_closed_threshold: timing.eyes_closed_threshold()?,
            auto_stop: timing.auto_stop()?,
            state: AlertState::default(),
        };
        info!("Creating alert state machine with timing: {:?}", timing);
        Ok(machine)
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Banner for the current state
    pub fn label(&self) -> Option<AlertLabel> {
        self.state.phase.label()
    }

    /// Discard all state, as at session start
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }

    /// Advance on one frame's conditions, returning the effects in order
    pub fn step(&mut self, conditions: &SignalConditions, now: Instant) -> Vec<AlertEffect> {
        let mut effects = Vec::new();

        if conditions.face_absent {
            self.step_no_face(now, &mut effects);
            return effects;
        }

        // a face is back: the no-face banner no longer applies
        if self.state.phase == AlertPhase::NoFaceAlertActive {
            self.state.phase = AlertPhase::EyesMonitoring;
        }

        if conditions.eyes_closed {
            match self.state.eyes_closed_since {
                None => {
                    self.state.eyes_closed_since = Some(now);
                    if !self.state.alert_playing {
                        self.state.phase = AlertPhase::EyesMonitoring;
                    }
                }
                Some(since) if now.saturating_duration_since(since) >= self.eyes_closed_threshold => {
                    self.trigger(AlertKind::Eyes, now, &mut effects);
                }
                Some(_) => {}
            }
        } else {
            self.state.eyes_closed_since = None;
            if self.state.alert_playing {
                self.stop(&mut effects);
            }
            self.state.phase = AlertPhase::Idle;
        }

        if conditions.yawning {
            self.trigger(AlertKind::Mouth, now, &mut effects);
        }

        effects
    }

    fn step_no_face(&mut self, now: Instant, effects: &mut Vec<AlertEffect>) {
        if self.state.alert_playing {
            self.stop(effects);
            self.state.eyes_closed_since = None;
            self.state.phase = AlertPhase::Idle;
        } else {
            effects.push(AlertEffect::Play);
            self.state.alert_playing = true;
            self.state.alert_start_time = Some(now);
            self.state.phase = AlertPhase::NoFaceAlertActive;
            debug!("No face: alert started");
        }
    }

    /// Play if silent, start the window and count a beep if none is running,
    /// then auto-stop once the window has elapsed.
    ///
    /// A sound started by the no-face branch already holds the window, so a
    /// trigger that lands while it plays is not counted as a beep.
    fn trigger(&mut self, kind: AlertKind, now: Instant, effects: &mut Vec<AlertEffect>) {
        if !self.state.alert_playing {
            effects.push(AlertEffect::Play);
            self.state.alert_playing = true;
        }
        self.state.phase = kind.active_phase();

        let started = match self.state.alert_start_time {
            Some(started) => started,
            None => {
                self.state.alert_start_time = Some(now);
                self.state.beep_count += 1;
                counter!(ALERTS_TRIGGERED_TOTAL, "kind" => kind.as_str()).increment(1);
                info!("{} alert triggered (beep {})", kind.as_str(), self.state.beep_count);
                now
            }
        };

        if now.saturating_duration_since(started) > self.auto_stop {
            debug!("{} alert auto-stopped", kind.as_str());
            self.stop(effects);
            self.state.phase = if self.state.eyes_closed_since.is_some() {
                AlertPhase::EyesMonitoring
            } else {
                AlertPhase::Idle
            };
        }
    }

    fn stop(&mut self, effects: &mut Vec<AlertEffect>) {
        effects.push(AlertEffect::Stop);
        self.state.alert_playing = false;
        self.state.alert_start_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::SignalGate;

    fn machine() -> AlertStateMachine {
        AlertStateMachine::new(AlertTiming::default()).unwrap()
    }

    fn face(eyes_closed: bool, yawning: bool) -> SignalConditions {
        SignalConditions {
            face_absent: false,
            eyes_closed,
            yawning,
        }
    }

    fn assert_invariant(machine: &AlertStateMachine) {
        let state = machine.state();
        assert_eq!(state.alert_start_time.is_some(), state.alert_playing);
    }

    #[test]
    fn test_eyes_alert_needs_threshold_duration() {
        let mut m = machine();
        let t0 = Instant::now();
        let ear = [0.30, 0.30, 0.20, 0.20, 0.20, 0.20];
        let mut fired_at = None;

        for (i, ear) in ear.iter().enumerate() {
            let now = t0 + Duration::from_millis(500 * i as u64);
            let effects = m.step(&face(*ear < 0.25, false), now);
            assert_invariant(&m);
            if effects.contains(&AlertEffect::Play) && fired_at.is_none() {
                fired_at = Some(i);
            }
        }

        // closed from sample 2; 1.5s elapses at sample 5
        assert_eq!(fired_at, Some(5));
        assert_eq!(m.state().beep_count, 1);
        assert_eq!(m.label(), Some(AlertLabel::EyesClosed));
    }

    #[test]
    fn test_eyes_alert_fires_on_third_low_sample() {
        let mut m = machine();
        let t0 = Instant::now();

        assert!(m.step(&face(true, false), t0).is_empty());
        assert_eq!(m.state().phase, AlertPhase::EyesMonitoring);
        assert!(m.step(&face(true, false), t0 + Duration::from_millis(750)).is_empty());
        let effects = m.step(&face(true, false), t0 + Duration::from_millis(1500));
        assert_eq!(effects, vec![AlertEffect::Play]);
        assert!(m.state().alert_playing);
    }

    #[test]
    fn test_open_eyes_reset_the_timer() {
        let mut m = machine();
        let t0 = Instant::now();
        m.step(&face(true, false), t0);
        m.step(&face(false, false), t0 + Duration::from_millis(1000));
        assert!(m.state().eyes_closed_since.is_none());
        m.step(&face(true, false), t0 + Duration::from_millis(1400));
        assert!(m.step(&face(true, false), t0 + Duration::from_millis(2000)).is_empty());
    }

    #[test]
    fn test_no_face_toggles() {
        let mut m = machine();
        let t0 = Instant::now();

        assert_eq!(m.step(&SignalConditions::no_face(), t0), vec![AlertEffect::Play]);
        assert!(m.state().alert_playing);
        assert_eq!(m.label(), Some(AlertLabel::NoFace));
        assert_invariant(&m);

        assert_eq!(
            m.step(&SignalConditions::no_face(), t0 + Duration::from_millis(33)),
            vec![AlertEffect::Stop]
        );
        assert!(!m.state().alert_playing);
        assert_invariant(&m);
        assert_eq!(m.state().beep_count, 0);
    }

    #[test]
    fn test_face_returning_clears_no_face_banner() {
        let mut m = machine();
        let t0 = Instant::now();
        m.step(&SignalConditions::no_face(), t0);
        assert_eq!(m.label(), Some(AlertLabel::NoFace));

        let effects = m.step(&face(true, false), t0 + Duration::from_millis(33));
        assert!(effects.is_empty());
        assert!(m.state().alert_playing);
        assert_eq!(m.state().phase, AlertPhase::EyesMonitoring);
        assert_eq!(m.label(), None);
        assert_invariant(&m);
    }

    #[test]
    fn test_trigger_during_no_face_sound_is_not_counted() {
        let mut m = machine();
        let t0 = Instant::now();
        m.step(&SignalConditions::no_face(), t0);
        m.step(&face(true, false), t0 + Duration::from_millis(100));

        let effects = m.step(&face(true, false), t0 + Duration::from_millis(1600));
        assert!(effects.is_empty());
        assert_eq!(m.label(), Some(AlertLabel::EyesClosed));
        assert_eq!(m.state().beep_count, 0);

        // the no-face window runs out and the next trigger counts
        assert_eq!(
            m.step(&face(true, false), t0 + Duration::from_millis(5100)),
            vec![AlertEffect::Stop]
        );
        assert_eq!(
            m.step(&face(true, false), t0 + Duration::from_millis(5200)),
            vec![AlertEffect::Play]
        );
        assert_eq!(m.state().beep_count, 1);
    }

    #[test]
    fn test_gate_yawn_at_085_with_open_eyes() {
        let gate = SignalGate::default();
        let mut m = machine();

        let conditions = gate.evaluate(1, 0.30, 0.85);
        assert!(conditions.yawning);
        assert!(!conditions.eyes_closed);

        assert_eq!(m.step(&conditions, Instant::now()), vec![AlertEffect::Play]);
        assert_eq!(m.state().beep_count, 1);
        assert_eq!(m.label(), Some(AlertLabel::Yawning));
        assert_invariant(&m);
    }

    #[test]
    fn test_yawn_with_open_eyes() {
        let mut m = machine();
        let t0 = Instant::now();

        assert_eq!(m.step(&face(false, true), t0), vec![AlertEffect::Play]);
        assert_eq!(m.state().beep_count, 1);
        assert_eq!(m.label(), Some(AlertLabel::Yawning));

        // eye branch stops the sound, then the yawn restarts it
        let effects = m.step(&face(false, true), t0 + Duration::from_millis(100));
        assert_eq!(effects, vec![AlertEffect::Stop, AlertEffect::Play]);
        assert_eq!(m.state().beep_count, 2);
        assert_invariant(&m);
    }

    #[test]
    fn test_auto_stop_after_window() {
        let mut m = machine();
        let t0 = Instant::now();
        m.step(&face(true, false), t0);
        m.step(&face(true, false), t0 + Duration::from_secs(2));
        assert!(m.state().alert_playing);

        assert!(m.step(&face(true, false), t0 + Duration::from_secs(7)).is_empty());
        let effects = m.step(&face(true, false), t0 + Duration::from_millis(7100));
        assert_eq!(effects, vec![AlertEffect::Stop]);
        assert!(!m.state().alert_playing);
        assert_eq!(m.state().phase, AlertPhase::EyesMonitoring);
        assert_invariant(&m);

        // still closed: next frame restarts the alert with a new beep
        let effects = m.step(&face(true, false), t0 + Duration::from_millis(7200));
        assert_eq!(effects, vec![AlertEffect::Play]);
        assert_eq!(m.state().beep_count, 2);
    }

    #[test]
    fn test_invariant_over_mixed_sequence() {
        let mut m = machine();
        let t0 = Instant::now();
        let frames = [
            SignalConditions::no_face(),
            face(true, false),
            face(true, true),
            SignalConditions::no_face(),
            SignalConditions::no_face(),
            face(false, false),
            face(true, false),
            face(true, true),
            face(false, true),
        ];
        for (i, conditions) in frames.iter().enumerate() {
            m.step(conditions, t0 + Duration::from_millis(400 * i as u64));
            assert_invariant(&m);
        }
    }

    #[test]
    fn test_reset_and_invalid_timing() {
        let mut m = machine();
        m.step(&face(false, true), Instant::now());
        m.reset();
        assert_eq!(m.state().beep_count, 0);
        assert!(!m.state().alert_playing);

        let timing = AlertTiming {
            auto_stop_secs: -1.0,
            ..Default::default()
        };
        assert!(matches!(AlertStateMachine::new(timing), Err(AlertError::InvalidTiming(_))));
    }

    #[test]
    fn test_timing_partial_config() {
        let timing: AlertTiming = serde_json::from_str(r#"{"eyes_closed_secs": 2.0}"#).unwrap();
        assert_eq!(timing.eyes_closed_threshold().unwrap(), Duration::from_secs(2));
        assert_eq!(timing.auto_stop().unwrap(), Duration::from_secs(5));
    }
}
