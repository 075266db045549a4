//! Looping reveal timeline.
//!
//! The timeline is a free-running modulo clock: elapsed time is wrapped by the
//! period and the wrapped value is looked up in a piecewise-linear keyframe
//! curve. The default curve creeps in slowly, then sweeps to full reveal:
//!
//! | elapsed     | t           |
//! |-------------|-------------|
//! | 0.0 – 0.2   | 0.0 → 0.1   |
//! | 0.2 – 3.5   | 0.1 → 0.3   |
//! | 3.5 – 4.5   | 0.3 → 1.0   |
//! | 4.5 – 8.0   | 1.0         |
//!
//! Rotation runs on its own clock: one full turn per `duration`, eased.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use thiserror::Error;

use super::easing::Easing;

pub const DEFAULT_PERIOD: f32 = 8.0;
pub const DEFAULT_ROTATION_DURATION: f32 = 4.5;

/// Errors produced when building a timeline from user configuration.
#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("timeline needs at least one keyframe")]
    Empty,

    #[error("first keyframe must be at time 0, found {0}")]
    FirstKeyframeNotAtZero(f32),

    #[error("keyframe times must be strictly increasing (index {0})")]
    UnorderedKeyframes(usize),

    #[error("keyframe values must be non-decreasing within [0, 1] (index {0})")]
    InvalidValue(usize),

    #[error("keyframe at {time} lies outside the period {period}")]
    KeyframeOutsidePeriod { time: f32, period: f32 },

    #[error("duration must be positive and finite, got {0}")]
    InvalidDuration(f32),
}

/// A point on the reveal curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
}

impl Keyframe {
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Default reveal curve.
pub const DEFAULT_KEYFRAMES: [Keyframe; 5] = [
    Keyframe::new(0.0, 0.0),
    Keyframe::new(0.2, 0.1),
    Keyframe::new(3.5, 0.3),
    Keyframe::new(4.5, 1.0),
    Keyframe::new(7.0, 1.0),
];

/// Eased rotation about the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationCurve {
    /// Time for one full turn.
    pub duration: f32,
    pub easing: Easing,
    /// Start a new turn after each completed one instead of stopping.
    pub repeat: bool,
}

impl Default for RotationCurve {
    fn default() -> Self {
        Self {
            duration: DEFAULT_ROTATION_DURATION,
            easing: Easing::EaseInEaseOut,
            repeat: true,
        }
    }
}

impl RotationCurve {
    /// Rotation angle in radians, in `[0, 2π]`.
    pub fn angle_at(&self, elapsed: f64) -> f32 {
        let elapsed = elapsed.max(0.0);
        let duration = self.duration as f64;
        let phase = if self.repeat {
            elapsed.rem_euclid(duration) / duration
        } else {
            (elapsed / duration).min(1.0)
        };
        TAU * self.easing.apply(phase as f32)
    }
}

/// One sample of the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealSample {
    /// Reveal parameter `t` in `[0, 1]`.
    pub reveal: f32,
    /// Rotation angle about +Y in radians.
    pub rotation: f32,
}

/// Keyframed reveal curve plus rotation, looping with a fixed period.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealTimeline {
    keyframes: Vec<Keyframe>,
    period: f32,
    rotation: RotationCurve,
}

impl Default for RevealTimeline {
    fn default() -> Self {
        Self {
            keyframes: DEFAULT_KEYFRAMES.to_vec(),
            period: DEFAULT_PERIOD,
            rotation: RotationCurve::default(),
        }
    }
}

impl RevealTimeline {
    /// Build a timeline, validating that the curve starts at 0, is ordered,
    /// never decreases and fits inside the period.
    pub fn new(
        keyframes: Vec<Keyframe>,
        period: f32,
        rotation: RotationCurve,
    ) -> Result<Self, TimelineError> {
        if !(period.is_finite() && period > 0.0) {
            return Err(TimelineError::InvalidDuration(period));
        }
        if !(rotation.duration.is_finite() && rotation.duration > 0.0) {
            return Err(TimelineError::InvalidDuration(rotation.duration));
        }

        let first = keyframes.first().ok_or(TimelineError::Empty)?;
        if first.time != 0.0 {
            return Err(TimelineError::FirstKeyframeNotAtZero(first.time));
        }

        let mut previous: Option<&Keyframe> = None;
        for (i, key) in keyframes.iter().enumerate() {
            if !(0.0..=1.0).contains(&key.value) {
                return Err(TimelineError::InvalidValue(i));
            }
            if key.time >= period {
                return Err(TimelineError::KeyframeOutsidePeriod {
                    time: key.time,
                    period,
                });
            }
            if let Some(prev) = previous {
                if key.time <= prev.time {
                    return Err(TimelineError::UnorderedKeyframes(i));
                }
                if key.value < prev.value {
                    return Err(TimelineError::InvalidValue(i));
                }
            }
            previous = Some(key);
        }

        Ok(Self {
            keyframes,
            period,
            rotation,
        })
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn period(&self) -> f32 {
        self.period
    }

    pub fn rotation(&self) -> &RotationCurve {
        &self.rotation
    }

    /// Reveal parameter for the given elapsed time since activation.
    pub fn reveal_at(&self, elapsed: f64) -> f32 {
        let local = elapsed.max(0.0).rem_euclid(self.period as f64) as f32;

        // Index of the last keyframe at or before `local`. The first keyframe
        // sits at 0, so there is always one.
        let idx = self
            .keyframes
            .partition_point(|k| k.time <= local)
            .saturating_sub(1);
        let start = self.keyframes[idx];

        match self.keyframes.get(idx + 1) {
            Some(end) => {
                let span = end.time - start.time;
                start.value + (end.value - start.value) * (local - start.time) / span
            }
            None => start.value,
        }
    }

    /// Rotation angle for the given elapsed time since activation.
    pub fn rotation_at(&self, elapsed: f64) -> f32 {
        self.rotation.angle_at(elapsed)
    }

    pub fn sample(&self, elapsed: f64) -> RevealSample {
        RevealSample {
            reveal: self.reveal_at(elapsed),
            rotation: self.rotation_at(elapsed),
        }
    }

    /// First time at which the curve reaches a full reveal, if it does.
    pub fn full_reveal_time(&self) -> Option<f32> {
        self.keyframes
            .iter()
            .find(|k| k.value >= 1.0)
            .map(|k| k.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keyframe_values() {
        let timeline = RevealTimeline::default();
        assert_eq!(timeline.reveal_at(0.0), 0.0);
        assert_eq!(timeline.reveal_at(0.2), 0.1);
        assert_eq!(timeline.reveal_at(3.5), 0.3);
        assert_eq!(timeline.reveal_at(4.5), 1.0);
    }

    #[test]
    fn test_ramp_midpoints() {
        let timeline = RevealTimeline::default();
        assert!((timeline.reveal_at(0.1) - 0.05).abs() < 1e-6);
        assert!((timeline.reveal_at(1.85) - 0.2).abs() < 1e-6);
        assert!((timeline.reveal_at(4.0) - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_held_after_full_reveal() {
        let timeline = RevealTimeline::default();
        let mut e = 4.5;
        while e < 8.0 {
            assert_eq!(timeline.reveal_at(e), 1.0, "at {}", e);
            e += 0.05;
        }
        assert_eq!(timeline.reveal_at(7.0), 1.0);
        assert_eq!(timeline.reveal_at(7.999), 1.0);
    }

    #[test]
    fn test_wraps_at_period() {
        let timeline = RevealTimeline::default();
        assert_eq!(timeline.reveal_at(8.0), 0.0);
        assert_eq!(timeline.reveal_at(8.2), timeline.reveal_at(0.2));
        assert_eq!(timeline.reveal_at(16.0 + 3.5), 0.3);
    }

    #[test]
    fn test_monotonic_within_period() {
        let timeline = RevealTimeline::default();
        let mut previous = timeline.reveal_at(0.0);
        for step in 1..800 {
            let t = timeline.reveal_at(step as f64 * 0.01);
            assert!(t >= previous, "decreased at step {}", step);
            assert!((0.0..=1.0).contains(&t));
            previous = t;
        }
    }

    #[test]
    fn test_negative_elapsed_clamps_to_start() {
        let timeline = RevealTimeline::default();
        assert_eq!(timeline.reveal_at(-3.0), 0.0);
        assert_eq!(timeline.rotation_at(-3.0), 0.0);
    }

    #[test]
    fn test_rotation_full_turn() {
        let timeline = RevealTimeline::default();
        assert_eq!(timeline.rotation_at(0.0), 0.0);
        assert!((timeline.rotation_at(2.25) - TAU * 0.5).abs() < 1e-5);
        assert!((timeline.rotation_at(4.4999) - TAU).abs() < 1e-3);
        // Next turn starts from zero again.
        assert!(timeline.rotation_at(4.5) < 1e-5);
    }

    #[test]
    fn test_rotation_eases_at_ends() {
        let timeline = RevealTimeline::default();
        let h = 1e-3;
        let start_velocity = timeline.rotation_at(h) / h as f32;
        let end_velocity = (TAU - timeline.rotation_at(4.5 - h)) / h as f32;
        assert!(start_velocity < 0.05);
        assert!(end_velocity < 0.05);
    }

    #[test]
    fn test_rotation_without_repeat_holds() {
        let rotation = RotationCurve {
            repeat: false,
            ..RotationCurve::default()
        };
        assert_eq!(rotation.angle_at(4.5), TAU);
        assert_eq!(rotation.angle_at(20.0), TAU);
    }

    #[test]
    fn test_full_reveal_time() {
        assert_eq!(RevealTimeline::default().full_reveal_time(), Some(4.5));
    }

    #[test]
    fn test_new_validates_keyframes() {
        let rotation = RotationCurve::default();
        assert_eq!(
            RevealTimeline::new(Vec::new(), 8.0, rotation),
            Err(TimelineError::Empty)
        );
        assert_eq!(
            RevealTimeline::new(vec![Keyframe::new(0.5, 0.0)], 8.0, rotation),
            Err(TimelineError::FirstKeyframeNotAtZero(0.5))
        );
        assert_eq!(
            RevealTimeline::new(
                vec![Keyframe::new(0.0, 0.0), Keyframe::new(0.0, 0.5)],
                8.0,
                rotation
            ),
            Err(TimelineError::UnorderedKeyframes(1))
        );
        assert_eq!(
            RevealTimeline::new(
                vec![Keyframe::new(0.0, 0.5), Keyframe::new(1.0, 0.2)],
                8.0,
                rotation
            ),
            Err(TimelineError::InvalidValue(1))
        );
        assert_eq!(
            RevealTimeline::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(9.0, 1.0)], 8.0, rotation),
            Err(TimelineError::KeyframeOutsidePeriod {
                time: 9.0,
                period: 8.0
            })
        );
        assert_eq!(
            RevealTimeline::new(DEFAULT_KEYFRAMES.to_vec(), 0.0, rotation),
            Err(TimelineError::InvalidDuration(0.0))
        );
    }

    #[test]
    fn test_new_accepts_defaults() {
        let timeline =
            RevealTimeline::new(DEFAULT_KEYFRAMES.to_vec(), DEFAULT_PERIOD, RotationCurve::default())
                .unwrap();
        assert_eq!(timeline, RevealTimeline::default());
    }
}
