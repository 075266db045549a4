//! Per-node reveal animation state.

use std::sync::Arc;

use super::timeline::{RevealSample, RevealTimeline};

/// Elapsed time and last sampled values for one animating node.
///
/// Owned by the node it animates and only touched from the presentation
/// thread, so it carries no synchronization of its own.
#[derive(Debug, Clone)]
pub struct RevealState {
    timeline: Arc<RevealTimeline>,
    elapsed: f64,
    sample: RevealSample,
}

impl RevealState {
    /// Start a timeline at elapsed time 0.
    pub fn new(timeline: Arc<RevealTimeline>) -> Self {
        let sample = timeline.sample(0.0);
        Self {
            timeline,
            elapsed: 0.0,
            sample,
        }
    }

    /// Advance by `dt` seconds and resample. Non-positive or non-finite steps
    /// leave the clock where it is, so elapsed time never runs backwards.
    pub fn advance(&mut self, dt: f64) -> RevealSample {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }
        self.sample = self.timeline.sample(self.elapsed);
        self.sample
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn reveal_parameter(&self) -> f32 {
        self.sample.reveal
    }

    pub fn rotation_angle(&self) -> f32 {
        self.sample.rotation
    }

    pub fn sample(&self) -> RevealSample {
        self.sample
    }

    pub fn timeline(&self) -> &RevealTimeline {
        &self.timeline
    }
}
