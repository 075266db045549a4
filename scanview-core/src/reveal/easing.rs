//! Easing curves for transform animations.

use serde::{Deserialize, Serialize};

/// Timing curve applied to a normalized animation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    /// Cubic smoothstep: zero velocity at both ends.
    #[default]
    EaseInEaseOut,
}

impl Easing {
    /// Map `phase` in `[0, 1]` to eased progress in `[0, 1]`. Values outside
    /// the unit interval are clamped.
    pub fn apply(self, phase: f32) -> f32 {
        let x = phase.clamp(0.0, 1.0);
        match self {
            Easing::Linear => x,
            Easing::EaseInEaseOut => x * x * (3.0 - 2.0 * x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        for easing in [Easing::Linear, Easing::EaseInEaseOut] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert_eq!(easing.apply(-2.0), 0.0);
            assert_eq!(easing.apply(3.0), 1.0);
        }
    }

    #[test]
    fn test_ease_in_ease_out_has_flat_ends() {
        let h = 1e-3;
        let start_slope = Easing::EaseInEaseOut.apply(h) / h;
        let end_slope = (1.0 - Easing::EaseInEaseOut.apply(1.0 - h)) / h;
        assert!(start_slope < 0.01);
        assert!(end_slope < 0.01);
        assert!((Easing::EaseInEaseOut.apply(0.5) - 0.5).abs() < 1e-6);
    }
}
