//! Viewer configuration loaded from JSON.
//!
//! Every field is optional in the file; missing values take the defaults
//! of the built-in reveal effect.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::reconstruction::{ContainerPolicy, MeshingParameters};
use crate::reveal::timeline::{DEFAULT_KEYFRAMES, DEFAULT_PERIOD};
use crate::reveal::{Keyframe, RevealTimeline, RotationCurve, SurfaceVisibility, TimelineError};
use crate::sequence::DEFAULT_FRAME_INTERVAL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid reveal timeline: {0}")]
    Timeline(#[from] TimelineError),
    #[error("invalid playback interval: {0}")]
    InvalidInterval(f64),
}

/// Reveal effect settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub keyframes: Vec<Keyframe>,
    pub period: f32,
    pub rotation: RotationCurve,
    pub visibility: SurfaceVisibility,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            keyframes: DEFAULT_KEYFRAMES.to_vec(),
            period: DEFAULT_PERIOD,
            rotation: RotationCurve::default(),
            visibility: SurfaceVisibility::default(),
        }
    }
}

impl RevealConfig {
    pub fn build_timeline(&self) -> Result<RevealTimeline, TimelineError> {
        RevealTimeline::new(self.keyframes.clone(), self.period, self.rotation)
    }
}

/// Sequence playback settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Pause after each frame load, in seconds.
    pub frame_interval_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_interval_secs: DEFAULT_FRAME_INTERVAL.as_secs_f64(),
        }
    }
}

impl PlaybackConfig {
    pub fn frame_interval(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.frame_interval_secs)
            .map_err(|_| ConfigError::InvalidInterval(self.frame_interval_secs))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub reveal: RevealConfig,
    pub meshing: MeshingParameters,
    pub playback: PlaybackConfig,
    pub container_policy: ContainerPolicy,
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading viewer config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check the parts that are not validated at use: the timeline and the
    /// playback interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reveal.build_timeline()?;
        self.playback.frame_interval()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruction::ColoringStrategy;

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.reveal.keyframes.len(), 5);
        assert_eq!(config.reveal.period, 8.0);
        assert_eq!(config.reveal.visibility.frequency, 450.0);
        assert_eq!(config.meshing.resolution, 4);
        assert_eq!(config.container_policy, ContainerPolicy::ReplacePrevious);
        assert!((config.playback.frame_interval_secs - 1.0 / 60.0).abs() < 1e-4);
        assert_eq!(
            config.reveal.build_timeline().unwrap(),
            RevealTimeline::default()
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ViewerConfig::from_json_str(
            r#"{
                "meshing": { "resolution": 2, "coloring_strategy": "vertex_color" },
                "container_policy": "accumulate"
            }"#,
        )
        .unwrap();
        assert_eq!(config.meshing.resolution, 2);
        assert_eq!(config.meshing.smoothness, 1);
        assert_eq!(config.meshing.coloring_strategy, ColoringStrategy::VertexColor);
        assert_eq!(config.container_policy, ContainerPolicy::Accumulate);
        assert_eq!(config.reveal, RevealConfig::default());
    }

    #[test]
    fn test_custom_timeline() {
        let config = ViewerConfig::from_json_str(
            r#"{
                "reveal": {
                    "keyframes": [
                        { "time": 0.0, "value": 0.0 },
                        { "time": 2.0, "value": 1.0 }
                    ],
                    "period": 3.0,
                    "rotation": { "duration": 2.0, "repeat": false }
                }
            }"#,
        )
        .unwrap();
        let timeline = config.reveal.build_timeline().unwrap();
        assert_eq!(timeline.reveal_at(1.0), 0.5);
        assert_eq!(timeline.full_reveal_time(), Some(2.0));
    }

    #[test]
    fn test_invalid_timeline_rejected() {
        let result = ViewerConfig::from_json_str(
            r#"{ "reveal": { "keyframes": [{ "time": 1.0, "value": 0.0 }] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Timeline(_))));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let result = ViewerConfig::from_json_str(r#"{ "playback": { "frame_interval_secs": -1.0 } }"#);
        assert!(matches!(result, Err(ConfigError::InvalidInterval(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ViewerConfig::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
