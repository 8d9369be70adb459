//! Engine configuration, read from a RON file.

use crate::colors::Theme;
use crate::constants::{
    CONNECTION_PULSE_MS, DISCOVERY_PULSE_MS, HIT_RADIUS, TARGET_FPS, TRAIL_ANIMATION_MS,
    WHEEL_ZOOM_STEP, ZOOM_MAX, ZOOM_MIN,
};
use crate::fog::FogPreset;
use crate::render::{PipelineKind, RenderOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Ron {
        path: PathBuf,
        source: ron::de::SpannedError,
    },
}

/// Every tunable of the minimap engine. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimapConfig {
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Fractional zoom change per wheel notch
    pub wheel_zoom_step: f64,
    pub target_fps: f64,
    pub render: RenderOptions,
    /// Hit-test radius in screen pixels
    pub hit_radius: f64,
    pub fog_preset: FogPreset,
    pub pipeline: PipelineKind,
    pub performance_monitor: bool,
    pub discovery_pulse_ms: u64,
    pub connection_pulse_ms: u64,
    pub trail_animation_ms: u64,
    /// Keep the camera inside the active layer's bounds
    pub clamp_to_world: bool,
    /// World units of slack around the layer bounds when clamping
    pub world_padding: f64,
    pub theme: Theme,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            zoom_min: ZOOM_MIN,
            zoom_max: ZOOM_MAX,
            wheel_zoom_step: WHEEL_ZOOM_STEP,
            target_fps: TARGET_FPS,
            render: RenderOptions::default(),
            hit_radius: HIT_RADIUS,
            fog_preset: FogPreset::default(),
            pipeline: PipelineKind::default(),
            performance_monitor: true,
            discovery_pulse_ms: DISCOVERY_PULSE_MS,
            connection_pulse_ms: CONNECTION_PULSE_MS,
            trail_animation_ms: TRAIL_ANIMATION_MS,
            clamp_to_world: false,
            world_padding: 100.0,
            theme: Theme::default(),
        }
    }
}

impl MinimapConfig {
    pub fn parse(text: &str) -> Result<Self, ron::de::SpannedError> {
        let mut config: Self = ron::from_str(text)?;
        config.sanitize();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Ron {
            path: path.to_owned(),
            source,
        })
    }

    /// Default location of the config file, `<config dir>/minimap/config.ron`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("minimap").join("config.ron"))
    }

    /// Loads `explicit` if given, otherwise the default path if it exists.
    ///
    /// An explicit path that fails to load is an error; a broken default file only logs
    /// a warning and falls back to defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            log::info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        let Some(path) = Self::default_path().filter(|p| p.is_file()) else {
            log::debug!("No config file found, using defaults");
            return Ok(Self::default());
        };
        match Self::load(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(err) => {
                log::warn!("{err}, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Repairs values that would break the engine's numeric invariants.
    pub(crate) fn sanitize(&mut self) {
        let defaults = Self::default();
        if !(self.zoom_min.is_finite() && self.zoom_min > 0.0) {
            self.zoom_min = defaults.zoom_min;
        }
        if !(self.zoom_max.is_finite() && self.zoom_max >= self.zoom_min) {
            self.zoom_max = self.zoom_min.max(defaults.zoom_max);
        }
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            self.target_fps = defaults.target_fps;
        }
        if !(self.wheel_zoom_step.is_finite() && (0.0..1.0).contains(&self.wheel_zoom_step)) {
            self.wheel_zoom_step = defaults.wheel_zoom_step;
        }
        if !(self.hit_radius.is_finite() && self.hit_radius >= 0.0) {
            self.hit_radius = defaults.hit_radius;
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.target_fps)
            .unwrap_or_else(|_| Duration::from_secs_f64(1.0 / TARGET_FPS))
    }

    pub fn discovery_pulse(&self) -> Duration {
        Duration::from_millis(self.discovery_pulse_ms)
    }

    pub fn connection_pulse(&self) -> Duration {
        Duration::from_millis(self.connection_pulse_ms)
    }

    pub fn trail_animation(&self) -> Duration {
        Duration::from_millis(self.trail_animation_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocationType, Rgb};

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(MinimapConfig::parse("()").unwrap(), MinimapConfig::default());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config = MinimapConfig::parse(
            r##"(
                fog_preset: mystical,
                pipeline: layered,
                render: (show_grid: false),
                theme: (
                    background: "#000000",
                    location_types: { cave: "#abc" },
                ),
            )"##,
        )
        .unwrap();
        assert_eq!(config.fog_preset, FogPreset::Mystical);
        assert_eq!(config.pipeline, PipelineKind::Layered);
        assert!(!config.render.show_grid);
        assert!(config.render.show_labels);
        assert_eq!(config.theme.background, Rgb::new(0, 0, 0));
        assert_eq!(
            config.theme.location_color(LocationType::Cave),
            Rgb::new(0xaa, 0xbb, 0xcc)
        );
        assert_eq!(config.zoom_max, ZOOM_MAX);
    }

    #[test]
    fn bad_numbers_are_repaired() {
        let config =
            MinimapConfig::parse("(zoom_min: 0.0, target_fps: -1.0, wheel_zoom_step: 3.0)")
                .unwrap();
        assert_eq!(config.zoom_min, ZOOM_MIN);
        assert_eq!(config.target_fps, TARGET_FPS);
        assert_eq!(config.wheel_zoom_step, WHEEL_ZOOM_STEP);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = MinimapConfig::load_or_default(Some(Path::new("/nonexistent/minimap.ron")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn frame_interval_matches_fps() {
        let config = MinimapConfig::default();
        let interval = config.frame_interval();
        assert!((interval.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn frame_interval_survives_zero_fps() {
        let config = MinimapConfig {
            target_fps: 0.0,
            ..MinimapConfig::default()
        };
        let interval = config.frame_interval();
        assert!((interval.as_secs_f64() - 1.0 / TARGET_FPS).abs() < 1e-9);
    }
}
