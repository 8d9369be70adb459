//! Frame scene description and the pipeline strategies that turn it into pixels.

use crate::animation::FrameClock;
use crate::colors::Theme;
use crate::constants::{GRID_SPACING, LABEL_MIN_ZOOM};
use crate::fog::FogOfWarRenderer;
use crate::icons::IconCache;
use crate::layers::LayeredPipeline;
use crate::{CurrentLocation, LayerData, LocationId, TrailPoint, Viewport, overlays};
use resvg::tiny_skia::Pixmap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Toggles for optional frame stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub show_grid: bool,
    /// World units between grid lines
    pub grid_spacing: f64,
    pub show_labels: bool,
    /// Labels only appear when zoom is strictly greater than this
    pub label_min_zoom: f64,
    pub show_fog: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_grid: true,
            grid_spacing: GRID_SPACING,
            show_labels: true,
            label_min_zoom: LABEL_MIN_ZOOM,
            show_fog: true,
        }
    }
}

/// Everything a pipeline needs to draw one frame. Built fresh by the controller each frame.
pub struct Scene<'a> {
    pub viewport: Viewport,
    pub clock: FrameClock,
    pub theme: &'a Theme,
    pub options: &'a RenderOptions,
    pub layer: &'a LayerData,
    /// Trail points on the active layer, oldest first
    pub trail: Vec<&'a TrailPoint>,
    /// Current location, only when it lies on the active layer
    pub current: Option<&'a CurrentLocation>,
    pub hovered: Option<&'a str>,
    pub selected: Option<&'a str>,
    /// Discovery ring progress per location while its pulse runs
    pub discovery: HashMap<LocationId, f64>,
    /// Fraction of the trail drawn so far
    pub trail_progress: f64,
    /// Progress of the pulse along connections adjacent to the current location
    pub connection_pulse: Option<f64>,
    /// Position in the current-location pulse cycle, `[0, 1)`
    pub current_pulse_phase: f64,
    /// Bumped whenever the snapshot, layer or theme changes
    pub generation: u64,
    /// True while any marker or trail animation is running
    pub markers_animating: bool,
    /// True when the fog must be redrawn this frame
    pub fog_changed: bool,
}

/// A location name the host should paint over the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlacement {
    pub location_id: LocationId,
    pub text: String,
    /// Top-center anchor in surface pixels
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub color: crate::Rgb,
}

/// What a rendered frame contained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub connections: usize,
    pub trail_segments: usize,
    pub locations: usize,
    pub icons: usize,
    pub fallback_icons: usize,
    pub pulsing_connections: usize,
    /// Cached surfaces redrawn this frame (every stage counts for the direct pipeline)
    pub surfaces_redrawn: usize,
    pub labels: Vec<LabelPlacement>,
    pub frame_time: Duration,
}

/// Pipeline strategy selected in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    #[default]
    Direct,
    Layered,
}

impl PipelineKind {
    pub fn build(self) -> Box<dyn RenderPipeline> {
        match self {
            Self::Direct => Box::new(DirectPipeline),
            Self::Layered => Box::new(LayeredPipeline::new()),
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Direct => "direct",
            Self::Layered => "layered",
        })
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "layered" => Ok(Self::Layered),
            other => Err(format!(
                "unknown pipeline '{other}' (expected direct or layered)"
            )),
        }
    }
}

/// A strategy for turning a [`Scene`] into pixels on `target`.
pub trait RenderPipeline {
    fn kind(&self) -> PipelineKind;

    fn render(
        &mut self,
        scene: &Scene<'_>,
        fog: &mut FogOfWarRenderer,
        icons: &IconCache,
        target: &mut Pixmap,
    ) -> FrameReport;

    /// Forgets any cached surfaces.
    fn invalidate(&mut self) {}
}

/// Redraws every stage straight onto the target each frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectPipeline;

impl RenderPipeline for DirectPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Direct
    }

    fn render(
        &mut self,
        scene: &Scene<'_>,
        fog: &mut FogOfWarRenderer,
        icons: &IconCache,
        target: &mut Pixmap,
    ) -> FrameReport {
        let mut canvas = target.as_mut();
        let mut report = FrameReport::default();

        overlays::draw_background(&mut canvas, scene);
        if scene.options.show_grid {
            overlays::draw_grid(&mut canvas, scene);
        }
        report.connections = overlays::draw_connections(&mut canvas, scene);
        report.trail_segments = overlays::draw_trail(&mut canvas, scene);
        let markers = overlays::draw_locations(&mut canvas, scene, icons);
        report.locations = markers.drawn;
        report.icons = markers.icons;
        report.fallback_icons = markers.fallbacks;
        report.labels = markers.labels;
        report.pulsing_connections = overlays::draw_current_highlight(&mut canvas, scene);

        if scene.options.show_fog {
            fog.redraw(scene.layer, &scene.viewport, scene.current, scene.clock.now);
            fog.composite(&mut canvas);
        }
        report.surfaces_redrawn = 4;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_kind_parses() {
        assert_eq!("Layered".parse::<PipelineKind>().unwrap(), PipelineKind::Layered);
        assert!("gpu".parse::<PipelineKind>().is_err());
        assert_eq!(PipelineKind::Direct.build().kind(), PipelineKind::Direct);
        assert_eq!(PipelineKind::Layered.build().kind(), PipelineKind::Layered);
    }
}
