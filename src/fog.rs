//! Fog of war: a dark overlay with soft holes punched where the player has explored.

use crate::animation::{Easing, FrameClock};
use crate::colors::Rgb;
use crate::coordinates::world_to_screen;
use crate::{Coordinates, CurrentLocation, LayerData, LocationId, Viewport};
use resvg::tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, Paint, PathBuilder, Pixmap, PixmapMut, PixmapPaint,
    Point, RadialGradient, SpreadMode, Transform,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Ring radius multipliers paired with the opacity erased at their center.
const RINGS: [(f64, f32); 5] = [(1.2, 0.15), (1.0, 0.3), (0.8, 0.5), (0.6, 0.75), (0.4, 1.0)];

/// The current location always clears at least this fraction of the reveal radius.
const CURRENT_LOCATION_REVEAL: f64 = 0.5;

/// Tuning parameters for the fog overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FogConfig {
    /// Overlay alpha where nothing has been explored
    pub base_opacity: f32,
    /// Hole radius in world units at 100% exploration
    pub reveal_radius: f64,
    /// Fraction of each ring's radius over which it fades out
    pub edge_softness: f32,
    /// Length of the reveal animation, in milliseconds
    pub animation_duration_ms: u64,
}

impl FogConfig {
    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }
}

impl Default for FogConfig {
    fn default() -> Self {
        FogPreset::Standard.config()
    }
}

/// Closed set of fog tuning profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FogPreset {
    Light,
    #[default]
    Standard,
    Heavy,
    Mystical,
}

impl FogPreset {
    pub const ALL: [FogPreset; 4] = [Self::Light, Self::Standard, Self::Heavy, Self::Mystical];

    pub fn config(self) -> FogConfig {
        match self {
            Self::Light => FogConfig {
                base_opacity: 0.6,
                reveal_radius: 120.0,
                edge_softness: 0.5,
                animation_duration_ms: 1000,
            },
            Self::Standard => FogConfig {
                base_opacity: 0.85,
                reveal_radius: 100.0,
                edge_softness: 0.3,
                animation_duration_ms: 1500,
            },
            Self::Heavy => FogConfig {
                base_opacity: 0.95,
                reveal_radius: 80.0,
                edge_softness: 0.2,
                animation_duration_ms: 2000,
            },
            Self::Mystical => FogConfig {
                base_opacity: 0.9,
                reveal_radius: 150.0,
                edge_softness: 0.7,
                animation_duration_ms: 2500,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Standard => "standard",
            Self::Heavy => "heavy",
            Self::Mystical => "mystical",
        }
    }
}

impl fmt::Display for FogPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FogPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown fog preset '{s}' (expected light, standard, heavy or mystical)")
            })
    }
}

/// Reveal bookkeeping for one location.
#[derive(Debug, Clone, Copy)]
struct RevealRecord {
    /// Percentage the reveal is heading towards; never decreases
    target: f64,
    /// Percentage shown when the current animation started
    from: f64,
    started: Option<Instant>,
}

impl RevealRecord {
    fn settled(percentage: f64) -> Self {
        Self {
            target: percentage,
            from: percentage,
            started: None,
        }
    }

    fn shown(&self, now: Instant, duration: Duration) -> f64 {
        let Some(started) = self.started else {
            return self.target;
        };
        if duration.is_zero() {
            return self.target;
        }
        let t = now.saturating_duration_since(started).as_secs_f64() / duration.as_secs_f64();
        if t >= 1.0 {
            return self.target;
        }
        self.from + (self.target - self.from) * Easing::OutCubic.apply(t)
    }

    fn is_animating(&self, now: Instant, duration: Duration) -> bool {
        self.started
            .is_some_and(|started| now.saturating_duration_since(started) < duration)
    }
}

/// Owns the off-screen fog buffer and the per-location reveal state.
pub struct FogOfWarRenderer {
    config: FogConfig,
    color: Rgb,
    buffer: Option<Pixmap>,
    reveals: HashMap<LocationId, RevealRecord>,
}

impl FogOfWarRenderer {
    pub fn new(config: FogConfig, color: Rgb) -> Self {
        Self {
            config,
            color,
            buffer: None,
            reveals: HashMap::new(),
        }
    }

    pub fn config(&self) -> &FogConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FogConfig) {
        self.config = config;
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    /// Folds the layer's exploration records into the reveal state.
    ///
    /// Returns `true` when any location's revealed percentage grew.
    pub fn sync(&mut self, layer: &LayerData, clock: FrameClock) -> bool {
        let duration = self.config.animation_duration();
        let mut changed = false;

        for progress in &layer.exploration {
            let percentage = progress.exploration();
            match self.reveals.get_mut(&progress.location_id) {
                Some(record) => {
                    if percentage > record.target {
                        record.from = record.shown(clock.now, duration);
                        record.target = percentage;
                        record.started = Some(clock.now);
                        changed = true;
                    }
                }
                None => {
                    let already_revealed = progress.fog_revealed_at.is_some_and(|at| {
                        clock.unix_ms.saturating_sub(at) >= self.config.animation_duration_ms
                    });
                    let record = if already_revealed || percentage <= 0.0 {
                        RevealRecord::settled(percentage)
                    } else {
                        RevealRecord {
                            target: percentage,
                            from: 0.0,
                            started: Some(clock.now),
                        }
                    };
                    self.reveals.insert(progress.location_id.clone(), record);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Percentage currently shown for a location, or `None` if it was never observed.
    pub fn shown_percentage(&self, location_id: &str, now: Instant) -> Option<f64> {
        let duration = self.config.animation_duration();
        self.reveals
            .get(location_id)
            .map(|record| record.shown(now, duration))
    }

    /// Hole radius in pixels for a shown percentage at the given zoom.
    pub fn reveal_radius_px(&self, percentage: f64, zoom: f64) -> f64 {
        self.config.reveal_radius * zoom * percentage / 100.0
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        let duration = self.config.animation_duration();
        self.reveals
            .values()
            .any(|record| record.is_animating(now, duration))
    }

    /// Drops reveal state for locations absent from the latest snapshot.
    pub fn evict_missing(&mut self, present: &HashSet<&str>) {
        self.reveals.retain(|id, _| present.contains(id.as_str()));
    }

    pub fn tracked(&self) -> usize {
        self.reveals.len()
    }

    /// Redraws the fog buffer for the given view.
    pub fn redraw(
        &mut self,
        layer: &LayerData,
        viewport: &Viewport,
        current: Option<&CurrentLocation>,
        now: Instant,
    ) {
        let width = viewport.width.max(1.0).round() as u32;
        let height = viewport.height.max(1.0).round() as u32;
        let resized = self
            .buffer
            .as_ref()
            .is_none_or(|buffer| buffer.width() != width || buffer.height() != height);
        if resized {
            self.buffer = Pixmap::new(width, height);
            if self.buffer.is_none() {
                log::warn!("Cannot allocate {width}x{height} fog buffer, fog disabled");
            }
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };

        buffer.fill(self.color.with_alpha(self.config.base_opacity));

        let config = &self.config;
        let reveals = &self.reveals;
        let duration = config.animation_duration();
        let softness = config.edge_softness;
        for progress in &layer.exploration {
            let Some(location) = layer.location(&progress.location_id) else {
                log::trace!(
                    "Skipping fog reveal for stale location {}",
                    progress.location_id
                );
                continue;
            };
            let shown = reveals
                .get(&progress.location_id)
                .map(|record| record.shown(now, duration))
                .unwrap_or(0.0);
            let radius = config.reveal_radius * viewport.zoom * shown / 100.0;
            let center = world_to_screen(location.coordinates, viewport);
            punch_reveal(&mut buffer.as_mut(), center, radius, softness);
        }

        if let Some(current) = current {
            let center = world_to_screen(current.coordinates, viewport);
            let radius = CURRENT_LOCATION_REVEAL * config.reveal_radius * viewport.zoom;
            punch_reveal(&mut buffer.as_mut(), center, radius, softness);
        }
    }

    /// The fog buffer as last drawn; `None` before the first redraw.
    pub fn buffer(&self) -> Option<&Pixmap> {
        self.buffer.as_ref()
    }

    /// Draws the fog buffer over `target`.
    pub fn composite(&self, target: &mut PixmapMut<'_>) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        target.draw_pixmap(
            0,
            0,
            buffer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

/// Erases five concentric soft-edged discs around `center`.
fn punch_reveal(target: &mut PixmapMut<'_>, center: Coordinates, radius: f64, softness: f32) {
    if !radius.is_finite() || radius < 0.5 {
        return;
    }
    let inner_stop = (1.0 - softness).clamp(0.0, 0.95);
    let cx = center.x as f32;
    let cy = center.y as f32;

    for (scale, opacity) in RINGS {
        let r = (radius * scale) as f32;
        if r < 0.5 {
            continue;
        }
        let solid = Color::from_rgba(0.0, 0.0, 0.0, opacity).unwrap_or(Color::BLACK);
        let mut stops = vec![GradientStop::new(0.0, solid)];
        if inner_stop > 0.0 {
            stops.push(GradientStop::new(inner_stop, solid));
        }
        stops.push(GradientStop::new(1.0, Color::TRANSPARENT));

        let Some(shader) = RadialGradient::new(
            Point::from_xy(cx, cy),
            Point::from_xy(cx, cy),
            r,
            stops,
            SpreadMode::Pad,
            Transform::identity(),
        ) else {
            continue;
        };
        let Some(path) = PathBuilder::from_circle(cx, cy, r) else {
            continue;
        };
        let paint = Paint {
            shader,
            blend_mode: BlendMode::DestinationOut,
            anti_alias: true,
            ..Paint::default()
        };
        target.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExplorationProgress, LocationType, MapLocation};

    fn layer_with(percentage: f64, revealed_at: Option<u64>) -> LayerData {
        LayerData {
            id: "ground".into(),
            name: "Ground".into(),
            locations: vec![MapLocation {
                id: "camp".into(),
                name: "Camp".into(),
                coordinates: Coordinates::new(0.0, 0.0),
                location_type: LocationType::Village,
                danger_level: Default::default(),
                discovered: true,
                exploration_percentage: percentage,
                last_visited: None,
            }],
            exploration: vec![ExplorationProgress {
                location_id: "camp".into(),
                exploration_percentage: percentage,
                explored_areas: Vec::new(),
                fog_revealed_at: revealed_at,
                fully_explored_at: None,
            }],
            ..Default::default()
        }
    }

    fn viewport() -> Viewport {
        Viewport {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            width: 400.0,
            height: 400.0,
        }
    }

    fn alpha_at(fog: &FogOfWarRenderer, x: u32, y: u32) -> u8 {
        fog.buffer()
            .and_then(|buffer| buffer.pixel(x, y))
            .map(|px| px.alpha())
            .unwrap_or(0)
    }

    #[test]
    fn presets_parse_by_name() {
        assert_eq!("Mystical".parse::<FogPreset>().unwrap(), FogPreset::Mystical);
        assert!("thick".parse::<FogPreset>().is_err());
        assert_eq!(FogConfig::default().base_opacity, 0.85);
        assert_eq!(FogConfig::default().animation_duration_ms, 1500);
    }

    #[test]
    fn unexplored_area_is_fully_fogged() {
        let clock = FrameClock::at(Instant::now(), 10_000);
        let layer = layer_with(0.0, None);
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        fog.sync(&layer, clock);
        fog.redraw(&layer, &viewport(), None, clock.now);
        assert_eq!(alpha_at(&fog, 200, 200), 217);
        assert_eq!(alpha_at(&fog, 5, 5), 217);
    }

    #[test]
    fn explored_location_punches_a_hole() {
        let clock = FrameClock::at(Instant::now(), 100_000);
        let layer = layer_with(100.0, Some(0));
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        fog.sync(&layer, clock);
        fog.redraw(&layer, &viewport(), None, clock.now);
        assert!(alpha_at(&fog, 200, 200) < 10);
        assert_eq!(alpha_at(&fog, 2, 2), 217);
    }

    #[test]
    fn stale_progress_records_are_skipped() {
        let clock = FrameClock::at(Instant::now(), 100_000);
        let mut layer = layer_with(100.0, Some(0));
        layer.locations.clear();
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        fog.sync(&layer, clock);
        fog.redraw(&layer, &viewport(), None, clock.now);
        assert_eq!(alpha_at(&fog, 200, 200), 217);
    }

    #[test]
    fn reveal_grows_then_holds_after_exploration_increase() {
        let t0 = FrameClock::at(Instant::now(), 100_000);
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        fog.sync(&layer_with(40.0, Some(0)), t0);
        assert_eq!(fog.shown_percentage("camp", t0.now), Some(40.0));

        let t1 = t0.advanced(Duration::from_secs(5));
        assert!(fog.sync(&layer_with(70.0, Some(0)), t1));

        let mut last = fog.reveal_radius_px(40.0, 1.0);
        for step in 1..15 {
            let now = t1.now + Duration::from_millis(step * 100);
            let shown = fog.shown_percentage("camp", now).unwrap();
            let radius = fog.reveal_radius_px(shown, 1.0);
            assert!(radius > last, "radius did not grow at step {step}");
            last = radius;
        }
        let settled = t1.now + Duration::from_millis(1500);
        assert_eq!(fog.shown_percentage("camp", settled), Some(70.0));
        assert_eq!(
            fog.shown_percentage("camp", settled + Duration::from_secs(3)),
            Some(70.0)
        );
        assert!(!fog.is_animating(settled));
    }

    #[test]
    fn lower_percentage_never_refogs() {
        let t0 = FrameClock::at(Instant::now(), 100_000);
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        fog.sync(&layer_with(80.0, Some(0)), t0);
        assert!(!fog.sync(&layer_with(20.0, Some(0)), t0.advanced(Duration::from_secs(1))));
        assert_eq!(fog.shown_percentage("camp", t0.now), Some(80.0));
    }

    #[test]
    fn fog_alpha_at_location_never_increases_during_reveal() {
        let t0 = FrameClock::at(Instant::now(), 100_000);
        let view = viewport();
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        let before = layer_with(40.0, Some(0));
        fog.sync(&before, t0);
        fog.redraw(&before, &view, None, t0.now);
        // Probe just inside the 40% ring edge.
        let sample = (200 + 45, 200);
        let mut last = alpha_at(&fog, sample.0, sample.1);

        let after = layer_with(70.0, Some(0));
        let t1 = t0.advanced(Duration::from_secs(2));
        fog.sync(&after, t1);
        for step in 0..=16 {
            let now = t1.now + Duration::from_millis(step * 100);
            fog.redraw(&after, &view, None, now);
            let alpha = alpha_at(&fog, sample.0, sample.1);
            assert!(alpha <= last, "fog thickened at step {step}: {alpha} > {last}");
            last = alpha;
        }
    }

    #[test]
    fn fresh_reveals_animate_from_zero() {
        let t0 = FrameClock::at(Instant::now(), 100_000);
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        fog.sync(&layer_with(50.0, Some(99_900)), t0);
        assert_eq!(fog.shown_percentage("camp", t0.now), Some(0.0));
        assert!(fog.is_animating(t0.now));
    }

    #[test]
    fn eviction_drops_missing_locations() {
        let t0 = FrameClock::at(Instant::now(), 100_000);
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        fog.sync(&layer_with(50.0, None), t0);
        assert_eq!(fog.tracked(), 1);
        fog.evict_missing(&HashSet::new());
        assert_eq!(fog.tracked(), 0);
    }

    #[test]
    fn buffer_tracks_viewport_size() {
        let t0 = FrameClock::at(Instant::now(), 0);
        let layer = layer_with(0.0, None);
        let mut fog = FogOfWarRenderer::new(FogConfig::default(), Rgb::new(0, 0, 0));
        let view = Viewport {
            width: 123.0,
            height: 45.0,
            ..viewport()
        };
        fog.redraw(&layer, &view, None, t0.now);
        let buffer = fog.buffer().unwrap();
        assert_eq!((buffer.width(), buffer.height()), (123, 45));
    }
}
