//! The minimap controller: owns the camera, pointer interaction and the frame loop.

use crate::animation::{AnimationManager, Easing, FrameClock};
use crate::config::MinimapConfig;
use crate::constants::CURRENT_PULSE_PERIOD_SECS;
use crate::coordinates::{clamp_viewport, clamp_zoom_in, distance, screen_to_world};
use crate::fog::{FogOfWarRenderer, FogPreset};
use crate::icons::IconCache;
use crate::performance::PerformanceMonitor;
use crate::render::{FrameReport, PipelineKind, RenderOptions, RenderPipeline, Scene};
use crate::snapshot::MapSnapshot;
use crate::{Coordinates, LayerData, LocationId, MapLocation, Viewport};
use resvg::tiny_skia::Pixmap;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

const TRAIL_ANIMATION: &str = "trail";
const CONNECTION_PULSE: &str = "connection-pulse";
const DISCOVERY_PREFIX: &str = "discover:";

fn discovery_id(location_id: &str) -> String {
    format!("{DISCOVERY_PREFIX}{location_id}")
}

/// Something the host should react to. Drained with [`MinimapController::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum MinimapEvent {
    LocationSelected(MapLocation),
    /// `None` when the pointer left every marker
    LocationHovered(Option<MapLocation>),
    ViewportChanged(Viewport),
    MoveRequested(MoveIntent),
}

/// A travel request. The host decides whether the target is reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveIntent {
    pub target: MapLocation,
    pub layer: String,
    /// Where the player currently is, if known
    pub from: Option<LocationId>,
}

/// Lifecycle of a location marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPhase {
    Undiscovered,
    /// The discovery ring is still expanding
    Discovering,
    Discovered,
    FullyExplored,
}

/// Per-location bookkeeping kept between snapshots.
#[derive(Debug, Clone, Copy)]
struct MarkerRecord {
    discovered: bool,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    last: Coordinates,
}

pub struct MinimapController {
    config: MinimapConfig,
    viewport: Viewport,
    snapshot: MapSnapshot,
    active_layer: Option<String>,
    hovered: Option<LocationId>,
    selected: Option<LocationId>,
    drag: Option<Drag>,
    animations: AnimationManager,
    markers: HashMap<LocationId, MarkerRecord>,
    fog: FogOfWarRenderer,
    fog_dirty: bool,
    icons: IconCache,
    perf: PerformanceMonitor,
    pipeline: Box<dyn RenderPipeline>,
    surface: Option<Pixmap>,
    last_tick: Option<Instant>,
    accumulator: Duration,
    generation: u64,
    needs_observe: bool,
    restart_trail: bool,
    restart_pulse: bool,
    pulse_epoch: Option<Instant>,
    events: Vec<MinimapEvent>,
}

impl MinimapController {
    /// Builds a controller. Out-of-range numbers in `config` are repaired first.
    pub fn new(mut config: MinimapConfig, icons: IconCache) -> Self {
        config.sanitize();
        let fog = FogOfWarRenderer::new(config.fog_preset.config(), config.theme.fog);
        let perf = PerformanceMonitor::new(config.performance_monitor, config.frame_interval());
        let pipeline = config.pipeline.build();
        Self {
            viewport: Viewport::default(),
            snapshot: MapSnapshot::default(),
            active_layer: None,
            hovered: None,
            selected: None,
            drag: None,
            animations: AnimationManager::new(),
            markers: HashMap::new(),
            fog,
            fog_dirty: true,
            icons,
            perf,
            pipeline,
            surface: None,
            last_tick: None,
            accumulator: Duration::ZERO,
            generation: 0,
            needs_observe: false,
            restart_trail: false,
            restart_pulse: false,
            pulse_epoch: None,
            events: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &MinimapConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn snapshot(&self) -> &MapSnapshot {
        &self.snapshot
    }

    pub fn active_layer(&self) -> Option<&LayerData> {
        self.snapshot.layer(self.active_layer.as_deref()?)
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.perf
    }

    pub fn icons(&self) -> &IconCache {
        &self.icons
    }

    /// The last rendered frame.
    pub fn surface(&self) -> Option<&Pixmap> {
        self.surface.as_ref()
    }

    pub fn pipeline_kind(&self) -> PipelineKind {
        self.pipeline.kind()
    }

    /// Takes every event queued since the last call.
    pub fn drain_events(&mut self) -> Vec<MinimapEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replaces the map data. Per-location state for ids that disappeared is dropped.
    pub fn set_snapshot(&mut self, snapshot: MapSnapshot) {
        let old_trail = self.trail_len(&self.snapshot);
        let old_current = self
            .snapshot
            .current_location
            .as_ref()
            .map(|c| c.location_id.clone());

        self.snapshot = snapshot;
        self.generation += 1;
        self.fog_dirty = true;
        self.needs_observe = true;

        let keep_layer = self
            .active_layer
            .as_deref()
            .is_some_and(|id| self.snapshot.layer(id).is_some());
        if !keep_layer {
            self.active_layer = self.snapshot.default_layer_id().map(str::to_owned);
        }

        let present: HashSet<&str> = self.snapshot.location_ids().collect();
        self.markers.retain(|id, _| present.contains(id.as_str()));
        self.fog.evict_missing(&present);
        self.animations.retain(|id| {
            id.strip_prefix(DISCOVERY_PREFIX)
                .is_none_or(|location| present.contains(location))
        });
        if self.hovered.as_deref().is_some_and(|id| !present.contains(id)) {
            self.hovered = None;
        }
        if self.selected.as_deref().is_some_and(|id| !present.contains(id)) {
            self.selected = None;
        }

        if self.trail_len(&self.snapshot) > old_trail {
            self.restart_trail = true;
        }
        let new_current = self
            .snapshot
            .current_location
            .as_ref()
            .map(|c| c.location_id.as_str());
        if new_current.is_some() && new_current != old_current.as_deref() {
            self.restart_pulse = true;
        }

        log::info!(
            "Minimap snapshot loaded: {} layers, {} locations, {} trail points",
            self.snapshot.layers.len(),
            present.len(),
            self.snapshot.character_trail.len()
        );
        self.apply_viewport(self.viewport);
    }

    fn trail_len(&self, snapshot: &MapSnapshot) -> usize {
        let Some(layer) = self.active_layer.as_deref() else {
            return 0;
        };
        snapshot
            .character_trail
            .iter()
            .filter(|p| p.layer == layer)
            .count()
    }

    /// Switches the rendered floor. Returns `false` for an unknown layer id.
    pub fn set_active_layer(&mut self, id: &str) -> bool {
        if self.snapshot.layer(id).is_none() {
            log::warn!("Ignoring switch to unknown layer {id}");
            return false;
        }
        if self.active_layer.as_deref() == Some(id) {
            return true;
        }
        self.active_layer = Some(id.to_owned());
        self.generation += 1;
        self.fog_dirty = true;
        self.needs_observe = true;
        self.hovered = None;
        self.drag = None;
        self.apply_viewport(self.viewport);
        true
    }

    pub fn set_fog_preset(&mut self, preset: FogPreset) {
        self.config.fog_preset = preset;
        self.fog.set_config(preset.config());
        self.fog_dirty = true;
        self.generation += 1;
    }

    pub fn set_render_options(&mut self, options: RenderOptions) {
        if options != self.config.render {
            self.config.render = options;
            self.fog_dirty = true;
        }
    }

    pub fn set_pipeline(&mut self, kind: PipelineKind) {
        if self.pipeline.kind() != kind {
            log::debug!("Switching minimap pipeline to {kind}");
            self.pipeline = kind.build();
            self.config.pipeline = kind;
            self.fog_dirty = true;
        }
    }

    /// Resizes the drawing surface.
    pub fn resize(&mut self, width: f64, height: f64) {
        let width = if width.is_finite() { width.max(1.0) } else { 1.0 };
        let height = if height.is_finite() { height.max(1.0) } else { 1.0 };
        self.apply_viewport(Viewport {
            width,
            height,
            ..self.viewport
        });
    }

    /// Replaces the camera, clamping zoom (and position, when world clamping is on).
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.apply_viewport(viewport);
    }

    fn apply_viewport(&mut self, mut viewport: Viewport) {
        viewport.zoom = clamp_zoom_in(viewport.zoom, self.config.zoom_min, self.config.zoom_max);
        if !viewport.x.is_finite() || !viewport.y.is_finite() {
            viewport.x = self.viewport.x;
            viewport.y = self.viewport.y;
        }
        if self.config.clamp_to_world {
            if let Some(bounds) = self.active_layer().and_then(LayerData::bounds) {
                viewport = clamp_viewport(&viewport, &bounds.expand(self.config.world_padding));
            }
        }
        if viewport != self.viewport {
            self.viewport = viewport;
            self.events.push(MinimapEvent::ViewportChanged(viewport));
        }
    }

    pub fn center_on(&mut self, world: Coordinates) {
        self.apply_viewport(Viewport {
            x: world.x,
            y: world.y,
            ..self.viewport
        });
    }

    /// Centers on the player, switching to their layer first. Returns `false` when the
    /// player's position is unknown.
    pub fn center_on_current(&mut self) -> bool {
        let Some(current) = self.snapshot.current_location.clone() else {
            return false;
        };
        if self.snapshot.layer(&current.layer).is_some() {
            self.set_active_layer(&current.layer);
        }
        self.center_on(current.coordinates);
        true
    }

    /// Multiplies the zoom by `factor`, keeping the world point under `anchor` (screen
    /// pixels) fixed. Without an anchor the surface center is kept.
    pub fn zoom_by(&mut self, factor: f64, anchor: Option<Coordinates>) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let vp = self.viewport;
        let anchor =
            anchor.unwrap_or_else(|| Coordinates::new(vp.width / 2.0, vp.height / 2.0));
        let pinned = screen_to_world(anchor, &vp);
        let zoom = clamp_zoom_in(vp.zoom * factor, self.config.zoom_min, self.config.zoom_max);
        self.apply_viewport(Viewport {
            x: pinned.x - (anchor.x - vp.width / 2.0) / zoom,
            y: pinned.y - (anchor.y - vp.height / 2.0) / zoom,
            zoom,
            ..vp
        });
    }

    /// Pans by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let vp = self.viewport;
        self.apply_viewport(Viewport {
            x: vp.x - dx / vp.zoom,
            y: vp.y - dy / vp.zoom,
            ..vp
        });
    }

    /// One wheel notch at `pointer`. Positive `delta` zooms in.
    pub fn wheel(&mut self, delta: f64, pointer: Coordinates) {
        if delta == 0.0 || !delta.is_finite() {
            return;
        }
        let step = self.config.wheel_zoom_step;
        let factor = if delta > 0.0 { 1.0 + step } else { 1.0 - step };
        self.zoom_by(factor, Some(pointer));
    }

    /// First location within the hit radius of a screen point.
    pub fn location_at(&self, screen: Coordinates) -> Option<&MapLocation> {
        let layer = self.active_layer()?;
        let world = screen_to_world(screen, &self.viewport);
        let radius = self.config.hit_radius / self.viewport.zoom;
        layer
            .locations
            .iter()
            .find(|location| distance(location.coordinates, world) <= radius)
    }

    /// Selects the location under the pointer, or starts dragging the map.
    pub fn pointer_down(&mut self, pos: Coordinates) {
        if let Some(location) = self.location_at(pos).cloned() {
            self.drag = None;
            self.selected = Some(location.id.clone());
            self.events.push(MinimapEvent::LocationSelected(location));
        } else {
            self.drag = Some(Drag { last: pos });
        }
    }

    pub fn pointer_move(&mut self, pos: Coordinates) {
        if let Some(drag) = self.drag {
            self.pan_by(pos.x - drag.last.x, pos.y - drag.last.y);
            self.drag = Some(Drag { last: pos });
            return;
        }
        let hit = self.location_at(pos).cloned();
        self.set_hovered(hit);
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    pub fn pointer_leave(&mut self) {
        self.drag = None;
        self.set_hovered(None);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn set_hovered(&mut self, location: Option<MapLocation>) {
        let id = location.as_ref().map(|l| l.id.as_str());
        if id != self.hovered.as_deref() {
            self.hovered = id.map(str::to_owned);
            self.events.push(MinimapEvent::LocationHovered(location));
        }
    }

    /// Asks the host to move the player to `location_id` on the active layer.
    pub fn request_move(&mut self, location_id: &str) -> Option<MoveIntent> {
        let layer = self.active_layer()?;
        let target = layer.location(location_id)?.clone();
        let intent = MoveIntent {
            target,
            layer: layer.id.clone(),
            from: self
                .snapshot
                .current_location
                .as_ref()
                .map(|c| c.location_id.clone()),
        };
        self.events.push(MinimapEvent::MoveRequested(intent.clone()));
        Some(intent)
    }

    pub fn marker_phase(&self, location_id: &str) -> Option<MarkerPhase> {
        self.marker_phase_at(location_id, Instant::now())
    }

    pub fn marker_phase_at(&self, location_id: &str, now: Instant) -> Option<MarkerPhase> {
        let location = self.active_layer()?.location(location_id)?;
        let phase = if !location.discovered {
            MarkerPhase::Undiscovered
        } else if self
            .animations
            .is_animating_at(&discovery_id(location_id), now)
        {
            MarkerPhase::Discovering
        } else if location.is_fully_explored() {
            MarkerPhase::FullyExplored
        } else {
            MarkerPhase::Discovered
        };
        Some(phase)
    }

    /// Called from the host's repaint callback. Renders only when a full frame
    /// interval has accumulated, carrying the remainder into the next call.
    pub fn tick(&mut self, clock: FrameClock) -> Option<FrameReport> {
        let interval = self.config.frame_interval();
        let elapsed = self
            .last_tick
            .map_or(interval, |last| clock.now.saturating_duration_since(last));
        self.last_tick = Some(clock.now);
        self.accumulator += elapsed;
        if self.accumulator < interval {
            return None;
        }
        self.accumulator = if interval.is_zero() {
            Duration::ZERO
        } else {
            // A long stall renders once rather than bursting to catch up.
            let remainder = self.accumulator.as_nanos() % interval.as_nanos();
            Duration::from_nanos(remainder as u64)
        };
        Some(self.render_frame(clock))
    }

    /// Draws one frame unconditionally.
    pub fn render_frame(&mut self, clock: FrameClock) -> FrameReport {
        let started = Instant::now();
        let now = clock.now;

        let width = self.viewport.width.max(1.0).round() as u32;
        let height = self.viewport.height.max(1.0).round() as u32;
        let fits = self
            .surface
            .as_ref()
            .is_some_and(|s| s.width() == width && s.height() == height);
        if !fits {
            self.surface = Pixmap::new(width, height);
            self.fog_dirty = true;
        }
        let Some(surface) = self.surface.as_mut() else {
            log::warn!("Cannot allocate {width}x{height} minimap surface, skipping frame");
            return FrameReport::default();
        };

        let empty = LayerData::default();
        let layer = self
            .active_layer
            .as_deref()
            .and_then(|id| self.snapshot.layer(id))
            .unwrap_or(&empty);

        if self.needs_observe {
            observe_markers(
                &mut self.markers,
                &mut self.animations,
                layer,
                now,
                self.config.discovery_pulse(),
            );
            self.needs_observe = false;
        }
        if self.restart_trail {
            self.animations.start_at(
                TRAIL_ANIMATION,
                now,
                self.config.trail_animation(),
                None,
                None,
                Easing::Linear,
            );
            self.restart_trail = false;
        }
        if self.restart_pulse {
            self.animations.start_at(
                CONNECTION_PULSE,
                now,
                self.config.connection_pulse(),
                None,
                None,
                Easing::OutCubic,
            );
            self.restart_pulse = false;
        }

        let revealed = self.fog.sync(layer, clock);
        let fog_changed = self.fog_dirty || revealed || self.fog.is_animating(now);
        self.fog_dirty = false;

        let mut discovery = HashMap::new();
        for location in &layer.locations {
            let id = discovery_id(&location.id);
            if self.animations.is_animating_at(&id, now) {
                discovery.insert(location.id.clone(), self.animations.progress_at(&id, now));
            } else {
                // Consumes finished pulses so their entries are freed.
                self.animations.progress_at(&id, now);
            }
        }

        let trail_animating = self.animations.is_animating_at(TRAIL_ANIMATION, now);
        let trail_progress = self.animations.progress_at(TRAIL_ANIMATION, now);
        let connection_pulse = self
            .animations
            .is_animating_at(CONNECTION_PULSE, now)
            .then(|| self.animations.progress_at(CONNECTION_PULSE, now));

        let current = self
            .snapshot
            .current_location
            .as_ref()
            .filter(|c| Some(c.layer.as_str()) == self.active_layer.as_deref());
        let epoch = *self.pulse_epoch.get_or_insert(now);
        let current_pulse_phase =
            (now.saturating_duration_since(epoch).as_secs_f64() / CURRENT_PULSE_PERIOD_SECS)
                .fract();

        let trail = self
            .snapshot
            .character_trail
            .iter()
            .filter(|p| p.layer == layer.id)
            .collect();

        let scene = Scene {
            viewport: self.viewport,
            clock,
            theme: &self.config.theme,
            options: &self.config.render,
            layer,
            trail,
            current,
            hovered: self.hovered.as_deref(),
            selected: self.selected.as_deref(),
            markers_animating: trail_animating || !discovery.is_empty(),
            discovery,
            trail_progress,
            connection_pulse,
            current_pulse_phase,
            generation: self.generation,
            fog_changed,
        };

        let mut report = self
            .pipeline
            .render(&scene, &mut self.fog, &self.icons, surface);
        report.frame_time = started.elapsed();
        self.perf.record_frame(report.frame_time);
        log::trace!(
            "Frame: {} locations, {} connections, {} surfaces in {:?}",
            report.locations,
            report.connections,
            report.surfaces_redrawn,
            report.frame_time
        );
        report
    }
}

/// Diffs discovery flags against the arena and starts a pulse for each location that
/// turned discovered since it was last seen. Locations seen for the first time never
/// pulse.
fn observe_markers(
    markers: &mut HashMap<LocationId, MarkerRecord>,
    animations: &mut AnimationManager,
    layer: &LayerData,
    now: Instant,
    pulse: Duration,
) {
    for location in &layer.locations {
        match markers.get_mut(&location.id) {
            Some(record) => {
                if location.discovered && !record.discovered {
                    log::debug!("Location {} discovered", location.id);
                    animations.start_at(
                        discovery_id(&location.id),
                        now,
                        pulse,
                        None,
                        None,
                        Easing::OutCubic,
                    );
                }
                record.discovered = location.discovered;
            }
            None => {
                markers.insert(
                    location.id.clone(),
                    MarkerRecord {
                        discovered: location.discovered,
                    },
                );
            }
        }
    }
}
