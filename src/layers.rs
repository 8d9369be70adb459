//! Cached-surface pipeline: the frame is split into four surfaces that are only redrawn
//! when their inputs change, then composited in stage order.

use crate::Viewport;
use crate::fog::FogOfWarRenderer;
use crate::icons::IconCache;
use crate::overlays;
use crate::render::{
    DirectPipeline, FrameReport, LabelPlacement, PipelineKind, RenderOptions, RenderPipeline,
    Scene,
};
use resvg::tiny_skia::{BlendMode, Color, Pixmap, PixmapPaint, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Background, grid and connections
    Static,
    /// Trail and location markers
    Markers,
    /// Current-location highlight and connection pulses
    Dynamic,
    /// Backed by the fog renderer's own buffer
    Fog,
}

impl SurfaceKind {
    pub const ALL: [SurfaceKind; 4] = [Self::Static, Self::Markers, Self::Dynamic, Self::Fog];

    fn index(self) -> usize {
        match self {
            Self::Static => 0,
            Self::Markers => 1,
            Self::Dynamic => 2,
            Self::Fog => 3,
        }
    }
}

#[derive(Default)]
struct Surface {
    pixmap: Option<Pixmap>,
    dirty: bool,
    redraws: u64,
}

/// Inputs that invalidate every surface when they change.
#[derive(Debug, Clone, PartialEq)]
struct FrameKey {
    viewport: Viewport,
    size: (u32, u32),
    generation: u64,
    options: RenderOptions,
}

/// Inputs that only affect the marker surface.
#[derive(Debug, Clone, PartialEq, Default)]
struct MarkerKey {
    hovered: Option<String>,
    selected: Option<String>,
}

/// Dirty-flag bookkeeping for the four cached surfaces.
#[derive(Default)]
pub struct LayerManager {
    surfaces: [Surface; 4],
    frame_key: Option<FrameKey>,
    marker_key: MarkerKey,
    dynamic_drawn: bool,
    markers_animated: bool,
    fog_changed: bool,
}

impl LayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self, kind: SurfaceKind) -> bool {
        self.surfaces[kind.index()].dirty
    }

    pub fn mark_dirty(&mut self, kind: SurfaceKind) {
        self.surfaces[kind.index()].dirty = true;
    }

    pub fn mark_all_dirty(&mut self) {
        for surface in &mut self.surfaces {
            surface.dirty = true;
        }
    }

    /// How many times a surface has been redrawn since creation.
    pub fn redraw_count(&self, kind: SurfaceKind) -> u64 {
        self.surfaces[kind.index()].redraws
    }

    /// Drops every cached bitmap and forces a full redraw.
    pub fn reset(&mut self) {
        for surface in &mut self.surfaces {
            surface.pixmap = None;
        }
        self.frame_key = None;
        self.mark_all_dirty();
    }

    /// Compares the scene against the previous frame and raises dirty flags.
    pub fn prepare(&mut self, scene: &Scene<'_>, width: u32, height: u32) {
        let frame_key = FrameKey {
            viewport: scene.viewport,
            size: (width, height),
            generation: scene.generation,
            options: *scene.options,
        };
        if self.frame_key.as_ref() != Some(&frame_key) {
            log::trace!("Layer cache invalidated for generation {}", scene.generation);
            self.mark_all_dirty();
            self.frame_key = Some(frame_key);
        }

        let marker_key = MarkerKey {
            hovered: scene.hovered.map(str::to_owned),
            selected: scene.selected.map(str::to_owned),
        };
        // An animation's last frame is drawn one frame after it stops reporting.
        if marker_key != self.marker_key || scene.markers_animating || self.markers_animated {
            self.mark_dirty(SurfaceKind::Markers);
            self.marker_key = marker_key;
        }
        self.markers_animated = scene.markers_animating;

        if scene.current.is_some() || self.dynamic_drawn {
            self.mark_dirty(SurfaceKind::Dynamic);
        }
        if scene.fog_changed || self.fog_changed {
            self.mark_dirty(SurfaceKind::Fog);
        }
        self.fog_changed = scene.fog_changed;
    }

    /// Clears a raster surface for redrawing, allocating it at the given size if needed.
    fn begin(&mut self, kind: SurfaceKind, width: u32, height: u32) -> Option<&mut Pixmap> {
        let surface = &mut self.surfaces[kind.index()];
        let fits = surface
            .pixmap
            .as_ref()
            .is_some_and(|p| p.width() == width && p.height() == height);
        if !fits {
            surface.pixmap = Pixmap::new(width, height);
        }
        if surface.pixmap.is_none() {
            return None;
        }
        surface.dirty = false;
        surface.redraws += 1;
        let pixmap = surface.pixmap.as_mut()?;
        pixmap.fill(Color::TRANSPARENT);
        Some(pixmap)
    }

    fn finish_fog(&mut self) {
        let surface = &mut self.surfaces[SurfaceKind::Fog.index()];
        surface.dirty = false;
        surface.redraws += 1;
    }

    fn pixmap(&self, kind: SurfaceKind) -> Option<&Pixmap> {
        self.surfaces[kind.index()].pixmap.as_ref()
    }
}

/// Frame counts carried over while a surface is served from cache.
#[derive(Debug, Default)]
struct CachedCounts {
    connections: usize,
    trail_segments: usize,
    locations: usize,
    icons: usize,
    fallback_icons: usize,
    pending_icons: usize,
    pulsing_connections: usize,
    labels: Vec<LabelPlacement>,
}

/// Pipeline that redraws only the surfaces whose inputs changed.
#[derive(Default)]
pub struct LayeredPipeline {
    manager: LayerManager,
    counts: CachedCounts,
}

impl LayeredPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manager(&self) -> &LayerManager {
        &self.manager
    }
}

impl RenderPipeline for LayeredPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Layered
    }

    fn render(
        &mut self,
        scene: &Scene<'_>,
        fog: &mut FogOfWarRenderer,
        icons: &IconCache,
        target: &mut Pixmap,
    ) -> FrameReport {
        let (width, height) = (target.width(), target.height());
        self.manager.prepare(scene, width, height);
        if self.counts.pending_icons > 0 {
            self.manager.mark_dirty(SurfaceKind::Markers);
        }

        let mut redrawn = 0;

        if self.manager.is_dirty(SurfaceKind::Static) {
            let Some(surface) = self.manager.begin(SurfaceKind::Static, width, height) else {
                log::warn!("Cannot allocate {width}x{height} static surface, drawing directly");
                self.manager.reset();
                return DirectPipeline.render(scene, fog, icons, target);
            };
            let mut canvas = surface.as_mut();
            overlays::draw_background(&mut canvas, scene);
            if scene.options.show_grid {
                overlays::draw_grid(&mut canvas, scene);
            }
            self.counts.connections = overlays::draw_connections(&mut canvas, scene);
            redrawn += 1;
        }

        if self.manager.is_dirty(SurfaceKind::Markers) {
            if let Some(surface) = self.manager.begin(SurfaceKind::Markers, width, height) {
                let mut canvas = surface.as_mut();
                self.counts.trail_segments = overlays::draw_trail(&mut canvas, scene);
                let stats = overlays::draw_locations(&mut canvas, scene, icons);
                self.counts.locations = stats.drawn;
                self.counts.icons = stats.icons;
                self.counts.fallback_icons = stats.fallbacks;
                self.counts.pending_icons = stats.pending;
                self.counts.labels = stats.labels;
                redrawn += 1;
            }
        }

        if self.manager.is_dirty(SurfaceKind::Dynamic) {
            if let Some(surface) = self.manager.begin(SurfaceKind::Dynamic, width, height) {
                let mut canvas = surface.as_mut();
                self.counts.pulsing_connections =
                    overlays::draw_current_highlight(&mut canvas, scene);
                redrawn += 1;
            }
            self.manager.dynamic_drawn = scene.current.is_some();
        }

        if scene.options.show_fog && self.manager.is_dirty(SurfaceKind::Fog) {
            fog.redraw(scene.layer, &scene.viewport, scene.current, scene.clock.now);
            self.manager.finish_fog();
            redrawn += 1;
        }

        let mut canvas = target.as_mut();
        if let Some(base) = self.manager.pixmap(SurfaceKind::Static) {
            let copy = PixmapPaint {
                blend_mode: BlendMode::Source,
                ..PixmapPaint::default()
            };
            canvas.draw_pixmap(0, 0, base.as_ref(), &copy, Transform::identity(), None);
        }
        for kind in [SurfaceKind::Markers, SurfaceKind::Dynamic] {
            if let Some(surface) = self.manager.pixmap(kind) {
                canvas.draw_pixmap(
                    0,
                    0,
                    surface.as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                );
            }
        }
        if scene.options.show_fog {
            fog.composite(&mut canvas);
        }

        FrameReport {
            connections: self.counts.connections,
            trail_segments: self.counts.trail_segments,
            locations: self.counts.locations,
            icons: self.counts.icons,
            fallback_icons: self.counts.fallback_icons,
            pulsing_connections: self.counts.pulsing_connections,
            surfaces_redrawn: redrawn,
            labels: self.counts.labels.clone(),
            frame_time: Default::default(),
        }
    }

    fn invalidate(&mut self) {
        self.manager.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::FrameClock;
    use crate::colors::Theme;
    use crate::fog::FogConfig;
    use crate::icons::{IconKey, SvgIconRasterizer};
    use crate::{Coordinates, CurrentLocation, LayerData, LocationType, MapLocation};
    use std::collections::HashMap;

    fn layer() -> LayerData {
        LayerData {
            id: "ground".into(),
            locations: vec![MapLocation {
                id: "gate".into(),
                name: "Gate".into(),
                coordinates: Coordinates::new(10.0, 10.0),
                location_type: LocationType::Village,
                danger_level: Default::default(),
                discovered: true,
                exploration_percentage: 0.0,
                last_visited: None,
            }],
            ..Default::default()
        }
    }

    struct Fixture {
        layer: LayerData,
        theme: Theme,
        options: RenderOptions,
        clock: FrameClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                layer: layer(),
                theme: Theme::default(),
                options: RenderOptions::default(),
                clock: FrameClock::now(),
            }
        }

        fn scene(&self) -> Scene<'_> {
            Scene {
                viewport: Viewport {
                    x: 0.0,
                    y: 0.0,
                    zoom: 1.0,
                    width: 120.0,
                    height: 90.0,
                },
                clock: self.clock,
                theme: &self.theme,
                options: &self.options,
                layer: &self.layer,
                trail: Vec::new(),
                current: None,
                hovered: None,
                selected: None,
                discovery: HashMap::new(),
                trail_progress: 1.0,
                connection_pulse: None,
                current_pulse_phase: 0.0,
                generation: 1,
                markers_animating: false,
                fog_changed: false,
            }
        }
    }

    fn setup() -> (LayeredPipeline, FogOfWarRenderer, IconCache, Pixmap) {
        (
            LayeredPipeline::new(),
            FogOfWarRenderer::new(FogConfig::default(), crate::colors::FOG),
            IconCache::new(SvgIconRasterizer),
            Pixmap::new(120, 90).unwrap(),
        )
    }

    #[test]
    fn first_frame_draws_everything_then_idles() {
        let fixture = Fixture::new();
        let (mut pipeline, mut fog, icons, mut target) = setup();

        let report = pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 4);
        assert_eq!(report.locations, 1);

        let report = pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 0);
        assert_eq!(report.locations, 1, "counts carry over from the cache");
        for kind in SurfaceKind::ALL {
            assert_eq!(pipeline.manager().redraw_count(kind), 1);
        }
    }

    #[tokio::test]
    async fn markers_redraw_until_icons_land() {
        let fixture = Fixture::new();
        let (mut pipeline, mut fog, _, mut target) = setup();
        let icons = IconCache::with_runtime(SvgIconRasterizer, tokio::runtime::Handle::current());

        let report = pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        assert_eq!((report.icons, report.fallback_icons), (0, 1));

        let key = IconKey::new(
            LocationType::Village,
            overlays::marker_radius(1.0) * 1.5,
            fixture.theme.location_color(LocationType::Village),
        );
        icons.get(key).await.unwrap();

        let report = pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 1);
        assert_eq!((report.icons, report.fallback_icons), (1, 0));
        assert_eq!(pipeline.manager().redraw_count(SurfaceKind::Markers), 2);

        let report = pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 0);
        assert_eq!(report.icons, 1);
        assert_eq!(pipeline.manager().redraw_count(SurfaceKind::Markers), 2);
    }

    #[test]
    fn hover_only_redraws_markers() {
        let fixture = Fixture::new();
        let (mut pipeline, mut fog, icons, mut target) = setup();
        pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);

        let mut scene = fixture.scene();
        scene.hovered = Some("gate");
        let report = pipeline.render(&scene, &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 1);
        assert_eq!(pipeline.manager().redraw_count(SurfaceKind::Markers), 2);
        assert_eq!(pipeline.manager().redraw_count(SurfaceKind::Static), 1);
    }

    #[test]
    fn viewport_change_redraws_all() {
        let fixture = Fixture::new();
        let (mut pipeline, mut fog, icons, mut target) = setup();
        pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);

        let mut scene = fixture.scene();
        scene.viewport.x += 5.0;
        let report = pipeline.render(&scene, &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 4);
    }

    #[test]
    fn current_location_keeps_dynamic_dirty() {
        let fixture = Fixture::new();
        let (mut pipeline, mut fog, icons, mut target) = setup();
        let current = CurrentLocation {
            location_id: "gate".into(),
            layer: "ground".into(),
            coordinates: Coordinates::new(10.0, 10.0),
        };
        let mut scene = fixture.scene();
        scene.current = Some(&current);
        pipeline.render(&scene, &mut fog, &icons, &mut target);
        let report = pipeline.render(&scene, &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 1);
        assert_eq!(pipeline.manager().redraw_count(SurfaceKind::Dynamic), 2);

        // One more pass clears the highlight after the location goes away.
        let report = pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 1);
        let report = pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 0);
    }

    #[test]
    fn invalidate_forces_full_redraw() {
        let fixture = Fixture::new();
        let (mut pipeline, mut fog, icons, mut target) = setup();
        pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        pipeline.invalidate();
        let report = pipeline.render(&fixture.scene(), &mut fog, &icons, &mut target);
        assert_eq!(report.surfaces_redrawn, 4);
    }
}
