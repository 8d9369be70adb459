//! Drawing routines for each stage of a minimap frame.

use crate::colors::Rgb;
use crate::constants::{GRID_MIN_PIXEL_SPACING, MARKER_RADIUS};
use crate::coordinates::{angle, distance, viewport_bounds, world_to_screen};
use crate::icons::{IconCache, IconKey};
use crate::render::{LabelPlacement, Scene};
use crate::{Coordinates, MapConnection, MapLocation, PathType};
use resvg::tiny_skia::{
    Color, FillRule, GradientStop, LineCap, Paint, Path, PathBuilder, PixmapMut, PixmapPaint,
    Point, RadialGradient, Rect, SpreadMode, Stroke, StrokeDash, Transform,
};
use std::f64::consts::TAU;

/// Markers further than this outside the surface are culled.
const CULL_MARGIN: f64 = 30.0;

/// Upper bound on grid lines per axis.
const MAX_GRID_LINES: usize = 400;

/// Tally of the location stage.
#[derive(Debug, Default)]
pub struct MarkerStats {
    pub drawn: usize,
    pub icons: usize,
    pub fallbacks: usize,
    /// Icons still rasterizing; the markers need another pass once they land
    pub pending: usize,
    pub labels: Vec<LabelPlacement>,
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

fn circle(center: Coordinates, radius: f32) -> Option<Path> {
    PathBuilder::from_circle(center.x as f32, center.y as f32, radius)
}

fn fill_circle(canvas: &mut PixmapMut<'_>, center: Coordinates, radius: f32, color: Color) {
    if let Some(path) = circle(center, radius) {
        canvas.fill_path(
            &path,
            &solid(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

fn stroke_circle(
    canvas: &mut PixmapMut<'_>,
    center: Coordinates,
    radius: f32,
    width: f32,
    color: Color,
) {
    if let Some(path) = circle(center, radius) {
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        canvas.stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
    }
}

fn on_screen(p: Coordinates, scene: &Scene<'_>, margin: f64) -> bool {
    p.x >= -margin
        && p.y >= -margin
        && p.x <= scene.viewport.width + margin
        && p.y <= scene.viewport.height + margin
}

/// Marker radius in pixels for a zoom level.
pub fn marker_radius(zoom: f64) -> f32 {
    (MARKER_RADIUS * (zoom as f32).sqrt()).clamp(4.0, 16.0)
}

pub fn draw_background(canvas: &mut PixmapMut<'_>, scene: &Scene<'_>) {
    let rect = Rect::from_xywh(0.0, 0.0, canvas.width() as f32, canvas.height() as f32);
    if let Some(rect) = rect {
        canvas.fill_rect(
            rect,
            &solid(scene.theme.background.opaque()),
            Transform::identity(),
            None,
        );
    }
}

/// Draws world-aligned grid lines, doubling the spacing until lines are legible.
pub fn draw_grid(canvas: &mut PixmapMut<'_>, scene: &Scene<'_>) {
    let vp = &scene.viewport;
    let mut spacing = scene.options.grid_spacing;
    if !spacing.is_finite() || spacing <= 0.0 {
        return;
    }
    while spacing * vp.zoom < GRID_MIN_PIXEL_SPACING {
        spacing *= 2.0;
    }

    let bounds = viewport_bounds(vp);
    let mut pb = PathBuilder::new();
    let mut x = (bounds.min_x / spacing).ceil() * spacing;
    let mut lines = 0;
    while x <= bounds.max_x && lines < MAX_GRID_LINES {
        let sx = world_to_screen(Coordinates::new(x, bounds.min_y), vp).x as f32;
        pb.move_to(sx, 0.0);
        pb.line_to(sx, vp.height as f32);
        x += spacing;
        lines += 1;
    }
    let mut y = (bounds.min_y / spacing).ceil() * spacing;
    lines = 0;
    while y <= bounds.max_y && lines < MAX_GRID_LINES {
        let sy = world_to_screen(Coordinates::new(bounds.min_x, y), vp).y as f32;
        pb.move_to(0.0, sy);
        pb.line_to(vp.width as f32, sy);
        y += spacing;
        lines += 1;
    }

    if let Some(path) = pb.finish() {
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        canvas.stroke_path(
            &path,
            &solid(scene.theme.grid.with_alpha(0.5)),
            &stroke,
            Transform::identity(),
            None,
        );
    }
}

/// Stroke style for each kind of connection.
fn connection_stroke(path_type: PathType, zoom: f64) -> Stroke {
    let scale = (zoom as f32).sqrt().clamp(0.6, 2.0);
    let (width, dash) = match path_type {
        PathType::Direct => (2.0, None),
        PathType::Curved => (2.0, None),
        PathType::Teleport => (1.5, Some(vec![6.0, 4.0])),
        PathType::Stairs => (3.0, Some(vec![2.0, 3.0])),
        PathType::Elevator => (2.5, Some(vec![8.0, 3.0, 2.0, 3.0])),
    };
    Stroke {
        width: width * scale,
        line_cap: LineCap::Round,
        dash: dash.and_then(|d| StrokeDash::new(d.into_iter().map(|v| v * scale).collect(), 0.0)),
        ..Stroke::default()
    }
}

/// Control point bending curved connections off the straight chord.
fn curve_control(a: Coordinates, b: Coordinates) -> Coordinates {
    let mid = Coordinates::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    let len = distance(a, b);
    if len == 0.0 {
        return mid;
    }
    let offset = len * 0.2;
    Coordinates::new(
        mid.x - (b.y - a.y) / len * offset,
        mid.y + (b.x - a.x) / len * offset,
    )
}

fn connection_path(a: Coordinates, b: Coordinates, path_type: PathType) -> Option<Path> {
    let mut pb = PathBuilder::new();
    pb.move_to(a.x as f32, a.y as f32);
    if path_type == PathType::Curved {
        let c = curve_control(a, b);
        pb.quad_to(c.x as f32, c.y as f32, b.x as f32, b.y as f32);
    } else {
        pb.line_to(b.x as f32, b.y as f32);
    }
    pb.finish()
}

/// Like [`connection_path`], but stops `gap` pixels short of each endpoint so the stroke
/// stays clear of the marker discs. `None` when the endpoints are too close.
fn trimmed_connection_path(
    a: Coordinates,
    b: Coordinates,
    path_type: PathType,
    gap: f64,
) -> Option<Path> {
    if distance(a, b) <= gap * 2.0 {
        return None;
    }
    let curved = path_type == PathType::Curved;
    let c = curve_control(a, b);
    let step = |from: Coordinates, toward: Coordinates| {
        let len = distance(from, toward);
        if len == 0.0 {
            return from;
        }
        Coordinates::new(
            from.x + (toward.x - from.x) / len * gap,
            from.y + (toward.y - from.y) / len * gap,
        )
    };
    let start = step(a, if curved { c } else { b });
    let end = step(b, if curved { c } else { a });

    let mut pb = PathBuilder::new();
    pb.move_to(start.x as f32, start.y as f32);
    if curved {
        pb.quad_to(c.x as f32, c.y as f32, end.x as f32, end.y as f32);
    } else {
        pb.line_to(end.x as f32, end.y as f32);
    }
    pb.finish()
}

/// Point halfway along the drawn connection.
fn connection_midpoint(a: Coordinates, b: Coordinates, path_type: PathType) -> Coordinates {
    if path_type == PathType::Curved {
        let c = curve_control(a, b);
        Coordinates::new(
            0.25 * a.x + 0.5 * c.x + 0.25 * b.x,
            0.25 * a.y + 0.5 * c.y + 0.25 * b.y,
        )
    } else {
        Coordinates::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }
}

fn segment_visible(a: Coordinates, b: Coordinates, scene: &Scene<'_>) -> bool {
    let pad = distance(a, b) * 0.2 + CULL_MARGIN;
    a.x.max(b.x) >= -pad
        && a.y.max(b.y) >= -pad
        && a.x.min(b.x) <= scene.viewport.width + pad
        && a.y.min(b.y) <= scene.viewport.height + pad
}

fn draw_arrow(canvas: &mut PixmapMut<'_>, tip: Coordinates, heading: f64, size: f64, color: Color) {
    // Barbs sit roughly 145 degrees either side of the heading.
    let spread = 2.5;
    let left = Coordinates::new(
        tip.x + size * (heading - spread).cos(),
        tip.y + size * (heading - spread).sin(),
    );
    let right = Coordinates::new(
        tip.x + size * (heading + spread).cos(),
        tip.y + size * (heading + spread).sin(),
    );
    let mut pb = PathBuilder::new();
    pb.move_to(tip.x as f32, tip.y as f32);
    pb.line_to(left.x as f32, left.y as f32);
    pb.line_to(right.x as f32, right.y as f32);
    pb.close();
    if let Some(path) = pb.finish() {
        canvas.fill_path(
            &path,
            &solid(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

/// Resolves a connection to screen-space endpoints, or `None` if either end is missing.
fn resolve<'s>(
    scene: &'s Scene<'_>,
    conn: &MapConnection,
) -> Option<(Coordinates, Coordinates, &'s MapLocation, &'s MapLocation)> {
    let Some((from, to)) = scene.layer.endpoints(conn) else {
        log::trace!("Skipping connection {} with a missing endpoint", conn.id);
        return None;
    };
    let a = world_to_screen(from.coordinates, &scene.viewport);
    let b = world_to_screen(to.coordinates, &scene.viewport);
    Some((a, b, from, to))
}

/// Draws every connection whose endpoints both exist. Returns how many were drawn.
pub fn draw_connections(canvas: &mut PixmapMut<'_>, scene: &Scene<'_>) -> usize {
    let mut drawn = 0;
    for conn in &scene.layer.connections {
        let Some((a, b, _, _)) = resolve(scene, conn) else {
            continue;
        };
        if !segment_visible(a, b, scene) {
            continue;
        }
        let alpha = if conn.discovered { 0.8 } else { 0.3 };
        let color = scene.theme.path_color(conn.path_type).with_alpha(alpha);
        let Some(path) = connection_path(a, b, conn.path_type) else {
            continue;
        };
        let stroke = connection_stroke(conn.path_type, scene.viewport.zoom);
        canvas.stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);

        if conn.one_way {
            let tip = connection_midpoint(a, b, conn.path_type);
            let size = (6.0 * scene.viewport.zoom.sqrt()).clamp(4.0, 10.0);
            draw_arrow(canvas, tip, angle(a, b), size, color);
        }
        drawn += 1;
    }
    drawn
}

/// Draws the fading character trail up to the current trail progress, with a particle at
/// its head. Returns the number of segments drawn, counting a partial segment.
pub fn draw_trail(canvas: &mut PixmapMut<'_>, scene: &Scene<'_>) -> usize {
    let points: Vec<Coordinates> = scene
        .trail
        .iter()
        .map(|p| world_to_screen(p.coordinates, &scene.viewport))
        .collect();
    if points.len() < 2 {
        return 0;
    }

    let segments = points.len() - 1;
    let reach = scene.trail_progress.clamp(0.0, 1.0) * segments as f64;
    let full = (reach.floor() as usize).min(segments);
    let partial = reach - full as f64;
    let width = (2.5 * scene.viewport.zoom.sqrt() as f32).clamp(1.5, 4.0);
    let stroke = Stroke {
        width,
        line_cap: LineCap::Round,
        ..Stroke::default()
    };

    let mut drawn = 0;
    let mut head = points[0];
    for i in 0..segments {
        let start = points[i];
        let end = if i < full {
            points[i + 1]
        } else if i == full && partial > 0.0 {
            let next = points[i + 1];
            Coordinates::new(
                start.x + (next.x - start.x) * partial,
                start.y + (next.y - start.y) * partial,
            )
        } else {
            break;
        };

        let fade = 0.25 + 0.75 * (i + 1) as f32 / segments as f32;
        let mut pb = PathBuilder::new();
        pb.move_to(start.x as f32, start.y as f32);
        pb.line_to(end.x as f32, end.y as f32);
        if let Some(path) = pb.finish() {
            canvas.stroke_path(
                &path,
                &solid(scene.theme.trail.with_alpha(fade)),
                &stroke,
                Transform::identity(),
                None,
            );
        }
        head = end;
        drawn += 1;
    }

    fill_circle(canvas, head, width * 2.8, scene.theme.trail.with_alpha(0.35));
    fill_circle(canvas, head, width * 1.4, scene.theme.trail.opaque());
    drawn
}

fn draw_glow(canvas: &mut PixmapMut<'_>, center: Coordinates, radius: f32, color: Rgb) {
    let cx = center.x as f32;
    let cy = center.y as f32;
    let stops = vec![
        GradientStop::new(0.0, color.with_alpha(0.45)),
        GradientStop::new(1.0, color.with_alpha(0.0)),
    ];
    let Some(shader) = RadialGradient::new(
        Point::from_xy(cx, cy),
        Point::from_xy(cx, cy),
        radius,
        stops,
        SpreadMode::Pad,
        Transform::identity(),
    ) else {
        return;
    };
    if let Some(path) = PathBuilder::from_circle(cx, cy, radius) {
        let paint = Paint {
            shader,
            anti_alias: true,
            ..Paint::default()
        };
        canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }
}

/// Draws every on-screen location marker and collects labels.
///
/// Discovered markers show their icon when the cache has it and a colored disc otherwise.
pub fn draw_locations(
    canvas: &mut PixmapMut<'_>,
    scene: &Scene<'_>,
    icons: &IconCache,
) -> MarkerStats {
    let mut stats = MarkerStats::default();
    let zoom = scene.viewport.zoom;
    let base_radius = marker_radius(zoom);
    let labels_visible = scene.options.show_labels && zoom > scene.options.label_min_zoom;

    for location in &scene.layer.locations {
        let pos = world_to_screen(location.coordinates, &scene.viewport);
        if !on_screen(pos, scene, CULL_MARGIN) {
            continue;
        }

        let hovered = scene.hovered == Some(location.id.as_str());
        let radius = if hovered { base_radius * 1.2 } else { base_radius };
        let alpha = if location.discovered { 1.0 } else { 0.35 };
        let type_color = scene.theme.location_color(location.location_type);

        if location.discovered && location.is_fully_explored() {
            draw_glow(canvas, pos, radius * 2.2, type_color);
        }

        if let Some(&p) = scene.discovery.get(&location.id) {
            let p = p.clamp(0.0, 1.0) as f32;
            stroke_circle(
                canvas,
                pos,
                radius * (1.0 + 2.0 * p),
                2.0,
                type_color.with_alpha((1.0 - p) * 0.9),
            );
        }

        let icon = if location.discovered {
            let key = IconKey::new(location.location_type, radius * 1.5, type_color);
            let icon = icons.lookup(&key);
            if icon.is_none() && icons.is_pending(&key) {
                stats.pending += 1;
            }
            icon
        } else {
            None
        };
        match icon {
            Some(icon) => {
                fill_circle(canvas, pos, radius, scene.theme.icon_backdrop.opaque());
                let x = (pos.x - f64::from(icon.width()) / 2.0).round() as i32;
                let y = (pos.y - f64::from(icon.height()) / 2.0).round() as i32;
                canvas.draw_pixmap(
                    x,
                    y,
                    icon.as_ref().as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                );
                stats.icons += 1;
            }
            None => {
                fill_circle(canvas, pos, radius, type_color.with_alpha(alpha));
                if location.discovered {
                    stats.fallbacks += 1;
                }
            }
        }

        let outline = scene.theme.danger_color(location.danger_level);
        stroke_circle(canvas, pos, radius, 2.0, outline.with_alpha(alpha));

        if scene.selected == Some(location.id.as_str()) {
            stroke_circle(canvas, pos, radius + 4.0, 2.0, scene.theme.selection.opaque());
        }

        if labels_visible && location.discovered {
            stats.labels.push(LabelPlacement {
                location_id: location.id.clone(),
                text: location.name.clone(),
                x: pos.x as f32,
                y: pos.y as f32 + radius + 4.0,
                font_size: (11.0 * (zoom as f32).sqrt()).clamp(9.0, 16.0),
                color: scene.theme.label,
            });
        }
        stats.drawn += 1;
    }
    stats
}

/// Draws the pulsing current-location highlight and, while the connection pulse runs,
/// the glow along its adjacent connections. Returns how many connections pulsed.
pub fn draw_current_highlight(canvas: &mut PixmapMut<'_>, scene: &Scene<'_>) -> usize {
    let Some(current) = scene.current else {
        return 0;
    };
    let color = scene.theme.current_location;
    let radius = marker_radius(scene.viewport.zoom);
    let mut pulsed = 0;

    if let Some(p) = scene.connection_pulse {
        let fade = (1.0 - p.clamp(0.0, 1.0)) as f32;
        let width = 2.0 + 4.0 * fade;
        // Hovered markers grow by a fifth and carry a 2px outline.
        let gap = f64::from(radius * 1.2 + 1.0 + width / 2.0);
        for conn in &scene.layer.connections {
            if !conn.touches(&current.location_id) {
                continue;
            }
            let Some((a, b, _, _)) = resolve(scene, conn) else {
                continue;
            };
            let Some(path) = trimmed_connection_path(a, b, conn.path_type, gap) else {
                continue;
            };
            let stroke = Stroke {
                width,
                line_cap: LineCap::Round,
                ..Stroke::default()
            };
            canvas.stroke_path(
                &path,
                &solid(color.with_alpha(0.8 * fade)),
                &stroke,
                Transform::identity(),
                None,
            );
            pulsed += 1;
        }
    }

    let pos = world_to_screen(current.coordinates, &scene.viewport);
    let wave = (scene.current_pulse_phase * TAU).sin() as f32;
    fill_circle(
        canvas,
        pos,
        radius * (2.0 + 0.5 * wave),
        color.with_alpha(0.18 + 0.08 * wave),
    );
    stroke_circle(
        canvas,
        pos,
        radius * (1.6 + 0.3 * wave),
        2.0,
        color.with_alpha(0.7 + 0.2 * wave),
    );
    fill_circle(canvas, pos, radius * 0.45, color.opaque());
    pulsed
}
