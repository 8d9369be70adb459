//! Coordinate transformation utilities for converting world positions to screen pixels.

use crate::constants::{ZOOM_MAX, ZOOM_MIN};
use crate::{Bounds, Coordinates, Viewport};

/// Converts a world position to a screen pixel position.
///
/// The camera center lands on the middle of the drawing surface.
pub fn world_to_screen(p: Coordinates, vp: &Viewport) -> Coordinates {
    Coordinates::new(
        (p.x - vp.x) * vp.zoom + vp.width / 2.0,
        (p.y - vp.y) * vp.zoom + vp.height / 2.0,
    )
}

/// Inverse of [`world_to_screen`].
pub fn screen_to_world(p: Coordinates, vp: &Viewport) -> Coordinates {
    Coordinates::new(
        (p.x - vp.width / 2.0) / vp.zoom + vp.x,
        (p.y - vp.height / 2.0) / vp.zoom + vp.y,
    )
}

pub fn distance(a: Coordinates, b: Coordinates) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Angle in radians of the vector from `a` to `b`.
pub fn angle(a: Coordinates, b: Coordinates) -> f64 {
    (b.y - a.y).atan2(b.x - a.x)
}

/// World-space rectangle currently visible through the viewport.
pub fn viewport_bounds(vp: &Viewport) -> Bounds {
    let half_w = vp.width / (2.0 * vp.zoom);
    let half_h = vp.height / (2.0 * vp.zoom);
    Bounds {
        min_x: vp.x - half_w,
        min_y: vp.y - half_h,
        max_x: vp.x + half_w,
        max_y: vp.y + half_h,
    }
}

/// Clamps a zoom factor to `[min, max]`. Non-finite or non-positive input yields `min`.
/// An inverted range collapses to `min`.
pub fn clamp_zoom_in(zoom: f64, min: f64, max: f64) -> f64 {
    if !zoom.is_finite() || zoom <= 0.0 {
        return min;
    }
    zoom.max(min).min(max.max(min))
}

/// Clamps a zoom factor to the default range.
pub fn clamp_zoom(zoom: f64) -> f64 {
    clamp_zoom_in(zoom, ZOOM_MIN, ZOOM_MAX)
}

/// Recenters the camera so the visible area stays inside `world`.
///
/// On an axis where the visible span exceeds the world, the camera centers on the
/// world midpoint; otherwise it is pushed back inside the nearest edge.
pub fn clamp_viewport(vp: &Viewport, world: &Bounds) -> Viewport {
    let half_w = vp.width / (2.0 * vp.zoom);
    let half_h = vp.height / (2.0 * vp.zoom);
    let center = world.center();

    let x = if half_w * 2.0 >= world.width() {
        center.x
    } else {
        vp.x.clamp(world.min_x + half_w, world.max_x - half_w)
    };
    let y = if half_h * 2.0 >= world.height() {
        center.y
    } else {
        vp.y.clamp(world.min_y + half_h, world.max_y - half_h)
    };

    Viewport { x, y, ..*vp }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn vp(x: f64, y: f64, zoom: f64) -> Viewport {
        Viewport {
            x,
            y,
            zoom,
            width: 200.0,
            height: 200.0,
        }
    }

    #[test]
    fn world_origin_maps_to_screen_center() {
        let p = world_to_screen(Coordinates::new(0.0, 0.0), &vp(0.0, 0.0, 1.0));
        assert_eq!(p, Coordinates::new(100.0, 100.0));
        let p = world_to_screen(Coordinates::new(100.0, 100.0), &vp(0.0, 0.0, 1.0));
        assert_eq!(p, Coordinates::new(200.0, 200.0));
    }

    #[test]
    fn screen_to_world_inverts_world_to_screen() {
        let viewports = [
            vp(0.0, 0.0, 1.0),
            vp(-340.5, 12.25, 0.1),
            vp(1e4, -7.0, 5.0),
            vp(3.0, 3.0, 2.37),
        ];
        let points = [
            Coordinates::new(0.0, 0.0),
            Coordinates::new(-1234.5, 98.1),
            Coordinates::new(1e5, -1e5),
            Coordinates::new(0.001, 7.77),
        ];
        for v in &viewports {
            for &p in &points {
                let back = screen_to_world(world_to_screen(p, v), v);
                let tol = EPS * p.x.abs().max(p.y.abs()).max(1.0) * 1e3;
                assert!((back.x - p.x).abs() < tol, "{p:?} via {v:?} -> {back:?}");
                assert!((back.y - p.y).abs() < tol, "{p:?} via {v:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn distance_and_angle() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(3.0, 4.0);
        assert!((distance(a, b) - 5.0).abs() < EPS);
        assert!((angle(a, Coordinates::new(0.0, 1.0)) - std::f64::consts::FRAC_PI_2).abs() < EPS);
        assert!((angle(a, Coordinates::new(-1.0, 0.0)) - std::f64::consts::PI).abs() < EPS);
    }

    #[test]
    fn bounds_shrink_as_zoom_grows() {
        let b1 = viewport_bounds(&vp(10.0, 20.0, 1.0));
        assert_eq!(b1.min_x, -90.0);
        assert_eq!(b1.max_y, 120.0);
        let b2 = viewport_bounds(&vp(10.0, 20.0, 2.0));
        assert_eq!(b2.width(), 100.0);
        assert_eq!(b2.center(), Coordinates::new(10.0, 20.0));
    }

    #[test]
    fn zoom_is_always_clamped() {
        assert_eq!(clamp_zoom(0.0), ZOOM_MIN);
        assert_eq!(clamp_zoom(-3.0), ZOOM_MIN);
        assert_eq!(clamp_zoom(f64::NAN), ZOOM_MIN);
        assert_eq!(clamp_zoom(f64::INFINITY), ZOOM_MIN);
        assert_eq!(clamp_zoom(100.0), ZOOM_MAX);
        assert_eq!(clamp_zoom(0.01), ZOOM_MIN);
        assert_eq!(clamp_zoom(1.5), 1.5);
    }

    #[test]
    fn inverted_zoom_range_collapses_to_min() {
        assert_eq!(clamp_zoom_in(1.5, 2.0, 1.0), 2.0);
        assert_eq!(clamp_zoom_in(5.0, 2.0, 1.0), 2.0);
        assert_eq!(clamp_zoom_in(0.1, 2.0, 1.0), 2.0);
    }

    #[test]
    fn clamp_viewport_centers_when_world_is_smaller() {
        let world = Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 100.0,
            max_y: 100.0,
        };
        let clamped = clamp_viewport(&vp(500.0, -500.0, 1.0), &world);
        assert_eq!((clamped.x, clamped.y), (50.0, 50.0));
    }

    #[test]
    fn clamp_viewport_pushes_back_inside_edges() {
        let world = Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1000.0,
            max_y: 1000.0,
        };
        let clamped = clamp_viewport(&vp(-50.0, 2000.0, 1.0), &world);
        assert_eq!((clamped.x, clamped.y), (100.0, 900.0));

        let inside = vp(400.0, 600.0, 1.0);
        assert_eq!(clamp_viewport(&inside, &world), inside);
    }
}
