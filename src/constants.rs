/// Minimum zoom level.
pub const ZOOM_MIN: f64 = 0.1;

/// Maximum zoom level.
pub const ZOOM_MAX: f64 = 5.0;

/// Multiplicative zoom step applied per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 0.1;

/// Hit-test radius in screen pixels; divided by zoom to get world units.
pub const HIT_RADIUS: f64 = 15.0;

/// Labels are only drawn above this zoom.
pub const LABEL_MIN_ZOOM: f64 = 0.5;

/// Default render rate.
pub const TARGET_FPS: f64 = 60.0;

/// World units between grid lines.
pub const GRID_SPACING: f64 = 50.0;

/// Grid lines closer than this many pixels are skipped.
pub const GRID_MIN_PIXEL_SPACING: f64 = 8.0;

/// Duration of the expanding ring shown when a location is discovered.
pub const DISCOVERY_PULSE_MS: u64 = 1200;

/// Duration of the connection pulse after the current location changes.
pub const CONNECTION_PULSE_MS: u64 = 2000;

/// Duration of the trail draw-in animation.
pub const TRAIL_ANIMATION_MS: u64 = 2000;

/// Period of the current-location highlight pulse, in seconds.
pub const CURRENT_PULSE_PERIOD_SECS: f64 = 1.6;

/// Base marker radius in pixels at zoom 1.0.
pub const MARKER_RADIUS: f32 = 8.0;

/// Frame-time samples kept by the performance monitor.
pub const PERF_WINDOW: usize = 60;

/// Size of the viewer panel when collapsed.
pub const COLLAPSED_SIZE: [f32; 2] = [320.0, 240.0];
