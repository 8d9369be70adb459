use std::time::Duration;

/// Width of the sidebar panel in pixels.
pub const SIDEBAR_WIDTH: f32 = 220.0;

/// Zoom multiplier for the +/- keys.
pub const KEY_ZOOM_FACTOR: f64 = 1.2;

/// Offset of the label drop shadow in pixels.
pub const LABEL_SHADOW_OFFSET: f32 = 1.0;

/// How far the headless export advances the clock so every animation has settled.
pub const HEADLESS_SETTLE: Duration = Duration::from_secs(30);

/// Headless export re-renders at most this many times waiting for icons.
pub const HEADLESS_ICON_RETRIES: usize = 40;
