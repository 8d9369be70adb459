//! Color helpers for the parts of the viewer egui paints itself.

use eframe::egui::Color32;
use minimap::Rgb;

// Label text
pub const LABEL_SHADOW: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 180);

// Minimap panel frame
pub const PANEL_BORDER: Color32 = Color32::from_rgb(75, 85, 99);
pub const PANEL_BORDER_EXPANDED: Color32 = Color32::from_rgb(34, 211, 238);

pub fn to_color32(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb.r, rgb.g, rgb.b)
}
