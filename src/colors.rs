//! Color palette for map elements and the theme that maps tags to colors.

use crate::{DangerLevel, LocationType, PathType};
use resvg::tiny_skia;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// An opaque sRGB color, written as `#rrggbb` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Converts to a rasterizer color with the given alpha in `[0, 1]`.
    pub fn with_alpha(self, alpha: f32) -> tiny_skia::Color {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, a)
    }

    pub fn opaque(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, 255)
    }

    /// Channel-wise linear interpolation from `self` to `other`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgb::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Error returned when a hex color string is malformed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid hex color '{0}' (expected #rrggbb or #rgb)")]
pub struct ParseRgbError(String);

impl FromStr for Rgb {
    type Err = ParseRgbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let err = || ParseRgbError(s.to_owned());
        if !hex.is_ascii() {
            return Err(err());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| err())
        };
        match hex.len() {
            6 => Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            3 => {
                let expand = |v: u8| v * 17;
                Ok(Rgb::new(
                    expand(channel(0..1)?),
                    expand(channel(1..2)?),
                    expand(channel(2..3)?),
                ))
            }
            _ => Err(err()),
        }
    }
}

// Surfaces
pub const BACKGROUND: Rgb = Rgb::new(17, 24, 39);
pub const GRID: Rgb = Rgb::new(55, 65, 81);
pub const FOG: Rgb = Rgb::new(3, 7, 18);
pub const TRAIL: Rgb = Rgb::new(251, 191, 36);
pub const CURRENT_LOCATION: Rgb = Rgb::new(34, 211, 238);
pub const SELECTION: Rgb = Rgb::new(255, 255, 255);
pub const LABEL: Rgb = Rgb::new(229, 231, 235);
pub const ICON_BACKDROP: Rgb = Rgb::new(31, 41, 55);

pub fn default_location_color(location_type: LocationType) -> Rgb {
    match location_type {
        LocationType::Town => Rgb::new(96, 165, 250),
        LocationType::City => Rgb::new(129, 140, 248),
        LocationType::Village => Rgb::new(74, 222, 128),
        LocationType::Dungeon => Rgb::new(248, 113, 113),
        LocationType::Forest => Rgb::new(34, 197, 94),
        LocationType::Mountain => Rgb::new(168, 162, 158),
        LocationType::Cave => Rgb::new(161, 98, 7),
        LocationType::Ruins => Rgb::new(214, 211, 209),
        LocationType::Shrine => Rgb::new(232, 121, 249),
        LocationType::Landmark => Rgb::new(250, 204, 21),
        LocationType::Unknown => Rgb::new(156, 163, 175),
    }
}

pub fn default_danger_color(danger: DangerLevel) -> Rgb {
    match danger {
        DangerLevel::Safe => Rgb::new(34, 197, 94),
        DangerLevel::Low => Rgb::new(163, 230, 53),
        DangerLevel::Medium => Rgb::new(250, 204, 21),
        DangerLevel::High => Rgb::new(249, 115, 22),
        DangerLevel::Extreme => Rgb::new(220, 38, 38),
    }
}

pub fn default_path_color(path_type: PathType) -> Rgb {
    match path_type {
        PathType::Direct => Rgb::new(148, 163, 184),
        PathType::Curved => Rgb::new(134, 239, 172),
        PathType::Teleport => Rgb::new(192, 132, 252),
        PathType::Stairs => Rgb::new(253, 186, 116),
        PathType::Elevator => Rgb::new(125, 211, 252),
    }
}

/// Closed mapping from every tag the renderer draws to a color.
///
/// Missing map entries fall back to the built-in palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub background: Rgb,
    pub grid: Rgb,
    pub fog: Rgb,
    pub trail: Rgb,
    pub current_location: Rgb,
    pub selection: Rgb,
    pub label: Rgb,
    pub icon_backdrop: Rgb,
    pub location_types: BTreeMap<LocationType, Rgb>,
    pub danger_levels: BTreeMap<DangerLevel, Rgb>,
    pub path_types: BTreeMap<PathType, Rgb>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: BACKGROUND,
            grid: GRID,
            fog: FOG,
            trail: TRAIL,
            current_location: CURRENT_LOCATION,
            selection: SELECTION,
            label: LABEL,
            icon_backdrop: ICON_BACKDROP,
            location_types: LocationType::ALL
                .iter()
                .map(|&t| (t, default_location_color(t)))
                .collect(),
            danger_levels: DangerLevel::ALL
                .iter()
                .map(|&d| (d, default_danger_color(d)))
                .collect(),
            path_types: PathType::ALL
                .iter()
                .map(|&p| (p, default_path_color(p)))
                .collect(),
        }
    }
}

impl Theme {
    pub fn location_color(&self, location_type: LocationType) -> Rgb {
        self.location_types
            .get(&location_type)
            .copied()
            .unwrap_or_else(|| default_location_color(location_type))
    }

    pub fn danger_color(&self, danger: DangerLevel) -> Rgb {
        self.danger_levels
            .get(&danger)
            .copied()
            .unwrap_or_else(|| default_danger_color(danger))
    }

    pub fn path_color(&self, path_type: PathType) -> Rgb {
        self.path_types
            .get(&path_type)
            .copied()
            .unwrap_or_else(|| default_path_color(path_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!("#1e90ff".parse::<Rgb>().unwrap(), Rgb::new(30, 144, 255));
        assert_eq!("ABC".parse::<Rgb>().unwrap(), Rgb::new(170, 187, 204));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
        assert!("#ééé".parse::<Rgb>().is_err());
    }

    #[test]
    fn display_round_trips() {
        let c = Rgb::new(1, 171, 255);
        assert_eq!(c.to_string(), "#01abff");
        assert_eq!(c.to_string().parse::<Rgb>().unwrap(), c);
    }

    #[test]
    fn lerp_hits_endpoints_and_midpoint() {
        let a = Rgb::new(0, 100, 200);
        let b = Rgb::new(200, 100, 0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Rgb::new(100, 100, 100));
    }

    #[test]
    fn theme_reads_partial_ron() {
        let theme: Theme = ron::from_str(
            r##"(background: "#000000", location_types: { town: "#ff0000" })"##,
        )
        .unwrap();
        assert_eq!(theme.background, Rgb::new(0, 0, 0));
        assert_eq!(theme.location_color(LocationType::Town), Rgb::new(255, 0, 0));
        assert_eq!(
            theme.location_color(LocationType::Cave),
            default_location_color(LocationType::Cave)
        );
        assert_eq!(theme.grid, GRID);
    }
}
