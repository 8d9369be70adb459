//! Minimap rendering engine: viewport math, fog of war, tweening, icon caching and a
//! software frame pipeline over a read-only map snapshot.

use serde::{Deserialize, Serialize};

pub mod animation;
pub mod colors;
pub mod config;
pub mod constants;
pub mod controller;
pub mod coordinates;
pub mod fog;
pub mod icons;
pub mod layers;
pub mod overlays;
pub mod performance;
pub mod render;
pub mod snapshot;

pub use animation::{AnimValue, AnimationManager, Easing, FrameClock};
pub use colors::{Rgb, Theme};
pub use config::{ConfigError, MinimapConfig};
pub use controller::{MarkerPhase, MinimapController, MinimapEvent, MoveIntent};
pub use fog::{FogConfig, FogOfWarRenderer, FogPreset};
pub use icons::{IconCache, IconError, IconKey, IconRasterizer, SvgIconRasterizer};
pub use performance::PerformanceMonitor;
pub use render::{FrameReport, LabelPlacement, PipelineKind, RenderPipeline};
pub use snapshot::{MapSnapshot, SnapshotError};

/// Re-export of the rasterizer backing every surface the engine draws into.
pub use resvg::tiny_skia;

/// Identifier of a map location, unique within a snapshot.
pub type LocationId = String;

/// A position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Camera window through which the world is observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Camera center, world x
    pub x: f64,
    /// Camera center, world y
    pub y: f64,
    /// Zoom factor, always clamped to the configured range before use
    pub zoom: f64,
    /// Drawing surface width in pixels
    pub width: f64,
    /// Drawing surface height in pixels
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            width: 320.0,
            height: 240.0,
        }
    }
}

/// Kind of place a location represents; selects its color and glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Town,
    City,
    Village,
    Dungeon,
    Forest,
    Mountain,
    Cave,
    Ruins,
    Shrine,
    Landmark,
    #[serde(other)]
    Unknown,
}

impl LocationType {
    pub const ALL: [LocationType; 11] = [
        Self::Town,
        Self::City,
        Self::Village,
        Self::Dungeon,
        Self::Forest,
        Self::Mountain,
        Self::Cave,
        Self::Ruins,
        Self::Shrine,
        Self::Landmark,
        Self::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Town => "Town",
            Self::City => "City",
            Self::Village => "Village",
            Self::Dungeon => "Dungeon",
            Self::Forest => "Forest",
            Self::Mountain => "Mountain",
            Self::Cave => "Cave",
            Self::Ruins => "Ruins",
            Self::Shrine => "Shrine",
            Self::Landmark => "Landmark",
            Self::Unknown => "Unknown",
        }
    }
}

/// Ordered danger rating; selects the marker outline color.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DangerLevel {
    #[default]
    Safe,
    Low,
    Medium,
    High,
    Extreme,
}

impl DangerLevel {
    pub const ALL: [DangerLevel; 5] = [
        Self::Safe,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Extreme,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Extreme => "Extreme",
        }
    }
}

/// How a connection is traversed; each kind has its own stroke style.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    #[default]
    Direct,
    Curved,
    Teleport,
    Stairs,
    Elevator,
}

impl PathType {
    pub const ALL: [PathType; 5] = [
        Self::Direct,
        Self::Curved,
        Self::Teleport,
        Self::Stairs,
        Self::Elevator,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Direct => "Road",
            Self::Curved => "Trail",
            Self::Teleport => "Teleport",
            Self::Stairs => "Stairs",
            Self::Elevator => "Elevator",
        }
    }
}

/// A node on the map, supplied by the host as an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLocation {
    pub id: LocationId,
    /// Display name drawn below the marker
    pub name: String,
    pub coordinates: Coordinates,
    pub location_type: LocationType,
    #[serde(default)]
    pub danger_level: DangerLevel,
    #[serde(default)]
    pub discovered: bool,
    /// Percentage in `[0, 100]`; use [`MapLocation::exploration`] for the clamped value
    #[serde(default)]
    pub exploration_percentage: f64,
    /// Unix milliseconds of the last visit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visited: Option<u64>,
}

impl MapLocation {
    /// Exploration percentage clamped to `[0, 100]`; non-finite input reads as 0.
    pub fn exploration(&self) -> f64 {
        clamp_percentage(self.exploration_percentage)
    }

    pub fn is_fully_explored(&self) -> bool {
        self.exploration() >= 100.0
    }
}

/// An edge between two locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConnection {
    pub id: String,
    pub from: LocationId,
    pub to: LocationId,
    #[serde(default)]
    pub path_type: PathType,
    #[serde(default)]
    pub one_way: bool,
    #[serde(default)]
    pub discovered: bool,
    /// Traversal cost shown to the player before travelling
    #[serde(default)]
    pub cost: u32,
}

impl MapConnection {
    /// Whether this connection can be walked from `from` to `to`.
    pub fn leads(&self, from: &str, to: &str) -> bool {
        (self.from == from && self.to == to)
            || (!self.one_way && self.from == to && self.to == from)
    }

    pub fn touches(&self, id: &str) -> bool {
        self.from == id || self.to == id
    }
}

/// Per-location exploration record used to drive fog reveals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationProgress {
    pub location_id: LocationId,
    #[serde(default)]
    pub exploration_percentage: f64,
    /// Named sub-areas the player has explored
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explored_areas: Vec<String>,
    /// Unix milliseconds at which fog first lifted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fog_revealed_at: Option<u64>,
    /// Unix milliseconds at which the location reached 100%
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_explored_at: Option<u64>,
}

impl ExplorationProgress {
    pub fn exploration(&self) -> f64 {
        clamp_percentage(self.exploration_percentage)
    }
}

/// One step of the path the player has physically traced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub location_id: LocationId,
    /// Unix milliseconds
    pub timestamp: u64,
    pub layer: String,
    pub coordinates: Coordinates,
}

/// Where the player is right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentLocation {
    pub location_id: LocationId,
    pub layer: String,
    pub coordinates: Coordinates,
}

/// One vertical slice ("floor") of the world.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerData {
    pub id: String,
    pub name: String,
    /// Vertical ordering; ground floor is 0
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub locations: Vec<MapLocation>,
    #[serde(default)]
    pub connections: Vec<MapConnection>,
    #[serde(default)]
    pub exploration: Vec<ExplorationProgress>,
}

/// Axis-aligned world-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn contains(&self, p: Coordinates) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn expand(&self, amount: f64) -> Self {
        Self {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }
}

fn clamp_percentage(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
