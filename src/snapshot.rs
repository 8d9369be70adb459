//! Map-data snapshots supplied by the host, and helpers to query them.

use crate::{Bounds, CurrentLocation, LayerData, MapConnection, MapLocation, TrailPoint};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading a snapshot file.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to read snapshot '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse RON snapshot: {0}")]
    Ron(#[from] ron::de::SpannedError),
    #[error("failed to parse JSON snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot format '{0}' (expected .ron or .json)")]
    UnsupportedFormat(String),
}

/// Serialization formats a snapshot can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Ron,
    Json,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_lowercase();
        match ext.as_str() {
            "ron" => Ok(Self::Ron),
            "json" => Ok(Self::Json),
            _ => Err(SnapshotError::UnsupportedFormat(ext)),
        }
    }
}

/// Total, instantaneous view of the map as the host last fetched it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapSnapshot {
    #[serde(default)]
    pub layers: Vec<LayerData>,
    #[serde(default)]
    pub character_trail: Vec<TrailPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<CurrentLocation>,
}

impl MapSnapshot {
    pub fn parse(text: &str, format: SnapshotFormat) -> Result<Self, SnapshotError> {
        match format {
            SnapshotFormat::Ron => Ok(ron::from_str(text)?),
            SnapshotFormat::Json => Ok(serde_json::from_str(text)?),
        }
    }

    /// Reads a snapshot file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let format = SnapshotFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, format)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerData> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// The layer the player stands on, falling back to the lowest layer.
    pub fn default_layer_id(&self) -> Option<&str> {
        if let Some(current) = &self.current_location
            && self.layer(&current.layer).is_some()
        {
            return Some(current.layer.as_str());
        }
        self.layers
            .iter()
            .min_by_key(|layer| layer.level)
            .map(|layer| layer.id.as_str())
    }

    /// Ids of every location across all layers.
    pub fn location_ids(&self) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .flat_map(|layer| layer.locations.iter().map(|loc| loc.id.as_str()))
    }

    pub fn find_location(&self, id: &str) -> Option<&MapLocation> {
        self.layers.iter().find_map(|layer| layer.location(id))
    }
}

impl LayerData {
    pub fn location(&self, id: &str) -> Option<&MapLocation> {
        self.locations.iter().find(|loc| loc.id == id)
    }

    /// World-space bounds of all locations; `None` for an empty layer.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self.locations.iter().map(|loc| loc.coordinates);
        let first = iter.next()?;
        let init = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(iter.fold(init, |b, p| Bounds {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    /// Cheapest discovered connection that can be walked from `from` to `to`.
    pub fn discovered_route(&self, from: &str, to: &str) -> Option<&MapConnection> {
        self.connections
            .iter()
            .filter(|conn| conn.discovered && conn.leads(from, to))
            .min_by_key(|conn| conn.cost)
    }

    /// Resolves both endpoints of a connection; `None` when either is absent from this layer.
    pub fn endpoints(&self, conn: &MapConnection) -> Option<(&MapLocation, &MapLocation)> {
        Some((self.location(&conn.from)?, self.location(&conn.to)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coordinates, LocationType, PathType};

    fn location(id: &str, x: f64, y: f64) -> MapLocation {
        MapLocation {
            id: id.to_owned(),
            name: id.to_uppercase(),
            coordinates: Coordinates::new(x, y),
            location_type: LocationType::Town,
            danger_level: Default::default(),
            discovered: true,
            exploration_percentage: 0.0,
            last_visited: None,
        }
    }

    fn connection(id: &str, from: &str, to: &str, one_way: bool, cost: u32) -> MapConnection {
        MapConnection {
            id: id.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
            path_type: PathType::Direct,
            one_way,
            discovered: true,
            cost,
        }
    }

    #[test]
    fn parses_ron_with_defaults() {
        let text = r#"(
            layers: [(
                id: "ground",
                name: "Ground",
                locations: [(
                    id: "a",
                    name: "Alpha",
                    coordinates: (x: 1.0, y: 2.0),
                    location_type: town,
                )],
            )],
        )"#;
        let snapshot = MapSnapshot::parse(text, SnapshotFormat::Ron).unwrap();
        let layer = snapshot.layer("ground").unwrap();
        assert_eq!(layer.locations[0].coordinates, Coordinates::new(1.0, 2.0));
        assert!(!layer.locations[0].discovered);
        assert!(snapshot.current_location.is_none());
    }

    #[test]
    fn unknown_location_type_falls_back() {
        let text = r#"{"layers":[{"id":"g","name":"G","locations":[
            {"id":"a","name":"A","coordinates":{"x":0,"y":0},"location_type":"volcano"}
        ]}]}"#;
        let snapshot = MapSnapshot::parse(text, SnapshotFormat::Json).unwrap();
        assert_eq!(
            snapshot.layers[0].locations[0].location_type,
            LocationType::Unknown
        );
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            SnapshotFormat::from_path(Path::new("map.RON")).unwrap(),
            SnapshotFormat::Ron
        );
        assert!(matches!(
            SnapshotFormat::from_path(Path::new("map.yaml")),
            Err(SnapshotError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn exploration_is_clamped() {
        let mut loc = location("a", 0.0, 0.0);
        loc.exploration_percentage = 140.0;
        assert_eq!(loc.exploration(), 100.0);
        loc.exploration_percentage = f64::NAN;
        assert_eq!(loc.exploration(), 0.0);
    }

    #[test]
    fn route_respects_one_way_and_cost() {
        let layer = LayerData {
            id: "g".into(),
            name: "G".into(),
            locations: vec![location("a", 0.0, 0.0), location("b", 10.0, 0.0)],
            connections: vec![
                connection("ab", "a", "b", true, 5),
                connection("ab2", "a", "b", false, 3),
            ],
            ..Default::default()
        };
        assert_eq!(layer.discovered_route("a", "b").unwrap().id, "ab2");
        assert_eq!(layer.discovered_route("b", "a").unwrap().id, "ab2");

        let one_way_only = LayerData {
            connections: vec![connection("ab", "a", "b", true, 5)],
            ..layer
        };
        assert!(one_way_only.discovered_route("b", "a").is_none());
    }

    #[test]
    fn default_layer_prefers_current_location() {
        let snapshot = MapSnapshot {
            layers: vec![
                LayerData {
                    id: "upper".into(),
                    level: 1,
                    ..Default::default()
                },
                LayerData {
                    id: "ground".into(),
                    level: 0,
                    ..Default::default()
                },
            ],
            character_trail: Vec::new(),
            current_location: None,
        };
        assert_eq!(snapshot.default_layer_id(), Some("ground"));

        let snapshot = MapSnapshot {
            current_location: Some(CurrentLocation {
                location_id: "x".into(),
                layer: "upper".into(),
                coordinates: Coordinates::default(),
            }),
            ..snapshot
        };
        assert_eq!(snapshot.default_layer_id(), Some("upper"));
    }

    #[test]
    fn bounds_cover_all_locations() {
        let layer = LayerData {
            locations: vec![location("a", -5.0, 3.0), location("b", 10.0, -2.0)],
            ..Default::default()
        };
        let bounds = layer.bounds().unwrap();
        assert_eq!(bounds.min_x, -5.0);
        assert_eq!(bounds.max_x, 10.0);
        assert_eq!(bounds.min_y, -2.0);
        assert_eq!(bounds.max_y, 3.0);
        assert!(LayerData::default().bounds().is_none());
    }
}
