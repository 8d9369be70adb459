//! Embedded assets shipped with the viewer.

use minimap::snapshot::{MapSnapshot, SnapshotError, SnapshotFormat};
use rust_embed::RustEmbed;
use thiserror::Error;

/// Embeds all assets from the assets/ directory into the binary.
/// In debug mode, assets are loaded from the filesystem for faster iteration.
/// In release mode, assets are compressed and embedded in the binary.
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Assets;

const DEMO_MAP: &str = "demo_map.ron";

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("{0} not found in embedded assets")]
    NotFound(&'static str),
    #[error("invalid UTF-8 in demo_map.ron: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("failed to parse demo_map.ron: {0}")]
    Parse(#[from] SnapshotError),
}

/// Loads the bundled demo map used when no snapshot file is given.
pub fn load_demo_snapshot() -> Result<MapSnapshot, AssetError> {
    let file = Assets::get(DEMO_MAP).ok_or(AssetError::NotFound(DEMO_MAP))?;
    let text = std::str::from_utf8(&file.data)?;
    Ok(MapSnapshot::parse(text, SnapshotFormat::Ron)?)
}
