use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::QualityLevel;

const DEFAULT_ASSET_BASE_URL: &str = "https://aistudiocdn.com/@ffmpeg/ffmpeg@0.12.15/dist/esm";

/// Top-level converter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base location the three engine assets are fetched from.
    pub asset_base_url: String,
    /// Binary driven by the native engine.
    pub ffmpeg_path: PathBuf,
    /// Vorbis quality preselected for new sessions (0..=10).
    pub default_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            asset_base_url: DEFAULT_ASSET_BASE_URL.into(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            default_quality: QualityLevel::default().value(),
        }
    }
}

impl Config {
    /// Directory: ~/.config/ogg-compressor/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("ogg-compressor");
        p
    }

    fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if the file doesn't exist or is invalid.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(data) => Self::parse(&data),
            Err(_) => Self::default(),
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn parse(data: &str) -> Self {
        serde_json::from_str(data).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid config: {e}");
            Self::default()
        })
    }

    /// Preselected quality, clamped into the accepted range.
    pub fn quality(&self) -> QualityLevel {
        QualityLevel::clamped(self.default_quality)
    }
}
