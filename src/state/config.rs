/// Settings document (`config.json`)
///
/// Only `token`, `admin` and `whitelist` are required. Everything else has a
/// default so an old three-field config keeps working.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// How WebM stickers are turned into GIFs
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoStrategy {
    /// Extract PNG frames with ffmpeg, assemble the GIF in-process
    #[default]
    Frames,
    /// Single ffmpeg call with palettegen/paletteuse
    Palette,
}

/// Paths (or names on `$PATH`) of the external tools
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ToolPaths {
    pub dwebp: String,
    pub ffmpeg: String,
    pub docker: String,
    /// Container image that turns `/source/sticker.tgs` into `sticker.tgs.gif`
    pub tgs_image: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            dwebp: "dwebp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            docker: "docker".to_string(),
            tgs_image: "edasriyan/tgs-to-gif".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Bot API token
    pub token: String,
    /// Administrators (can extend the whitelist)
    pub admin: Vec<i64>,
    /// Whitelisted users
    pub whitelist: Vec<i64>,

    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
    #[serde(default)]
    pub video_strategy: VideoStrategy,
    /// Use the 64x64 animation preset instead of 512x512
    #[serde(default)]
    pub compress_animations: bool,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_network_timeout")]
    pub network_timeout_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_frame_cache_ttl")]
    pub frame_cache_ttl_secs: u64,
    #[serde(default)]
    pub tools: ToolPaths,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("files")
}

fn default_tool_timeout() -> u64 {
    120
}

fn default_network_timeout() -> u64 {
    60
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_frame_cache_ttl() -> u64 {
    24 * 60 * 60
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write the whole document back.
    ///
    /// The JSON goes to a sibling `.tmp` file first and is renamed over the
    /// target, so a crash never leaves a half-written config behind.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Persist(format!("serialize: {}", e)))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .map_err(|e| ConfigError::Persist(format!("write {}: {}", tmp_path.display(), e)))?;
        fs::rename(&tmp_path, path)
            .map_err(|e| ConfigError::Persist(format!("rename to {}: {}", path.display(), e)))?;

        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn frame_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.frame_cache_ttl_secs)
    }
}
