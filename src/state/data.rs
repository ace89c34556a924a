/// Shared data structures for stickers and converted artifacts
///
/// These types sit between the Bot API layer (which speaks in loose
/// `is_animated` / `is_video` flags) and the converters (which only
/// understand a closed `StickerKind`).

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::RequestError;

/// The three sticker encodings Telegram hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickerKind {
    /// WebP still image
    Static,
    /// TGS (gzipped Lottie) vector animation
    Animated,
    /// WebM / VP9 video
    Video,
}

impl StickerKind {
    /// Classify from the Bot API flags. Video wins over animated.
    pub fn from_flags(is_animated: bool, is_video: bool) -> Self {
        if is_video {
            StickerKind::Video
        } else if is_animated {
            StickerKind::Animated
        } else {
            StickerKind::Static
        }
    }

    /// Extension of the file as downloaded from Telegram
    pub fn source_extension(self) -> &'static str {
        match self {
            StickerKind::Static => "webp",
            StickerKind::Animated => "tgs",
            StickerKind::Video => "webm",
        }
    }

    pub fn target_format(self) -> ArtifactFormat {
        match self {
            StickerKind::Static => ArtifactFormat::Png,
            StickerKind::Animated | StickerKind::Video => ArtifactFormat::Gif,
        }
    }
}

impl fmt::Display for StickerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StickerKind::Static => "static",
            StickerKind::Animated => "animated",
            StickerKind::Video => "video",
        };
        f.write_str(name)
    }
}

/// A sticker as far as this bot cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Per-request id, only good for fetching the bytes
    pub file_id: String,
    /// Stable id, safe to use in file names
    pub unique_id: String,
    pub kind: StickerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Png,
    Gif,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Png => "png",
            ArtifactFormat::Gif => "gif",
        }
    }
}

/// A converted file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedArtifact {
    pub source_id: String,
    pub path: PathBuf,
    pub format: ArtifactFormat,
}

impl ConvertedArtifact {
    /// The in-place path for an asset's artifact: `<dir>/<unique_id>.<ext>`
    pub fn derived_path(dir: &Path, asset: &Asset) -> PathBuf {
        let ext = asset.kind.target_format().extension();
        dir.join(format!("{}.{}", asset.unique_id, ext))
    }

    pub fn for_asset(dir: &Path, asset: &Asset) -> Self {
        Self {
            source_id: asset.unique_id.clone(),
            path: Self::derived_path(dir, asset),
            format: asset.kind.target_format(),
        }
    }

    /// Display name used when uploading the artifact
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.source_id, self.format.extension())
    }
}

/// Sticker set name, validated so it can be used as a directory name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetName(String);

/// Telegram caps set names at 64 characters
const MAX_SET_NAME_LEN: usize = 64;

impl SetName {
    /// Accept only `[A-Za-z0-9_]{1,64}`, which rules out `..`, separators and NUL
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SET_NAME_LEN
            && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid {
            Ok(SetName(raw.to_string()))
        } else {
            Err(RequestError::InvalidSetName(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
