/// Sticker conversion module
///
/// This module handles:
/// - Static stickers: WebP → PNG with `dwebp` (webp.rs)
/// - Animated stickers: TGS → GIF with a containerized converter (animation.rs)
/// - Video stickers: WebM → GIF with ffmpeg (video.rs, frames.rs)
/// - Running external tools with timeouts (process.rs)
///
/// `Converters` ties them together behind the `MediaConverter` trait.

pub mod animation;
pub mod frames;
pub mod process;
pub mod video;
pub mod webp;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::error::ConvertError;
use crate::state::config::{Settings, VideoStrategy};
use crate::state::data::{Asset, StickerKind};
use crate::state::locks::KeyedLocks;
use animation::{AnimationPreset, AnimationTool};
use frames::{FrameCache, GifOptions};
use video::VideoTool;

/// Anything that can turn a downloaded sticker into a viewable file
#[async_trait]
pub trait MediaConverter: Send + Sync {
    /// Convert the downloaded bytes of `asset` at `source`.
    /// Returns where the converted file ended up.
    async fn convert(&self, asset: &Asset, source: &Path) -> Result<PathBuf, ConvertError>;
}

/// The real converters, configured from the settings document
pub struct Converters {
    dwebp: String,
    animation: AnimationTool,
    preset: AnimationPreset,
    video: VideoTool,
    timeout: Duration,
    /// Process-wide scratch root, removed when the bot exits
    scratch: TempDir,
    locks: KeyedLocks,
}

impl Converters {
    pub fn from_settings(settings: &Settings, cache: FrameCache) -> std::io::Result<Self> {
        let prefix = format!("tgs2gif-{}-", chrono::Local::now().format("%Y-%m-%d"));
        let scratch = tempfile::Builder::new().prefix(&prefix).tempdir()?;
        info!("📁 Scratch directory: {}", scratch.path().display());

        let timeout = settings.tool_timeout();
        Ok(Converters {
            dwebp: settings.tools.dwebp.clone(),
            animation: AnimationTool {
                docker: settings.tools.docker.clone(),
                image: settings.tools.tgs_image.clone(),
                timeout,
            },
            preset: AnimationPreset::select(settings.compress_animations),
            video: VideoTool {
                ffmpeg: settings.tools.ffmpeg.clone(),
                strategy: settings.video_strategy,
                cache,
                gif: GifOptions::default(),
                timeout,
            },
            timeout,
            scratch,
            locks: KeyedLocks::default(),
        })
    }

    /// Startup check that every required tool answers a version query.
    ///
    /// Returns the failures so the caller can refuse to start.
    pub async fn health_check(&self) -> Vec<ConvertError> {
        let probe_timeout = Duration::from_secs(15);
        let checks = [
            ("dwebp", self.dwebp.as_str(), "-version"),
            ("ffmpeg", self.video.ffmpeg.as_str(), "-version"),
            ("docker", self.animation.docker.as_str(), "version"),
        ];

        let mut failures = Vec::new();
        for (tool, program, arg) in checks {
            match process::probe(tool, program, arg, probe_timeout).await {
                Ok(()) => info!("✅ {} is available", tool),
                Err(e) => {
                    warn!("❌ {} check failed: {}", tool, e);
                    failures.push(e);
                }
            }
        }
        failures
    }

    pub fn frame_cache(&self) -> &FrameCache {
        &self.video.cache
    }

    /// Drop expired frame cache entries, skipping stickers mid-conversion. Blocking.
    pub fn evict_expired_frames(&self) -> usize {
        self.video.cache.evict_expired(|key| self.locks.try_acquire(key))
    }

    pub fn video_strategy(&self) -> VideoStrategy {
        self.video.strategy
    }
}

#[async_trait]
impl MediaConverter for Converters {
    async fn convert(&self, asset: &Asset, source: &Path) -> Result<PathBuf, ConvertError> {
        let _guard = self.locks.acquire(&asset.unique_id).await;

        match asset.kind {
            StickerKind::Static => webp::webp_to_png(&self.dwebp, source, self.timeout).await,
            StickerKind::Animated => {
                self.animation
                    .tgs_to_gif(source, self.scratch.path(), self.preset)
                    .await
            }
            StickerKind::Video => self.video.webm_to_gif(source).await,
        }
    }
}
