/// Video sticker conversion: WebM (VP9) → GIF
///
/// Two strategies:
/// - `Frames`: ffmpeg extracts PNG frames into the frame cache, the GIF is
///   assembled in-process with the `gif` encoder
/// - `Palette`: a single ffmpeg call with a palettegen/paletteuse filter graph

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::frames::{frames_to_gif, FrameCache, GifOptions};
use super::process::run_tool;
use crate::error::ConvertError;
use crate::state::config::VideoStrategy;

/// Generates an optimized palette and applies it in one pass
const PALETTE_FILTER: &str = "[0:v]split[a][b];[a]palettegen=reserve_transparent=1[p];[b][p]paletteuse";

#[derive(Debug, Clone)]
pub struct VideoTool {
    pub ffmpeg: String,
    pub strategy: VideoStrategy,
    pub cache: FrameCache,
    pub gif: GifOptions,
    pub timeout: Duration,
}

impl VideoTool {
    pub async fn webm_to_gif(&self, source: &Path) -> Result<PathBuf, ConvertError> {
        match self.strategy {
            VideoStrategy::Frames => {
                let dir = self.cache.extract(&self.ffmpeg, source, self.timeout).await?;
                frames_to_gif(dir, self.gif).await
            }
            VideoStrategy::Palette => self.palette_gif(source).await,
        }
    }

    /// Writes `<source>.gif` (suffix appended, not substituted)
    async fn palette_gif(&self, source: &Path) -> Result<PathBuf, ConvertError> {
        let mut output = source.as_os_str().to_owned();
        output.push(".gif");
        let output_path = PathBuf::from(output);

        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-c:v", "libvpx-vp9"])
            .arg("-i")
            .arg(source)
            .args(["-filter_complex", PALETTE_FILTER])
            .arg(&output_path);

        run_tool("ffmpeg", command, self.timeout).await?;

        if !output_path.exists() {
            return Err(ConvertError::MissingOutput(output_path));
        }

        debug!("🎞️  {} → {}", source.display(), output_path.display());
        Ok(output_path)
    }
}
