/// Frame cache and GIF assembly for video stickers
///
/// This module handles:
/// - Extracting WebM frames to PNG with ffmpeg, cached per sticker
/// - Assembling the frames (in temporal order) into a looping GIF with a
///   reserved transparent palette index
/// - Evicting stale cache entries

use color_quant::NeuQuant;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::process::run_tool;
use crate::error::ConvertError;

/// Name of the assembled GIF inside a cache entry
const OUTPUT_NAME: &str = "output.gif";

/// Zero-padded so a plain lexicographic listing is also in order
const FRAME_PATTERN: &str = "frame_%04d.png";

/// NeuQuant sampling factor, 1 (best) to 30 (fastest)
const QUANT_SAMPLE_FACTOR: i32 = 10;

/// GIF assembly settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifOptions {
    /// Display time of each frame in milliseconds
    pub delay_ms: u32,
    /// Number of loops, 0 = forever
    pub loops: u16,
    /// Palette index reserved for transparent pixels
    pub transparency: u8,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            delay_ms: 50,
            loops: 0,
            transparency: 0,
        }
    }
}

/// On-disk cache of extracted frames, one directory per sticker.
///
/// Entries are keyed by the source file name, which is the sticker's stable id.
#[derive(Debug, Clone)]
pub struct FrameCache {
    root: PathBuf,
    ttl: Duration,
}

impl FrameCache {
    pub fn new(root: PathBuf, ttl: Duration) -> Self {
        FrameCache { root, ttl }
    }

    /// `~/.cache/sticker-bot/frames` on Linux
    pub fn default_root() -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        path.push("sticker-bot");
        path.push("frames");
        path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, source: &Path) -> PathBuf {
        let key = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        self.root.join(key)
    }

    /// Extract every frame of `source` into its cache entry.
    ///
    /// If the entry already exists ffmpeg is not run and the directory is
    /// returned as-is. Frames are written to a staging directory that is
    /// renamed onto the entry only once ffmpeg succeeds; on failure or
    /// cancellation the staging directory is dropped, so a partial
    /// extraction is never mistaken for a cached one.
    pub async fn extract(
        &self,
        ffmpeg: &str,
        source: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, ConvertError> {
        let dir = self.entry_dir(source);
        if dir.exists() {
            debug!("♻️  Reusing frames in {}", dir.display());
            return Ok(dir);
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let name = dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.", entry_key(&name)))
            .tempdir_in(&self.root)?;

        let mut command = Command::new(ffmpeg);
        command
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-c:v", "libvpx-vp9"])
            .arg("-i")
            .arg(source)
            .arg(staging.path().join(FRAME_PATTERN));

        run_tool("ffmpeg", command, timeout).await?;

        tokio::fs::rename(staging.path(), &dir).await?;
        Ok(dir)
    }

    /// Remove entries not modified within the TTL. Blocking.
    ///
    /// `claim` gets each entry's sticker id; `None` means the sticker is in
    /// use and the entry is left alone, otherwise the returned guard is held
    /// while the entry is removed. A failing entry is logged and skipped.
    pub fn evict_expired<G>(&self, mut claim: impl FnMut(&str) -> Option<G>) -> usize {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("⚠️  Cannot read frame cache {}: {}", self.root.display(), e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut evicted = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let age = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => now.duration_since(modified).unwrap_or_default(),
                Err(e) => {
                    warn!("⚠️  Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };
            if age < self.ttl {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let Some(_guard) = claim(entry_key(&name)) else {
                debug!("Skipping busy cache entry {}", path.display());
                continue;
            };
            match fs::remove_dir_all(&path) {
                Ok(()) => evicted += 1,
                Err(e) => warn!("⚠️  Could not evict {}: {}", path.display(), e),
            }
        }

        if evicted > 0 {
            info!("🧹 Evicted {} stale frame cache entries", evicted);
        }
        evicted
    }
}

/// Sticker id of a cache entry or staging directory:
/// `AgADv.webm`, `AgADv` and `.AgADv.x1y2z3` all map to `AgADv`
fn entry_key(name: &str) -> &str {
    let name = name.trim_start_matches('.');
    name.split('.').next().unwrap_or(name)
}

/// Temporal index of a frame file: `frame_12.png` → 12
fn frame_index(path: &Path) -> Option<u64> {
    path.file_stem()?
        .to_str()?
        .rsplit('_')
        .next()?
        .parse()
        .ok()
}

/// PNG frames in `dir`, sorted by numeric index (so `frame_2` comes before `frame_10`)
fn sorted_frames(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("png"))
                .unwrap_or(false)
        })
        .collect();

    frames.sort_by(|a, b| {
        let key_a = (frame_index(a).unwrap_or(u64::MAX), a.file_name());
        let key_b = (frame_index(b).unwrap_or(u64::MAX), b.file_name());
        key_a.cmp(&key_b)
    });

    Ok(frames)
}

/// Assemble the frames in `dir` into `dir/output.gif`
pub async fn frames_to_gif(dir: PathBuf, options: GifOptions) -> Result<PathBuf, ConvertError> {
    // Spawn blocking because decoding + quantizing every frame is CPU-bound
    tokio::task::spawn_blocking(move || frames_to_gif_blocking(&dir, options))
        .await
        .map_err(|e| ConvertError::Join(e.to_string()))?
}

/// Blocking implementation of GIF assembly.
///
/// Intermediate PNGs are deleted afterwards; the directory and the GIF stay,
/// so a later call on the same (now frame-less) entry returns the GIF.
fn frames_to_gif_blocking(dir: &Path, options: GifOptions) -> Result<PathBuf, ConvertError> {
    let output_path = dir.join(OUTPUT_NAME);
    let frames = sorted_frames(dir)?;

    if frames.is_empty() {
        if output_path.exists() {
            return Ok(output_path);
        }
        return Err(ConvertError::NoFrames(dir.to_path_buf()));
    }

    let first = image::open(&frames[0])?.to_rgba8();
    let (screen_width, screen_height) = (dimension(first.width())?, dimension(first.height())?);
    let mut first = Some(first);

    let file = BufWriter::new(File::create(&output_path)?);
    let mut encoder = gif::Encoder::new(file, screen_width, screen_height, &[])?;
    encoder.set_repeat(match options.loops {
        0 => gif::Repeat::Infinite,
        n => gif::Repeat::Finite(n),
    })?;

    for path in &frames {
        let rgba = match first.take() {
            Some(rgba) => rgba,
            None => image::open(path)?.to_rgba8(),
        };
        let (width, height) = (dimension(rgba.width())?, dimension(rgba.height())?);

        let mut frame = indexed_frame(width, height, rgba.as_raw(), options.transparency);
        frame.delay = u16::try_from(options.delay_ms / 10).unwrap_or(u16::MAX);
        frame.dispose = gif::DisposalMethod::Background;
        encoder.write_frame(&frame)?;
    }
    encoder.into_inner()?.flush()?;

    for path in &frames {
        fs::remove_file(path)?;
    }

    debug!("🎬 Assembled {} frames into {}", frames.len(), output_path.display());
    Ok(output_path)
}

fn dimension(value: u32) -> Result<u16, ConvertError> {
    u16::try_from(value).map_err(|_| {
        ConvertError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame dimension {} is too large for a GIF", value),
        ))
    })
}

/// Quantize one RGBA frame to a 256-entry palette in which `transparent` is
/// reserved for pixels with alpha below half; the other 255 slots hold the
/// frame's colors.
fn indexed_frame(width: u16, height: u16, rgba: &[u8], transparent: u8) -> gif::Frame<'static> {
    let quant = NeuQuant::new(QUANT_SAMPLE_FACTOR, 255, rgba);

    let reserved = usize::from(transparent);
    let colors = quant.color_map_rgb();
    let split = (reserved * 3).min(colors.len());
    let mut palette = Vec::with_capacity(256 * 3);
    palette.extend_from_slice(&colors[..split]);
    palette.extend_from_slice(&[0, 0, 0]);
    palette.extend_from_slice(&colors[split..]);

    let indices: Vec<u8> = rgba
        .chunks_exact(4)
        .map(|pixel| {
            if pixel[3] < 128 {
                return transparent;
            }
            let index = quant.index_of(pixel);
            // Shift past the reserved slot; index_of is below 255 so this fits
            let index = if index >= reserved { index + 1 } else { index };
            index as u8
        })
        .collect();

    gif::Frame {
        width,
        height,
        buffer: Cow::Owned(indices),
        palette: Some(palette),
        transparent: Some(transparent),
        ..gif::Frame::default()
    }
}
