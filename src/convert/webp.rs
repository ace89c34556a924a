/// Static sticker conversion: WebP → PNG via `dwebp`
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::process::run_tool;
use crate::error::ConvertError;

/// Convert a WebP file to PNG next to it (same base name, `.png` extension).
///
/// Runs `dwebp <source> -o <output> -v`. Failures are returned as-is; the
/// caller decides whether that aborts the request or just skips the item.
pub async fn webp_to_png(
    dwebp: &str,
    source: &Path,
    timeout: Duration,
) -> Result<PathBuf, ConvertError> {
    let output_path = source.with_extension("png");

    let mut command = Command::new(dwebp);
    command.arg(source).arg("-o").arg(&output_path).arg("-v");

    let output = run_tool("dwebp", command, timeout).await?;
    debug!("dwebp: {}", output.stderr.trim());

    if !output_path.exists() {
        return Err(ConvertError::MissingOutput(output_path));
    }

    Ok(output_path)
}
