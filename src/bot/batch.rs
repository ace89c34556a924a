/// Sticker set conversion
///
/// Resolve the set, convert every sticker into `files/<set>/`, zip the
/// directory and send the archive back. A sticker that fails to download or
/// convert is skipped and reported at the end; it never sinks the batch.
/// Requests for the same set run one after the other.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::archive::zip_directory;
use super::handlers::BotContext;
use super::progress::StatusMessage;
use crate::error::RequestError;
use crate::state::data::{ConvertedArtifact, SetName};

/// Outcome of a set conversion
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub archive: PathBuf,
    pub total: usize,
    /// Stable ids of stickers that produced no artifact
    pub failed: Vec<String>,
}

/// Put a converter's output at `dest`.
///
/// Converters that already write in place hand back `dest` itself; that is
/// not an error and nothing is copied.
pub(crate) async fn place_artifact(output: &Path, dest: &Path) -> std::io::Result<()> {
    if output == dest {
        return Ok(());
    }
    if let (Ok(a), Ok(b)) = (
        tokio::fs::canonicalize(output).await,
        tokio::fs::canonicalize(dest).await,
    ) {
        if a == b {
            return Ok(());
        }
    }
    tokio::fs::copy(output, dest).await.map(|_| ())
}

/// Convert a whole sticker set for `chat_id`, narrating progress as a reply
/// to `reply_to`. The caller has already checked permissions.
pub async fn convert_set(
    ctx: &BotContext,
    chat_id: i64,
    reply_to: i64,
    name: &SetName,
) -> Result<BatchReport, RequestError> {
    let status = StatusMessage::start(ctx.platform.as_ref(), chat_id, reply_to, "Downloading...").await?;

    match run(ctx, chat_id, reply_to, name, &status).await {
        Ok(report) => {
            status.finish().await;
            if !report.failed.is_empty() {
                let summary = format!(
                    "Converted {} of {} stickers. Failed: {}",
                    report.total - report.failed.len(),
                    report.total,
                    report.failed.join(", ")
                );
                ctx.platform.send_message(chat_id, &summary, Some(reply_to)).await?;
            }
            Ok(report)
        }
        Err(e) => {
            status.update(&e.user_message()).await;
            Err(e)
        }
    }
}

async fn run(
    ctx: &BotContext,
    chat_id: i64,
    reply_to: i64,
    name: &SetName,
    status: &StatusMessage<'_>,
) -> Result<BatchReport, RequestError> {
    // Covers files/<set>/ and files/<set>.zip until the archive is sent
    let _set_guard = ctx.locks.acquire(&format!("set:{}", name)).await;

    let set = ctx.platform.sticker_set(name.as_str()).await?;
    let total = set.stickers.len();
    info!(
        "📦 Sticker set {} ({} stickers, animated={}, video={})",
        name, total, set.is_animated, set.is_video
    );

    let work_dir = ctx.files_dir.join(name.as_str());
    tokio::fs::create_dir_all(&work_dir).await?;

    let mut failed = Vec::new();
    for (index, sticker) in set.stickers.iter().enumerate() {
        status
            .update(&format!("Converting {}/{}...", index + 1, total))
            .await;

        let asset = sticker.asset();
        let _item_guard = ctx.locks.acquire(&asset.unique_id).await;
        let raw_path = work_dir.join(&asset.unique_id);

        if let Err(e) = ctx.platform.download(&asset.file_id, &raw_path).await {
            warn!("⚠️  Download of {} failed: {}", asset.unique_id, e);
            failed.push(asset.unique_id);
            continue;
        }

        let output = match ctx.converter.convert(&asset, &raw_path).await {
            Ok(output) => output,
            Err(e) => {
                warn!("⚠️  {} sticker {} failed: {}", asset.kind, asset.unique_id, e);
                failed.push(asset.unique_id);
                continue;
            }
        };

        let dest = ConvertedArtifact::derived_path(&work_dir, &asset);
        if let Err(e) = place_artifact(&output, &dest).await {
            warn!("⚠️  Could not place {}: {}", dest.display(), e);
            failed.push(asset.unique_id);
        }
    }

    status.update("Zipping...").await;
    let zip_path = ctx.files_dir.join(format!("{}.zip", name));
    let archive = zip_directory(work_dir, zip_path).await?;

    status.update("Sending...").await;
    let file_name = format!("{}.zip", name);
    ctx.platform
        .send_document(chat_id, &archive, &file_name, Some(reply_to))
        .await?;

    info!(
        "✅ Sent {} ({} converted, {} failed)",
        file_name,
        total - failed.len(),
        failed.len()
    );

    Ok(BatchReport {
        archive,
        total,
        failed,
    })
}
