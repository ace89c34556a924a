/// Zip packaging of a sticker set's working directory
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::RequestError;

/// Zip everything under `dir` into `zip_path`
pub async fn zip_directory(dir: PathBuf, zip_path: PathBuf) -> Result<PathBuf, RequestError> {
    // Deflating a few hundred stickers is CPU work, keep it off the runtime
    tokio::task::spawn_blocking(move || zip_directory_blocking(&dir, &zip_path).map(|_| zip_path))
        .await
        .map_err(|e| RequestError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?
}

/// Blocking implementation; returns the number of files written.
/// Entry names are relative to `dir` and use `/` separators.
fn zip_directory_blocking(dir: &Path, zip_path: &Path) -> Result<usize, RequestError> {
    let file = File::create(zip_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    let mut count = 0;
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let relative = match path.strip_prefix(dir) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name, options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
        count += 1;
    }

    zip.finish()?;
    info!("🗜️  Zipped {} files into {}", count, zip_path.display());
    Ok(count)
}
