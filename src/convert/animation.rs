/// Animated sticker conversion: TGS → GIF through a containerized converter
///
/// The container expects `/source/sticker.tgs` and writes
/// `/source/sticker.tgs.gif`. Size, frame rate and quality come in as
/// environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::process::run_tool;
use crate::error::ConvertError;

/// Render settings handed to the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationPreset {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub quality: u32,
}

impl AnimationPreset {
    /// Small and cheap
    pub const COMPRESSED: AnimationPreset = AnimationPreset {
        width: 64,
        height: 64,
        fps: 20,
        quality: 45,
    };

    /// Full sticker resolution
    pub const FULL: AnimationPreset = AnimationPreset {
        width: 512,
        height: 512,
        fps: 50,
        quality: 90,
    };

    pub fn select(compress: bool) -> Self {
        if compress {
            Self::COMPRESSED
        } else {
            Self::FULL
        }
    }

    fn env(&self) -> [(&'static str, String); 4] {
        [
            ("WIDTH", self.width.to_string()),
            ("HEIGHT", self.height.to_string()),
            ("FPS", self.fps.to_string()),
            ("QUALITY", self.quality.to_string()),
        ]
    }
}

/// Where the container lives and how to reach it
#[derive(Debug, Clone)]
pub struct AnimationTool {
    pub docker: String,
    pub image: String,
    pub timeout: Duration,
}

const CONTAINER_INPUT: &str = "sticker.tgs";
const CONTAINER_OUTPUT: &str = "sticker.tgs.gif";

impl AnimationTool {
    /// Convert `source` into `<out_dir>/<source stem>.gif`.
    ///
    /// The container only ever sees a private working directory created under
    /// `out_dir`; it is removed when this returns, whatever the outcome.
    pub async fn tgs_to_gif(
        &self,
        source: &Path,
        out_dir: &Path,
        preset: AnimationPreset,
    ) -> Result<PathBuf, ConvertError> {
        let stem = source
            .file_stem()
            .ok_or_else(|| ConvertError::MissingOutput(source.to_path_buf()))?
            .to_string_lossy()
            .to_string();

        let work = tempfile::Builder::new().prefix("tgs-").tempdir_in(out_dir)?;
        tokio::fs::copy(source, work.path().join(CONTAINER_INPUT)).await?;

        let mut command = Command::new(&self.docker);
        command
            .arg("run")
            .arg("--rm")
            .arg("-v")
            .arg(format!("{}:/source", work.path().display()));
        for (key, value) in preset.env() {
            command.arg("-e").arg(format!("{}={}", key, value));
        }
        command.arg(&self.image);

        run_tool("docker", command, self.timeout).await?;

        let produced = work.path().join(CONTAINER_OUTPUT);
        if !produced.exists() {
            return Err(ConvertError::MissingOutput(produced));
        }

        let output_path = out_dir.join(format!("{}.gif", stem));
        tokio::fs::copy(&produced, &output_path).await?;

        debug!("🎞️  {} → {}", source.display(), output_path.display());
        Ok(output_path)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::convert::test_support::fake_tool;

    /// Stand-in for `docker run`: writes its own arguments as the "GIF"
    const FAKE_DOCKER: &str = r#"
for arg in "$@"; do
  case "$arg" in
    *:/source) dir="${arg%:/source}" ;;
  esac
done
test -f "$dir/sticker.tgs" || exit 2
echo "$@" > "$dir/sticker.tgs.gif"
"#;

    fn tool(docker: &Path) -> AnimationTool {
        AnimationTool {
            docker: docker.to_str().unwrap().to_string(),
            image: "edasriyan/tgs-to-gif".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_presets() {
        assert_eq!(AnimationPreset::select(true), AnimationPreset::COMPRESSED);
        assert_eq!(AnimationPreset::select(false).width, 512);
        assert_eq!(AnimationPreset::FULL.fps, 50);
        assert_eq!(AnimationPreset::COMPRESSED.quality, 45);
    }

    #[tokio::test]
    async fn test_output_and_cleanup() {
        let bin = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let docker = fake_tool(bin.path(), "docker", FAKE_DOCKER);
        let source = bin.path().join("AgADanim");
        std::fs::write(&source, b"tgs bytes").unwrap();

        let gif = tool(&docker)
            .tgs_to_gif(&source, scratch.path(), AnimationPreset::COMPRESSED)
            .await
            .unwrap();

        assert_eq!(gif, scratch.path().join("AgADanim.gif"));
        let args = std::fs::read_to_string(&gif).unwrap();
        assert!(args.contains("WIDTH=64"));
        assert!(args.contains("FPS=20"));
        assert!(args.contains("QUALITY=45"));
        assert!(args.contains("edasriyan/tgs-to-gif"));

        // Only the final GIF remains, the working directory is gone
        let entries: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_cleans_up() {
        let bin = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let docker = fake_tool(bin.path(), "docker", "exit 125");
        let source = bin.path().join("AgADanim.tgs");
        std::fs::write(&source, b"tgs bytes").unwrap();

        let err = tool(&docker)
            .tgs_to_gif(&source, scratch.path(), AnimationPreset::FULL)
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::ConversionFailed { .. }));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_container_output() {
        let bin = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let docker = fake_tool(bin.path(), "docker", "exit 0");
        let source = bin.path().join("AgADanim");
        std::fs::write(&source, b"tgs bytes").unwrap();

        let err = tool(&docker)
            .tgs_to_gif(&source, scratch.path(), AnimationPreset::FULL)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingOutput(_)));
    }
}
