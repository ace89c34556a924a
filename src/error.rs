/// Error taxonomy for the bot
///
/// Each layer has its own error type:
/// - `ConvertError` for external tools and GIF assembly
/// - `PlatformError` for Bot API calls
/// - `ConfigError` for the settings document
/// - `RequestError` for a whole inbound request (what handlers return)

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// The executable or container runtime could not be spawned at all
    #[error("{tool} is not available: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The tool ran but exited non-zero
    #[error("{tool} exited with {status}: {stderr}")]
    ConversionFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} did not finish within {}s", .after.as_secs())]
    ToolTimeout { tool: String, after: Duration },

    /// The tool reported success but the expected file is not there
    #[error("expected output not found: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("no frames found in {}", .0.display())]
    NoFrames(PathBuf),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("GIF encoding error: {0}")]
    Gif(#[from] gif::EncodingError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("task join error: {0}")]
    Join(String),
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered with `ok: false`
    #[error("{method} failed: {description}")]
    Api { method: String, description: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to persist settings: {0}")]
    Persist(String),
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid sticker set name: {0:?}")]
    InvalidSetName(String),
}

impl RequestError {
    /// Text that is safe to show to the requester (no paths, no tool output)
    pub fn user_message(&self) -> String {
        match self {
            RequestError::Convert(ConvertError::ToolUnavailable { .. }) => {
                "Conversion is temporarily unavailable, please try again later.".to_string()
            }
            RequestError::Convert(ConvertError::ToolTimeout { .. }) => {
                "Conversion took too long and was cancelled.".to_string()
            }
            RequestError::Convert(_) => "Failed to convert this sticker.".to_string(),
            RequestError::Platform(_) => "Failed to talk to Telegram, please try again.".to_string(),
            RequestError::Archive(_) | RequestError::Io(_) => {
                "Something went wrong while preparing your file.".to_string()
            }
            RequestError::InvalidSetName(_) => "That sticker set name is not valid.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_details() {
        let err = RequestError::Convert(ConvertError::ConversionFailed {
            tool: "ffmpeg".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "/tmp/secret/path.webm: Invalid data".to_string(),
        });
        let message = err.user_message();
        assert!(!message.contains("/tmp"));
        assert!(!message.contains("ffmpeg"));
    }

    #[test]
    fn test_timeout_display() {
        let err = ConvertError::ToolTimeout {
            tool: "docker".to_string(),
            after: Duration::from_secs(120),
        };
        assert_eq!(err.to_string(), "docker did not finish within 120s");
    }
}
