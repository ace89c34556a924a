/// Recording fakes for handler tests

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::api::{Chat, Message, StickerSet};
use super::client::ChatPlatform;
use super::handlers::BotContext;
use crate::convert::MediaConverter;
use crate::error::{ConvertError, PlatformError};
use crate::state::config::Settings;
use crate::state::data::{Asset, StickerKind};
use crate::state::locks::KeyedLocks;
use crate::state::roster::Roster;

/// What the fake platform was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Send { chat_id: i64, text: String },
    Edit { message_id: i64, text: String },
    Delete { message_id: i64 },
    Document { chat_id: i64, file_name: String },
    Download { file_id: String },
}

#[derive(Default)]
struct PlatformState {
    events: Vec<Recorded>,
    next_message_id: i64,
    set: Option<StickerSet>,
    /// Downloads truncate the target, wait this long, then write the bytes
    download_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl FakePlatform {
    pub fn with_set(set: StickerSet) -> Self {
        let platform = FakePlatform::default();
        platform.state.lock().unwrap().set = Some(set);
        platform
    }

    pub fn slow_downloads(self, delay: Duration) -> Self {
        self.state.lock().unwrap().download_delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().events.clone()
    }

    fn record(&self, event: Recorded) {
        self.state.lock().unwrap().events.push(event);
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        _reply_to: Option<i64>,
    ) -> Result<Message, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.next_message_id += 1;
        state.events.push(Recorded::Send {
            chat_id,
            text: text.to_string(),
        });
        Ok(Message {
            message_id: 1000 + state.next_message_id,
            chat: Chat { id: chat_id },
            from: None,
            text: Some(text.to_string()),
            sticker: None,
        })
    }

    async fn edit_message(&self, _chat_id: i64, message_id: i64, text: &str) -> Result<(), PlatformError> {
        self.record(Recorded::Edit {
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, _chat_id: i64, message_id: i64) -> Result<(), PlatformError> {
        self.record(Recorded::Delete { message_id });
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
        _reply_to: Option<i64>,
    ) -> Result<(), PlatformError> {
        assert!(path.exists(), "uploading a missing file: {}", path.display());
        self.record(Recorded::Document {
            chat_id,
            file_name: file_name.to_string(),
        });
        Ok(())
    }

    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), PlatformError> {
        self.record(Recorded::Download {
            file_id: file_id.to_string(),
        });
        let delay = self.state.lock().unwrap().download_delay;
        if let Some(delay) = delay {
            tokio::fs::write(dest, b"").await?;
            tokio::time::sleep(delay).await;
        }
        tokio::fs::write(dest, format!("raw:{}", file_id)).await?;
        Ok(())
    }

    async fn sticker_set(&self, name: &str) -> Result<StickerSet, PlatformError> {
        let state = self.state.lock().unwrap();
        state
            .set
            .clone()
            .filter(|set| set.name == name)
            .ok_or_else(|| PlatformError::Api {
                method: "getStickerSet".to_string(),
                description: "Bad Request: STICKERSET_INVALID".to_string(),
            })
    }
}

/// Converter that mimics the real ones' placement rules:
/// static output lands next to the source, animated/video output in a
/// separate scratch directory.
#[derive(Clone)]
pub struct FakeConverter {
    scratch: PathBuf,
    failing: Vec<String>,
    delay: Option<Duration>,
    kinds: Arc<Mutex<Vec<StickerKind>>>,
    source_sizes: Arc<Mutex<Vec<u64>>>,
}

impl FakeConverter {
    pub fn new(scratch: PathBuf) -> Self {
        std::fs::create_dir_all(&scratch).unwrap();
        FakeConverter {
            scratch,
            failing: Vec::new(),
            delay: None,
            kinds: Arc::default(),
            source_sizes: Arc::default(),
        }
    }

    pub fn failing(mut self, unique_id: &str) -> Self {
        self.failing.push(unique_id.to_string());
        self
    }

    /// Wait this long before reading the source, like a tool mid-read
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn kinds(&self) -> Vec<StickerKind> {
        self.kinds.lock().unwrap().clone()
    }

    /// Size of each source file at the moment it was read
    pub fn source_sizes(&self) -> Vec<u64> {
        self.source_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaConverter for FakeConverter {
    async fn convert(&self, asset: &Asset, source: &Path) -> Result<PathBuf, ConvertError> {
        self.kinds.lock().unwrap().push(asset.kind);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let size = tokio::fs::metadata(source).await?.len();
        self.source_sizes.lock().unwrap().push(size);

        if self.failing.contains(&asset.unique_id) {
            return Err(ConvertError::ConversionFailed {
                tool: "fake".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "broken sticker".to_string(),
            });
        }

        let output = match asset.kind {
            StickerKind::Static => source.with_extension("png"),
            StickerKind::Animated | StickerKind::Video => {
                self.scratch.join(format!("{}.gif", asset.unique_id))
            }
        };
        tokio::fs::write(&output, format!("converted:{}", asset.unique_id)).await?;
        Ok(output)
    }
}

/// Context over the fakes, with admin 1 and whitelisted user 2
pub fn context(platform: &FakePlatform, converter: &FakeConverter, files_dir: &Path) -> BotContext {
    let config_path = files_dir.join("config.json");
    let settings = Settings::from_json(r#"{"token": "t", "admin": [1], "whitelist": [2]}"#).unwrap();
    settings.save(&config_path).unwrap();

    BotContext {
        platform: Arc::new(platform.clone()),
        converter: Arc::new(converter.clone()),
        roster: Arc::new(Roster::new(settings, config_path)),
        files_dir: files_dir.to_path_buf(),
        locks: KeyedLocks::default(),
    }
}
