use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use super::api::{
    ApiResponse, DeleteMessage, EditMessageText, File, GetFile, GetStickerSet, GetUpdates,
    Message, SendMessage, StickerSet, Update,
};
use crate::error::PlatformError;

/// The chat operations the handlers need.
///
/// `TelegramClient` is the real implementation; tests use a recording fake.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<Message, PlatformError>;

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), PlatformError>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), PlatformError>;

    /// Upload a local file, shown to the user as `file_name`
    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
        reply_to: Option<i64>,
    ) -> Result<(), PlatformError>;

    /// Fetch a file's bytes into `dest`
    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), PlatformError>;

    async fn sticker_set(&self, name: &str) -> Result<StickerSet, PlatformError>;
}

/// Bot API client over reqwest
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    /// Every request is bounded by `timeout`; long polls get the poll time on top
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(TelegramClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }

    /// Call a Bot API method with a JSON body.
    ///
    /// URLs carry the token, so it is stripped from every reqwest error.
    async fn call<S, T>(&self, method: &str, request: &S, extra_timeout: Option<Duration>) -> Result<T, PlatformError>
    where
        S: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.client.post(self.method_url(method)).json(request);
        if let Some(extra) = extra_timeout {
            builder = builder.timeout(extra);
        }

        let response = builder.send().await.map_err(|e| e.without_url())?;
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| e.without_url())?;
        unwrap_envelope(method, envelope)
    }

    /// Long-poll for new updates
    #[instrument(level = "debug", skip(self))]
    pub async fn get_updates(&self, offset: i64, poll_timeout: Duration) -> Result<Vec<Update>, PlatformError> {
        let request = GetUpdates {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: vec!["message"],
        };
        // Give the HTTP request room beyond the server-side wait
        let http_timeout = poll_timeout + Duration::from_secs(10);
        self.call("getUpdates", &request, Some(http_timeout)).await
    }
}

fn unwrap_envelope<T>(method: &str, envelope: ApiResponse<T>) -> Result<T, PlatformError> {
    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { description, .. } => Err(PlatformError::Api {
            method: method.to_string(),
            description: description.unwrap_or_else(|| "no description".to_string()),
        }),
    }
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    #[instrument(level = "debug", skip(self, text))]
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<Message, PlatformError> {
        let request = SendMessage {
            chat_id,
            text,
            reply_to_message_id: reply_to,
        };
        self.call("sendMessage", &request, None).await
    }

    #[instrument(level = "debug", skip(self, text))]
    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), PlatformError> {
        let request = EditMessageText {
            chat_id,
            message_id,
            text,
        };
        // Answers with the edited message, which nobody needs
        let _: serde_json::Value = self.call("editMessageText", &request, None).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), PlatformError> {
        let request = DeleteMessage { chat_id, message_id };
        let _: bool = self.call("deleteMessage", &request, None).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
        reply_to: Option<i64>,
    ) -> Result<(), PlatformError> {
        let bytes = tokio::fs::read(path).await?;
        debug!("📤 Uploading {} ({} KB)", file_name, bytes.len() / 1024);

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", Part::bytes(bytes).file_name(file_name.to_string()));
        if let Some(reply_to) = reply_to {
            form = form.text("reply_to_message_id", reply_to.to_string());
        }

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.without_url())?;
        let envelope: ApiResponse<Message> = response.json().await.map_err(|e| e.without_url())?;
        unwrap_envelope("sendDocument", envelope).map(|_| ())
    }

    #[instrument(level = "debug", skip(self))]
    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), PlatformError> {
        let file: File = self.call("getFile", &GetFile { file_id }, None).await?;
        let file_path = file.file_path.ok_or_else(|| PlatformError::Api {
            method: "getFile".to_string(),
            description: "file is not downloadable".to_string(),
        })?;

        let bytes = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.without_url())?
            .bytes()
            .await
            .map_err(|e| e.without_url())?;

        tokio::fs::write(dest, &bytes).await?;
        debug!("📥 Downloaded {} bytes to {}", bytes.len(), dest.display());
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn sticker_set(&self, name: &str) -> Result<StickerSet, PlatformError> {
        self.call("getStickerSet", &GetStickerSet { name }, None).await
    }
}
