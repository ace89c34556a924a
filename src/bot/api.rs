use serde::{Deserialize, Serialize};

use crate::state::data::{Asset, StickerKind};

/// Envelope of every Bot API answer
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) ok: bool,
    pub(crate) result: Option<T>,
    pub(crate) description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub sticker: Option<Sticker>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Sticker {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default)]
    pub is_animated: bool,
    #[serde(default)]
    pub is_video: bool,
    pub set_name: Option<String>,
}

impl Sticker {
    pub fn asset(&self) -> Asset {
        Asset {
            file_id: self.file_id.clone(),
            unique_id: self.file_unique_id.clone(),
            kind: StickerKind::from_flags(self.is_animated, self.is_video),
        }
    }
}

/// `getStickerSet` result. The set-level flags are informational only,
/// each sticker carries its own.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StickerSet {
    pub name: String,
    pub title: String,
    pub stickers: Vec<Sticker>,
    #[serde(default)]
    pub is_animated: bool,
    #[serde(default)]
    pub is_video: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct File {
    pub file_id: String,
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct GetUpdates {
    pub(crate) offset: i64,
    pub(crate) timeout: u64,
    pub(crate) allowed_updates: Vec<&'static str>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct GetFile<'a> {
    pub(crate) file_id: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct GetStickerSet<'a> {
    pub(crate) name: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct SendMessage<'a> {
    pub(crate) chat_id: i64,
    pub(crate) text: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reply_to_message_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct EditMessageText<'a> {
    pub(crate) chat_id: i64,
    pub(crate) message_id: i64,
    pub(crate) text: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct DeleteMessage {
    pub(crate) chat_id: i64,
    pub(crate) message_id: i64,
}
