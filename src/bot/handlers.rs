use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::api::{Message, Sticker, Update};
use super::batch::{convert_set, place_artifact};
use super::client::ChatPlatform;
use super::progress::StatusMessage;
use crate::convert::MediaConverter;
use crate::error::RequestError;
use crate::state::data::{ConvertedArtifact, SetName};
use crate::state::locks::KeyedLocks;
use crate::state::roster::Roster;

const HELP_TEXT: &str = "Send me a sticker and I will send it back as a PNG (static) or GIF \
(animated and video).\n\
Send a link like https://t.me/addstickers/<name> to get a whole set as a zip.\n\n\
Admin commands:\n\
/add_whitelist <user id> - allow a user\n\
/list_whitelist - show admins and whitelisted users";

const HINT_TEXT: &str = "Please send a sticker or a sticker set link to me.";

/// Matches `https://t.me/addstickers/<name>`; the name is validated separately
static SET_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(?:t|telegram)\.me/addstickers/([^\s?#/]+)")
        .expect("set link pattern is valid")
});

/// Everything a request handler needs, shared by all request tasks
pub struct BotContext {
    pub platform: Arc<dyn ChatPlatform>,
    pub converter: Arc<dyn MediaConverter>,
    pub roster: Arc<Roster>,
    pub files_dir: PathBuf,
    /// Held per sticker id, or per `set:<name>`, for as long as a request
    /// works on the files under `files_dir` derived from that key
    pub locks: KeyedLocks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// Raw argument, parsed by the handler so a bad id can get a usage reply
    AddWhitelist(String),
    ListWhitelist,
    Unknown(String),
}

impl Command {
    /// Parse `/name[@bot] args...`; `None` if the text is not a command
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head);

        let command = match name {
            "start" => Command::Start,
            "help" => Command::Help,
            "add_whitelist" => Command::AddWhitelist(args.to_string()),
            "list_whitelist" => Command::ListWhitelist,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }

    fn admin_only(&self) -> bool {
        matches!(self, Command::AddWhitelist(_) | Command::ListWhitelist)
    }
}

/// Raw set name from a link in `text`, if any
pub fn find_set_link(text: &str) -> Option<&str> {
    SET_LINK
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Entry point for one update. Errors are reported to the user and logged
/// here; nothing propagates to the polling loop.
pub async fn handle_update(ctx: &BotContext, update: Update) {
    let Some(message) = update.message else {
        return;
    };

    if let Err(e) = dispatch(ctx, &message).await {
        warn!("⚠️  Update {} failed: {}", update.update_id, e);
    }
}

async fn dispatch(ctx: &BotContext, message: &Message) -> Result<(), RequestError> {
    let chat_id = message.chat.id;
    let Some(user_id) = message.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };

    if let Some(command) = message.text.as_deref().and_then(Command::parse) {
        return handle_command(ctx, message, user_id, command).await;
    }

    if let Some(sticker) = &message.sticker {
        if !ctx.roster.has_permission(user_id) {
            debug!("Ignoring sticker from unauthorized user {}", user_id);
            return Ok(());
        }
        return handle_sticker(ctx, message, sticker).await;
    }

    if let Some(raw_name) = message.text.as_deref().and_then(find_set_link) {
        if !ctx.roster.has_permission(user_id) {
            debug!("Ignoring set link from unauthorized user {}", user_id);
            return Ok(());
        }
        let name = match SetName::parse(raw_name) {
            Ok(name) => name,
            Err(e) => {
                warn!("Rejected set name {:?} from user {}", raw_name, user_id);
                ctx.platform
                    .send_message(chat_id, &e.user_message(), Some(message.message_id))
                    .await?;
                return Ok(());
            }
        };
        convert_set(ctx, chat_id, message.message_id, &name).await?;
        return Ok(());
    }

    ctx.platform
        .send_message(chat_id, HINT_TEXT, Some(message.message_id))
        .await?;
    Ok(())
}

async fn handle_command(
    ctx: &BotContext,
    message: &Message,
    user_id: i64,
    command: Command,
) -> Result<(), RequestError> {
    let chat_id = message.chat.id;

    if command.admin_only() && !ctx.roster.is_admin(user_id) {
        debug!("Ignoring {:?} from non-admin {}", command, user_id);
        return Ok(());
    }

    let reply = match command {
        Command::Start => {
            let name = message
                .from
                .as_ref()
                .map(|u| u.first_name.as_str())
                .unwrap_or("there");
            format!("Hi {}! Send me a sticker to convert it.", name)
        }
        Command::Help => HELP_TEXT.to_string(),
        Command::AddWhitelist(arg) => match arg.parse::<i64>() {
            Ok(new_id) => match ctx.roster.add_whitelist(new_id).await {
                Ok(()) => format!("User {} added to the whitelist.", new_id),
                Err(e) => {
                    warn!("⚠️  add_whitelist {} failed: {}", new_id, e);
                    "Failed to update the whitelist.".to_string()
                }
            },
            Err(_) => "Usage: /add_whitelist <user id>".to_string(),
        },
        Command::ListWhitelist => {
            let (admins, whitelist) = ctx.roster.list();
            format!("Admins: {}\nWhitelist: {}", join_ids(&admins), join_ids(&whitelist))
        }
        Command::Unknown(name) => {
            debug!("Unknown command /{}", name);
            HINT_TEXT.to_string()
        }
    };

    ctx.platform
        .send_message(chat_id, &reply, Some(message.message_id))
        .await?;
    Ok(())
}

fn join_ids(ids: &[i64]) -> String {
    if ids.is_empty() {
        return "(none)".to_string();
    }
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// Convert a single sticker and send it back as a document
async fn handle_sticker(ctx: &BotContext, message: &Message, sticker: &Sticker) -> Result<(), RequestError> {
    let chat_id = message.chat.id;
    let status = StatusMessage::start(ctx.platform.as_ref(), chat_id, message.message_id, "Processing...").await?;

    match convert_single(ctx, message, sticker, &status).await {
        Ok(()) => {
            status.finish().await;
            Ok(())
        }
        Err(e) => {
            status.update(&e.user_message()).await;
            Err(e)
        }
    }
}

async fn convert_single(
    ctx: &BotContext,
    message: &Message,
    sticker: &Sticker,
    status: &StatusMessage<'_>,
) -> Result<(), RequestError> {
    let asset = sticker.asset();
    let _guard = ctx.locks.acquire(&asset.unique_id).await;
    tokio::fs::create_dir_all(&ctx.files_dir).await?;

    let raw_path = ctx
        .files_dir
        .join(format!("{}.{}", asset.unique_id, asset.kind.source_extension()));
    ctx.platform.download(&asset.file_id, &raw_path).await?;

    status.update("Converting...").await;
    let output = ctx.converter.convert(&asset, &raw_path).await?;

    let artifact = ConvertedArtifact::for_asset(&ctx.files_dir, &asset);
    place_artifact(&output, &artifact.path).await?;

    status.update("Sending...").await;
    ctx.platform
        .send_document(
            message.chat.id,
            &artifact.path,
            &artifact.file_name(),
            Some(message.message_id),
        )
        .await?;

    info!("✅ Sent {} sticker {}", asset.kind, asset.unique_id);
    Ok(())
}
