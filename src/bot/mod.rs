/// Telegram side of the bot: API types, the HTTP client, request handlers,
/// set batching and archive packaging
pub mod api;
pub mod archive;
pub mod batch;
pub mod client;
pub mod handlers;
pub mod progress;

#[cfg(test)]
pub(crate) mod testing;
