/// Tracing setup for the bot
///
/// Logs go to stderr. `RUST_LOG` overrides the default filter.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "info,sticker_bot=debug";

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        );

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("[sticker-bot] Failed to set tracing subscriber: {}", e);
        }
    });
}
