use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

mod bot;
mod convert;
mod error;
mod logging;
mod state;

use bot::client::TelegramClient;
use bot::handlers::{handle_update, BotContext};
use convert::frames::FrameCache;
use convert::Converters;
use state::config::Settings;
use state::locks::KeyedLocks;
use state::roster::Roster;

const EVICTION_INTERVAL: Duration = Duration::from_secs(60 * 60);
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram bot that turns stickers into PNG/GIF files
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Settings document (token, admins, whitelist, tool paths)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Start even if dwebp/ffmpeg/docker do not answer
    #[arg(long)]
    skip_health_check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    info!(
        "🤖 Sticker bot starting ({} admins, {} whitelisted)",
        settings.admin.len(),
        settings.whitelist.len()
    );

    tokio::fs::create_dir_all(&settings.files_dir)
        .await
        .with_context(|| format!("failed to create {}", settings.files_dir.display()))?;

    let cache = FrameCache::new(FrameCache::default_root(), settings.frame_cache_ttl());
    let converters = Converters::from_settings(&settings, cache).context("failed to create scratch directory")?;
    info!(
        "🎞️  Video strategy: {:?}, frame cache at {}",
        converters.video_strategy(),
        converters.frame_cache().root().display()
    );

    if cli.skip_health_check {
        warn!("⚠️  Skipping tool health check");
    } else {
        let failures = converters.health_check().await;
        if !failures.is_empty() {
            bail!("{} required tool(s) unavailable, see the log above", failures.len());
        }
    }

    let converters = Arc::new(converters);
    spawn_cache_eviction(converters.clone());

    let client = Arc::new(TelegramClient::new(&settings.api_base, &settings.token, settings.network_timeout())?);
    let poll_timeout = settings.poll_timeout();
    let ctx = Arc::new(BotContext {
        platform: client.clone(),
        converter: converters,
        roster: Arc::new(Roster::new(settings.clone(), cli.config.clone())),
        files_dir: settings.files_dir.clone(),
        locks: KeyedLocks::default(),
    });

    run_polling(client, ctx, poll_timeout).await;
    info!("👋 Shutting down");
    Ok(())
}

/// Long-poll for updates until Ctrl-C, one task per update
async fn run_polling(client: Arc<TelegramClient>, ctx: Arc<BotContext>, poll_timeout: Duration) {
    let mut offset: i64 = 0;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let updates = tokio::select! {
            _ = &mut shutdown => break,
            result = client.get_updates(offset, poll_timeout) => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    debug!("📨 Update {}", update.update_id);
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        handle_update(&ctx, update).await;
                    });
                }
            }
            Err(e) => {
                error!("❌ getUpdates failed: {}", e);
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }
}

fn spawn_cache_eviction(converters: Arc<Converters>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            ticker.tick().await;
            let converters = converters.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || converters.evict_expired_frames()).await {
                warn!("⚠️  Frame cache eviction task failed: {}", e);
            }
        }
    });
}
