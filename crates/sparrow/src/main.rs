use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sparrow::db::{cache_repo, default_database_path};
use sparrow::{
    load_config, resolve_secret, AccountRegistry, Database, DedupLedger, EnvTokenProvider,
    GmailClient, MailPipeline, OllamaClient, PollScheduler, SparrowError, TelegramSink,
};

fn init_tracing() {
    // Bridge `log` records from the db layer into tracing.
    let _ = tracing_log::LogTracer::init();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sparrow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".sparrow").join("config.json")))
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

#[tokio::main]
async fn main() -> Result<(), SparrowError> {
    init_tracing();
    info!("Starting sparrow v{}", env!("CARGO_PKG_VERSION"));

    let config_path = config_path();
    info!(path = %config_path.display(), "Loading configuration");
    let config = load_config(&config_path)?;

    let bot_token = resolve_secret(&config.telegram.bot_token_env)?;

    let db_path = config
        .database_path
        .clone()
        .map(PathBuf::from)
        .or_else(default_database_path)
        .unwrap_or_else(|| PathBuf::from("sparrow.db"));
    let db = Database::open(&db_path)?;
    info!(path = %db_path.display(), "Database opened");

    match cache_repo::prune(&db, config.summarizer.cache_retention_days) {
        Ok(0) => {}
        Ok(pruned) => info!(pruned, "Pruned stale summary cache entries"),
        Err(e) => warn!(error = %e, "Failed to prune summary cache"),
    }

    let fetcher = Arc::new(GmailClient::new(
        config.gmail.api_base.clone(),
        config.gmail.timeout_secs,
        Arc::new(EnvTokenProvider::default()),
    )?);
    let summarizer = Arc::new(OllamaClient::new(
        config.summarizer.endpoint.clone(),
        config.summarizer.model.clone(),
        config.summarizer.timeout_secs,
        config.summarizer.max_body_chars,
    )?);
    let sink = Arc::new(TelegramSink::new(
        config.telegram.api_base.clone(),
        bot_token,
        config.telegram.timeout_secs,
    )?);

    let registry = AccountRegistry::new(db.clone());
    let ledger = DedupLedger::new(db.clone());
    let shutdown = Arc::new(AtomicBool::new(false));

    let pipeline = MailPipeline::new(
        fetcher,
        summarizer,
        sink,
        ledger,
        db,
        config.max_concurrent_summaries,
        config.max_messages_per_cycle,
        shutdown,
    );
    let scheduler = PollScheduler::new(
        pipeline,
        config.poll_interval_secs,
        config.backoff.base_secs,
        config.backoff.max_secs,
    );

    let accounts = registry.all_accounts()?;
    if accounts.is_empty() {
        warn!("No linked accounts; nothing to poll");
    } else {
        info!(count = accounts.len(), "Spawning account poll tasks");
    }
    let handles = scheduler.spawn_all(accounts).await;

    tokio::signal::ctrl_c().await.map_err(SparrowError::Io)?;
    info!("Shutdown signal received; finishing in-flight messages");
    scheduler.shutdown();

    for handle in handles {
        let _ = handle.await;
    }

    info!("Sparrow stopped");
    Ok(())
}
