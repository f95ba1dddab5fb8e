//! Pawdium - daily pet-photo competition engine daemon

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pawdium::competition::{CompetitionEngine, EngineConfig};
use pawdium::config::Args;
use pawdium::db::MongoClient;
use pawdium::ledger::{Ledger, MemoryLedger, MongoLedger};
use pawdium::scheduler::{CompetitionScheduler, SchedulerConfig};
use pawdium::store::{CompetitionStore, MemoryStore, MongoStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pawdium={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Pawdium - Daily Pet Competition");
    info!("======================================");
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Entry fee: {} tokens", args.entry_fee);
    info!(
        "Nightly tick: {:02}:{:02} (UTC{:+}min)",
        args.nightly_hour, args.nightly_minute, args.utc_offset_minutes
    );
    info!("Status tick: every {}s", args.status_interval_secs);
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            if let Err(e) = client.ensure_indexes().await {
                error!("Failed to ensure MongoDB indexes: {}", e);
                std::process::exit(1);
            }
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory storage): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let (store, ledger): (Arc<dyn CompetitionStore>, Arc<dyn Ledger>) = match &mongo {
        Some(client) => (
            Arc::new(MongoStore::new(client)),
            Arc::new(MongoLedger::new(client)),
        ),
        None => (Arc::new(MemoryStore::new()), Arc::new(MemoryLedger::new())),
    };

    let engine = Arc::new(CompetitionEngine::new(
        store,
        ledger,
        EngineConfig {
            entry_fee: args.entry_fee,
        },
    ));

    let mut scheduler = CompetitionScheduler::new(
        engine,
        SchedulerConfig {
            nightly_hour: args.nightly_hour,
            nightly_minute: args.nightly_minute,
            utc_offset_minutes: args.utc_offset_minutes,
            status_interval_secs: args.status_interval_secs,
        },
    );

    if let Err(e) = scheduler.start().await {
        error!("Scheduler failed to start: {:?}", e);
        std::process::exit(1);
    }

    info!("Scheduler running; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Received Ctrl+C, shutting down");
    scheduler.stop().await;

    Ok(())
}
