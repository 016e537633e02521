//! One-shot sync runner.
//!
//! Runs a single full guiaseller -> leads sync and prints the summary as JSON.
//! Intended for cron / external schedulers; the HTTP endpoint does the same
//! work with a concurrency guard.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leads_sync_api::config::Config;
use leads_sync_api::db::{LeadsDb, SourceDb};
use leads_sync_api::repository::LeadRepository;
use leads_sync_api::source_reader::SourceReader;
use leads_sync_api::sync::SyncService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leads_sync_api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let leads_db = LeadsDb::connect(&config.leads_database_url).await?;
    sqlx::migrate!("./migrations").run(&leads_db.pool).await?;
    let source_db = SourceDb::connect(&config.source_database_url).await?;

    let service = SyncService::new(LeadRepository::new(leads_db.pool.clone()));
    let reader = SourceReader::new(&source_db);

    let result = service.run_full_sync(&reader).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
