//! Medallion Runtime - one bronze/silver/gold batch run
//!
//! Loads the sales CSV, writes bronze and silver layers, computes and writes
//! the three gold tables, then prints the gold tables back.
//!
//! Usage:
//!   cargo run --release --bin medallion_runtime
//!
//! Environment variables:
//!   MEDALLION_SOURCE_PATH - Input CSV (default: sales_100.csv)
//!   MEDALLION_DB_PATH - SQLite database path (default: data/medallion.db)
//!   MEDALLION_SCHEMA_DIR - Migration directory (default: sql)
//!   MEDALLION_BATCH_SIZE - Rows per bulk INSERT (default: 100)
//!   MEDALLION_ID_STRATEGY - random | content (default: random)
//!   MEDALLION_STAGE_TIMEOUT_SECS - Per write-stage timeout (default: unset)
//!   MEDALLION_REPORT - Print gold tables after the run (default: true)
//!   RUST_LOG - Logging level (default: info)
//!
//! Exits with status 1 and the failing stage on any error.

use dotenv::dotenv;
use log::{error, info, warn};
use medallion::pipeline::{
    config::PipelineConfig, db::SqliteMedallionStore, engine::MedallionPipeline,
    report::render_gold_report,
};

#[tokio::main]
async fn main() {
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run().await {
        error!("❌ Medallion run failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env()?;

    info!("🚀 Starting medallion run");
    info!("   ├─ Source: {}", config.source_path);
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Schema dir: {}", config.schema_dir);
    info!("   ├─ Batch size: {} rows", config.batch_size);
    info!("   ├─ Id strategy: {}", config.id_strategy.as_str());
    match config.stage_timeout_secs {
        Some(secs) => info!("   └─ Stage timeout: {}s", secs),
        None => info!("   └─ Stage timeout: none"),
    }

    // Single store handle for the whole run
    let store = SqliteMedallionStore::open(&config.db_path, config.batch_size)?;
    store.migrate(&config.schema_dir)?;

    let outcome = MedallionPipeline::new(&store)
        .with_id_strategy(config.id_strategy)
        .with_stage_timeout(config.stage_timeout())
        .run(&config.source_path)
        .await;

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            if let Err(close_err) = store.close().await {
                warn!("⚠️  Failed to close store after error: {}", close_err);
            }
            return Err(e.into());
        }
    };

    info!("📋 Run summary: {}", serde_json::to_string(&summary)?);

    if config.report {
        println!("{}", render_gold_report(&store).await?);
    }

    store.close().await?;
    info!("✅ Medallion runtime stopped");
    Ok(())
}
