//! ABOUTME: Main binary for the depot inventory platform
//! ABOUTME: Opens the database, seeds sample data on first run, reports stats

use dp_config::Config;
use dp_core::telemetry;
use dp_db::{Db, FlagStore};
use std::process;

#[tokio::main]
async fn main() {
    telemetry::init_tracing("development", "depot");
    tracing::info!("depot starting");

    // Load configuration - exit with non-zero if invalid
    let config = match Config::load() {
        Ok(config) => {
            tracing::debug!(?config, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    tracing::info!(
        db_path = %config.database.path,
        pool_size = %config.database.pool_size,
        wal = %config.database.sqlite_wal,
        "Application configured and ready"
    );

    // Open database and bootstrap the schema
    let db = match Db::open(
        &config.database.path,
        config.database.pool_size,
        config.database.sqlite_wal,
    )
    .await
    {
        Ok(db) => {
            tracing::info!("Database initialized successfully");
            db
        }
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            process::exit(1);
        }
    };

    // Verify database health
    if let Err(e) = db.health_check().await {
        tracing::error!("Database health check failed: {}", e);
        process::exit(1);
    }

    // Seed sample data once; a failed flag write is logged but not fatal
    if config.seed.sample_data {
        let flags = FlagStore::new(&config.seed.flags_path);
        match flags.is_data_seeded().await {
            Ok(true) => tracing::debug!("Sample data already seeded, skipping"),
            Ok(false) => match dp_db::seed::seed_sample_data(&db).await {
                Ok(()) => {
                    if let Err(e) = flags.mark_data_seeded().await {
                        tracing::warn!("Failed to persist seed flag: {}", e);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to seed sample data: {}", e);
                    process::exit(1);
                }
            },
            Err(e) => tracing::warn!("Failed to read seed flag, skipping seeding: {}", e),
        }
    }

    match db.stats().await {
        Ok(stats) => {
            for (table, count) in &stats.table_counts {
                tracing::info!(table = %table, rows = %count, "Table ready");
            }
        }
        Err(e) => tracing::warn!("Failed to gather database statistics: {}", e),
    }

    db.close().await;
    tracing::info!("depot shut down cleanly");
}
