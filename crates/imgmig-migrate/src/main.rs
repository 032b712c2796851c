//! imgmig - migrate legacy image rows into the new image table

use anyhow::{Context, Result};
use clap::Parser;
use imgmig_common::logging::{init_logging, LogConfig, LogLevel};
use imgmig_migrate::{
    config::{Config, ConfigOverrides},
    db,
    destination::PgDestinationStore,
    driver::BatchDriver,
    fetch::{HttpFetcher, ImageUrlBuilder},
    report::TracingReporter,
    source::PgSourceStore,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "imgmig")]
#[command(author, version, about = "Copy legacy images into the new image table")]
struct Cli {
    /// Legacy rows read per page
    #[arg(long, env = "MIGRATE_PAGE_SIZE")]
    page_size: Option<usize>,

    /// Image host the legacy paths are relative to
    #[arg(long, env = "IMAGE_BASE_URL")]
    base_url: Option<String>,

    /// Create the destination table if it does not exist
    #[arg(long)]
    create_table: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Loaded before parsing so `.env` feeds both clap and the log settings.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _log_guard = init_logging(&log_config)?;

    let config = Config::load(&ConfigOverrides {
        page_size: cli.page_size,
        base_url: cli.base_url,
        create_destination_table: cli.create_table,
    })?;

    info!(
        source_table = %config.source.table,
        destination_table = %config.destination.table,
        base_url = %config.fetch.base_url,
        page_size = config.migration.page_size,
        "Starting image migration"
    );

    let source_pool = db::create_pool(&config.source)
        .await
        .context("Failed to connect to the source database")?;
    let destination_pool = db::create_pool(&config.destination)
        .await
        .context("Failed to connect to the destination database")?;

    let source = PgSourceStore::new(source_pool, &config.source.table);
    let destination = PgDestinationStore::new(destination_pool, &config.destination.table);
    if config.migration.create_destination_table {
        destination
            .ensure_table()
            .await
            .context("Failed to create the destination table")?;
    }

    let driver = BatchDriver::new(
        source,
        destination,
        HttpFetcher::new(&config.fetch).context("Failed to build HTTP client")?,
        ImageUrlBuilder::new(&config.fetch.base_url)?,
        TracingReporter,
        config.migration.page_size()?,
    );

    // Row failures are only logged; the exit status reflects pagination.
    let summary = driver.run().await?;

    info!(
        rows = summary.rows(),
        migrated = summary.migrated,
        failed = summary.fetch_failures + summary.insert_failures,
        "Migration complete"
    );
    Ok(())
}
