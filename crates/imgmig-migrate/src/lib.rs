//! Image Migration Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Moves image records from the legacy image table, whose files live on an
//! external image host, into the new image table that stores the bytes inline.
//!
//! # Pipeline
//!
//! For every page of legacy rows the [`driver::BatchDriver`]:
//!
//! 1. derives the identifier and file type from the stored file name
//! 2. downloads the file through a [`fetch::Fetcher`]
//! 3. builds the new row with [`translate::translate`]
//! 4. inserts it through a [`destination::DestinationStore`]
//!
//! A failed download or insert only skips that row. A failed page read stops
//! the run.
//!
//! # Example
//!
//! ```no_run
//! use imgmig_migrate::{
//!     config::{Config, ConfigOverrides}, db, destination::PgDestinationStore, driver::BatchDriver,
//!     fetch::{HttpFetcher, ImageUrlBuilder}, report::TracingReporter, source::PgSourceStore,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     dotenvy::dotenv().ok();
//!     let config = Config::load(&ConfigOverrides::default())?;
//!
//!     let source = PgSourceStore::new(db::create_pool(&config.source).await?, &config.source.table);
//!     let destination =
//!         PgDestinationStore::new(db::create_pool(&config.destination).await?, &config.destination.table);
//!
//!     let driver = BatchDriver::new(
//!         source,
//!         destination,
//!         HttpFetcher::new(&config.fetch)?,
//!         ImageUrlBuilder::new(&config.fetch.base_url)?,
//!         TracingReporter,
//!         config.migration.page_size()?,
//!     );
//!
//!     let summary = driver.run().await?;
//!     println!("migrated {} images", summary.migrated);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod destination;
pub mod driver;
pub mod fetch;
pub mod memory;
pub mod report;
pub mod source;
pub mod translate;

pub use db::{StoreError, StoreResult};
pub use driver::{BatchDriver, MigrationError, PageReport, RowOutcome, RunSummary};
pub use fetch::FetchError;
