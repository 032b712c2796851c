//! Configuration management
//!
//! Values come from the process environment (seeded from `.env` by the
//! binary), then command line overrides. Everything is validated before any
//! store is opened.

use anyhow::{Context, Result};
use regex::Regex;
use std::num::NonZeroUsize;
use std::str::FromStr;
use url::Url;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Image host the legacy table's paths are relative to.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://pic.jingyijun.xyz:8443/i";

/// Legacy rows read per page.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

pub const DEFAULT_SOURCE_TABLE: &str = "original_image_table";

pub const DEFAULT_DESTINATION_TABLE: &str = "image_table";

/// Rows are processed one at a time, so a small pool per store is enough.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 2;

pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Plain or schema-qualified SQL identifier
const TABLE_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$";

/// Migration configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub source: DatabaseConfig,
    pub destination: DatabaseConfig,
    pub fetch: FetchConfig,
    pub migration: MigrationConfig,
}

/// Connection settings for one of the two stores
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub table: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Image download settings
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Base URL without a trailing slash
    pub base_url: String,

    /// Per-request timeout; the client default applies when unset
    pub timeout_secs: Option<u64>,

    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub page_size: usize,

    /// Create the destination table before migrating if it does not exist
    pub create_destination_table: bool,
}

impl MigrationConfig {
    pub fn page_size(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.page_size).context("Page size must be greater than 0")
    }
}

/// Values supplied on the command line, applied over the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub page_size: Option<usize>,
    pub base_url: Option<String>,
    pub create_destination_table: bool,
}

impl Config {
    /// Load configuration from the process environment, apply overrides,
    /// and validate the result.
    ///
    /// `.env` is not read here; callers load it first (the binary does so
    /// before parsing arguments).
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.apply(overrides);
        config.validate()?;

        Ok(config)
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Environment variables:
    /// - `SOURCE_DATABASE_URL` / `DESTINATION_DATABASE_URL` (required)
    /// - `SOURCE_TABLE` / `DESTINATION_TABLE`
    /// - `DB_MAX_CONNECTIONS`, `DB_CONNECT_TIMEOUT`
    /// - `IMAGE_BASE_URL`, `FETCH_TIMEOUT`, `FETCH_USER_AGENT`
    /// - `MIGRATE_PAGE_SIZE`, `MIGRATE_CREATE_TABLE`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections =
            parse_var(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS)?;
        let connect_timeout_secs =
            parse_var(&lookup, "DB_CONNECT_TIMEOUT", DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS)?;

        let source = DatabaseConfig {
            url: lookup("SOURCE_DATABASE_URL").context("SOURCE_DATABASE_URL not set")?,
            table: lookup("SOURCE_TABLE").unwrap_or_else(|| DEFAULT_SOURCE_TABLE.to_string()),
            max_connections,
            connect_timeout_secs,
        };

        let destination = DatabaseConfig {
            url: lookup("DESTINATION_DATABASE_URL").context("DESTINATION_DATABASE_URL not set")?,
            table: lookup("DESTINATION_TABLE")
                .unwrap_or_else(|| DEFAULT_DESTINATION_TABLE.to_string()),
            max_connections,
            connect_timeout_secs,
        };

        let timeout_secs = match lookup("FETCH_TIMEOUT") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("Invalid FETCH_TIMEOUT: {}", raw))?,
            ),
            None => None,
        };

        let fetch = FetchConfig {
            base_url: normalize_base_url(
                &lookup("IMAGE_BASE_URL").unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string()),
            ),
            timeout_secs,
            user_agent: lookup("FETCH_USER_AGENT")
                .unwrap_or_else(|| format!("imgmig/{}", env!("CARGO_PKG_VERSION"))),
        };

        let migration = MigrationConfig {
            page_size: parse_var(&lookup, "MIGRATE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            create_destination_table: parse_var(&lookup, "MIGRATE_CREATE_TABLE", false)?,
        };

        Ok(Config {
            source,
            destination,
            fetch,
            migration,
        })
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(page_size) = overrides.page_size {
            self.migration.page_size = page_size;
        }

        if let Some(base_url) = &overrides.base_url {
            self.fetch.base_url = normalize_base_url(base_url);
        }

        if overrides.create_destination_table {
            self.migration.create_destination_table = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let table_name = Regex::new(TABLE_NAME_PATTERN).context("Invalid table name pattern")?;

        for (label, db) in [("source", &self.source), ("destination", &self.destination)] {
            if db.url.trim().is_empty() {
                anyhow::bail!("The {} database URL cannot be empty", label);
            }

            if !table_name.is_match(&db.table) {
                anyhow::bail!("The {} table name '{}' is not a valid identifier", label, db.table);
            }

            if db.max_connections == 0 {
                anyhow::bail!("The {} database max_connections must be greater than 0", label);
            }
        }

        if self.migration.page_size == 0 {
            anyhow::bail!("Page size must be greater than 0");
        }

        if self.fetch.timeout_secs == Some(0) {
            anyhow::bail!("Fetch timeout must be greater than 0 when set");
        }

        let base = Url::parse(&self.fetch.base_url)
            .with_context(|| format!("Invalid image base URL: {}", self.fetch.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("Image base URL must use http or https, got '{}'", base.scheme());
        }

        if self.source.url == self.destination.url && self.source.table == self.destination.table {
            anyhow::bail!("Source and destination must not be the same table");
        }

        Ok(())
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        None => Ok(default),
    }
}
