use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the source and destination stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Store configuration is invalid or missing
    #[error("Store configuration error: {0}")]
    Config(String),

    /// Unique constraint violation on insert
    #[error("{0}")]
    Duplicate(String),

    /// The store refused the operation for another reason
    #[error("{0}")]
    Rejected(String),
}

impl StoreError {
    pub fn duplicate(resource_type: &str, identifier: &str) -> Self {
        Self::Duplicate(format!("{} '{}' already exists", resource_type, identifier))
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Map a failed insert, singling out unique violations
    pub fn from_insert(err: sqlx::Error, resource_type: &str, identifier: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::duplicate(resource_type, identifier);
            }
        }
        Self::Sqlx(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub async fn create_pool(config: &DatabaseConfig) -> StoreResult<PgPool> {
    if config.url.trim().is_empty() {
        return Err(StoreError::Config("database URL is empty".to_string()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await?;

    tracing::info!(
        table = %config.table,
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}
