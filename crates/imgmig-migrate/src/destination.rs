//! Single-row inserts into the new image table

use async_trait::async_trait;
use imgmig_common::DestinationImageRecord;
use sqlx::PgPool;

use crate::db::{StoreError, StoreResult};

/// Write side of the migration
#[async_trait]
pub trait DestinationStore: Send + Sync {
    async fn insert(&self, record: &DestinationImageRecord) -> StoreResult<()>;
}

/// New image table in Postgres
pub struct PgDestinationStore {
    pool: PgPool,
    table: String,
    insert_sql: String,
}

impl PgDestinationStore {
    /// `table` must already be validated as an identifier; it is spliced into
    /// the statements.
    pub fn new(pool: PgPool, table: &str) -> Self {
        let insert_sql = format!(
            r#"
            INSERT INTO {table} (
                created_at, updated_at, image_identifier,
                original_file_name, image_type, image_file_data
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#
        );

        Self {
            pool,
            table: table.to_string(),
            insert_sql,
        }
    }

    /// Create the destination table when it does not exist yet
    pub async fn ensure_table(&self) -> StoreResult<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                image_identifier TEXT NOT NULL,
                original_file_name TEXT NOT NULL,
                image_type TEXT NOT NULL,
                image_file_data BYTEA NOT NULL
            )
            "#,
            self.table
        );

        sqlx::query(&ddl).execute(&self.pool).await?;

        tracing::info!(table = %self.table, "Destination table ready");
        Ok(())
    }
}

#[async_trait]
impl DestinationStore for PgDestinationStore {
    async fn insert(&self, record: &DestinationImageRecord) -> StoreResult<()> {
        sqlx::query(&self.insert_sql)
            .bind(record.created_at)
            .bind(record.updated_at)
            .bind(&record.image_identifier)
            .bind(&record.original_file_name)
            .bind(&record.image_type)
            .bind(record.image_data.as_slice())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, "image", &record.image_identifier))?;

        Ok(())
    }
}
