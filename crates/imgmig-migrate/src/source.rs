//! Paginated reads from the legacy image table
//!
//! Pages are key-set paginated on the integer primary key: each read asks for
//! rows with `id` greater than the last id of the previous page, ordered by
//! `id`. Rows are never revisited or skipped within one run as long as ids are
//! not rewritten while the migration is running.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imgmig_common::LegacyImageRecord;
use sqlx::PgPool;
use std::num::NonZeroUsize;

use crate::db::StoreResult;

/// One page of legacy rows, owned by whoever requested it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<LegacyImageRecord>,

    /// Whether rows exist after the last one in this page
    pub has_more: bool,
}

impl Page {
    /// Cursor to pass to the next `next_page` call
    pub fn last_id(&self) -> Option<i64> {
        self.records.last().map(|r| r.id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read side of the migration
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch up to `page_size` rows with an id greater than `after`
    /// (from the start of the table when `after` is `None`).
    async fn next_page(&self, after: Option<i64>, page_size: NonZeroUsize) -> StoreResult<Page>;
}

#[derive(Debug, sqlx::FromRow)]
struct LegacyImageRow {
    id: i64,
    path: String,
    name: String,
    origin_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LegacyImageRow> for LegacyImageRecord {
    fn from(row: LegacyImageRow) -> Self {
        Self {
            id: row.id,
            relative_path: row.path,
            file_name: row.name,
            original_file_name: row.origin_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Legacy table in Postgres
pub struct PgSourceStore {
    pool: PgPool,
    query: String,
}

impl PgSourceStore {
    /// `table` must already be validated as an identifier; it is spliced into
    /// the statement.
    pub fn new(pool: PgPool, table: &str) -> Self {
        let query = format!(
            r#"
            SELECT id, path, name, origin_name, created_at, updated_at
            FROM {table}
            WHERE $1::BIGINT IS NULL OR id > $1
            ORDER BY id
            LIMIT $2
            "#
        );

        Self { pool, query }
    }
}

#[async_trait]
impl SourceStore for PgSourceStore {
    async fn next_page(&self, after: Option<i64>, page_size: NonZeroUsize) -> StoreResult<Page> {
        let size = page_size.get();
        // One extra row tells us whether another page exists.
        let limit = i64::try_from(size).unwrap_or(i64::MAX).saturating_add(1);

        let mut rows: Vec<LegacyImageRow> = sqlx::query_as(&self.query)
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let has_more = rows.len() > size;
        rows.truncate(size);

        Ok(Page {
            records: rows.into_iter().map(LegacyImageRecord::from).collect(),
            has_more,
        })
    }
}
