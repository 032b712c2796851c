//! In-memory stores
//!
//! Both stores behave like their Postgres counterparts (id-ordered key-set
//! pages, one row per insert) and can be told to fail, which makes the
//! driver's failure handling testable without a database.

use async_trait::async_trait;
use imgmig_common::{DestinationImageRecord, LegacyImageRecord};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::db::{StoreError, StoreResult};
use crate::destination::DestinationStore;
use crate::source::{Page, SourceStore};

/// Legacy table held in a vector
#[derive(Debug, Default)]
pub struct InMemorySourceStore {
    records: Vec<LegacyImageRecord>,
    fail_on_page: Option<usize>,
    requests: AtomicUsize,
}

impl InMemorySourceStore {
    pub fn new(mut records: Vec<LegacyImageRecord>) -> Self {
        records.sort_by_key(|r| r.id);
        Self {
            records,
            fail_on_page: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Make the `page`-th read (1-based) fail
    pub fn fail_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Number of `next_page` calls so far, failed ones included
    pub fn pages_requested(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceStore for InMemorySourceStore {
    async fn next_page(&self, after: Option<i64>, page_size: NonZeroUsize) -> StoreResult<Page> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_page == Some(request) {
            return Err(StoreError::rejected(format!("page {} unavailable", request)));
        }

        let start = match after {
            Some(id) => self.records.partition_point(|r| r.id <= id),
            None => 0,
        };
        let end = start.saturating_add(page_size.get()).min(self.records.len());

        Ok(Page {
            records: self.records[start..end].to_vec(),
            has_more: end < self.records.len(),
        })
    }
}

/// New image table held in a vector
#[derive(Debug, Default)]
pub struct InMemoryDestinationStore {
    records: Mutex<Vec<DestinationImageRecord>>,
    rejected: HashSet<String>,
}

impl InMemoryDestinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse inserts for this identifier
    pub fn reject(mut self, identifier: impl Into<String>) -> Self {
        self.rejected.insert(identifier.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DestinationImageRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserted rows, in insertion order
    pub fn records(&self) -> Vec<DestinationImageRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl DestinationStore for InMemoryDestinationStore {
    async fn insert(&self, record: &DestinationImageRecord) -> StoreResult<()> {
        if self.rejected.contains(&record.image_identifier) {
            return Err(StoreError::rejected(format!(
                "insert of image '{}' refused",
                record.image_identifier
            )));
        }

        self.lock().push(record.clone());
        Ok(())
    }
}
