//! Batch driver: walks the legacy table page by page and migrates each row
//!
//! ```text
//! Paginating --page read ok--> ProcessingRow* --> Paginating | Done
//!     |
//!     +--page read failed--> FatalAborted
//! ```
//!
//! Rows are processed strictly one after another. A row that fails to
//! download or insert is recorded and skipped; only a failed page read ends
//! the run early.

use imgmig_common::{checksum, ImageName, LegacyImageRecord};
use std::num::NonZeroUsize;
use thiserror::Error;

use crate::db::StoreError;
use crate::destination::DestinationStore;
use crate::fetch::{FetchError, Fetcher, ImageUrlBuilder};
use crate::report::RunObserver;
use crate::source::SourceStore;
use crate::translate::translate;

/// Run-fatal failure
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Failed to read page {batch} of legacy images: {source}")]
    PageRead { batch: usize, source: StoreError },
}

/// What happened to one legacy row
#[derive(Debug)]
pub enum RowOutcome {
    Migrated {
        identifier: String,
        bytes: usize,
        sha256: String,
    },
    FetchFailed {
        identifier: String,
        error: FetchError,
    },
    InsertFailed {
        identifier: String,
        error: StoreError,
    },
}

impl RowOutcome {
    pub fn identifier(&self) -> &str {
        match self {
            RowOutcome::Migrated { identifier, .. }
            | RowOutcome::FetchFailed { identifier, .. }
            | RowOutcome::InsertFailed { identifier, .. } => identifier,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Migrated { .. })
    }
}

/// Outcomes of every row in one page, in page order
#[derive(Debug, Default)]
pub struct PageReport {
    /// 1-based page number within the run
    pub batch: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl PageReport {
    pub fn migrated(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn fetch_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RowOutcome::FetchFailed { .. }))
            .count()
    }

    pub fn insert_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RowOutcome::InsertFailed { .. }))
            .count()
    }
}

/// Totals for a run that reached the end of the legacy table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: usize,
    pub migrated: usize,
    pub fetch_failures: usize,
    pub insert_failures: usize,
}

impl RunSummary {
    pub fn rows(&self) -> usize {
        self.migrated + self.fetch_failures + self.insert_failures
    }

    fn absorb(&mut self, report: &PageReport) {
        self.pages += 1;
        self.migrated += report.migrated();
        self.fetch_failures += report.fetch_failures();
        self.insert_failures += report.insert_failures();
    }
}

/// Drives the migration from a source store into a destination store
pub struct BatchDriver<S, D, F, O> {
    source: S,
    destination: D,
    fetcher: F,
    urls: ImageUrlBuilder,
    observer: O,
    page_size: NonZeroUsize,
}

impl<S, D, F, O> BatchDriver<S, D, F, O>
where
    S: SourceStore,
    D: DestinationStore,
    F: Fetcher,
    O: RunObserver,
{
    pub fn new(
        source: S,
        destination: D,
        fetcher: F,
        urls: ImageUrlBuilder,
        observer: O,
        page_size: NonZeroUsize,
    ) -> Self {
        Self {
            source,
            destination,
            fetcher,
            urls,
            observer,
            page_size,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Migrate the whole legacy table.
    ///
    /// Returns the run totals once pagination is exhausted, whatever the
    /// number of failed rows. A page read failure stops the run before any
    /// row of that page is touched.
    pub async fn run(&self) -> Result<RunSummary, MigrationError> {
        let mut summary = RunSummary::default();
        let mut cursor: Option<i64> = None;
        let mut batch = 0;

        loop {
            batch += 1;

            let page = match self.source.next_page(cursor, self.page_size).await {
                Ok(page) => page,
                Err(source) => {
                    let err = MigrationError::PageRead { batch, source };
                    self.observer.run_aborted(&summary, &err);
                    return Err(err);
                },
            };

            if page.is_empty() {
                break;
            }

            let has_more = page.has_more && page.len() >= self.page_size.get();
            cursor = page.last_id();

            self.observer.page_started(batch, page.len());
            let report = self.process_page(batch, page.records).await;
            summary.absorb(&report);
            self.observer.page_finished(&report);

            if !has_more {
                break;
            }
        }

        self.observer.run_finished(&summary);
        Ok(summary)
    }

    /// Process every row of one page; the page is consumed and dropped here.
    pub async fn process_page(&self, batch: usize, records: Vec<LegacyImageRecord>) -> PageReport {
        let mut report = PageReport {
            batch,
            outcomes: Vec::with_capacity(records.len()),
        };

        for record in records {
            let outcome = self.process_row(batch, &record).await;
            self.observer.row_finished(batch, &outcome);
            report.outcomes.push(outcome);
        }

        report
    }

    async fn process_row(&self, batch: usize, record: &LegacyImageRecord) -> RowOutcome {
        let name = ImageName::from_file_name(&record.file_name);
        let identifier = name.identifier.clone();

        let url = match self.urls.build(record) {
            Ok(url) => url,
            Err(error) => return RowOutcome::FetchFailed { identifier, error },
        };

        self.observer.download_started(batch, &identifier, &url);

        let payload = match self.fetcher.fetch(&url).await {
            Ok(payload) => payload,
            Err(error) => return RowOutcome::FetchFailed { identifier, error },
        };

        let bytes = payload.len();
        let sha256 = checksum::sha256_hex(&payload);
        let new_record = translate(record, name, payload);

        match self.destination.insert(&new_record).await {
            Ok(()) => RowOutcome::Migrated {
                identifier,
                bytes,
                sha256,
            },
            Err(error) => RowOutcome::InsertFailed { identifier, error },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryDestinationStore, InMemorySourceStore};
    use crate::report::RecordingObserver;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use url::Url;

    /// Serves payloads by URL path; unknown paths fail with a 404.
    struct StubFetcher {
        bodies: HashMap<String, Vec<u8>>,
    }

    impl StubFetcher {
        fn serving_all(records: &[LegacyImageRecord]) -> Self {
            let bodies = records
                .iter()
                .map(|r| (format!("/i/{}/{}", r.relative_path, r.file_name), payload_for(r.id)))
                .collect();
            Self { bodies }
        }

        fn without(mut self, record: &LegacyImageRecord) -> Self {
            self.bodies
                .remove(&format!("/i/{}/{}", record.relative_path, record.file_name));
            self
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            self.bodies
                .get(url.path())
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: reqwest::StatusCode::NOT_FOUND,
                })
        }
    }

    fn payload_for(id: i64) -> Vec<u8> {
        format!("image-bytes-{id}").into_bytes()
    }

    fn record(id: i64) -> LegacyImageRecord {
        LegacyImageRecord {
            id,
            relative_path: "2024/09/24".to_string(),
            file_name: format!("img{id:04}.png"),
            original_file_name: format!("upload {id}.png"),
            created_at: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::seconds(id),
            updated_at: Utc.with_ymd_and_hms(2023, 6, 1, 12, 30, 0).unwrap()
                + chrono::Duration::milliseconds(id * 7),
        }
    }

    fn records(n: i64) -> Vec<LegacyImageRecord> {
        (1..=n).map(record).collect()
    }

    fn driver(
        source: InMemorySourceStore,
        fetcher: StubFetcher,
        page_size: usize,
    ) -> BatchDriver<InMemorySourceStore, InMemoryDestinationStore, StubFetcher, RecordingObserver>
    {
        BatchDriver::new(
            source,
            InMemoryDestinationStore::new(),
            fetcher,
            ImageUrlBuilder::new("https://pic.example.com/i").unwrap(),
            RecordingObserver::default(),
            NonZeroUsize::new(page_size).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_three_records_with_one_fetch_failure() {
        let rows = records(3);
        let fetcher = StubFetcher::serving_all(&rows).without(&rows[1]);
        let driver = driver(InMemorySourceStore::new(rows.clone()), fetcher, 2);

        let summary = driver.run().await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                pages: 2,
                migrated: 2,
                fetch_failures: 1,
                insert_failures: 0,
            }
        );
        assert_eq!(driver.observer().page_sizes(), vec![2, 1]);

        let stored = driver.destination().records();
        let identifiers: Vec<_> = stored.iter().map(|r| r.image_identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["img0001", "img0003"]);

        assert_eq!(driver.observer().fetch_failures(), vec!["img0002".to_string()]);
        assert!(driver.observer().finished());
    }

    #[tokio::test]
    async fn test_every_record_visited_once() {
        for (n, page_size) in [(0, 3), (1, 1), (5, 2), (6, 3), (7, 10), (10, 1)] {
            let rows = records(n);
            let driver = driver(
                InMemorySourceStore::new(rows.clone()),
                StubFetcher::serving_all(&rows),
                page_size,
            );

            let summary = driver.run().await.unwrap();

            let expected_pages = (n as usize).div_ceil(page_size);
            assert_eq!(summary.pages, expected_pages, "n={n} page_size={page_size}");
            assert_eq!(summary.migrated, n as usize);
            assert_eq!(driver.source().pages_requested(), expected_pages.max(1));

            let ids: Vec<_> = driver
                .destination()
                .records()
                .iter()
                .map(|r| r.image_identifier.clone())
                .collect();
            let expected: Vec<_> = rows.iter().map(|r| format!("img{:04}", r.id)).collect();
            assert_eq!(ids, expected);
        }
    }

    #[tokio::test]
    async fn test_timestamps_and_payload_preserved() {
        let rows = records(4);
        let driver = driver(
            InMemorySourceStore::new(rows.clone()),
            StubFetcher::serving_all(&rows),
            3,
        );

        driver.run().await.unwrap();

        for (legacy, stored) in rows.iter().zip(driver.destination().records()) {
            assert_eq!(stored.created_at, legacy.created_at);
            assert_eq!(stored.updated_at, legacy.updated_at);
            assert_eq!(stored.original_file_name, legacy.original_file_name);
            assert_eq!(stored.image_type, "png");
            assert_eq!(stored.image_data, payload_for(legacy.id));
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_produces_no_insert() {
        let rows = records(1);
        let driver = driver(
            InMemorySourceStore::new(rows.clone()),
            StubFetcher::serving_all(&[]),
            5,
        );

        let summary = driver.run().await.unwrap();

        assert_eq!(summary.fetch_failures, 1);
        assert!(driver.destination().records().is_empty());
        assert_eq!(driver.observer().fetch_failures(), vec!["img0001".to_string()]);
        assert!(driver.observer().insert_failures().is_empty());
    }

    #[tokio::test]
    async fn test_insert_failure_skips_row_and_continues() {
        let rows = records(3);
        let destination = InMemoryDestinationStore::new().reject("img0002");
        let driver = BatchDriver::new(
            InMemorySourceStore::new(rows.clone()),
            destination,
            StubFetcher::serving_all(&rows),
            ImageUrlBuilder::new("https://pic.example.com/i").unwrap(),
            RecordingObserver::default(),
            NonZeroUsize::new(10).unwrap(),
        );

        let summary = driver.run().await.unwrap();

        assert_eq!(summary.migrated, 2);
        assert_eq!(summary.insert_failures, 1);
        assert_eq!(driver.observer().insert_failures(), vec!["img0002".to_string()]);
        assert_eq!(driver.destination().records().len(), 2);
    }

    #[tokio::test]
    async fn test_page_read_failure_aborts_run() {
        let rows = records(5);
        let source = InMemorySourceStore::new(rows.clone()).fail_on_page(2);
        let driver = driver(source, StubFetcher::serving_all(&rows), 2);

        let err = driver.run().await.unwrap_err();

        let MigrationError::PageRead { batch, .. } = err;
        assert_eq!(batch, 2);
        // Page 1 was migrated, nothing from page 2 onwards was touched.
        assert_eq!(driver.destination().records().len(), 2);
        assert_eq!(driver.source().pages_requested(), 2);
        assert_eq!(driver.observer().page_sizes(), vec![2]);
        assert!(driver.observer().aborted());
        assert!(!driver.observer().finished());
    }

    #[tokio::test]
    async fn test_all_rows_failing_still_completes() {
        let rows = records(4);
        let driver = driver(
            InMemorySourceStore::new(rows),
            StubFetcher::serving_all(&[]),
            3,
        );

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.migrated, 0);
        assert_eq!(summary.fetch_failures, 4);
        assert_eq!(summary.rows(), 4);
        assert!(driver.observer().finished());
    }
}
