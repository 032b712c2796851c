//! Image records on both sides of the migration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the legacy image table.
///
/// Owned by the source store; the migration only reads it. The file itself
/// lives on the legacy image host under `relative_path/file_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyImageRecord {
    /// Primary key, used as the pagination cursor
    pub id: i64,

    /// Directory of the file on the image host (e.g. "2024/09/24")
    pub relative_path: String,

    /// Stored file name (e.g. "66f2cbaf9c143.png")
    pub file_name: String,

    /// Name the user uploaded the file under
    pub original_file_name: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row of the new image table, carrying the image bytes inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationImageRecord {
    /// Copied from the legacy row, never regenerated
    pub created_at: DateTime<Utc>,

    /// Copied from the legacy row, never regenerated
    pub updated_at: DateTime<Utc>,

    pub image_identifier: String,
    pub original_file_name: String,

    /// File extension without the dot, possibly empty
    pub image_type: String,

    #[serde(skip)]
    pub image_data: Vec<u8>,
}
