//! Legacy row + downloaded bytes -> new image row

use imgmig_common::{DestinationImageRecord, ImageName, LegacyImageRecord};

/// Build the destination row.
///
/// Timestamps are copied from the legacy row so the migrated image keeps its
/// original upload time.
pub fn translate(
    legacy: &LegacyImageRecord,
    name: ImageName,
    payload: Vec<u8>,
) -> DestinationImageRecord {
    DestinationImageRecord {
        created_at: legacy.created_at,
        updated_at: legacy.updated_at,
        image_identifier: name.identifier,
        original_file_name: legacy.original_file_name.clone(),
        image_type: name.file_type,
        image_data: payload,
    }
}
