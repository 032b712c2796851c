//! Identifier derivation for stored image file names
//!
//! Stored names look like `66f2cbaf9c143.png`: a generated stem followed by
//! the extension of the uploaded file. The stem becomes the migrated record's
//! identifier and the extension its file type.

use serde::{Deserialize, Serialize};

/// Identifier and file type derived from a stored file name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageName {
    /// File name with its trailing `.<ext>` removed
    pub identifier: String,

    /// Extension without the leading dot, empty when the name has none
    pub file_type: String,
}

impl ImageName {
    /// Split a stored file name at its last `.`.
    ///
    /// Total over every input: names without a dot keep the whole name as the
    /// identifier and get an empty file type.
    pub fn from_file_name(file_name: &str) -> Self {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) => Self {
                identifier: stem.to_string(),
                file_type: ext.to_string(),
            },
            None => Self {
                identifier: file_name.to_string(),
                file_type: String::new(),
            },
        }
    }
}

impl std::fmt::Display for ImageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier)
    }
}
