//! Image Migration Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the image migration tool.
//!
//! # Overview
//!
//! - **Types**: legacy and destination image records
//! - **Naming**: identifier and file type derivation from stored file names
//! - **Checksums**: payload digests used when reporting migrated rows
//! - **Logging**: subscriber setup shared by every binary
//!
//! # Example
//!
//! ```
//! use imgmig_common::naming::ImageName;
//!
//! let name = ImageName::from_file_name("66f2cbaf9c143.png");
//! assert_eq!(name.identifier, "66f2cbaf9c143");
//! assert_eq!(name.file_type, "png");
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod naming;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use naming::ImageName;
pub use types::{DestinationImageRecord, LegacyImageRecord};
