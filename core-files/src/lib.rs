//! # File Listing
//!
//! Serves the caller's design files, transparently refreshing expired
//! provider credentials on the way (the Refresh Guard), and degrading to
//! cached metadata when a per-file lookup fails; partial data beats a
//! blank screen on a phone.

pub mod error;
pub mod lister;
pub mod types;

pub use error::{FilesError, Result};
pub use lister::FileLister;
pub use types::{FileListing, FileSummary};
