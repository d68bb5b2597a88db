//! Media acquisition: scratch files and attachment download.

pub mod extract;
pub mod temp;

pub use extract::{extract_media, MediaBuffer, MediaFilter, MAX_MEDIA_BYTES};
pub use temp::{TempFiles, TempPath};
