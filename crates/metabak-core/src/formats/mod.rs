//! On-disk format helpers.
//!
//! - [`compression`]: suffix-driven compression layer selection

pub mod compression;

pub use compression::Compression;
pub use compression::plain_path;
