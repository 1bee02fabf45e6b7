//! Decoding and inspection of filesystem metadata backups.
//!
//! `metabak-core` turns a backup artifact that may be RSA-encrypted and/or
//! gzip/zstd compressed into plain bytes, caches the plain form next to the
//! source, and reads the trailer-indexed binary container so individual
//! segments can be inspected without a linear scan.
//!
//! # Examples
//!
//! ```no_run
//! use metabak_core::DecodeSpec;
//! use metabak_core::materialize;
//! use metabak_core::read_footer;
//! use metabak_core::report::render_summary;
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = DecodeSpec::from_env("meta-dump.bin.gz").with_private_key("/etc/metabak/key.pem");
//! let plain = materialize(&spec)?;
//! let footer = read_footer(&mut File::open(&plain.path)?)?;
//! print!("{}", render_summary(&footer, false));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backup;
pub mod cache;
pub mod config;
pub mod copy;
pub mod crypto;
pub mod error;
pub mod formats;
pub mod keys;
pub mod loader;
pub mod progress;
pub mod report;
pub mod storage;
pub mod stream;

#[cfg(test)]
mod test_utils;

// Re-export main API types
pub use backup::BackupFooter;
pub use backup::BackupWriter;
pub use backup::Segment;
pub use backup::SegmentKind;
pub use backup::read_footer;
pub use backup::read_segment;
pub use cache::MaterializeOutcome;
pub use cache::Materialized;
pub use cache::materialize;
pub use config::DEFAULT_THREADS;
pub use config::DecodeSpec;
pub use config::EncryptAlgo;
pub use config::PASSPHRASE_ENV;
pub use crypto::DataEncryptor;
pub use error::BackupError;
pub use error::Result;
pub use formats::Compression;
pub use keys::KeyMaterial;
pub use loader::LoadOptions;
pub use loader::LoadSummary;
pub use loader::MetaLoader;
pub use loader::ScanLoader;
pub use progress::CountingProgress;
pub use progress::LoadProgress;
pub use progress::NoopProgress;
pub use stream::ComposedStream;
