//! Binary backup container.
//!
//! A container is a sequence of independently addressable segment records
//! followed by a footer index and a fixed-size trailer. Keeping the index at
//! the end lets a writer stream segments out as they are produced and flush
//! the index once; readers start from the trailer and seek straight to the
//! segment they need.
//!
//! ```text
//! +-----------+-----------+-----+-------------+---------------------+
//! | segment 0 | segment 1 | ... | footer body | trailer (24 bytes)  |
//! +-----------+-----------+-----+-------------+---------------------+
//!
//! segment:  magic u32 | kind tag u8 | payload len u32 | crc32 u32 | payload
//! footer:   entry count u32 | { name len u16 | name | count u64 | offset u64 }*
//! trailer:  magic u32 | version u32 | footer crc32 u32 | reserved u32 | footer len u64
//! ```
//!
//! All integers are big-endian. Segment payloads are JSON arrays of records.
//!
//! # Examples
//!
//! ```no_run
//! use metabak_core::backup::read_footer;
//! use metabak_core::backup::read_segment;
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut file = File::open("meta-dump.bin")?;
//! let footer = read_footer(&mut file)?;
//! if let Some(info) = footer.get("edge") {
//!     let segment = read_segment(&mut file, info.offset)?;
//!     println!("{} holds {} records", segment.name(), segment.count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod footer;
pub mod kind;
pub mod segment;
pub mod writer;

pub use footer::BackupFooter;
pub use footer::SegmentInfo;
pub use footer::read_footer;
pub use kind::SegmentKind;
pub use segment::Segment;
pub use segment::read_segment;
pub use writer::BackupWriter;

/// Container format version written by [`BackupWriter`].
pub const BACKUP_VERSION: u32 = 1;

/// Trailer magic ("MBKF").
pub const FOOTER_MAGIC: u32 = 0x4D42_4B46;

/// Segment record magic ("SEG1").
pub const SEGMENT_MAGIC: u32 = 0x5345_4731;

/// Size of the trailer at the end of the file.
pub const TRAILER_LEN: u64 = 24;

/// Size of a segment record header.
pub const SEGMENT_HEADER_LEN: u64 = 13;

/// Largest accepted segment payload (64 MiB).
pub const MAX_SEGMENT_LEN: u32 = 64 * 1024 * 1024;

/// Largest accepted footer body (16 MiB).
pub const MAX_FOOTER_LEN: u64 = 16 * 1024 * 1024;
