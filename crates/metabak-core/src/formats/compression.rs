//! Compression layer selection.
//!
//! The compression of a backup is implied by its file name: a `.gz` suffix
//! selects gzip, `.zstd` selects Zstandard, and anything else is read as-is.
//! Removing exactly that suffix yields the path of the plain backup.

use std::ffi::OsStr;
use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

/// Gzip member header magic.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Zstandard frame magic (little-endian `0xFD2FB528`).
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Compression applied to a backup file.
///
/// # Examples
///
/// ```
/// use metabak_core::Compression;
///
/// assert_eq!(Compression::detect("meta-dump.json.gz"), Compression::Gzip);
/// assert_eq!(Compression::detect("meta-dump.bin.zstd"), Compression::Zstd);
/// assert_eq!(Compression::detect("meta-dump.bin.zst"), Compression::None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Plain bytes.
    None,
    /// Gzip (deflate), possibly multi-member.
    Gzip,
    /// Zstandard.
    Zstd,
}

impl Compression {
    /// Resolves the compression from the path suffix.
    ///
    /// Matching is exact and case-sensitive. Only the extension has to be
    /// UTF-8; the rest of the file name may be arbitrary bytes.
    pub fn detect(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(OsStr::to_str) {
            Some("gz") => Self::Gzip,
            Some("zstd") => Self::Zstd,
            _ => Self::None,
        }
    }

    /// Returns the file name suffix, empty for [`Compression::None`].
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Zstd => ".zstd",
        }
    }

    /// Returns a human-readable codec name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "identity",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }

    /// Returns the magic bytes a stream of this codec must start with.
    #[must_use]
    pub const fn magic(self) -> &'static [u8] {
        match self {
            Self::None => &[],
            Self::Gzip => &GZIP_MAGIC,
            Self::Zstd => &ZSTD_MAGIC,
        }
    }

    /// Returns `true` for an actual compression codec.
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Returns the path of the plain backup for `path`.
///
/// The outermost compression suffix is removed; for an uncompressed path the
/// last extension is removed instead, which is where the decrypted copy of an
/// encrypted backup lands. The rest of the path is kept byte for byte. A path without any extension gets a `.plain`
/// suffix so the result never equals the input.
///
/// # Examples
///
/// ```
/// use metabak_core::formats::compression::plain_path;
/// use std::path::PathBuf;
///
/// assert_eq!(plain_path("backup.json.gz"), PathBuf::from("backup.json"));
/// assert_eq!(plain_path("/b/dump.bin.zstd"), PathBuf::from("/b/dump.bin"));
/// assert_eq!(plain_path("dump.bin.enc"), PathBuf::from("dump.bin"));
/// ```
pub fn plain_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().is_some() {
        return path.with_extension("");
    }

    let mut plain = OsString::from(path.as_os_str());
    plain.push(".plain");
    PathBuf::from(plain)
}
