//! Conversion cache for encoded backups.
//!
//! An encrypted or compressed backup is decoded once into a plain sibling
//! file (see [`plain_path`]) and that file is reused by later invocations.
//! An existing plain file is trusted as-is: no hash or timestamp is compared,
//! so a stale or partially written file from an earlier failed run has to be
//! removed by hand.

use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;

use crate::BackupError;
use crate::DecodeSpec;
use crate::Result;
use crate::copy::CopyBuffer;
use crate::copy::copy_with_buffer;
use crate::crypto::DataEncryptor;
use crate::formats::Compression;
use crate::formats::plain_path;
use crate::stream;
use crate::stream::ComposedStream;

/// What [`materialize`] did to produce its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// The source is already plain and was returned unchanged.
    Passthrough,
    /// A plain file already existed and was reused.
    CacheHit,
    /// The source was decoded into a new plain file.
    Converted {
        /// Plain bytes written.
        bytes: u64,
    },
}

/// Result of materializing a backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// Path of a plain, directly readable backup.
    pub path: PathBuf,
    /// How the path was obtained.
    pub outcome: MaterializeOutcome,
}

/// Returns `true` if the source has to be decoded before direct use.
#[must_use]
pub fn needs_decode(source: &Path, encrypted: bool) -> bool {
    encrypted || Compression::detect(source).is_compressed()
}

/// Ensures a plain copy of the backup described by `spec` exists.
///
/// The private key is only resolved when an actual conversion happens, so a
/// cache hit works even after the key has been rotated away.
///
/// # Errors
///
/// - key and stream errors from [`stream::open`]
/// - [`BackupError::CreateTarget`] if the plain file cannot be created,
///   including when it appeared concurrently
/// - [`BackupError::Copy`] if decoding fails midway; the partial plain file
///   is left in place
///
/// # Examples
///
/// ```no_run
/// use metabak_core::DecodeSpec;
/// use metabak_core::materialize;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let plain = materialize(&DecodeSpec::new("meta-dump.bin.gz"))?;
/// assert_eq!(plain.path.to_str(), Some("meta-dump.bin"));
/// # Ok(())
/// # }
/// ```
pub fn materialize(spec: &DecodeSpec) -> Result<Materialized> {
    let source = spec.source();
    let Some(plain) = cached_or_target(source, spec.is_encrypted())? else {
        return Ok(passthrough(source));
    };
    if plain.outcome == MaterializeOutcome::CacheHit {
        return Ok(plain);
    }

    let composed = stream::open(spec)?;
    write_plain(composed, source, plain.path)
}

/// Same as [`materialize`] with an already bound decryptor.
pub fn materialize_source(
    source: &Path,
    decryptor: Option<&DataEncryptor>,
) -> Result<Materialized> {
    let Some(plain) = cached_or_target(source, decryptor.is_some())? else {
        return Ok(passthrough(source));
    };
    if plain.outcome == MaterializeOutcome::CacheHit {
        return Ok(plain);
    }

    let composed = stream::open_source(source, decryptor)?;
    write_plain(composed, source, plain.path)
}

fn passthrough(source: &Path) -> Materialized {
    Materialized {
        path: source.to_path_buf(),
        outcome: MaterializeOutcome::Passthrough,
    }
}

/// Returns `None` when no decoding is needed, a cache hit when the plain file
/// exists, and otherwise the target path with a placeholder outcome.
fn cached_or_target(source: &Path, encrypted: bool) -> Result<Option<Materialized>> {
    if !needs_decode(source, encrypted) {
        return Ok(None);
    }

    let path = plain_path(source);
    if path.try_exists()? {
        info!(
            "plain backup {} already exists, skip conversion",
            path.display()
        );
        return Ok(Some(Materialized {
            path,
            outcome: MaterializeOutcome::CacheHit,
        }));
    }

    Ok(Some(Materialized {
        path,
        outcome: MaterializeOutcome::Converted { bytes: 0 },
    }))
}

fn write_plain(mut composed: ComposedStream, source: &Path, target: PathBuf) -> Result<Materialized> {
    let copy_error = |source_err| BackupError::Copy {
        source_path: source.to_path_buf(),
        target_path: target.clone(),
        source: source_err,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .map_err(|e| BackupError::CreateTarget {
            path: target.clone(),
            source: e,
        })?;

    let mut buffer = CopyBuffer::new();
    let bytes = copy_with_buffer(&mut composed, &mut file, &mut buffer).map_err(copy_error)?;
    composed.close().map_err(copy_error)?;
    file.sync_all().map_err(copy_error)?;

    info!(
        bytes,
        "converted backup {} to {}",
        source.display(),
        target.display()
    );
    Ok(Materialized {
        path: target,
        outcome: MaterializeOutcome::Converted { bytes },
    })
}
