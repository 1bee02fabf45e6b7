//! Error conversion utilities for CLI.
//!
//! Converts metabak-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::Result;
use anyhow::anyhow;
use metabak_core::BackupError;
use metabak_core::EncryptAlgo;
use std::path::Path;

/// Converts `BackupError` to user-friendly anyhow error with context
pub fn convert_backup_error(err: BackupError, backup: &Path) -> anyhow::Error {
    match err {
        BackupError::PassphraseRequired { env_var } => {
            anyhow!(
                "Private key for '{}' is protected by a passphrase\n\
                 HINT: Export the passphrase in {env_var} and run the command again.",
                backup.display()
            )
        }
        BackupError::KeyResolution { reason } => {
            anyhow!(
                "Cannot use the RSA private key for '{}': {reason}\n\
                 HINT: Pass PEM text or the path of a PEM file with --encrypt-rsa-key.",
                backup.display()
            )
        }
        BackupError::UnsupportedAlgorithm(name) => {
            anyhow!(
                "Unsupported encryption algorithm '{name}'\n\
                 HINT: Supported algorithms: {}",
                supported_algorithms()
            )
        }
        BackupError::Decrypt { reason, .. } => {
            anyhow!(
                "Cannot decrypt '{}': {reason}\n\
                 HINT: Check that --encrypt-rsa-key and --encrypt-algo match the ones used for the backup.",
                backup.display()
            )
        }
        BackupError::DecodeInit { codec, reason, .. } => {
            anyhow!(
                "Cannot decode '{}' as {codec}: {reason}\n\
                 HINT: The file suffix (.gz, .zstd) must match its content; encrypted backups need --encrypt-rsa-key.",
                backup.display()
            )
        }
        BackupError::CreateTarget { path, source } => {
            anyhow!(
                "Cannot create plain backup '{}': {source}\n\
                 HINT: Check the directory is writable, or remove a stale file left by another run.",
                path.display()
            )
        }
        BackupError::Copy {
            target_path,
            source,
            ..
        } => {
            anyhow!(
                "Conversion of '{}' failed: {source}\n\
                 HINT: Remove the partial file '{}' before trying again; it would be reused as-is.",
                backup.display(),
                target_path.display()
            )
        }
        BackupError::MalformedFooter { reason } => {
            anyhow!(
                "'{}' is not a readable binary backup: {reason}\n\
                 HINT: JSON dumps are loaded without --binary.",
                backup.display()
            )
        }
        BackupError::SegmentRead { offset, reason } => {
            anyhow!(
                "No segment at offset {offset} in '{}': {reason}\n\
                 HINT: Use --stat --offset -1 to list valid segment offsets.",
                backup.display()
            )
        }
        _ => anyhow::Error::from(err)
            .context(format!("Error processing backup '{}'", backup.display())),
    }
}

/// Adds context to a generic error about backup operations
pub fn add_backup_context<T>(result: Result<T, BackupError>, backup: &Path) -> anyhow::Result<T> {
    result.map_err(|e| convert_backup_error(e, backup))
}

fn supported_algorithms() -> String {
    EncryptAlgo::ALL
        .iter()
        .map(|algo| algo.name())
        .collect::<Vec<_>>()
        .join(", ")
}
