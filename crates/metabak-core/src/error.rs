//! Error types for backup decoding and inspection.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `BackupError`.
pub type Result<T> = std::result::Result<T, BackupError>;

/// Errors that can occur while decoding, materializing or inspecting a
/// metadata backup.
///
/// Every variant is terminal for the current invocation. None of them are
/// retried internally.
#[derive(Error, Debug)]
pub enum BackupError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The private key reference could not be read or parsed.
    #[error("failed to resolve RSA private key: {reason}")]
    KeyResolution {
        /// Why the key could not be resolved.
        reason: String,
    },

    /// The private key is passphrase-protected and no passphrase was given.
    #[error(
        "passphrase is required to private key, please try again after setting the '{env_var}' environment variable"
    )]
    PassphraseRequired {
        /// Environment variable that carries the passphrase.
        env_var: &'static str,
    },

    /// The encryption algorithm name is not one of the supported selectors.
    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The encrypted source could not be statted.
    #[error("failed to stat {path}: {source}")]
    SourceNotFound {
        /// The source path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The plain source could not be opened.
    #[error("failed to open {path}: {source}")]
    OpenSource {
        /// The source path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The compression layer could not be initialized.
    #[error("failed to initialize {codec} decoder for {path}: {reason}")]
    DecodeInit {
        /// The source path.
        path: PathBuf,
        /// Codec name.
        codec: &'static str,
        /// Why initialization failed.
        reason: String,
    },

    /// The encrypted object could not be decrypted.
    #[error("failed to decrypt {path}: {reason}")]
    Decrypt {
        /// Object path or key.
        path: PathBuf,
        /// Why decryption failed.
        reason: String,
    },

    /// The plain backup file could not be created.
    #[error("failed to create plain backup {path}: {source}")]
    CreateTarget {
        /// The target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Copying the decoded stream into the plain backup failed.
    #[error("failed to convert {source_path} to {target_path}: {source}")]
    Copy {
        /// The encoded source path.
        source_path: PathBuf,
        /// The plain target path.
        target_path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The container trailer is missing, truncated or corrupt.
    #[error("failed to read footer: {reason}")]
    MalformedFooter {
        /// Why the footer was rejected.
        reason: String,
    },

    /// No valid segment record starts at the given offset.
    #[error("failed to read segment at offset {offset}: {reason}")]
    SegmentRead {
        /// Absolute byte offset that was requested.
        offset: u64,
        /// Why the record was rejected.
        reason: String,
    },

    /// A segment could not be appended to a container.
    #[error("failed to write segment {name}: {reason}")]
    SegmentWrite {
        /// Segment name.
        name: String,
        /// Why the write was rejected.
        reason: String,
    },

    /// A JSON dump could not be parsed by the loader.
    #[error("invalid metadata dump: {reason}")]
    InvalidDump {
        /// Why the dump was rejected.
        reason: String,
    },
}

impl BackupError {
    /// Returns `true` if this error stems from how the command was
    /// configured (key, passphrase, algorithm) rather than from the data.
    ///
    /// # Examples
    ///
    /// ```
    /// use metabak_core::BackupError;
    ///
    /// let err = BackupError::PassphraseRequired {
    ///     env_var: "METABAK_RSA_PASSPHRASE",
    /// };
    /// assert!(err.is_configuration_error());
    ///
    /// let err = BackupError::MalformedFooter {
    ///     reason: "bad magic".to_string(),
    /// };
    /// assert!(!err.is_configuration_error());
    /// ```
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::KeyResolution { .. }
                | Self::PassphraseRequired { .. }
                | Self::UnsupportedAlgorithm(_)
        )
    }

    /// Returns `true` if this error indicates corrupt or foreign input data.
    ///
    /// Re-running the command without fixing the input cannot help.
    #[must_use]
    pub const fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::DecodeInit { .. }
                | Self::Decrypt { .. }
                | Self::MalformedFooter { .. }
                | Self::SegmentRead { .. }
                | Self::InvalidDump { .. }
        )
    }

    pub(crate) fn malformed_footer(reason: impl Into<String>) -> Self {
        Self::MalformedFooter {
            reason: reason.into(),
        }
    }

    pub(crate) fn segment_read(offset: u64, reason: impl Into<String>) -> Self {
        Self::SegmentRead {
            offset,
            reason: reason.into(),
        }
    }
}
