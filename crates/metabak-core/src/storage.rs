//! Minimal object storage accessors.
//!
//! Decrypting a local backup goes through the same "get object, open
//! envelope, yield plaintext" path used for encrypted remote objects, so the
//! local directory is exposed as an [`ObjectStorage`] and decryption is a
//! wrapper around it.

use std::fs::File;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::PathBuf;

use tracing::debug;

use crate::BackupError;
use crate::Result;
use crate::crypto::DataEncryptor;

/// Reader returned by [`ObjectStorage::get`].
pub type ObjectReader = Box<dyn Read + Send>;

/// Read access to named objects.
pub trait ObjectStorage {
    /// Human-readable description of the backend.
    fn describe(&self) -> String;

    /// Returns a reader over `key` starting at `offset`.
    ///
    /// `limit` is the number of bytes to read; `-1` reads to the end.
    fn get(&self, key: &str, offset: u64, limit: i64) -> Result<ObjectReader>;
}

/// Objects stored as files below a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Creates a storage rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStorage for FileStorage {
    fn describe(&self) -> String {
        format!("file://{}/", self.root.display())
    }

    fn get(&self, key: &str, offset: u64, limit: i64) -> Result<ObjectReader> {
        let path = self.root.join(key);
        let mut file = File::open(&path).map_err(|source| BackupError::OpenSource {
            path: path.clone(),
            source,
        })?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))?;
        }
        match u64::try_from(limit) {
            Ok(limit) => Ok(Box::new(file.take(limit))),
            Err(_) => Ok(Box::new(file)),
        }
    }
}

/// Wraps a storage and decrypts every object it returns.
///
/// Envelopes are authenticated as a whole, so the object is fetched and
/// opened in full before the requested range is served from the plaintext.
pub struct EncryptedStorage<S> {
    inner: S,
    encryptor: DataEncryptor,
}

impl<S: ObjectStorage> EncryptedStorage<S> {
    /// Creates an encrypted view over `inner`.
    pub const fn new(inner: S, encryptor: DataEncryptor) -> Self {
        Self { inner, encryptor }
    }
}

impl<S: ObjectStorage> ObjectStorage for EncryptedStorage<S> {
    fn describe(&self) -> String {
        format!("{}({})", self.encryptor.algorithm(), self.inner.describe())
    }

    fn get(&self, key: &str, offset: u64, limit: i64) -> Result<ObjectReader> {
        let mut envelope = Vec::new();
        self.inner.get(key, 0, -1)?.read_to_end(&mut envelope)?;
        let plaintext = self.encryptor.decrypt(key, &envelope)?;
        debug!(
            key,
            encrypted = envelope.len(),
            plain = plaintext.len(),
            "decrypted object"
        );

        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(plaintext.len());
        let end = usize::try_from(limit).map_or(plaintext.len(), |limit| {
            start.saturating_add(limit).min(plaintext.len())
        });

        let mut cursor = Cursor::new(plaintext);
        cursor.set_position(start as u64);
        Ok(Box::new(cursor.take((end - start) as u64)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::EncryptAlgo;
    use crate::test_utils::test_private_key;
    use tempfile::TempDir;

    fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_file_storage_ranges() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("obj"), b"0123456789").unwrap();
        let storage = FileStorage::new(dir.path());

        assert_eq!(read_all(storage.get("obj", 0, -1).unwrap()), b"0123456789");
        assert_eq!(read_all(storage.get("obj", 3, 4).unwrap()), b"3456");
        assert_eq!(read_all(storage.get("obj", 8, -1).unwrap()), b"89");
    }

    #[test]
    fn test_file_storage_missing_object() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(matches!(
            storage.get("missing", 0, -1),
            Err(BackupError::OpenSource { .. })
        ));
    }

    #[test]
    fn test_encrypted_storage_decrypts_ranges() {
        let dir = TempDir::new().unwrap();
        let encryptor = DataEncryptor::new(test_private_key(), EncryptAlgo::Aes256GcmRsa);
        std::fs::write(
            dir.path().join("obj"),
            encryptor.encrypt(b"0123456789").unwrap(),
        )
        .unwrap();

        let storage = EncryptedStorage::new(FileStorage::new(dir.path()), encryptor);
        assert_eq!(read_all(storage.get("obj", 0, -1).unwrap()), b"0123456789");
        assert_eq!(read_all(storage.get("obj", 2, 3).unwrap()), b"234");
        assert_eq!(read_all(storage.get("obj", 20, -1).unwrap()), b"");
        assert!(storage.describe().starts_with("aes256gcm-rsa(file://"));
    }
}
