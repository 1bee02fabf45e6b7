//! Envelope encryption of backup objects.
//!
//! Each object carries its own random data key. The data key is wrapped with
//! the RSA public key (OAEP, SHA-256) and the payload is sealed with an AEAD
//! selected by [`EncryptAlgo`]:
//!
//! ```text
//! +----------------+-------------+-------------+-------+----------------+
//! | key len: u16BE | nonce len u8| wrapped key | nonce | AEAD ciphertext|
//! +----------------+-------------+-------------+-------+----------------+
//! ```

use std::path::PathBuf;

use aes_gcm::Aes256Gcm;
use aes_gcm::aead::Aead;
use aes_gcm::aead::KeyInit;
use aes_gcm::aead::Nonce;
use chacha20poly1305::ChaCha20Poly1305;
use rand::RngCore;
use rsa::Oaep;
use rsa::RsaPrivateKey;
use rsa::RsaPublicKey;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::BackupError;
use crate::EncryptAlgo;
use crate::Result;

/// Length of the per-object data key.
const DATA_KEY_LEN: usize = 32;

/// Nonce length shared by both AEADs.
const NONCE_LEN: usize = 12;

/// Fixed part of the envelope header.
const HEADER_LEN: usize = 3;

/// RSA-keyed envelope encryptor/decryptor bound to one algorithm.
///
/// # Examples
///
/// ```no_run
/// use metabak_core::EncryptAlgo;
/// use metabak_core::keys::load_private_key;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let key = load_private_key("/etc/backup/key.pem", None)?;
/// let encryptor = key.decryptor(EncryptAlgo::Aes256GcmRsa);
/// let sealed = encryptor.encrypt(b"metadata")?;
/// assert_eq!(encryptor.decrypt("dump.json", &sealed)?, b"metadata");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DataEncryptor {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    algorithm: EncryptAlgo,
}

impl DataEncryptor {
    /// Creates an encryptor from an RSA private key.
    #[must_use]
    pub fn new(private_key: RsaPrivateKey, algorithm: EncryptAlgo) -> Self {
        let public_key = private_key.to_public_key();
        Self {
            private_key,
            public_key,
            algorithm,
        }
    }

    /// Returns the algorithm this encryptor is bound to.
    #[must_use]
    pub const fn algorithm(&self) -> EncryptAlgo {
        self.algorithm
    }

    /// Seals `plaintext` into an envelope.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        let mut data_key = Zeroizing::new([0u8; DATA_KEY_LEN]);
        rng.fill_bytes(&mut data_key[..]);
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);

        let wrapped = self
            .public_key
            .encrypt(&mut rng, Oaep::new::<Sha256>(), &data_key[..])
            .map_err(|e| encrypt_error(&e.to_string()))?;
        let wrapped_len = u16::try_from(wrapped.len())
            .map_err(|_| encrypt_error("wrapped key too large"))?;

        let ciphertext = match self.algorithm {
            EncryptAlgo::Aes256GcmRsa => seal::<Aes256Gcm>(&data_key[..], &nonce, plaintext),
            EncryptAlgo::Chacha20Rsa => {
                seal::<ChaCha20Poly1305>(&data_key[..], &nonce, plaintext)
            }
        }
        .map_err(|reason| encrypt_error(&reason))?;

        let mut out = Vec::with_capacity(HEADER_LEN + wrapped.len() + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&wrapped_len.to_be_bytes());
        #[allow(clippy::cast_possible_truncation)]
        out.push(NONCE_LEN as u8);
        out.extend_from_slice(&wrapped);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Opens an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// `object` only labels errors.
    pub fn decrypt(&self, object: &str, envelope: &[u8]) -> Result<Vec<u8>> {
        let fail = |reason: &str| BackupError::Decrypt {
            path: PathBuf::from(object),
            reason: reason.to_string(),
        };

        if envelope.len() < HEADER_LEN {
            return Err(fail("envelope shorter than its header"));
        }
        let key_len = usize::from(u16::from_be_bytes([envelope[0], envelope[1]]));
        let nonce_len = usize::from(envelope[2]);
        if nonce_len != NONCE_LEN {
            return Err(fail(&format!("unexpected nonce length {nonce_len}")));
        }
        let body = &envelope[HEADER_LEN..];
        if body.len() < key_len + nonce_len {
            return Err(fail("envelope truncated"));
        }
        let (wrapped, rest) = body.split_at(key_len);
        let (nonce, ciphertext) = rest.split_at(nonce_len);

        let data_key = Zeroizing::new(
            self.private_key
                .decrypt(Oaep::new::<Sha256>(), wrapped)
                .map_err(|e| fail(&format!("unwrap data key: {e}")))?,
        );

        match self.algorithm {
            EncryptAlgo::Aes256GcmRsa => open::<Aes256Gcm>(&data_key, nonce, ciphertext),
            EncryptAlgo::Chacha20Rsa => open::<ChaCha20Poly1305>(&data_key, nonce, ciphertext),
        }
        .map_err(|reason| fail(&reason))
    }
}

fn encrypt_error(reason: &str) -> BackupError {
    BackupError::Decrypt {
        path: PathBuf::new(),
        reason: format!("encryption failed: {reason}"),
    }
}

fn seal<A: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
) -> std::result::Result<Vec<u8>, String> {
    let cipher = A::new_from_slice(key).map_err(|e| e.to_string())?;
    cipher
        .encrypt(Nonce::<A>::from_slice(nonce), plaintext)
        .map_err(|_| "AEAD seal failed".to_string())
}

fn open<A: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
) -> std::result::Result<Vec<u8>, String> {
    let cipher = A::new_from_slice(key).map_err(|e| format!("invalid data key: {e}"))?;
    cipher
        .decrypt(Nonce::<A>::from_slice(nonce), ciphertext)
        .map_err(|_| "authentication failed (wrong key or algorithm?)".to_string())
}
