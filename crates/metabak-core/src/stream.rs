//! Layered decode stream: optional decryption below optional decompression.
//!
//! A [`ComposedStream`] is an explicit two-layer structure. The base layer is
//! either the plain local file or the decrypted object; the compression layer
//! is a gzip or zstd decoder over it, or the base layer itself when the
//! source is not compressed. Closing releases the compression layer first
//! and the base layer afterwards, but only when it is a distinct object.

use std::fmt;
use std::fs;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

use flate2::bufread::MultiGzDecoder;
use tracing::debug;

use crate::BackupError;
use crate::DecodeSpec;
use crate::Result;
use crate::crypto::DataEncryptor;
use crate::formats::Compression;
use crate::keys;
use crate::storage::EncryptedStorage;
use crate::storage::FileStorage;
use crate::storage::ObjectReader;
use crate::storage::ObjectStorage;

type ZstdDecoder = zstd::stream::read::Decoder<'static, BufReader<BaseLayer>>;

/// Fixed part of a gzip member header (RFC 1952).
const GZIP_HEADER_LEN: usize = 10;

/// The only compression method gzip defines (deflate).
const GZIP_METHOD_DEFLATE: u8 = 8;

/// Flag bits RFC 1952 reserves; a conforming header leaves them clear.
const GZIP_RESERVED_FLAGS: u8 = 0xE0;

/// Where the base layer's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseKind {
    /// The source file, read directly.
    LocalFile,
    /// The source fetched through an [`EncryptedStorage`].
    Decrypted,
}

/// The innermost byte source of a composed stream.
pub struct BaseLayer {
    kind: BaseKind,
    reader: ObjectReader,
    /// Bytes pulled ahead by [`peek`](Self::peek), served before `reader`.
    head: Vec<u8>,
    head_pos: usize,
}

impl BaseLayer {
    fn new(kind: BaseKind, reader: ObjectReader) -> Self {
        Self {
            kind,
            reader,
            head: Vec::new(),
            head_pos: 0,
        }
    }

    /// Buffers up to `len` leading bytes without consuming them.
    ///
    /// Keeps reading until `len` bytes are held or the source hits EOF, so a
    /// source that trickles out short reads still yields a full header.
    fn peek(&mut self, len: usize) -> io::Result<&[u8]> {
        let mut chunk = [0u8; 64];
        while self.head.len() < len {
            let want = (len - self.head.len()).min(chunk.len());
            match self.reader.read(&mut chunk[..want]) {
                Ok(0) => break,
                Ok(n) => self.head.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(&self.head[self.head_pos..])
    }

    fn close(self) {
        drop(self.reader);
    }
}

impl Read for BaseLayer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.head_pos < self.head.len() {
            let n = (&self.head[self.head_pos..]).read(buf)?;
            self.head_pos += n;
            return Ok(n);
        }
        self.reader.read(buf)
    }
}

enum CompressionLayer {
    /// No decoder: the compression layer is the base layer.
    Identity(BufReader<BaseLayer>),
    Gzip(MultiGzDecoder<BufReader<BaseLayer>>),
    Zstd(Box<ZstdDecoder>),
}

/// A readable stream that undoes encryption and compression.
///
/// # Examples
///
/// ```no_run
/// use metabak_core::DecodeSpec;
/// use metabak_core::stream;
/// use std::io::Read;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut composed = stream::open(&DecodeSpec::new("meta-dump.json.gz"))?;
/// let mut json = String::new();
/// composed.read_to_string(&mut json)?;
/// composed.close()?;
/// # Ok(())
/// # }
/// ```
pub struct ComposedStream {
    compression: Compression,
    base_kind: BaseKind,
    layer: CompressionLayer,
}

impl ComposedStream {
    /// Returns the codec of the compression layer.
    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.compression
    }

    /// Returns the origin of the base layer.
    #[must_use]
    pub const fn base_kind(&self) -> BaseKind {
        self.base_kind
    }

    /// Returns `true` if the compression layer and the base layer are the
    /// same object, i.e. closing must only happen once.
    #[must_use]
    pub const fn shares_base_layer(&self) -> bool {
        matches!(self.layer, CompressionLayer::Identity(_))
    }

    /// Closes the stream and returns how many distinct layers were released.
    ///
    /// The compression layer is closed first; the base layer is closed
    /// afterwards only if it is a separate object.
    pub fn close(self) -> io::Result<usize> {
        let closed = match self.layer {
            CompressionLayer::Identity(reader) => {
                reader.into_inner().close();
                1
            }
            CompressionLayer::Gzip(decoder) => {
                let base = decoder.into_inner();
                base.into_inner().close();
                2
            }
            CompressionLayer::Zstd(decoder) => {
                let base = decoder.finish();
                base.into_inner().close();
                2
            }
        };
        debug!(layers = closed, "closed decode stream");
        Ok(closed)
    }
}

impl Read for ComposedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.layer {
            CompressionLayer::Identity(reader) => reader.read(buf),
            CompressionLayer::Gzip(decoder) => decoder.read(buf),
            CompressionLayer::Zstd(decoder) => decoder.read(buf),
        }
    }
}

impl fmt::Debug for ComposedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedStream")
            .field("compression", &self.compression)
            .field("base_kind", &self.base_kind)
            .finish_non_exhaustive()
    }
}

/// Opens the source described by `spec`, resolving its key if needed.
///
/// # Errors
///
/// Key errors from [`keys::load_for_spec`] are returned before the source is
/// touched. See [`open_source`] for the remaining conditions.
pub fn open(spec: &DecodeSpec) -> Result<ComposedStream> {
    let key = keys::load_for_spec(spec)?;
    let decryptor = key.map(|key| key.decryptor(spec.algorithm));
    open_source(&spec.source_path, decryptor.as_ref())
}

/// Builds a composed stream over `path`.
///
/// With a decryptor, the source is fetched as an encrypted object from a
/// [`FileStorage`] rooted at its parent directory. The compression layer is
/// chosen by [`Compression::detect`].
///
/// # Errors
///
/// - [`BackupError::SourceNotFound`] if an encrypted source cannot be statted
/// - [`BackupError::OpenSource`] if a plain source cannot be opened
/// - [`BackupError::Decrypt`] if the envelope cannot be opened
/// - [`BackupError::DecodeInit`] if the compression header is malformed
pub fn open_source(path: &Path, decryptor: Option<&DataEncryptor>) -> Result<ComposedStream> {
    let base = match decryptor {
        Some(decryptor) => open_encrypted(path, decryptor)?,
        None => {
            let file = File::open(path).map_err(|source| BackupError::OpenSource {
                path: path.to_path_buf(),
                source,
            })?;
            BaseLayer::new(BaseKind::LocalFile, Box::new(file))
        }
    };

    let compression = Compression::detect(path);
    let base_kind = base.kind;
    debug!(
        path = %path.display(),
        codec = compression.name(),
        ?base_kind,
        "composing decode stream"
    );

    let mut base = base;
    check_header(&mut base, compression, path)?;
    let reader = BufReader::new(base);

    let layer = match compression {
        Compression::None => CompressionLayer::Identity(reader),
        Compression::Gzip => CompressionLayer::Gzip(MultiGzDecoder::new(reader)),
        Compression::Zstd => {
            let decoder = ZstdDecoder::with_buffer(reader).map_err(|e| BackupError::DecodeInit {
                path: path.to_path_buf(),
                codec: compression.name(),
                reason: e.to_string(),
            })?;
            CompressionLayer::Zstd(Box::new(decoder))
        }
    };

    Ok(ComposedStream {
        compression,
        base_kind,
        layer,
    })
}

fn open_encrypted(path: &Path, decryptor: &DataEncryptor) -> Result<BaseLayer> {
    let not_found = |source| BackupError::SourceNotFound {
        path: path.to_path_buf(),
        source,
    };

    fs::metadata(path).map_err(not_found)?;
    let absolute = std::path::absolute(path).map_err(not_found)?;
    let (Some(dir), Some(name)) = (absolute.parent(), absolute.file_name()) else {
        return Err(not_found(io::Error::new(
            io::ErrorKind::InvalidInput,
            "source has no file name",
        )));
    };

    let Some(key) = name.to_str() else {
        return Err(not_found(io::Error::new(
            io::ErrorKind::InvalidInput,
            "object key is not valid UTF-8",
        )));
    };

    let storage = EncryptedStorage::new(FileStorage::new(dir), decryptor.clone());
    debug!(storage = %storage.describe(), "fetching encrypted backup");
    let reader = storage.get(key, 0, -1)?;
    Ok(BaseLayer::new(BaseKind::Decrypted, reader))
}

/// Validates the codec header before any decoder or target exists.
///
/// For gzip the whole fixed header is checked (magic, method, reserved
/// flags) so a corrupt member fails here instead of midway through a copy.
fn check_header(base: &mut BaseLayer, compression: Compression, path: &Path) -> Result<()> {
    let magic = compression.magic();
    if magic.is_empty() {
        return Ok(());
    }
    let decode_init = |reason: String| BackupError::DecodeInit {
        path: path.to_path_buf(),
        codec: compression.name(),
        reason,
    };

    let header_len = match compression {
        Compression::Gzip => GZIP_HEADER_LEN,
        _ => magic.len(),
    };
    let head = base
        .peek(header_len)
        .map_err(|e| decode_init(e.to_string()))?;

    if head.len() < header_len {
        return Err(decode_init("stream too short for header".to_string()));
    }
    if !head.starts_with(magic) {
        return Err(decode_init(format!(
            "invalid header magic {:02x?}, expected {magic:02x?}",
            &head[..magic.len()]
        )));
    }
    if compression == Compression::Gzip {
        if head[2] != GZIP_METHOD_DEFLATE {
            return Err(decode_init(format!(
                "unsupported gzip compression method {}",
                head[2]
            )));
        }
        if head[3] & GZIP_RESERVED_FLAGS != 0 {
            return Err(decode_init(format!(
                "reserved gzip header flags set: {:#04x}",
                head[3]
            )));
        }
    }
    Ok(())
}
