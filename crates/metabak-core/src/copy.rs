//! Buffered stream copy used when materializing plain backups.
//!
//! Decoders already buffer internally, so the copy loop reuses one
//! heap-allocated chunk instead of letting `std::io::copy` pick a small stack
//! buffer per call.

use std::io;
use std::io::Read;
use std::io::Write;

/// Chunk size for copy operations (256KB).
///
/// Plain backups are usually hundreds of megabytes; larger chunks keep the
/// number of decoder round trips low.
pub const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Reusable copy buffer.
#[derive(Debug)]
pub struct CopyBuffer {
    buf: Box<[u8]>,
}

impl CopyBuffer {
    /// Creates a new zeroed buffer of [`COPY_BUFFER_SIZE`] bytes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; COPY_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Returns the buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies `reader` into `writer` until EOF and returns the byte count.
///
/// Interrupted reads are retried; every other error is returned as-is so the
/// caller can attach source and target context.
///
/// # Examples
///
/// ```
/// use metabak_core::copy::CopyBuffer;
/// use metabak_core::copy::copy_with_buffer;
///
/// let mut buffer = CopyBuffer::new();
/// let mut output = Vec::new();
/// let copied = copy_with_buffer(&mut &b"inode,edge"[..], &mut output, &mut buffer)?;
/// assert_eq!(copied, 10);
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn copy_with_buffer<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut CopyBuffer,
) -> io::Result<u64> {
    let mut total: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer.buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        writer.write_all(&buffer.buf[..bytes_read])?;
        total += bytes_read as u64;
    }

    Ok(total)
}
