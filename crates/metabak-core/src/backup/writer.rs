//! Backup container writer.

use std::io::Write;

use byteorder::BigEndian;
use byteorder::WriteBytesExt;
use serde_json::Value;
use tracing::debug;

use super::BACKUP_VERSION;
use super::BackupFooter;
use super::MAX_SEGMENT_LEN;
use super::SEGMENT_HEADER_LEN;
use super::SEGMENT_MAGIC;
use super::SegmentInfo;
use super::SegmentKind;
use crate::BackupError;
use crate::Result;

/// Writes segments followed by the footer index.
///
/// Each kind may be written at most once. Nothing is readable until
/// [`finish`](Self::finish) has appended the footer.
///
/// # Examples
///
/// ```
/// use metabak_core::BackupWriter;
/// use metabak_core::SegmentKind;
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut writer = BackupWriter::new(Vec::new());
/// writer.write_segment(SegmentKind::Format, &[json!({"Name": "myjfs"})])?;
/// let bytes = writer.finish()?;
/// assert!(!bytes.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BackupWriter<W: Write> {
    inner: W,
    position: u64,
    footer: BackupFooter,
}

impl<W: Write> BackupWriter<W> {
    /// Creates a writer that starts at offset 0 of `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            position: 0,
            footer: BackupFooter::new(BACKUP_VERSION),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Appends one segment and records it in the footer.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SegmentWrite`] if `kind` was already written or
    /// the encoded records are too large, and [`BackupError::Io`] if the
    /// underlying writer fails.
    pub fn write_segment(&mut self, kind: SegmentKind, records: &[Value]) -> Result<SegmentInfo> {
        let name = kind.name();
        if self.footer.get(name).is_some() {
            return Err(BackupError::SegmentWrite {
                name: name.to_string(),
                reason: "segment already written".into(),
            });
        }

        let payload = serde_json::to_vec(records).map_err(|e| BackupError::SegmentWrite {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_SEGMENT_LEN)
            .ok_or_else(|| BackupError::SegmentWrite {
                name: name.to_string(),
                reason: format!("payload of {} bytes is too large", payload.len()),
            })?;

        self.inner.write_u32::<BigEndian>(SEGMENT_MAGIC)?;
        self.inner.write_u8(kind.tag())?;
        self.inner.write_u32::<BigEndian>(len)?;
        self.inner.write_u32::<BigEndian>(crc32fast::hash(&payload))?;
        self.inner.write_all(&payload)?;

        let info = SegmentInfo {
            count: records.len() as u64,
            offset: self.position,
        };
        self.position += SEGMENT_HEADER_LEN + u64::from(len);
        self.footer.segments.insert(name.to_string(), info);
        debug!(segment = name, count = info.count, offset = info.offset, "wrote segment");
        Ok(info)
    }

    /// Appends the footer, flushes and returns the inner writer.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Io`] if writing or flushing fails.
    pub fn finish(mut self) -> Result<W> {
        let footer = self.footer.encode()?;
        self.inner.write_all(&footer)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backup::read_footer;
    use crate::backup::read_segment;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_offsets_follow_position() {
        let mut writer = BackupWriter::new(Vec::new());
        let first = writer
            .write_segment(SegmentKind::Counter, &[json!({"nextInode": 10})])
            .unwrap();
        let after_first = writer.position();
        let second = writer.write_segment(SegmentKind::Node, &[]).unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, after_first);
        assert_eq!(second.count, 0);
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let mut writer = BackupWriter::new(Vec::new());
        writer.write_segment(SegmentKind::Edge, &[]).unwrap();
        let err = writer.write_segment(SegmentKind::Edge, &[]).unwrap_err();
        assert!(matches!(err, BackupError::SegmentWrite { ref name, .. } if name == "edge"));
    }

    #[test]
    fn test_finished_container_is_readable() {
        let records = vec![json!({"inode": 1}), json!({"inode": 2}), json!({"inode": 3})];
        let mut writer = BackupWriter::new(Vec::new());
        writer.write_segment(SegmentKind::Node, &records).unwrap();
        let mut cursor = Cursor::new(writer.finish().unwrap());

        let footer = read_footer(&mut cursor).unwrap();
        let info = footer.get("node").unwrap();
        assert_eq!(info.count, 3);
        assert_eq!(read_segment(&mut cursor, info.offset).unwrap().records, records);
    }
}
