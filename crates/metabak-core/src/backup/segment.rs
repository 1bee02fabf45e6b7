//! Segment records.

use std::fmt;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use serde_json::Value;
use tracing::debug;

use super::MAX_SEGMENT_LEN;
use super::SEGMENT_HEADER_LEN;
use super::SEGMENT_MAGIC;
use super::SegmentKind;
use crate::BackupError;
use crate::Result;

/// One decoded segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Kind of metadata in this segment.
    pub kind: SegmentKind,
    /// Records, in the order they were written.
    pub records: Vec<Value>,
}

impl Segment {
    /// Creates a segment.
    #[must_use]
    pub const fn new(kind: SegmentKind, records: Vec<Value>) -> Self {
        Self { kind, records }
    }

    /// Returns the segment name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

/// Renders the records as a compact JSON array.
impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{record}")?;
        }
        f.write_str("]")
    }
}

/// Reads the segment record starting at `offset`.
///
/// Offsets are expected to come from a [`BackupFooter`](super::BackupFooter)
/// entry; the record itself is validated (magic, kind, length, checksum,
/// payload) so that any other offset fails instead of yielding garbage.
///
/// # Errors
///
/// Returns [`BackupError::SegmentRead`] carrying `offset` if the offset is
/// past the end of the file or no valid record starts there.
pub fn read_segment<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Segment> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    if offset.saturating_add(SEGMENT_HEADER_LEN) > file_len {
        return Err(BackupError::segment_read(
            offset,
            format!("out of bounds for a {file_len}-byte file"),
        ));
    }

    reader.seek(SeekFrom::Start(offset))?;
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != SEGMENT_MAGIC {
        return Err(BackupError::segment_read(
            offset,
            format!("bad record magic {magic:#010x}"),
        ));
    }
    let tag = reader.read_u8()?;
    let kind = SegmentKind::from_tag(tag)
        .ok_or_else(|| BackupError::segment_read(offset, format!("unknown kind tag {tag}")))?;
    let len = reader.read_u32::<BigEndian>()?;
    let checksum = reader.read_u32::<BigEndian>()?;

    let payload_end = offset + SEGMENT_HEADER_LEN + u64::from(len);
    if len > MAX_SEGMENT_LEN || payload_end > file_len {
        return Err(BackupError::segment_read(
            offset,
            format!("payload length {len} overruns the file"),
        ));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    if crc32fast::hash(&payload) != checksum {
        return Err(BackupError::segment_read(offset, "checksum mismatch"));
    }

    let records: Vec<Value> = serde_json::from_slice(&payload)
        .map_err(|e| BackupError::segment_read(offset, format!("invalid payload: {e}")))?;
    debug!(offset, segment = kind.name(), records = records.len(), "read segment");
    Ok(Segment::new(kind, records))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backup::BackupWriter;
    use crate::backup::read_footer;
    use serde_json::json;
    use std::io::Cursor;

    fn sample() -> Vec<u8> {
        let mut writer = BackupWriter::new(Vec::new());
        writer
            .write_segment(SegmentKind::Format, &[json!({"Name": "myjfs"})])
            .unwrap();
        writer
            .write_segment(
                SegmentKind::Edge,
                &[
                    json!({"parent": 1, "name": "a", "inode": 2}),
                    json!({"parent": 1, "name": "b", "inode": 3}),
                ],
            )
            .unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_read_indexed_segments() {
        let mut cursor = Cursor::new(sample());
        let footer = read_footer(&mut cursor).unwrap();

        for (name, info) in footer.sorted_entries() {
            let segment = read_segment(&mut cursor, info.offset).unwrap();
            assert_eq!(segment.name(), name);
            assert_eq!(segment.count() as u64, info.count);
        }
    }

    #[test]
    fn test_display() {
        let segment = Segment::new(SegmentKind::Counter, vec![json!({"nextInode": 2}), json!(7)]);
        assert_eq!(segment.to_string(), "[{\"nextInode\":2},7]");
        assert_eq!(Segment::new(SegmentKind::Acl, vec![]).to_string(), "[]");
    }

    #[test]
    fn test_unaligned_offset_fails() {
        let mut cursor = Cursor::new(sample());
        let footer = read_footer(&mut cursor).unwrap();
        let edge = footer.get("edge").unwrap().offset;

        for offset in [edge + 1, edge + 5, 3] {
            let err = read_segment(&mut cursor, offset).unwrap_err();
            assert!(
                matches!(err, BackupError::SegmentRead { offset: o, .. } if o == offset),
                "offset {offset}: {err}"
            );
        }
    }

    #[test]
    fn test_offset_past_end_fails() {
        let bytes = sample();
        let len = bytes.len() as u64;
        let err = read_segment(&mut Cursor::new(bytes), len + 10).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn test_corrupt_payload_fails() {
        let mut bytes = sample();
        // Inside the format segment payload.
        bytes[SEGMENT_HEADER_LEN as usize + 2] ^= 0x20;
        let err = read_segment(&mut Cursor::new(bytes), 0).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }
}
