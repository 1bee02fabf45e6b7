//! Footer index of a backup container.

use std::collections::HashMap;
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use serde::Serialize;
use tracing::debug;

use super::BACKUP_VERSION;
use super::FOOTER_MAGIC;
use super::MAX_FOOTER_LEN;
use super::SEGMENT_HEADER_LEN;
use super::TRAILER_LEN;
use crate::BackupError;
use crate::Result;

/// Location and size of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    /// Number of records in the segment.
    pub count: u64,
    /// Absolute byte offset of the segment record.
    pub offset: u64,
}

/// Index of a backup container, read from its trailer.
///
/// Segment names have no inherent order; use
/// [`sorted_entries`](Self::sorted_entries) for deterministic output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackupFooter {
    /// Container format version.
    pub version: u32,
    /// Segment name to location.
    pub segments: HashMap<String, SegmentInfo>,
}

impl BackupFooter {
    /// Creates an empty footer for `version`.
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self {
            version,
            segments: HashMap::new(),
        }
    }

    /// Returns the entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SegmentInfo> {
        self.segments.get(name)
    }

    /// Returns all entries sorted by name.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<(&str, &SegmentInfo)> {
        let mut entries: Vec<_> = self
            .segments
            .iter()
            .map(|(name, info)| (name.as_str(), info))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Total number of records across all segments.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.segments.values().map(|info| info.count).sum()
    }

    /// Returns `true` if the container holds no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Serializes the footer body and trailer.
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let count = u32::try_from(self.segments.len())
            .map_err(|_| BackupError::malformed_footer("too many segments"))?;

        let mut body = Vec::new();
        body.write_u32::<BigEndian>(count)?;
        for (name, info) in self.sorted_entries() {
            let name_len = u16::try_from(name.len())
                .map_err(|_| BackupError::malformed_footer(format!("segment name too long: {name}")))?;
            body.write_u16::<BigEndian>(name_len)?;
            body.extend_from_slice(name.as_bytes());
            body.write_u64::<BigEndian>(info.count)?;
            body.write_u64::<BigEndian>(info.offset)?;
        }

        let mut out = body.clone();
        out.write_u32::<BigEndian>(FOOTER_MAGIC)?;
        out.write_u32::<BigEndian>(self.version)?;
        out.write_u32::<BigEndian>(crc32fast::hash(&body))?;
        out.write_u32::<BigEndian>(0)?;
        out.write_u64::<BigEndian>(body.len() as u64)?;
        Ok(out)
    }
}

/// Reads the footer index from the end of a container.
///
/// Only the trailer and footer body are read; segment data is not touched.
///
/// # Errors
///
/// Returns [`BackupError::MalformedFooter`] if the file is too short, the
/// magic or version is wrong, the checksum does not match, or an entry
/// points past the segment area.
pub fn read_footer<R: Read + Seek>(reader: &mut R) -> Result<BackupFooter> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    if file_len < TRAILER_LEN {
        return Err(BackupError::malformed_footer(format!(
            "file is {file_len} bytes, smaller than the {TRAILER_LEN}-byte trailer"
        )));
    }

    reader.seek(SeekFrom::Start(file_len - TRAILER_LEN))?;
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != FOOTER_MAGIC {
        return Err(BackupError::malformed_footer(format!(
            "bad magic {magic:#010x}, not a metadata backup"
        )));
    }
    let version = reader.read_u32::<BigEndian>()?;
    if version == 0 || version > BACKUP_VERSION {
        return Err(BackupError::malformed_footer(format!(
            "unsupported version {version}"
        )));
    }
    let checksum = reader.read_u32::<BigEndian>()?;
    let _reserved = reader.read_u32::<BigEndian>()?;
    let body_len = reader.read_u64::<BigEndian>()?;

    let body_area = file_len - TRAILER_LEN;
    if body_len > body_area || body_len > MAX_FOOTER_LEN {
        return Err(BackupError::malformed_footer(format!(
            "footer length {body_len} exceeds available {body_area} bytes"
        )));
    }
    let segments_end = body_area - body_len;

    reader.seek(SeekFrom::Start(segments_end))?;
    #[allow(clippy::cast_possible_truncation)]
    let mut body = vec![0u8; body_len as usize];
    reader.read_exact(&mut body)?;

    if crc32fast::hash(&body) != checksum {
        return Err(BackupError::malformed_footer("checksum mismatch"));
    }

    let footer = parse_body(&body, version, segments_end)?;
    debug!(version, segments = footer.segments.len(), "read backup footer");
    Ok(footer)
}

fn parse_body(body: &[u8], version: u32, segments_end: u64) -> Result<BackupFooter> {
    let mut cursor = Cursor::new(body);
    let footer = parse_entries(&mut cursor, version, segments_end).map_err(|e| match e {
        BackupError::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            BackupError::malformed_footer("footer body truncated")
        }
        other => other,
    })?;

    #[allow(clippy::cast_possible_truncation)]
    let trailing = body.len() - cursor.position() as usize;
    if trailing > 0 {
        return Err(BackupError::malformed_footer(format!(
            "{trailing} trailing bytes after footer entries"
        )));
    }
    Ok(footer)
}

fn parse_entries(cursor: &mut Cursor<&[u8]>, version: u32, segments_end: u64) -> Result<BackupFooter> {
    let count = cursor.read_u32::<BigEndian>()?;
    let mut footer = BackupFooter::new(version);

    for _ in 0..count {
        let name_len = usize::from(cursor.read_u16::<BigEndian>()?);
        let mut name = vec![0u8; name_len];
        cursor.read_exact(&mut name)?;
        let name = String::from_utf8(name)
            .map_err(|_| BackupError::malformed_footer("segment name is not UTF-8"))?;
        let count = cursor.read_u64::<BigEndian>()?;
        let offset = cursor.read_u64::<BigEndian>()?;

        if offset.saturating_add(SEGMENT_HEADER_LEN) > segments_end {
            return Err(BackupError::malformed_footer(format!(
                "segment {name} offset {offset} is outside the segment area"
            )));
        }
        if footer.segments.contains_key(&name) {
            return Err(BackupError::malformed_footer(format!(
                "duplicate segment {name}"
            )));
        }
        footer.segments.insert(name, SegmentInfo { count, offset });
    }
    Ok(footer)
}
