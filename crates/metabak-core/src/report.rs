//! Plain-text rendering of container summaries and segments.

use serde::Serialize;

use crate::backup::BackupFooter;
use crate::backup::Segment;

const RULE_WIDTH: usize = 23;
const RULE_WIDTH_WITH_OFFSETS: usize = 34;

/// One row of a container summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    /// Segment name.
    pub name: String,

    /// Number of records.
    pub count: u64,

    /// Byte offset, present only when offsets were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Returns the summary rows of `footer`, sorted by segment name.
#[must_use]
pub fn summary_rows(footer: &BackupFooter, with_offsets: bool) -> Vec<SummaryRow> {
    footer
        .sorted_entries()
        .into_iter()
        .map(|(name, info)| SummaryRow {
            name: name.to_string(),
            count: info.count,
            offset: with_offsets.then_some(info.offset),
        })
        .collect()
}

/// Renders the version line and the segment table.
///
/// # Examples
///
/// ```
/// use metabak_core::BackupFooter;
/// use metabak_core::backup::SegmentInfo;
/// use metabak_core::report::render_summary;
///
/// let mut footer = BackupFooter::new(1);
/// footer
///     .segments
///     .insert("edge".into(), SegmentInfo { count: 250, offset: 4096 });
///
/// let text = render_summary(&footer, false);
/// assert!(text.starts_with("Backup Version: 1\n"));
/// assert!(text.contains("edge      | 250       |\n"));
/// ```
#[must_use]
pub fn render_summary(footer: &BackupFooter, with_offsets: bool) -> String {
    let (rule, header) = if with_offsets {
        (
            "-".repeat(RULE_WIDTH_WITH_OFFSETS),
            format!("{:<10}| {:<10}| {:<10}", "Name", "Num", "Offset"),
        )
    } else {
        (
            "-".repeat(RULE_WIDTH),
            format!("{:<10}| {:<10}", "Name", "Num"),
        )
    };

    let mut out = format!("Backup Version: {}\n{rule}\n{header}\n{rule}\n", footer.version);
    for row in summary_rows(footer, with_offsets) {
        out.push_str(&render_row(&row));
        out.push('\n');
    }
    out
}

fn render_row(row: &SummaryRow) -> String {
    match row.offset {
        Some(offset) => format!("{:<10}| {:<10}| {offset:<10}", row.name, row.count),
        None => format!("{:<10}| {:<10}|", row.name, row.count),
    }
}

/// Renders a segment's name and its records.
#[must_use]
pub fn render_segment(segment: &Segment) -> String {
    format!("Segment: {}\nValue: {segment}\n", segment.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::SegmentInfo;
    use crate::backup::SegmentKind;
    use serde_json::json;

    fn footer() -> BackupFooter {
        let mut footer = BackupFooter::new(1);
        footer.segments.insert(
            "inode".into(),
            SegmentInfo {
                count: 100,
                offset: 0,
            },
        );
        footer.segments.insert(
            "edge".into(),
            SegmentInfo {
                count: 250,
                offset: 4096,
            },
        );
        footer
    }

    #[test]
    fn test_summary_without_offsets() {
        let text = render_summary(&footer(), false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "Backup Version: 1",
                "-----------------------",
                "Name      | Num       ",
                "-----------------------",
                "edge      | 250       |",
                "inode     | 100       |",
            ]
        );
        assert!(text.ends_with("|\n"));
    }

    #[test]
    fn test_summary_with_offsets() {
        let text = render_summary(&footer(), true);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "Backup Version: 1",
                "----------------------------------",
                "Name      | Num       | Offset    ",
                "----------------------------------",
                "edge      | 250       | 4096      ",
                "inode     | 100       | 0         ",
            ]
        );
    }

    #[test]
    fn test_empty_summary() {
        let text = render_summary(&BackupFooter::new(1), false);
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_row_layout() {
        let mut row = SummaryRow {
            name: "sliceRef".into(),
            count: 12,
            offset: None,
        };
        assert_eq!(render_row(&row), "sliceRef  | 12        |");

        row.offset = Some(77);
        assert_eq!(render_row(&row), "sliceRef  | 12        | 77        ");
    }

    #[test]
    fn test_rows_sorted_and_offsets_optional() {
        let rows = summary_rows(&footer(), false);
        assert_eq!(rows[0].name, "edge");
        assert_eq!(rows[1].name, "inode");
        assert!(rows.iter().all(|row| row.offset.is_none()));

        let rows = summary_rows(&footer(), true);
        assert_eq!(rows[0].offset, Some(4096));
    }

    #[test]
    fn test_row_json_omits_missing_offset() {
        let row = SummaryRow {
            name: "edge".into(),
            count: 250,
            offset: None,
        };
        assert_eq!(
            serde_json::to_value(&row).unwrap_or_default(),
            json!({"name": "edge", "count": 250})
        );
    }

    #[test]
    fn test_render_segment() {
        let segment = Segment::new(SegmentKind::Counter, vec![json!({"nextInode": 2})]);
        assert_eq!(
            render_segment(&segment),
            "Segment: counter\nValue: [{\"nextInode\":2}]\n"
        );
    }
}
