//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use anyhow::Result;
use metabak_core::BackupFooter;
use metabak_core::LoadSummary;
use metabak_core::Materialized;
use metabak_core::Segment;
use metabak_core::report::SummaryRow;
use metabak_core::report::summary_rows;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonFormatter;

#[derive(Serialize)]
struct SummaryOutput {
    backup: String,
    version: u32,
    total_records: u64,
    segments: Vec<SummaryRow>,
}

#[derive(Serialize)]
struct SegmentOutput<'a> {
    backup: String,
    name: &'static str,
    offset: u64,
    count: usize,
    records: &'a [Value],
}

#[derive(Serialize)]
struct LoadOutput<'a> {
    source: &'a str,
    total_records: u64,
    #[serde(flatten)]
    summary: &'a LoadSummary,
}

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }

    fn summary_output(backup: &Path, footer: &BackupFooter, with_offsets: bool) -> SummaryOutput {
        SummaryOutput {
            backup: backup.display().to_string(),
            version: footer.version,
            total_records: footer.total_count(),
            segments: summary_rows(footer, with_offsets),
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_summary(
        &self,
        backup: &Path,
        footer: &BackupFooter,
        with_offsets: bool,
    ) -> Result<()> {
        let data = Self::summary_output(backup, footer, with_offsets);
        Self::output(&JsonOutput::success("stat", data))
    }

    fn format_segment(&self, backup: &Path, offset: u64, segment: &Segment) -> Result<()> {
        let data = SegmentOutput {
            backup: backup.display().to_string(),
            name: segment.name(),
            offset,
            count: segment.count(),
            records: &segment.records,
        };
        Self::output(&JsonOutput::success("stat", data))
    }

    fn format_load_result(&self, source: &str, summary: &LoadSummary) -> Result<()> {
        let data = LoadOutput {
            source,
            total_records: summary.total_records(),
            summary,
        };
        Self::output(&JsonOutput::success("load", data))
    }

    // One document per invocation; the plain path is not reported separately.
    fn format_materialized(&self, _source: &Path, _plain: &Materialized) {}

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::<()>::error("load", format!("{error:?}"));
        let _ = Self::output(&output);
    }
}
