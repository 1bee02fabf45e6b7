//! Output formatter trait for CLI results.

use anyhow::Result;
use metabak_core::BackupFooter;
use metabak_core::LoadSummary;
use metabak_core::Materialized;
use metabak_core::Segment;
use serde::Serialize;
use std::path::Path;

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format the segment table of a binary backup
    fn format_summary(&self, backup: &Path, footer: &BackupFooter, with_offsets: bool)
    -> Result<()>;

    /// Format a single segment
    fn format_segment(&self, backup: &Path, offset: u64, segment: &Segment) -> Result<()>;

    /// Format the outcome of a load
    fn format_load_result(&self, source: &str, summary: &LoadSummary) -> Result<()>;

    /// Report how the plain backup was obtained
    fn format_materialized(&self, source: &Path, plain: &Materialized);

    /// Format error message
    fn format_error(&self, error: &anyhow::Error);
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(operation: impl Into<String>, error: impl Into<String>) -> JsonOutput<()> {
        JsonOutput {
            operation: operation.into(),
            status: Status::Error,
            data: None,
            error: Some(error.into()),
        }
    }
}
