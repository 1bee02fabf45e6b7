//! Metadata loading.
//!
//! A [`MetaLoader`] consumes a plain backup, either a JSON dump read as a
//! stream or a binary container read segment by segment. [`ScanLoader`] is
//! the built-in implementation: it walks and validates the whole backup and
//! reports what it found, without writing to any metadata engine.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::panic;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::BackupError;
use crate::DEFAULT_THREADS;
use crate::Result;
use crate::backup::SegmentInfo;
use crate::backup::SegmentKind;
use crate::backup::read_footer;
use crate::backup::read_segment;
use crate::progress::LoadProgress;
use crate::progress::NoopProgress;

/// Value of the secret key after it was stripped from a dump.
pub const REMOVED_SECRET: &str = "removed";

/// Records reported to [`LoadProgress`] per callback.
const PROGRESS_BATCH: usize = 1024;

/// Options for binary loads.
#[derive(Clone, Copy)]
pub struct LoadOptions<'a> {
    /// Number of worker threads; zero is treated as one.
    pub threads: usize,

    /// Receives per-segment progress from all workers.
    pub progress: &'a dyn LoadProgress,
}

impl<'a> LoadOptions<'a> {
    /// Options with `threads` workers and no progress reporting.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            progress: &NoopProgress,
        }
    }

    /// Sets the progress receiver.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn LoadProgress) -> Self {
        self.progress = progress;
        self
    }
}

impl Default for LoadOptions<'_> {
    fn default() -> Self {
        Self::new(DEFAULT_THREADS)
    }
}

impl std::fmt::Debug for LoadOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

/// Shape of the backup that was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// JSON dump.
    Json,
    /// Binary container.
    Binary,
}

/// Outcome of a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Shape of the backup.
    pub format: DumpFormat,

    /// Records per section (JSON) or segment (binary), by name.
    pub sections: BTreeMap<String, u64>,

    /// Volume name from the settings, if present.
    pub volume: Option<String>,

    /// `true` if the dump was taken with its secret key stripped.
    pub secret_key_removed: bool,
}

impl LoadSummary {
    /// Total records across all sections.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.sections.values().sum()
    }
}

/// Consumer of plain backups.
pub trait MetaLoader {
    /// Loads a JSON dump from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::InvalidDump`] if the input is not a JSON
    /// object, or an I/O error while reading.
    fn load_json(&mut self, reader: &mut dyn Read) -> Result<LoadSummary>;

    /// Loads the binary container at `path`.
    ///
    /// # Errors
    ///
    /// Returns footer and segment errors from the container reader, and
    /// [`BackupError::InvalidDump`] if the content contradicts its index.
    fn load_binary(&mut self, path: &Path, options: &LoadOptions<'_>) -> Result<LoadSummary>;
}

/// Loader that reads and validates a backup without persisting it.
///
/// # Examples
///
/// ```
/// use metabak_core::MetaLoader;
/// use metabak_core::ScanLoader;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dump = br#"{"Setting": {"Name": "myjfs", "SecretKey": "removed"}, "DelFiles": []}"#;
/// let summary = ScanLoader::new().load_json(&mut &dump[..])?;
/// assert_eq!(summary.volume.as_deref(), Some("myjfs"));
/// assert!(summary.secret_key_removed);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ScanLoader {
    strict: bool,
}

impl ScanLoader {
    /// Creates a loader that rejects segments whose record count differs
    /// from the footer.
    #[must_use]
    pub const fn new() -> Self {
        Self { strict: true }
    }

    /// Creates a loader that only warns on count mismatches.
    #[must_use]
    pub const fn lenient() -> Self {
        Self { strict: false }
    }
}

impl Default for ScanLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaLoader for ScanLoader {
    fn load_json(&mut self, reader: &mut dyn Read) -> Result<LoadSummary> {
        let dump: Value = serde_json::from_reader(BufReader::new(reader)).map_err(|e| {
            BackupError::InvalidDump {
                reason: e.to_string(),
            }
        })?;
        let Value::Object(sections) = dump else {
            return Err(BackupError::InvalidDump {
                reason: "top level is not an object".into(),
            });
        };

        let counts = sections
            .iter()
            .map(|(name, value)| (name.clone(), section_len(value)))
            .collect();
        let setting = sections.get("Setting");
        let summary = LoadSummary {
            format: DumpFormat::Json,
            sections: counts,
            volume: setting.and_then(volume_name),
            secret_key_removed: setting.is_some_and(secret_removed),
        };
        finish(&summary);
        Ok(summary)
    }

    fn load_binary(&mut self, path: &Path, options: &LoadOptions<'_>) -> Result<LoadSummary> {
        let mut file = open(path)?;
        let footer = read_footer(&mut file)?;
        drop(file);

        let entries: Vec<(String, SegmentInfo)> = footer
            .sorted_entries()
            .into_iter()
            .map(|(name, info)| (name.to_string(), *info))
            .collect();
        let threads = options.threads.clamp(1, entries.len().max(1));
        debug!(
            segments = entries.len(),
            threads,
            "loading binary backup {}",
            path.display()
        );

        let scan = Scan {
            path,
            entries: &entries,
            strict: self.strict,
            progress: options.progress,
            next: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
            settings: Mutex::new(None),
        };

        let shared = &scan;
        thread::scope(|scope| {
            let workers: Vec<_> = (0..threads)
                .map(|_| scope.spawn(move || shared.run()))
                .collect();
            let mut first_error = None;
            for worker in workers {
                match worker.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        first_error.get_or_insert(e);
                    }
                    Err(payload) => panic::resume_unwind(payload),
                }
            }
            first_error.map_or(Ok(()), Err)
        })?;

        let settings = scan
            .settings
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let summary = LoadSummary {
            format: DumpFormat::Binary,
            sections: entries
                .iter()
                .map(|(name, info)| (name.clone(), info.count))
                .collect(),
            volume: settings.as_ref().and_then(volume_name),
            secret_key_removed: settings.as_ref().is_some_and(secret_removed),
        };
        finish(&summary);
        Ok(summary)
    }
}

/// Shared state of one binary load.
struct Scan<'a> {
    path: &'a Path,
    entries: &'a [(String, SegmentInfo)],
    strict: bool,
    progress: &'a dyn LoadProgress,
    next: AtomicUsize,
    failed: AtomicBool,
    settings: Mutex<Option<Value>>,
}

impl Scan<'_> {
    /// Claims segments until none are left or another worker failed.
    fn run(&self) -> Result<()> {
        let result = self.claim_all();
        if result.is_err() {
            self.failed.store(true, Ordering::Relaxed);
        }
        result
    }

    fn claim_all(&self) -> Result<()> {
        let mut file = open(self.path)?;
        while !self.failed.load(Ordering::Relaxed) {
            let index = self.next.fetch_add(1, Ordering::Relaxed);
            let Some((name, info)) = self.entries.get(index) else {
                break;
            };

            let segment = read_segment(&mut file, info.offset)?;
            if segment.name() != name {
                return Err(BackupError::InvalidDump {
                    reason: format!(
                        "index entry {name} points to a {} segment",
                        segment.name()
                    ),
                });
            }
            if segment.count() as u64 != info.count {
                let reason = format!(
                    "segment {name} holds {} records, index says {}",
                    segment.count(),
                    info.count
                );
                if self.strict {
                    return Err(BackupError::InvalidDump { reason });
                }
                warn!("{reason}");
            }

            for batch in segment.records.chunks(PROGRESS_BATCH) {
                self.progress.on_loaded(name, batch.len());
            }
            if segment.kind == SegmentKind::Format
                && let Some(first) = segment.records.into_iter().next()
            {
                *self
                    .settings
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(first);
            }
        }
        Ok(())
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| BackupError::OpenSource {
        path: path.to_path_buf(),
        source,
    })
}

fn section_len(value: &Value) -> u64 {
    match value {
        Value::Array(items) => items.len() as u64,
        Value::Object(fields) => fields.len() as u64,
        _ => 1,
    }
}

fn volume_name(setting: &Value) -> Option<String> {
    setting.get("Name")?.as_str().map(str::to_string)
}

fn secret_removed(setting: &Value) -> bool {
    setting.get("SecretKey").and_then(Value::as_str) == Some(REMOVED_SECRET)
}

fn finish(summary: &LoadSummary) {
    if summary.secret_key_removed {
        warn!("secret key was removed; please correct it with `config` command");
    }
    info!(
        records = summary.total_records(),
        sections = summary.sections.len(),
        "scanned metadata backup"
    );
}
