//! Progress callbacks for metadata loading.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::backup::SegmentKind;

/// Receives per-segment progress while a backup is loaded.
///
/// Loaders call this from several worker threads at once, so implementations
/// must be `Send + Sync` and synchronize internally.
///
/// # Examples
///
/// ```
/// use metabak_core::LoadProgress;
/// use std::sync::atomic::AtomicUsize;
/// use std::sync::atomic::Ordering;
///
/// struct Total(AtomicUsize);
///
/// impl LoadProgress for Total {
///     fn on_loaded(&self, _segment: &str, count: usize) {
///         self.0.fetch_add(count, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait LoadProgress: Send + Sync {
    /// Called after `count` more records of `segment` were loaded.
    fn on_loaded(&self, segment: &str, count: usize);
}

/// No-op progress implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl LoadProgress for NoopProgress {
    fn on_loaded(&self, _segment: &str, _count: usize) {}
}

/// Thread-safe record counter per segment kind.
///
/// Names that are not a known [`SegmentKind`] are tallied under
/// [`other`](Self::other).
#[derive(Debug)]
pub struct CountingProgress {
    counts: HashMap<&'static str, AtomicU64>,
    other: AtomicU64,
}

impl CountingProgress {
    /// Creates a counter with every kind at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: SegmentKind::ALL
                .iter()
                .map(|kind| (kind.name(), AtomicU64::new(0)))
                .collect(),
            other: AtomicU64::new(0),
        }
    }

    /// Records counted for `segment` so far.
    #[must_use]
    pub fn count(&self, segment: &str) -> u64 {
        self.counts
            .get(segment)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Records counted for unknown segment names.
    #[must_use]
    pub fn other(&self) -> u64 {
        self.other.load(Ordering::Relaxed)
    }

    /// Records counted across all segments.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .map(|count| count.load(Ordering::Relaxed))
            .sum::<u64>()
            + self.other()
    }
}

impl Default for CountingProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProgress for CountingProgress {
    fn on_loaded(&self, segment: &str, count: usize) {
        let counter = self.counts.get(segment).unwrap_or(&self.other);
        counter.fetch_add(count as u64, Ordering::Relaxed);
    }
}
