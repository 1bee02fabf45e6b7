//! Per-segment progress spinners for binary loads.

use console::Term;
use indicatif::MultiProgress;
use indicatif::ProgressBar;
use indicatif::ProgressDrawTarget;
use indicatif::ProgressStyle;
use metabak_core::LoadProgress;
use metabak_core::SegmentKind;
use std::collections::HashMap;

/// One count spinner per segment kind, implementing `LoadProgress`.
///
/// Workers report concurrently; `ProgressBar` is internally synchronized so
/// no extra locking is needed. Spinners stay on screen after
/// [`finish`](Self::finish) so the final counts remain visible.
pub struct SegmentProgress {
    bars: HashMap<&'static str, ProgressBar>,
    other: ProgressBar,
}

impl SegmentProgress {
    /// Creates the spinners, drawing to stderr unless `hidden`.
    #[must_use]
    pub fn new(hidden: bool) -> Self {
        let target = if hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let multi = MultiProgress::with_draw_target(target);

        // Template: "⠋ edge       12,345 records"
        let style = ProgressStyle::with_template("{spinner:.green} {prefix:<10} {human_pos} records")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let add = |name: &str| {
            let bar = multi.add(ProgressBar::new_spinner());
            bar.set_style(style.clone());
            bar.set_prefix(name.to_string());
            bar
        };

        let bars = SegmentKind::ALL
            .iter()
            .map(|kind| (kind.name(), add(kind.name())))
            .collect();
        let other = add("other");

        Self { bars, other }
    }

    /// Checks if we should show progress (TTY detection).
    #[must_use]
    pub fn should_show() -> bool {
        Term::stderr().is_term()
    }

    /// Records counted for `segment` so far.
    #[must_use]
    pub fn position(&self, segment: &str) -> u64 {
        self.bars.get(segment).unwrap_or(&self.other).position()
    }

    /// Stops all spinners, leaving their final counts.
    pub fn finish(&self) {
        for bar in self.bars.values() {
            bar.finish();
        }
        self.other.finish_and_clear();
    }
}

impl LoadProgress for SegmentProgress {
    fn on_loaded(&self, segment: &str, count: usize) {
        self.bars
            .get(segment)
            .unwrap_or(&self.other)
            .inc(count as u64);
    }
}
