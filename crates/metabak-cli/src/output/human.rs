//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use anyhow::Result;
use console::Term;
use console::style;
use metabak_core::BackupFooter;
use metabak_core::LoadSummary;
use metabak_core::MaterializeOutcome;
use metabak_core::Materialized;
use metabak_core::Segment;
use metabak_core::report::render_segment;
use metabak_core::report::render_summary;
use std::path::Path;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
    err_term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
            err_term: Term::stderr(),
        }
    }

    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();
        let mut count = 0;

        for c in s.chars().rev() {
            if count == 3 {
                result.push(',');
                count = 0;
            }
            result.push(c);
            count += 1;
        }

        result.chars().rev().collect()
    }

    fn materialized_message(source: &Path, plain: &Materialized) -> String {
        match plain.outcome {
            MaterializeOutcome::Passthrough => format!("Using {} as-is", source.display()),
            MaterializeOutcome::CacheHit => {
                format!("Reusing plain backup {}", plain.path.display())
            }
            MaterializeOutcome::Converted { bytes } => format!(
                "Converted {} to {} ({})",
                source.display(),
                plain.path.display(),
                Self::format_size(bytes)
            ),
        }
    }

    fn warn(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            let _ = self
                .err_term
                .write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = self.err_term.write_line(&format!("WARNING: {message}"));
        }
    }
}

impl OutputFormatter for HumanFormatter {
    // Requested data is printed even in quiet mode.
    fn format_summary(
        &self,
        _backup: &Path,
        footer: &BackupFooter,
        with_offsets: bool,
    ) -> Result<()> {
        self.term.write_str(&render_summary(footer, with_offsets))?;
        Ok(())
    }

    fn format_segment(&self, _backup: &Path, _offset: u64, segment: &Segment) -> Result<()> {
        self.term.write_str(&render_segment(segment))?;
        Ok(())
    }

    fn format_load_result(&self, source: &str, summary: &LoadSummary) -> Result<()> {
        if summary.secret_key_removed {
            self.warn("secret key was removed; please correct it with `config` command");
        }
        if self.quiet {
            return Ok(());
        }

        if self.use_colors {
            let _ = self.term.write_line(&format!(
                "{} Loaded metadata from {source}",
                style("✓").green().bold()
            ));
        } else {
            let _ = self
                .term
                .write_line(&format!("Loaded metadata from {source}"));
        }

        if let Some(volume) = &summary.volume {
            let _ = self.term.write_line(&format!("  Volume:   {volume}"));
        }
        let _ = self.term.write_line(&format!(
            "  Records:  {}",
            Self::format_number(summary.total_records())
        ));
        let _ = self
            .term
            .write_line(&format!("  Sections: {}", summary.sections.len()));

        if self.verbose {
            let _ = self.term.write_line("");
            for (name, count) in &summary.sections {
                let _ = self.term.write_line(&format!(
                    "  {name:<10} {:>12}",
                    Self::format_number(*count)
                ));
            }
        }

        Ok(())
    }

    fn format_materialized(&self, source: &Path, plain: &Materialized) {
        if !self.verbose {
            return;
        }
        let _ = self
            .err_term
            .write_line(&Self::materialized_message(source, plain));
    }

    fn format_error(&self, error: &anyhow::Error) {
        // Always show errors, even in quiet mode
        if self.use_colors {
            let _ = self
                .err_term
                .write_line(&format!("{} {error:?}", style("ERROR:").red().bold()));
        } else {
            let _ = self.err_term.write_line(&format!("ERROR: {error:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_size() {
        assert_eq!(HumanFormatter::format_size(0), "0 B");
        assert_eq!(HumanFormatter::format_size(1536), "1.5 KB");
        assert_eq!(HumanFormatter::format_size(2 * 1024 * 1024), "2.0 MB");
        assert_eq!(HumanFormatter::format_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(HumanFormatter::format_number(0), "0");
        assert_eq!(HumanFormatter::format_number(999), "999");
        assert_eq!(HumanFormatter::format_number(1234), "1,234");
        assert_eq!(HumanFormatter::format_number(42_000_000), "42,000,000");
    }

    #[test]
    fn test_materialized_messages() {
        let source = Path::new("dump.bin.gz");
        let converted = Materialized {
            path: PathBuf::from("dump.bin"),
            outcome: MaterializeOutcome::Converted { bytes: 2048 },
        };
        assert_eq!(
            HumanFormatter::materialized_message(source, &converted),
            "Converted dump.bin.gz to dump.bin (2.0 KB)"
        );

        let hit = Materialized {
            path: PathBuf::from("dump.bin"),
            outcome: MaterializeOutcome::CacheHit,
        };
        assert_eq!(
            HumanFormatter::materialized_message(source, &hit),
            "Reusing plain backup dump.bin"
        );
    }
}
