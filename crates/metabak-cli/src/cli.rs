//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use metabak_core::DEFAULT_THREADS;
use metabak_core::EncryptAlgo;
use std::path::Path;
use std::path::PathBuf;

/// Source name that selects standard input.
pub const STDIN_SOURCE: &str = "-";

#[derive(Parser)]
#[command(name = "metabak")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a metadata backup, or inspect a binary one with --stat
    Load(LoadArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct LoadArgs {
    /// Backup file; "-" reads a plain JSON dump from stdin
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// The backup is a binary container
    #[arg(long)]
    pub binary: bool,

    /// Show the segments of a binary backup instead of loading it
    #[arg(long, requires = "binary")]
    pub stat: bool,

    /// With --stat: -1 lists segment offsets, N shows the segment at offset N
    #[arg(
        long,
        requires = "stat",
        allow_negative_numbers = true,
        value_parser = parse_offset
    )]
    pub offset: Option<i64>,

    /// Number of threads used to load a binary backup
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// RSA private key (PEM text or path) the backup was encrypted with
    #[arg(long, value_name = "KEY")]
    pub encrypt_rsa_key: Option<String>,

    /// Envelope algorithm of an encrypted backup
    #[arg(long, value_name = "ALGO", default_value_t = EncryptAlgo::default())]
    pub encrypt_algo: EncryptAlgo,
}

/// What `--stat` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatView {
    /// Segment names and record counts.
    Summary,
    /// Names, counts and offsets.
    SummaryWithOffsets,
    /// A single segment.
    Segment(u64),
}

impl LoadArgs {
    /// Returns `true` if the backup is read from standard input.
    pub fn reads_stdin(&self) -> bool {
        self.file == Path::new(STDIN_SOURCE)
    }

    /// Returns the requested inspection, if `--stat` was given.
    pub fn stat_view(&self) -> Option<StatView> {
        if !self.stat {
            return None;
        }
        Some(match self.offset {
            None => StatView::Summary,
            Some(-1) => StatView::SummaryWithOffsets,
            #[allow(clippy::cast_sign_loss)]
            Some(offset) => StatView::Segment(offset as u64),
        })
    }
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Accepts -1 or a non-negative byte offset.
fn parse_offset(s: &str) -> Result<i64, String> {
    let offset = s
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid offset: {s}"))?;
    if offset < -1 {
        return Err(format!("offset must be -1 or a byte offset, got {offset}"));
    }
    Ok(offset)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("metabak").chain(args.iter().copied()))
    }

    fn load_args(args: &[&str]) -> LoadArgs {
        match parse(args).unwrap().command {
            Commands::Load(args) => args,
            Commands::Completion(_) => panic!("expected load"),
        }
    }

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("-1").unwrap(), -1);
        assert_eq!(parse_offset("0").unwrap(), 0);
        assert_eq!(parse_offset("4096").unwrap(), 4096);
        assert!(parse_offset("-2").is_err());
        assert!(parse_offset("abc").is_err());
    }

    #[test]
    fn test_stat_views() {
        let args = load_args(&["load", "--binary", "--stat", "dump.bin"]);
        assert_eq!(args.stat_view(), Some(StatView::Summary));

        let args = load_args(&["load", "--binary", "--stat", "--offset", "-1", "dump.bin"]);
        assert_eq!(args.stat_view(), Some(StatView::SummaryWithOffsets));

        let args = load_args(&["load", "--binary", "--stat", "--offset", "4096", "dump.bin"]);
        assert_eq!(args.stat_view(), Some(StatView::Segment(4096)));

        let args = load_args(&["load", "--binary", "dump.bin"]);
        assert_eq!(args.stat_view(), None);
    }

    #[test]
    fn test_defaults() {
        let args = load_args(&["load", "dump.json.gz"]);
        assert_eq!(args.threads, DEFAULT_THREADS);
        assert_eq!(args.encrypt_algo, EncryptAlgo::Aes256GcmRsa);
        assert!(args.encrypt_rsa_key.is_none());
        assert!(!args.reads_stdin());
        assert!(load_args(&["load", "-"]).reads_stdin());
    }

    #[test]
    fn test_stat_requires_binary() {
        assert!(parse(&["load", "--stat", "dump.bin"]).is_err());
        assert!(parse(&["load", "--binary", "--offset", "0", "dump.bin"]).is_err());
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        assert!(parse(&["load", "--encrypt-algo", "rot13", "dump.json"]).is_err());
        let args = load_args(&["load", "--encrypt-algo", "chacha20-rsa", "dump.json"]);
        assert_eq!(args.encrypt_algo, EncryptAlgo::Chacha20Rsa);
    }
}
