//! Load command implementation

use crate::cli::LoadArgs;
use crate::cli::StatView;
use crate::error::add_backup_context;
use crate::output::OutputFormatter;
use crate::progress::SegmentProgress;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use metabak_core::DecodeSpec;
use metabak_core::LoadOptions;
use metabak_core::LoadSummary;
use metabak_core::MetaLoader;
use metabak_core::ScanLoader;
use metabak_core::materialize;
use metabak_core::read_footer;
use metabak_core::read_segment;
use metabak_core::stream;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::info;

pub fn execute(args: &LoadArgs, formatter: &dyn OutputFormatter, show_progress: bool) -> Result<()> {
    if args.reads_stdin() {
        return load_stdin(args, formatter);
    }

    let mut spec = DecodeSpec::from_env(&args.file).with_algorithm(args.encrypt_algo);
    if let Some(key) = &args.encrypt_rsa_key {
        spec = spec.with_private_key(key.clone());
    }

    let summary = if args.binary {
        let plain = add_backup_context(materialize(&spec), &args.file)?;
        formatter.format_materialized(&args.file, &plain);

        if let Some(view) = args.stat_view() {
            return stat(&plain.path, view, formatter);
        }
        load_binary(&plain.path, args.threads, show_progress)?
    } else {
        load_json(&spec)?
    };

    info!("load metadata from {} succeed", args.file.display());
    formatter.format_load_result(&args.file.display().to_string(), &summary)
}

fn load_stdin(args: &LoadArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    if args.binary {
        bail!(
            "Binary backups cannot be read from STDIN\n\
             HINT: Pass the backup path instead of '-'."
        );
    }
    if args.encrypt_rsa_key.is_some() {
        bail!(
            "Encrypted backups cannot be read from STDIN\n\
             HINT: Pass the backup path instead of '-', or decrypt it first."
        );
    }

    let summary = add_backup_context(
        ScanLoader::new().load_json(&mut io::stdin().lock()),
        Path::new("STDIN"),
    )?;
    info!("load metadata from STDIN succeed");
    formatter.format_load_result("STDIN", &summary)
}

fn load_json(spec: &DecodeSpec) -> Result<LoadSummary> {
    let source = spec.source();
    let mut composed = add_backup_context(stream::open(spec), source)?;
    let summary = add_backup_context(ScanLoader::new().load_json(&mut composed), source)?;
    composed
        .close()
        .with_context(|| format!("Failed to close '{}'", source.display()))?;
    Ok(summary)
}

fn load_binary(plain: &Path, threads: usize, show_progress: bool) -> Result<LoadSummary> {
    let progress = SegmentProgress::new(!show_progress);
    let options = LoadOptions::new(threads).with_progress(&progress);
    let result = ScanLoader::new().load_binary(plain, &options);
    progress.finish();
    add_backup_context(result, plain)
}

fn stat(plain: &Path, view: StatView, formatter: &dyn OutputFormatter) -> Result<()> {
    info!("load backup from {}", plain.display());
    let mut file = File::open(plain)
        .with_context(|| format!("Failed to open file {}", plain.display()))?;

    match view {
        StatView::Summary | StatView::SummaryWithOffsets => {
            let footer = add_backup_context(read_footer(&mut file), plain)?;
            formatter.format_summary(plain, &footer, view == StatView::SummaryWithOffsets)
        }
        StatView::Segment(offset) => {
            let segment = add_backup_context(read_segment(&mut file, offset), plain)?;
            formatter.format_segment(plain, offset, &segment)
        }
    }
}
