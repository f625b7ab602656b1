//! Terminal rendering for acquisition results.

use crate::asset::AudioAsset;
use crate::error::AcquireError;
use crate::sink::AssetSink;
use owo_colors::OwoColorize;
use std::error::Error;
use std::time::Duration;

/// Clear the current terminal line (replaces spinner etc.)
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Human-readable byte count.
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Seconds with two decimals, `?` when unknown.
pub fn format_duration(duration: Option<Duration>) -> String {
    match duration {
        Some(d) => format!("{:.2}s", d.as_secs_f64()),
        None => "?".to_string(),
    }
}

/// One-line summary of an asset, without colors.
pub fn describe_asset(asset: &AudioAsset) -> String {
    format!(
        "#{} {} {} {} ({})",
        asset.sequence(),
        asset.provenance(),
        asset.mime(),
        format_duration(asset.duration()),
        format_bytes(asset.len())
    )
}

/// Error message followed by its cause chain, one cause per line.
pub fn describe_error(error: &AcquireError) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

pub fn print_asset(asset: &AudioAsset) {
    let marker = if asset.format().is_canonical() {
        "✓".green().to_string()
    } else {
        "→".yellow().to_string()
    };
    eprintln!("{} {}", marker, describe_asset(asset));
}

pub fn print_error(error: &AcquireError) {
    eprintln!(
        "{} [{}] {}",
        "✗".red(),
        error.kind().dimmed(),
        describe_error(error)
    );
}

/// Sink that reports every finished asset on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportSink {
    quiet: bool,
}

impl ReportSink {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl AssetSink for ReportSink {
    fn handle(&self, asset: &AudioAsset) -> std::io::Result<()> {
        if !self.quiet {
            print_asset(asset);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "report"
    }
}
