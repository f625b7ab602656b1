//! Application entry points for the CLI.
//!
//! Wires the configured device, engine and extractor into one
//! [`AcquisitionCoordinator`] and drives it for a single acquisition.

use crate::asset::{AudioAsset, MediaKind};
use crate::audio::capture::{CpalInputDevice, suppress_audio_warnings};
use crate::config::Config;
use crate::coordinator::AcquisitionCoordinator;
use crate::error::AcquireError;
use crate::output::{ReportSink, clear_line};
use crate::remote::ProxyExtractor;
use crate::sink::{AssetSink, WavFileSink};
use crate::transcode::engine_from_config;
use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Build the coordinator from configuration.
pub fn build_coordinator(config: &Config, quiet: bool) -> Result<AcquisitionCoordinator> {
    let device = Arc::new(CpalInputDevice::new(config.capture.device.as_deref()));
    let engine = engine_from_config(&config.transcode);
    let extractor =
        Arc::new(ProxyExtractor::new(&config.remote).context("Failed to build HTTP client")?);

    tracing::debug!(
        device = %config.capture.device.as_deref().unwrap_or("default"),
        engine = engine.name(),
        proxy = %config.remote.proxy_url,
        "Coordinator configured"
    );

    Ok(AcquisitionCoordinator::new(device, engine, extractor)
        .with_sink(Arc::new(ReportSink::new(quiet)))
        .with_pump_interval(Duration::from_millis(config.capture.pump_interval_ms)))
}

/// Record from the microphone until Enter, Ctrl+C, or `seconds` elapse.
pub async fn run_record_command(
    mut config: Config,
    seconds: Option<Duration>,
    device: Option<String>,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    if let Some(d) = device {
        config.capture.device = Some(d);
    }
    let coordinator = build_coordinator(&config, quiet)?;

    let sequence = coordinator.begin_capture().await?;
    if !quiet {
        match seconds {
            Some(d) => eprintln!(
                "Recording #{} for {}...",
                sequence,
                humantime::format_duration(d)
            ),
            None => eprintln!("Recording #{}... press Enter to stop.", sequence),
        }
    }

    let stop = async {
        match seconds {
            Some(d) => tokio::time::sleep(d).await,
            None => {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                if let Err(e) = lines.next_line().await {
                    tracing::debug!(error = %e, "stdin closed");
                }
            }
        }
    };

    tokio::select! {
        _ = stop => {}
        _ = tokio::signal::ctrl_c() => {
            coordinator.abandon();
            if !quiet {
                clear_line();
                eprintln!("Recording cancelled.");
            }
            return Ok(());
        }
    }

    let asset = coordinator.end_capture().await?;
    write_output(&asset, output.as_deref())
}

/// Acquire audio from a local file.
///
/// The kind comes from `--kind`, or from the file extension.
pub async fn run_file_command(
    config: Config,
    path: PathBuf,
    kind: Option<String>,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let declared = match kind {
        Some(kind) => kind,
        None => match MediaKind::from_path(&path) {
            Some(kind) => kind.as_str().to_string(),
            None => bail!(
                "Cannot infer media kind of {}; pass --kind audio|video",
                path.display()
            ),
        },
    };
    let payload = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let coordinator = build_coordinator(&config, quiet)?;
    let spinner = spinner(quiet, format!("Processing {}", path.display()));
    let result = until_interrupted(&coordinator, coordinator.submit_file(payload, &declared)).await;
    spinner.finish_and_clear();

    let asset = result?;
    write_output(&asset, output.as_deref())
}

/// Acquire audio from a remote media reference.
pub async fn run_remote_command(
    config: Config,
    url: String,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let coordinator = build_coordinator(&config, quiet)?;
    let spinner = spinner(quiet, format!("Fetching {}", url));
    let result = until_interrupted(&coordinator, coordinator.submit_remote(&url)).await;
    spinner.finish_and_clear();

    let asset = result?;
    write_output(&asset, output.as_deref())
}

/// Run one acquisition, abandoning it on Ctrl+C.
async fn until_interrupted<F>(coordinator: &AcquisitionCoordinator, work: F) -> Result<AudioAsset>
where
    F: Future<Output = std::result::Result<AudioAsset, AcquireError>>,
{
    tokio::select! {
        result = work => Ok(result?),
        _ = tokio::signal::ctrl_c() => {
            coordinator.abandon();
            bail!("Interrupted")
        }
    }
}

fn spinner(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        // SAFETY: hardcoded template string, always valid
        #[allow(clippy::expect_used)]
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} ({elapsed})")
            .expect("hardcoded spinner template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn write_output(asset: &AudioAsset, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        WavFileSink::new(path)
            .handle(asset)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
