//! System diagnostics and dependency checking.
//!
//! Verifies that the transcoding engine, the ffmpeg binary and an input
//! device are usable with the current configuration.

use crate::config::{Config, EngineKind};
use crate::transcode::engine_from_config;
use owo_colors::OwoColorize;
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working
    Ok(String),
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues
    Warning(String),
}

impl CheckResult {
    fn print(&self, label: &str, required: bool) {
        print!("{:<22}", format!("{}:", label));
        match self {
            Self::Ok(detail) if detail.is_empty() => println!("{}", "✓ OK".green()),
            Self::Ok(detail) => println!("{} ({})", "✓ OK".green(), detail),
            Self::NotFound if required => println!("{}", "✗ NOT FOUND".red()),
            Self::NotFound => println!("- not installed"),
            Self::Warning(msg) => println!("{} {}", "⚠ WARNING:".yellow(), msg),
        }
    }
}

/// Check if a command exists and report the first line of `-version`.
pub fn check_command(command: &str) -> CheckResult {
    match Command::new(command).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            CheckResult::Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
        }
        Ok(_) => CheckResult::Warning(format!("'{}' found but -version failed", command)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", command, e)),
    }
}

/// Check that at least one input device is visible.
#[cfg(feature = "cpal-audio")]
pub fn check_input_devices(preferred: Option<&str>) -> CheckResult {
    match crate::audio::capture::list_devices() {
        Ok(devices) if devices.is_empty() => {
            CheckResult::Warning("no audio input devices found".to_string())
        }
        Ok(devices) => match preferred {
            Some(name) if !devices.iter().any(|d| d.contains(name)) => {
                CheckResult::Warning(format!("configured device '{}' not present", name))
            }
            _ => CheckResult::Ok(format!("{} device(s)", devices.len())),
        },
        Err(e) => CheckResult::Warning(e.to_string()),
    }
}

/// Initialize the configured engine.
pub async fn check_engine(config: &Config) -> CheckResult {
    let engine = engine_from_config(&config.transcode);
    match engine.initialize().await {
        Ok(()) => CheckResult::Ok(engine.name().to_string()),
        Err(e) => CheckResult::Warning(e.to_string()),
    }
}

/// Run all dependency checks and print results.
pub async fn check_dependencies(config: &Config) {
    println!("voxclip {}", crate::version_string());
    println!("Checking system dependencies...\n");

    let ffmpeg_required = config.transcode.engine == EngineKind::Ffmpeg;
    let ffmpeg = check_command(&config.transcode.ffmpeg_path);
    ffmpeg.print("ffmpeg", ffmpeg_required);

    let engine = check_engine(config).await;
    engine.print("transcoding engine", true);

    #[cfg(feature = "cpal-audio")]
    {
        let devices = tokio::task::spawn_blocking({
            let preferred = config.capture.device.clone();
            move || check_input_devices(preferred.as_deref())
        })
        .await
        .unwrap_or_else(|e| CheckResult::Warning(format!("device check failed: {}", e)));
        devices.print("audio input", true);
    }

    println!();
    match (&engine, &ffmpeg) {
        (CheckResult::Ok(_), _) => println!("✓ Ready to transcode video and remote media."),
        (_, CheckResult::NotFound) if ffmpeg_required => {
            println!("⚠ The ffmpeg engine is selected but ffmpeg is missing:");
            println!("  sudo apt install ffmpeg    (Debian/Ubuntu)");
            println!("  sudo pacman -S ffmpeg      (Arch)");
            println!("  Or set transcode.engine = \"symphonia\"");
        }
        _ => println!("⚠ Transcoding is unavailable; file audio still passes through."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_inequality() {
        assert_ne!(CheckResult::Ok(String::new()), CheckResult::NotFound);
        assert_ne!(
            CheckResult::Warning("a".to_string()),
            CheckResult::Warning("b".to_string())
        );
    }

    #[test]
    fn test_check_command_nonexistent() {
        let result = check_command("nonexistent-command-xyz-12345");
        assert_eq!(result, CheckResult::NotFound);
    }

    #[tokio::test]
    async fn test_symphonia_engine_check_passes() {
        let config = Config::default();
        assert_eq!(
            check_engine(&config).await,
            CheckResult::Ok("symphonia".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_engine_check_warns() {
        let mut config = Config::default();
        config.transcode.engine = EngineKind::Ffmpeg;
        config.transcode.ffmpeg_path = "/nonexistent/ffmpeg-xyz".to_string();

        assert!(matches!(
            check_engine(&config).await,
            CheckResult::Warning(_)
        ));
    }

    #[tokio::test]
    async fn test_check_dependencies_runs_without_panic() {
        let mut config = Config::default();
        config.transcode.ffmpeg_path = "/nonexistent/ffmpeg-xyz".to_string();
        check_dependencies(&config).await;
    }
}
