//! Video transcoding against real containers.
//!
//! `fixtures/silent_10s_22k_mono.mkv` is a Matroska file with an
//! uncompressed video track and ten seconds of silent 22.05kHz mono FLAC.
//! The remaining tests render their input with ffmpeg and skip when it is
//! not installed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use voxclip::audio::{MockInputDevice, wav};
use voxclip::config::Config;
use voxclip::remote::MockExtractor;
use voxclip::transcode::{FfmpegEngine, SymphoniaEngine, TranscodeEngine, engine_from_config};
use voxclip::{AcquisitionCoordinator, AcquisitionState, MediaKind, Provenance};

const SILENT_MKV: &[u8] = include_bytes!("fixtures/silent_10s_22k_mono.mkv");

/// Container framing (encoder priming, last partial frame) may add a little.
const TOLERANCE_SECS: f64 = 0.25;

fn ffmpeg_available() -> bool {
    let available = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .is_ok_and(|o| o.status.success());
    if !available {
        eprintln!("skipping: ffmpeg not installed");
    }
    available
}

/// Render `seconds` of black video with a silent audio track.
fn silent_video(dir: &Path, name: &str, seconds: u32, audio: &str) -> Option<PathBuf> {
    let path = dir.join(name);
    let duration = seconds.to_string();
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-f", "lavfi", "-i"])
        .arg(format!("color=c=black:s=64x64:r=10:d={}", duration))
        .args(["-f", "lavfi", "-i", audio])
        .args(["-t", &duration])
        .args(["-c:v", "mpeg4", "-c:a", "aac", "-shortest"])
        .arg(&path)
        .status()
        .ok()?;
    if !status.success() {
        eprintln!("skipping: ffmpeg could not render {}", name);
        return None;
    }
    Some(path)
}

fn assert_duration_close(bytes: &[u8], expected_secs: f64) {
    let info = wav::inspect(bytes).unwrap();
    assert!(info.is_canonical(), "not canonical: {:?}", info);
    let actual = info.duration().as_secs_f64();
    assert!(
        (actual - expected_secs).abs() <= TOLERANCE_SECS,
        "expected ~{}s, got {}s",
        expected_secs,
        actual
    );
}

#[tokio::test]
async fn symphonia_decodes_ten_second_matroska_fixture() {
    let output = SymphoniaEngine::new()
        .transcode(SILENT_MKV.to_vec())
        .await
        .unwrap();

    assert_duration_close(&output, 10.0);
    let samples = wav::read_canonical(&output).unwrap();
    assert_eq!(samples.len(), wav::samples_for(Duration::from_secs(10)));
    assert!(samples.iter().all(|&s| s == 0));
}

#[tokio::test]
async fn default_engine_turns_video_fixture_into_file_asset() {
    let kind = MediaKind::from_path(Path::new("fixtures/silent_10s_22k_mono.mkv"));
    assert_eq!(kind, Some(MediaKind::Video));
    let coordinator = AcquisitionCoordinator::new(
        Arc::new(MockInputDevice::new()),
        engine_from_config(&Config::default().transcode),
        Arc::new(MockExtractor::new()),
    );

    let asset = coordinator
        .submit_file(SILENT_MKV.to_vec(), "video")
        .await
        .unwrap();

    assert_eq!(asset.provenance(), Provenance::File);
    assert!(asset.format().is_canonical());
    assert_duration_close(asset.bytes(), 10.0);
    assert_eq!(coordinator.state(), AcquisitionState::Idle);
}

#[tokio::test]
async fn ffmpeg_ten_second_silent_video_gives_ten_seconds_of_pcm() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let Some(path) = silent_video(
        dir.path(),
        "silent.mp4",
        10,
        "anullsrc=r=48000:cl=mono",
    ) else {
        return;
    };
    let payload = std::fs::read(&path).unwrap();

    let output = FfmpegEngine::default().transcode(payload).await.unwrap();

    assert_duration_close(&output, 10.0);
    let samples = wav::read_canonical(&output).unwrap();
    assert!(samples.iter().all(|s| s.unsigned_abs() <= 1));
}

#[tokio::test]
async fn symphonia_ten_second_silent_video_gives_ten_seconds_of_pcm() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let Some(path) = silent_video(
        dir.path(),
        "silent.mp4",
        10,
        "anullsrc=r=44100:cl=stereo",
    ) else {
        return;
    };
    let payload = std::fs::read(&path).unwrap();

    let output = SymphoniaEngine::new().transcode(payload).await.unwrap();

    assert_duration_close(&output, 10.0);
}

#[tokio::test]
async fn coordinator_video_submission_yields_canonical_file_asset() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let Some(path) = silent_video(
        dir.path(),
        "short.mp4",
        2,
        "anullsrc=r=22050:cl=mono",
    ) else {
        return;
    };
    let coordinator = AcquisitionCoordinator::new(
        Arc::new(MockInputDevice::new()),
        Arc::new(FfmpegEngine::default()),
        Arc::new(MockExtractor::new()),
    );

    let asset = coordinator
        .submit_file(std::fs::read(&path).unwrap(), "video/mp4")
        .await
        .unwrap();

    assert_eq!(asset.provenance(), Provenance::File);
    assert!(asset.format().is_canonical());
    let duration = asset.duration().unwrap_or_default();
    assert!(duration >= Duration::from_millis(1750), "{:?}", duration);
    assert_eq!(coordinator.state(), AcquisitionState::Idle);
}

#[tokio::test]
async fn truncated_video_fails_without_leaving_processing() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let Some(path) = silent_video(
        dir.path(),
        "cut.mp4",
        2,
        "anullsrc=r=44100:cl=stereo",
    ) else {
        return;
    };
    let mut payload = std::fs::read(&path).unwrap();
    payload.truncate(payload.len() / 3);
    let coordinator = AcquisitionCoordinator::new(
        Arc::new(MockInputDevice::new()),
        Arc::new(FfmpegEngine::default()),
        Arc::new(MockExtractor::new()),
    );

    let result = coordinator.submit_file(payload, "video").await;

    // a cut file may still decode partially; either way the machine is idle
    if let Err(e) = &result {
        assert_eq!(e.kind(), "transcode_failed");
    }
    assert_eq!(coordinator.state(), AcquisitionState::Idle);
}
