//! In-process transcoding with symphonia.

use super::TranscodeEngine;
use crate::audio::wav;
use crate::error::TranscodeError;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::OnceCell;

/// Demuxes and decodes with symphonia's bundled codecs.
#[derive(Debug, Default)]
pub struct SymphoniaEngine {
    init: OnceCell<Result<(), TranscodeError>>,
}

impl SymphoniaEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TranscodeEngine for SymphoniaEngine {
    async fn initialize(&self) -> Result<(), TranscodeError> {
        self.init
            .get_or_init(|| async {
                // Round-trip a tiny canonical file through the registries.
                let self_check = wav::encode_canonical(&[0; 8])
                    .map_err(|e| TranscodeError::EngineInitFailed {
                        message: e.to_string(),
                    })
                    .and_then(|bytes| {
                        decode_to_canonical(bytes).map_err(|e| TranscodeError::EngineInitFailed {
                            message: format!("codec registry self-check failed: {}", e),
                        })
                    });
                if self_check.is_ok() {
                    tracing::debug!("Symphonia engine initialized");
                }
                self_check.map(|_| ())
            })
            .await
            .clone()
    }

    async fn transcode(&self, payload: Vec<u8>) -> Result<Vec<u8>, TranscodeError> {
        self.initialize().await?;

        let input_len = payload.len();
        let output = tokio::task::spawn_blocking(move || decode_to_canonical(payload))
            .await
            .map_err(|e| TranscodeError::CorruptInput {
                message: format!("decoder task failed: {}", e),
            })??;

        tracing::debug!(input_len, output_len = output.len(), "Symphonia transcode done");
        Ok(output)
    }

    fn name(&self) -> &str {
        "symphonia"
    }

    fn is_ready(&self) -> bool {
        matches!(self.init.get(), Some(Ok(())))
    }
}

fn unsupported(message: impl Into<String>) -> TranscodeError {
    TranscodeError::UnsupportedCodec {
        message: message.into(),
    }
}

fn corrupt(message: impl Into<String>) -> TranscodeError {
    TranscodeError::CorruptInput {
        message: message.into(),
    }
}

fn classify(context: &str, err: SymphoniaError) -> TranscodeError {
    match err {
        SymphoniaError::Unsupported(what) => unsupported(format!("{}: {}", context, what)),
        other => corrupt(format!("{}: {}", context, other)),
    }
}

/// Decode the first audio track of `payload` into canonical WAV bytes.
///
/// Video and other non-audio tracks are ignored. Corrupt frames are skipped.
pub fn decode_to_canonical(payload: Vec<u8>) -> Result<Vec<u8>, TranscodeError> {
    if payload.is_empty() {
        return Err(corrupt("empty payload"));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(payload)), Default::default());
    let detected = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| classify("format detection", e))?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or_else(|| unsupported("no audio track found"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| classify("codec", e))?;

    let mut samples: Vec<i16> = Vec::new();
    let mut layout: Option<(u16, u32)> = None;
    let mut converter: Option<wav::CanonicalConverter> = None;
    let mut skipped = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(classify("packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = %e, "Skipping corrupt audio frame");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(classify("decode", e)),
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }
        let channels = spec.channels.count() as u16;
        match layout {
            None => layout = Some((channels, spec.rate)),
            Some(existing) if existing != (channels, spec.rate) => {
                return Err(corrupt(format!(
                    "stream layout changed mid-stream from {:?} to {:?}",
                    existing,
                    (channels, spec.rate)
                )));
            }
            Some(_) => {}
        }

        let mut buffer = SampleBuffer::<i16>::new(frames as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        let converter =
            converter.get_or_insert_with(|| wav::CanonicalConverter::new(channels, spec.rate));
        samples.extend(converter.push(buffer.samples()));
    }

    let (Some((channels, rate)), Some(converter)) = (layout, converter) else {
        return Err(corrupt(format!(
            "no audio frames decoded ({} corrupt frames skipped)",
            skipped
        )));
    };

    tracing::debug!(
        channels,
        rate,
        samples = samples.len(),
        skipped,
        "Decoded audio track"
    );

    samples.extend(converter.finish());
    Ok(wav::encode_canonical(&samples)?)
}
