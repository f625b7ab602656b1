//! Extraction through a generic resolving proxy over HTTP.
//!
//! The proxy takes the provider URL as a `url` query parameter and answers
//! with the media bytes of the best audio stream it can locate.
//!
//! Failure taxonomy:
//! - no response (connect error, timeout) → `TransferFailed`
//! - HTTP 404, 410, 415, 422 → `ResolutionFailed`
//! - any other non-success status → `TransferFailed`
//! - content type not audio/*, video/* or application/octet-stream → `ResolutionFailed`
//! - empty body → `ResolutionFailed`
//! - body stream error or body over the size limit → `TransferFailed`

use super::{RemoteExtractor, require_media_id};
use crate::config::RemoteConfig;
use crate::error::ExtractError;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Statuses meaning the proxy understood the request but found no stream.
const RESOLUTION_STATUSES: &[StatusCode] = &[
    StatusCode::NOT_FOUND,
    StatusCode::GONE,
    StatusCode::UNSUPPORTED_MEDIA_TYPE,
    StatusCode::UNPROCESSABLE_ENTITY,
];

/// Fetches remote audio through a resolving proxy.
#[derive(Debug, Clone)]
pub struct ProxyExtractor {
    client: reqwest::Client,
    endpoint: String,
    max_bytes: u64,
}

impl ProxyExtractor {
    /// Build an extractor from configuration.
    ///
    /// # Errors
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("voxclip/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.proxy_url.clone(),
            max_bytes: config.max_bytes,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn is_audio_content_type(value: &str) -> bool {
    let mime = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("audio/") || mime.starts_with("video/") || mime == "application/octet-stream"
}

#[async_trait::async_trait]
impl RemoteExtractor for ProxyExtractor {
    async fn extract(&self, reference: &str) -> Result<Vec<u8>, ExtractError> {
        let media_id = require_media_id(reference)?;
        let transfer_failed = |message: String| ExtractError::TransferFailed {
            reference: reference.to_string(),
            message,
        };
        let resolution_failed = |message: String| ExtractError::ResolutionFailed {
            reference: reference.to_string(),
            message,
        };

        let url = reqwest::Url::parse_with_params(&self.endpoint, &[("url", reference.trim())])
            .map_err(|e| transfer_failed(format!("invalid proxy endpoint: {}", e)))?;

        tracing::debug!(%media_id, endpoint = %self.endpoint, "Requesting remote media");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                transfer_failed(format!("proxy request timed out: {}", e))
            } else {
                transfer_failed(format!("proxy request failed: {}", e))
            }
        })?;

        let status = response.status();
        if RESOLUTION_STATUSES.contains(&status) {
            return Err(resolution_failed(format!(
                "proxy could not resolve an audio stream (HTTP {})",
                status
            )));
        }
        if !status.is_success() {
            return Err(transfer_failed(format!("proxy answered HTTP {}", status)));
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or("");
            if !is_audio_content_type(content_type) {
                return Err(resolution_failed(format!(
                    "proxy returned non-media content type '{}'",
                    content_type
                )));
            }
        }

        if let Some(length) = response.content_length()
            && length > self.max_bytes
        {
            return Err(transfer_failed(format!(
                "remote media is {} bytes, limit is {}",
                length, self.max_bytes
            )));
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transfer_failed(format!("body read failed: {}", e)))?;
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(transfer_failed(format!(
                    "remote media exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(resolution_failed("proxy returned an empty body".to_string()));
        }

        tracing::debug!(%media_id, bytes = body.len(), "Remote media fetched");
        Ok(body)
    }

    fn name(&self) -> &str {
        "proxy"
    }
}
