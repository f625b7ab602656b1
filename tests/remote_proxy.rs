#![cfg(feature = "remote")]

//! Proxy extractor against a local one-shot HTTP server.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use voxclip::audio::{MockInputDevice, wav};
use voxclip::config::RemoteConfig;
use voxclip::error::{AcquireError, ExtractError};
use voxclip::remote::{ProxyExtractor, RemoteExtractor};
use voxclip::transcode::MockEngine;
use voxclip::{AcquisitionCoordinator, AcquisitionState, Provenance};

const REFERENCE: &str = "https://youtu.be/abc123";

struct Reply {
    status: &'static str,
    content_type: Option<&'static str>,
    body: Vec<u8>,
    /// Send Content-Length; otherwise the body ends when the socket closes.
    with_length: bool,
}

impl Reply {
    fn ok(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: "200 OK",
            content_type: Some(content_type),
            body,
            with_length: true,
        }
    }

    fn status(status: &'static str) -> Self {
        Self {
            status,
            content_type: Some("text/plain"),
            body: b"nope".to_vec(),
            with_length: true,
        }
    }
}

/// Serve one connection; the handle yields the request head.
async fn serve_once(reply: Reply) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/download", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }

        let mut response = format!("HTTP/1.1 {}\r\nConnection: close\r\n", reply.status);
        if let Some(content_type) = reply.content_type {
            response.push_str(&format!("Content-Type: {}\r\n", content_type));
        }
        if reply.with_length {
            response.push_str(&format!("Content-Length: {}\r\n", reply.body.len()));
        }
        response.push_str("\r\n");
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.write_all(&reply.body).await.unwrap();
        socket.shutdown().await.unwrap();

        String::from_utf8_lossy(&head).into_owned()
    });

    (endpoint, handle)
}

fn extractor(endpoint: &str, max_bytes: u64) -> ProxyExtractor {
    ProxyExtractor::new(&RemoteConfig {
        proxy_url: endpoint.to_string(),
        timeout_secs: 5,
        max_bytes,
    })
    .unwrap()
}

fn canonical_body() -> Vec<u8> {
    wav::encode_canonical(&[1, -1, 2, -2]).unwrap()
}

#[tokio::test]
async fn media_body_is_returned_and_reference_is_forwarded() {
    let (endpoint, server) = serve_once(Reply::ok("audio/wav", canonical_body())).await;

    let bytes = extractor(&endpoint, 1 << 20).extract(REFERENCE).await.unwrap();

    assert_eq!(bytes, canonical_body());
    let head = server.await.unwrap();
    assert!(
        head.starts_with("GET /download?url=https%3A%2F%2Fyoutu.be%2Fabc123 "),
        "{}",
        head
    );
}

#[tokio::test]
async fn not_found_is_resolution_failed() {
    let (endpoint, _server) = serve_once(Reply::status("404 Not Found")).await;

    let result = extractor(&endpoint, 1 << 20).extract(REFERENCE).await;

    assert!(matches!(result, Err(ExtractError::ResolutionFailed { .. })));
}

#[tokio::test]
async fn server_error_is_transfer_failed() {
    let (endpoint, _server) = serve_once(Reply::status("502 Bad Gateway")).await;

    let result = extractor(&endpoint, 1 << 20).extract(REFERENCE).await;

    assert!(matches!(result, Err(ExtractError::TransferFailed { .. })));
}

#[tokio::test]
async fn html_page_is_resolution_failed() {
    let (endpoint, _server) = serve_once(Reply::ok(
        "text/html; charset=utf-8",
        b"<html>captcha</html>".to_vec(),
    ))
    .await;

    let result = extractor(&endpoint, 1 << 20).extract(REFERENCE).await;

    assert!(matches!(result, Err(ExtractError::ResolutionFailed { .. })));
}

#[tokio::test]
async fn empty_body_is_resolution_failed() {
    let (endpoint, _server) = serve_once(Reply::ok("audio/mpeg", Vec::new())).await;

    let result = extractor(&endpoint, 1 << 20).extract(REFERENCE).await;

    assert!(matches!(result, Err(ExtractError::ResolutionFailed { .. })));
}

#[tokio::test]
async fn declared_length_over_limit_is_transfer_failed() {
    let (endpoint, _server) = serve_once(Reply::ok("audio/mpeg", vec![0xAB; 4096])).await;

    let result = extractor(&endpoint, 1024).extract(REFERENCE).await;

    assert!(matches!(result, Err(ExtractError::TransferFailed { .. })));
}

#[tokio::test]
async fn streamed_body_over_limit_is_transfer_failed() {
    let (endpoint, _server) = serve_once(Reply {
        with_length: false,
        ..Reply::ok("application/octet-stream", vec![0xAB; 4096])
    })
    .await;

    let result = extractor(&endpoint, 1024).extract(REFERENCE).await;

    assert!(matches!(result, Err(ExtractError::TransferFailed { .. })));
}

#[tokio::test]
async fn refused_connection_is_transfer_failed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/download", listener.local_addr().unwrap());
    drop(listener);

    let result = extractor(&endpoint, 1 << 20).extract(REFERENCE).await;

    assert!(matches!(result, Err(ExtractError::TransferFailed { .. })));
}

#[tokio::test]
async fn rejected_reference_never_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/download", listener.local_addr().unwrap());

    let result = extractor(&endpoint, 1 << 20)
        .extract("https://www.youtube.com/results?search_query=x")
        .await;

    assert!(matches!(result, Err(ExtractError::ReferenceRejected { .. })));
    let accepted = tokio::time::timeout(Duration::from_millis(50), listener.accept()).await;
    assert!(accepted.is_err(), "extractor should not have connected");
}

#[tokio::test]
async fn coordinator_delivers_remote_asset_through_proxy() {
    let (endpoint, _server) = serve_once(Reply::ok("audio/wav", canonical_body())).await;
    let engine = MockEngine::new();
    let coordinator = AcquisitionCoordinator::new(
        Arc::new(MockInputDevice::new()),
        Arc::new(engine.clone()),
        Arc::new(extractor(&endpoint, 1 << 20)),
    );

    let asset = coordinator.submit_remote(REFERENCE).await.unwrap();

    assert_eq!(asset.provenance(), Provenance::Remote);
    assert_eq!(asset.bytes(), canonical_body().as_slice());
    assert_eq!(engine.transcode_count(), 0);
    assert_eq!(coordinator.state(), AcquisitionState::Idle);
}

#[tokio::test]
async fn coordinator_maps_undecodable_remote_body_to_resolution_failure() {
    let (endpoint, _server) = serve_once(Reply::ok("video/mp4", b"garbage".to_vec())).await;
    let coordinator = AcquisitionCoordinator::new(
        Arc::new(MockInputDevice::new()),
        Arc::new(voxclip::transcode::SymphoniaEngine::new()),
        Arc::new(extractor(&endpoint, 1 << 20)),
    );

    let result = coordinator.submit_remote(REFERENCE).await;

    assert!(matches!(
        result,
        Err(AcquireError::ExtractionFailed(
            ExtractError::ResolutionFailed { .. }
        ))
    ));
    assert_eq!(coordinator.state(), AcquisitionState::Idle);
}
