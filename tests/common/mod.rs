//! Shared helpers: mock upstream servers and gateway state

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request};
use otter_gateway::ApiState;
use otter_gateway::media::AudioNormalizer;
use otter_gateway::upstream::{RagClient, SpeechToText, TextToSpeech, VoiceSettings};
use secrecy::SecretString;
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-key";
pub const BOUNDARY: &str = "otter-test-boundary";

/// A request captured by a mock upstream
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Requests seen by a mock upstream
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    pub fn record(&self, path: &str, headers: &HeaderMap, body: &Bytes) {
        self.0.lock().unwrap().push(Recorded {
            path: path.to_string(),
            headers: headers.clone(),
            body: body.clone(),
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_mock(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Gateway state pointed at mock upstreams
pub fn state(
    voice_url: &str,
    rag_url: &str,
    upload_dir: &Path,
    normalizer: Option<AudioNormalizer>,
) -> Arc<ApiState> {
    Arc::new(build_state(
        voice_url,
        rag_url,
        upload_dir,
        normalizer,
        Duration::from_secs(5),
    ))
}

/// Gateway state with an explicit upstream timeout, for tests that tweak fields
pub fn build_state(
    voice_url: &str,
    rag_url: &str,
    upload_dir: &Path,
    normalizer: Option<AudioNormalizer>,
    timeout: Duration,
) -> ApiState {
    ApiState {
        stt: Some(
            SpeechToText::new(voice_url, SecretString::from(API_KEY.to_string()), "scribe_v1", timeout)
                .unwrap(),
        ),
        tts: Some(
            TextToSpeech::new(
                voice_url,
                SecretString::from(API_KEY.to_string()),
                "eleven_monolingual_v1",
                "default-voice",
                VoiceSettings {
                    stability: 0.5,
                    similarity_boost: 0.75,
                },
                timeout,
            )
            .unwrap(),
        ),
        rag: RagClient::new(rag_url, timeout).unwrap(),
        agent: None,
        agent_id: None,
        normalizer,
        upload_dir: upload_dir.to_path_buf(),
    }
}

/// Multipart upload with a single file field
pub fn multipart_request(uri: &str, field: &str, mime: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"recording.webm\"\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// JSON POST request
pub fn json_request(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Number of entries left in a directory
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}

/// Whether `haystack` contains `needle`
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Mock upstream answering `path` with a fixed response and recording requests
pub fn mock_route(
    path: &str,
    status: axum::http::StatusCode,
    content_type: &'static str,
    body: &'static [u8],
) -> (Router, Recorder) {
    let recorder = Recorder::default();
    let seen = recorder.clone();
    let router = Router::new().route(
        path,
        axum::routing::any(
            move |uri: axum::http::Uri, headers: HeaderMap, request_body: Bytes| {
                let seen = seen.clone();
                async move {
                    seen.record(uri.path(), &headers, &request_body);
                    (status, [("content-type", content_type)], body)
                }
            },
        ),
    );
    (router, recorder)
}

/// Mock upstream that records the request, then stalls for `delay` before answering
pub fn slow_route(path: &str, delay: Duration) -> (Router, Recorder) {
    let recorder = Recorder::default();
    let seen = recorder.clone();
    let router = Router::new().route(
        path,
        axum::routing::any(
            move |uri: axum::http::Uri, headers: HeaderMap, request_body: Bytes| {
                let seen = seen.clone();
                async move {
                    seen.record(uri.path(), &headers, &request_body);
                    tokio::time::sleep(delay).await;
                    (axum::http::StatusCode::OK, "too late")
                }
            },
        ),
    );
    (router, recorder)
}
