//! API endpoint integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use otter_gateway::api::router;
use otter_gateway::media::AudioNormalizer;
use otter_gateway::upstream::AgentClient;
use secrecy::SecretString;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{
    body_json, build_state, closed_url, contains, entries, json_request, mock_route,
    multipart_request, slow_route, spawn_mock, state,
};

const STT_PATH: &str = "/v1/speech-to-text";
const TTS_PATH: &str = "/v1/text-to-speech/{voice}";
const CHAT_PATH: &str = "/v1/chat/completions";
const SIGNED_URL_PATH: &str = "/v1/convai/conversation/get_signed_url";

/// Upstream timeout for tests where the mock upstream stalls
const SHORT_TIMEOUT: Duration = Duration::from_millis(200);
const STALL: Duration = Duration::from_secs(3);

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let rag = closed_url().await;
    let app = router(state(&rag, &rag, dir.path(), None));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_reflects_rag_backend() {
    let dir = tempfile::tempdir().unwrap();
    let (rag_router, _) = mock_route("/health", StatusCode::OK, "application/json", b"{}");
    let rag = spawn_mock(rag_router).await;
    let app = router(state(&rag, &rag, dir.path(), None));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["checks"]["rag_backend"]["status"], "ok");

    let down = closed_url().await;
    let app = router(state(&down, &down, dir.path(), None));
    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_speech_to_text_returns_trimmed_text_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, stt) = mock_route(
        STT_PATH,
        StatusCode::OK,
        "application/json",
        br#"{"text":"  hello world  ","language_code":"en"}"#,
    );
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(multipart_request(
            "/api/speech-to-text",
            "audio",
            "audio/webm",
            b"webm-audio-bytes",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "text": "hello world" }));

    let requests = stt.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].headers["xi-api-key"], common::API_KEY);
    assert!(contains(&requests[0].body, b"scribe_v1"));
    assert!(contains(&requests[0].body, b"webm-audio-bytes"));

    assert_eq!(entries(dir.path()), 0, "upload was not removed");
}

#[tokio::test]
async fn test_transcribe_alias_accepts_file_field() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, stt) =
        mock_route(STT_PATH, StatusCode::OK, "application/json", br#"{"text":"hi"}"#);
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(multipart_request(
            "/api/transcribe",
            "file",
            "audio/wav",
            b"RIFFdata",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["text"], "hi");
    assert_eq!(stt.count(), 1);
}

#[tokio::test]
async fn test_speech_to_text_upstream_error_carries_status() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, _) = mock_route(
        STT_PATH,
        StatusCode::INTERNAL_SERVER_ERROR,
        "text/plain",
        b"provider exploded",
    );
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(multipart_request(
            "/api/speech-to-text",
            "audio",
            "audio/webm",
            b"audio",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Transcription failed");
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("500"), "details: {details}");
    assert!(details.contains("provider exploded"), "details: {details}");

    assert_eq!(entries(dir.path()), 0, "upload was not removed after failure");
}

#[tokio::test]
async fn test_speech_to_text_without_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, stt) =
        mock_route(STT_PATH, StatusCode::OK, "application/json", br#"{"text":"x"}"#);
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(multipart_request(
            "/api/speech-to-text",
            "other",
            "audio/webm",
            b"audio",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No audio file uploaded");
    assert_eq!(stt.count(), 0);
}

#[tokio::test]
async fn test_speech_to_text_rejects_empty_audio() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, stt) =
        mock_route(STT_PATH, StatusCode::OK, "application/json", br#"{"text":"x"}"#);
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(multipart_request(
            "/api/speech-to-text",
            "audio",
            "audio/webm",
            b"",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stt.count(), 0);
}

#[tokio::test]
async fn test_normalization_failure_submits_original_audio() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, stt) =
        mock_route(STT_PATH, StatusCode::OK, "application/json", br#"{"text":"ok"}"#);
    let voice = spawn_mock(voice_router).await;
    let normalizer = AudioNormalizer::new("/nonexistent/otter-ffmpeg");
    let app = router(state(&voice, &voice, dir.path(), Some(normalizer)));

    let response = app
        .oneshot(multipart_request(
            "/api/speech-to-text",
            "audio",
            "audio/webm",
            b"original-bytes",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = stt.requests();
    assert!(contains(&requests[0].body, b"original-bytes"));
    assert_eq!(entries(dir.path()), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_normalized_audio_is_submitted_and_removed() {
    use std::os::unix::fs::PermissionsExt;

    let bin = tempfile::tempdir().unwrap();
    let script = bin.path().join("ffmpeg");
    std::fs::write(
        &script,
        "#!/bin/sh\nfor last; do :; done\nprintf 'RIFFnormalized' > \"$last\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let (voice_router, stt) =
        mock_route(STT_PATH, StatusCode::OK, "application/json", br#"{"text":"ok"}"#);
    let voice = spawn_mock(voice_router).await;
    let app = router(state(
        &voice,
        &voice,
        dir.path(),
        Some(AudioNormalizer::new(&script)),
    ));

    let response = app
        .oneshot(multipart_request(
            "/api/speech-to-text",
            "audio",
            "audio/webm",
            b"original-bytes",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = &stt.requests()[0].body;
    assert!(contains(body, b"RIFFnormalized"));
    assert!(!contains(body, b"original-bytes"));
    assert_eq!(entries(dir.path()), 0, "temp files left behind");
}

#[tokio::test]
async fn test_text_to_speech_requires_text() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, tts) = mock_route(TTS_PATH, StatusCode::OK, "audio/mpeg", b"mp3");
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    for body in [json!({}), json!({ "text": "" }), json!({ "text": "   " })] {
        let response = app
            .clone()
            .oneshot(json_request("/api/text-to-speech", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Text is required");
    }

    assert_eq!(tts.count(), 0);
}

#[tokio::test]
async fn test_text_to_speech_returns_mpeg() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, tts) =
        mock_route(TTS_PATH, StatusCode::OK, "audio/mpeg", b"ID3-fake-mp3");
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(json_request(
            "/api/text-to-speech",
            &json!({ "text": "Hello there" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "audio/mpeg");
    assert_eq!(response.headers()["content-length"], "12");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ID3-fake-mp3");

    let requests = tts.requests();
    assert_eq!(requests[0].path, "/v1/text-to-speech/default-voice");
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["text"], "Hello there");
    assert_eq!(sent["model_id"], "eleven_monolingual_v1");
    assert_eq!(sent["voice_settings"]["stability"], 0.5);
}

#[tokio::test]
async fn test_text_to_speech_honours_voice_id() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, tts) = mock_route(TTS_PATH, StatusCode::OK, "audio/mpeg", b"mp3");
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(json_request(
            "/api/text-to-speech",
            &json!({ "text": "Hi", "voice_id": "custom" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(tts.requests()[0].path, "/v1/text-to-speech/custom");
}

#[tokio::test]
async fn test_text_to_speech_upstream_error() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, _) = mock_route(
        TTS_PATH,
        StatusCode::UNAUTHORIZED,
        "application/json",
        br#"{"detail":"invalid key"}"#,
    );
    let voice = spawn_mock(voice_router).await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(json_request("/api/text-to-speech", &json!({ "text": "Hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Text-to-speech failed");
    assert!(body["details"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn test_chat_relays_body_and_reply() {
    let dir = tempfile::tempdir().unwrap();
    let (rag_router, rag) = mock_route(
        CHAT_PATH,
        StatusCode::OK,
        "application/json",
        br#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"Answer"}}]}"#,
    );
    let rag_url = spawn_mock(rag_router).await;
    let app = router(state(&rag_url, &rag_url, dir.path(), None));

    let request = json!({
        "model": "gpt-4",
        "messages": [{ "role": "user", "content": "Question" }],
        "stream": false,
    });
    let response = app
        .oneshot(json_request("/api/chat", &request))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "c1");
    assert_eq!(body["choices"][0]["message"]["content"], "Answer");

    let sent: serde_json::Value = serde_json::from_slice(&rag.requests()[0].body).unwrap();
    assert_eq!(sent, request);
}

#[tokio::test]
async fn test_chat_upstream_error_includes_backend_url() {
    let dir = tempfile::tempdir().unwrap();
    let (rag_router, _) = mock_route(
        CHAT_PATH,
        StatusCode::SERVICE_UNAVAILABLE,
        "text/plain",
        b"index loading",
    );
    let rag_url = spawn_mock(rag_router).await;
    let app = router(state(&rag_url, &rag_url, dir.path(), None));

    let response = app
        .oneshot(json_request(
            "/api/chat",
            &json!({ "model": "gpt-4", "messages": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to get response from RAG backend");
    assert!(body["details"].as_str().unwrap().contains("503"));
    assert_eq!(body["backend_url"], format!("{rag_url}{CHAT_PATH}"));
}

#[tokio::test]
async fn test_chat_unreachable_backend() {
    let dir = tempfile::tempdir().unwrap();
    let rag_url = closed_url().await;
    let app = router(state(&rag_url, &rag_url, dir.path(), None));

    let response = app
        .oneshot(json_request(
            "/api/chat",
            &json!({ "model": "gpt-4", "messages": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["details"], "RAG backend is unreachable");
    assert_eq!(body["backend_url"], format!("{rag_url}{CHAT_PATH}"));
}

#[tokio::test]
async fn test_chat_rejects_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    let rag_url = closed_url().await;
    let app = router(state(&rag_url, &rag_url, dir.path(), None));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_agent_id_is_empty_when_unset() {
    let dir = tempfile::tempdir().unwrap();
    let url = closed_url().await;
    let app = router(state(&url, &url, dir.path(), None));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/getAgentId")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "agentId": "" }));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/signed-url")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Failed to get signed URL");
}

#[tokio::test]
async fn test_speech_to_text_timeout_is_unreachable_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, stt) = slow_route(STT_PATH, STALL);
    let voice = spawn_mock(voice_router).await;
    let app = router(Arc::new(build_state(
        &voice,
        &voice,
        dir.path(),
        None,
        SHORT_TIMEOUT,
    )));

    let response = app
        .oneshot(multipart_request(
            "/api/speech-to-text",
            "audio",
            "audio/webm",
            b"slow-audio",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Transcription failed");
    assert_eq!(body["details"], "speech-to-text service is unreachable");
    assert_eq!(stt.count(), 1);

    assert_eq!(entries(dir.path()), 0, "upload was not removed after timeout");
}

#[tokio::test]
async fn test_speech_to_text_unreachable_provider_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let voice = closed_url().await;
    let app = router(state(&voice, &voice, dir.path(), None));

    let response = app
        .oneshot(multipart_request(
            "/api/speech-to-text",
            "audio",
            "audio/webm",
            b"audio",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["details"],
        "speech-to-text service is unreachable"
    );
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn test_chat_timeout_matches_unreachable_backend() {
    let dir = tempfile::tempdir().unwrap();
    let (rag_router, rag) = slow_route(CHAT_PATH, STALL);
    let rag_url = spawn_mock(rag_router).await;
    let app = router(Arc::new(build_state(
        &rag_url,
        &rag_url,
        dir.path(),
        None,
        SHORT_TIMEOUT,
    )));

    let response = app
        .oneshot(json_request(
            "/api/chat",
            &json!({ "model": "gpt-4", "messages": [{ "role": "user", "content": "hi" }] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to get response from RAG backend");
    assert_eq!(body["details"], "RAG backend is unreachable");
    assert_eq!(body["backend_url"], format!("{rag_url}{CHAT_PATH}"));
    assert_eq!(rag.count(), 1);
}

#[tokio::test]
async fn test_agent_id_is_reported_without_provider_key() {
    let dir = tempfile::tempdir().unwrap();
    let url = closed_url().await;
    let mut state = build_state(&url, &url, dir.path(), None, Duration::from_secs(5));
    state.agent_id = Some("agent-7".to_string());
    let app = router(Arc::new(state));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/getAgentId")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "agentId": "agent-7" }));
}

#[tokio::test]
async fn test_signed_url_is_fetched_for_agent() {
    let dir = tempfile::tempdir().unwrap();
    let (voice_router, agent) = mock_route(
        SIGNED_URL_PATH,
        StatusCode::OK,
        "application/json",
        br#"{"signed_url":"wss://agents.example/convai?token=abc"}"#,
    );
    let voice = spawn_mock(voice_router).await;
    let timeout = Duration::from_secs(5);
    let mut state = build_state(&voice, &voice, dir.path(), None, timeout);
    state.agent = Some(
        AgentClient::new(
            &voice,
            SecretString::from(common::API_KEY.to_string()),
            "agent-7",
            timeout,
        )
        .unwrap(),
    );
    let app = router(Arc::new(state));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/signed-url")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "signedUrl": "wss://agents.example/convai?token=abc" })
    );

    let requests = agent.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, SIGNED_URL_PATH);
    assert_eq!(requests[0].headers["xi-api-key"], common::API_KEY);
}
