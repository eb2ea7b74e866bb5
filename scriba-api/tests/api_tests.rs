//! HTTP API integration tests
//!
//! Run against the real router with an in-memory database and a temp
//! storage directory, in open mode (no identity service) so no session
//! plumbing is needed. Vendor-facing paths are exercised with local
//! stand-in servers.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use scriba_api::{build_router, AppState};
use scriba_common::config::AppConfig;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    db: SqlitePool,
    _storage_dir: tempfile::TempDir,
}

async fn spawn_app(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let storage_dir = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.storage.root_folder = storage_dir.path().to_path_buf();
    configure(&mut config);

    let db = SqlitePool::connect(":memory:").await.unwrap();
    scriba_common::db::init_tables(&db).await.unwrap();

    let state = AppState::new(db.clone(), config).unwrap();
    TestApp {
        router: build_router(state),
        db,
        _storage_dir: storage_dir,
    }
}

async fn default_app() -> TestApp {
    spawn_app(|_| {}).await
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_project(app: &TestApp, title: &str, source_type: &str, url: Option<&str>) -> i64 {
    let mut payload = json!({ "title": title, "source_type": source_type });
    if let Some(url) = url {
        payload["source_url"] = json!(url);
    }

    let (status, body) = send(&app.router, json_request("POST", "/api/projects", payload)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

fn multipart_upload(uri: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let boundary = "test-boundary-7f9a2c";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: audio/mpeg\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Spawn a local axum server, returning its address
async fn serve_local(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn health_reports_ok() {
    let app = default_app().await;

    let (status, body) = send(&app.router, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "scriba-api");
}

#[tokio::test]
async fn open_mode_exposes_the_local_user() {
    let app = default_app().await;

    let (status, body) = send(&app.router, get_request("/api/users/me")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "local");
}

#[tokio::test]
async fn project_crud_roundtrip() {
    let app = default_app().await;

    let id = create_project(&app, "Interview", "upload", None).await;

    let (status, body) = send(&app.router, get_request(&format!("/api/projects/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Interview");
    assert_eq!(body["source_type"], "upload");
    assert!(body["transcript_text"].is_null());

    let (status, body) = send(&app.router, get_request("/api/projects")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_project_is_404() {
    let app = default_app().await;

    let (status, body) = send(&app.router, get_request("/api/projects/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn create_project_validates_input() {
    let app = default_app().await;

    let cases = [
        json!({ "title": "  ", "source_type": "upload" }),
        json!({ "title": "T", "source_type": "stream" }),
        json!({ "title": "T", "source_type": "url" }),
        json!({ "title": "T", "source_type": "url", "source_url": "ftp://x/a.mp3" }),
        json!({ "title": "T", "source_type": "url", "source_url": "not a url" }),
    ];

    for payload in cases {
        let (status, body) =
            send(&app.router, json_request("POST", "/api/projects", payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {} -> {}", payload, body);
    }
}

#[tokio::test]
async fn upload_then_download_roundtrip() {
    let app = default_app().await;
    let id = create_project(&app, "Podcast", "upload", None).await;

    let (status, body) = send(
        &app.router,
        multipart_upload(&format!("/api/projects/{}/upload", id), "episode.mp3", b"ID3fake"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["file_name"], "episode.mp3");
    assert_eq!(body["file_size"], 7);

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/projects/{}/file", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "audio/mpeg"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ID3fake");
}

#[tokio::test]
async fn upload_rejects_disallowed_extension() {
    let app = default_app().await;
    let id = create_project(&app, "Notes", "upload", None).await;

    let (status, body) = send(
        &app.router,
        multipart_upload(&format!("/api/projects/{}/upload", id), "notes.txt", b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
}

#[tokio::test]
async fn upload_far_over_the_cap_is_413() {
    let app = default_app().await;
    let id = create_project(&app, "Huge", "upload", None).await;

    // 52 MB payload: well past the 50 MB cap and past the router's body
    // limit, so the failure happens while the body is being read
    let content = vec![0u8; 52 * 1024 * 1024];
    let (status, body) = send(
        &app.router,
        multipart_upload(&format!("/api/projects/{}/upload", id), "huge.mp3", &content),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{}", body);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn upload_to_url_project_is_rejected() {
    let app = default_app().await;
    let id = create_project(&app, "Linked", "url", Some("https://example.com/a.mp3")).await;

    let (status, _) = send(
        &app.router,
        multipart_upload(&format!("/api/projects/{}/upload", id), "a.mp3", b"x"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transcript_edit_is_persisted() {
    let app = default_app().await;
    let id = create_project(&app, "Edited", "upload", None).await;

    let (status, body) = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/projects/{}/transcript", id),
            json!({ "transcript_text": "corrected text" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcript_text"], "corrected text");
}

#[tokio::test]
async fn transcribe_unknown_project_is_404() {
    let app = default_app().await;

    let (status, _) = send(
        &app.router,
        json_request("POST", "/api/transcribe", json!({ "project_id": 42 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transcribe_without_a_source_is_400() {
    let app = default_app().await;
    let id = create_project(&app, "Empty", "upload", None).await;

    let (status, _) = send(
        &app.router,
        json_request("POST", "/api/transcribe", json!({ "project_id": id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_media_source_url_is_400() {
    let page = Router::new().route(
        "/page",
        get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html></html>") }),
    );
    let addr = serve_local(page).await;

    let app = default_app().await;
    let id = create_project(
        &app,
        "Web page",
        "url",
        Some(&format!("http://{}/page", addr)),
    )
    .await;

    let (status, body) = send(
        &app.router,
        json_request("POST", "/api/transcribe", json!({ "project_id": id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("text/html"));
}

#[tokio::test]
async fn transcribe_with_no_providers_is_502_and_marks_the_project_failed() {
    let media = Router::new().route(
        "/a.mp3",
        get(|| async { ([(header::CONTENT_TYPE, "audio/mpeg")], &b"fake"[..]) }),
    );
    let addr = serve_local(media).await;

    let app = default_app().await;
    let id = create_project(&app, "No keys", "url", Some(&format!("http://{}/a.mp3", addr))).await;

    let (status, body) = send(
        &app.router,
        json_request("POST", "/api/transcribe", json!({ "project_id": id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "BAD_GATEWAY");

    let (_, project) = send(&app.router, get_request(&format!("/api/projects/{}", id))).await;
    assert_eq!(project["provider_used"], "failed");
    assert!(project["last_error"].as_str().unwrap().contains("no transcription provider"));
}

#[tokio::test]
async fn subtitles_reject_unknown_format() {
    let app = default_app().await;
    let id = create_project(&app, "T", "upload", None).await;

    let (status, _) = send(
        &app.router,
        get_request(&format!("/api/subtitles/ass?project_id={}", id)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subtitles_without_transcript_are_404() {
    let app = default_app().await;
    let id = create_project(&app, "T", "upload", None).await;

    for format in ["srt", "vtt"] {
        let (status, _) = send(
            &app.router,
            get_request(&format!("/api/subtitles/{}?project_id={}", format, id)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "format {}", format);
    }
}

#[tokio::test]
async fn subtitles_are_generated_from_the_stored_transcript() {
    let app = default_app().await;
    let id = create_project(&app, "T", "upload", None).await;

    let (status, _) = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/projects/{}/transcript", id),
            json!({ "transcript_text": "First sentence. Second sentence." }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/subtitles/srt?project_id={}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-subrip"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"subtitles.srt\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("1\n00:00:00,000 --> "));
    assert!(text.contains("First sentence."));

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/subtitles/vtt?project_id={}", id)))
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().starts_with("WEBVTT\n\n"));
}

#[tokio::test]
async fn tts_without_a_key_is_400() {
    let app = default_app().await;

    let (status, body) = send(
        &app.router,
        json_request("POST", "/api/tts", json!({ "text": "hello", "voice_id": "v1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("text-to-speech"));
}

#[tokio::test]
async fn diagnostic_reports_configured_secrets() {
    let app = spawn_app(|config| {
        config.providers.openai_api_key = Some("sk-test".to_string());
    })
    .await;
    let id = create_project(&app, "Diag", "upload", None).await;

    let (status, body) = send(
        &app.router,
        get_request(&format!("/api/projects/{}/diagnostic", id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["secrets_status"]["openai"], true);
    assert_eq!(body["secrets_status"]["assemblyai"], false);
    assert_eq!(body["file_info"]["source"], "upload");
    assert!(body["provider_used"].is_null());

    // Sanity: the db handle observes the same project
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(row.0, 1);
}

// ---------------------------------------------------------------------------
// Vendor stand-in servers
// ---------------------------------------------------------------------------

/// Minimal AssemblyAI look-alike whose job completes after one pending poll
fn fake_assemblyai(poll_counter: Arc<AtomicUsize>, final_status: &'static str) -> Router {
    Router::new()
        .route(
            "/upload",
            post(|| async { Json(json!({ "upload_url": "https://cdn.invalid/audio" })) }),
        )
        .route(
            "/transcript",
            post(|| async {
                Json(json!({ "id": "tr-1", "status": "queued", "text": null, "error": null }))
            }),
        )
        .route(
            "/transcript/:id",
            get(move |_: axum::extract::Path<String>| {
                let counter = poll_counter.clone();
                async move {
                    let polls = counter.fetch_add(1, Ordering::SeqCst);
                    if polls == 0 {
                        Json(json!({ "id": "tr-1", "status": "processing", "text": null, "error": null }))
                    } else {
                        match final_status {
                            "completed" => Json(json!({
                                "id": "tr-1", "status": "completed",
                                "text": "ola mundo", "error": null
                            })),
                            _ => Json(json!({
                                "id": "tr-1", "status": "error",
                                "text": null, "error": "transcoding failed"
                            })),
                        }
                    }
                }
            }),
        )
}

#[tokio::test]
async fn assemblyai_polls_until_the_job_completes() {
    use scriba_api::services::providers::{AssemblyAiClient, TranscriptionProvider};
    use tokio_util::sync::CancellationToken;

    let polls = Arc::new(AtomicUsize::new(0));
    let addr = serve_local(fake_assemblyai(polls.clone(), "completed")).await;

    let client = AssemblyAiClient::new(
        reqwest::Client::new(),
        "key".to_string(),
        "pt".to_string(),
        CancellationToken::new(),
    )
    .with_endpoint(format!("http://{}", addr))
    .with_polling(Duration::from_millis(10), 10);

    let transcript = client
        .transcribe(bytes::Bytes::from_static(b"audio"), "audio/mpeg")
        .await
        .unwrap();

    assert_eq!(transcript.text, "ola mundo");
    assert_eq!(transcript.transcript_id.as_deref(), Some("tr-1"));
    assert_eq!(polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn assemblyai_job_error_surfaces_as_job_failed() {
    use scriba_api::services::providers::{
        AssemblyAiClient, ProviderError, TranscriptionProvider,
    };
    use tokio_util::sync::CancellationToken;

    let polls = Arc::new(AtomicUsize::new(0));
    let addr = serve_local(fake_assemblyai(polls, "error")).await;

    let client = AssemblyAiClient::new(
        reqwest::Client::new(),
        "key".to_string(),
        "pt".to_string(),
        CancellationToken::new(),
    )
    .with_endpoint(format!("http://{}", addr))
    .with_polling(Duration::from_millis(10), 10);

    let err = client
        .transcribe(bytes::Bytes::from_static(b"audio"), "audio/mpeg")
        .await
        .unwrap_err();

    match err {
        ProviderError::JobFailed(message) => assert!(message.contains("transcoding failed")),
        other => panic!("expected JobFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn assemblyai_poll_budget_exhaustion_is_a_timeout() {
    use scriba_api::services::providers::{
        AssemblyAiClient, ProviderError, TranscriptionProvider,
    };
    use tokio_util::sync::CancellationToken;

    // Job that never leaves the queue
    let stuck = Router::new()
        .route(
            "/upload",
            post(|| async { Json(json!({ "upload_url": "https://cdn.invalid/audio" })) }),
        )
        .route(
            "/transcript",
            post(|| async {
                Json(json!({ "id": "tr-2", "status": "queued", "text": null, "error": null }))
            }),
        )
        .route(
            "/transcript/:id",
            get(|| async {
                Json(json!({ "id": "tr-2", "status": "queued", "text": null, "error": null }))
            }),
        );
    let addr = serve_local(stuck).await;

    let client = AssemblyAiClient::new(
        reqwest::Client::new(),
        "key".to_string(),
        "pt".to_string(),
        CancellationToken::new(),
    )
    .with_endpoint(format!("http://{}", addr))
    .with_polling(Duration::from_millis(5), 3);

    let err = client
        .transcribe(bytes::Bytes::from_static(b"audio"), "audio/mpeg")
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Timeout { attempts: 3 }));
}

#[tokio::test]
async fn openai_stand_in_transcribes_multipart_audio() {
    use scriba_api::services::providers::{OpenAiClient, TranscriptionProvider};

    let whisper = Router::new().route(
        "/v1/audio/transcriptions",
        post(|| async { Json(json!({ "text": "fallback transcript" })) }),
    );
    let addr = serve_local(whisper).await;

    let client = OpenAiClient::new(
        reqwest::Client::new(),
        "sk-test".to_string(),
        "pt".to_string(),
    )
    .with_endpoint(format!("http://{}/v1/audio/transcriptions", addr));

    let transcript = client
        .transcribe(bytes::Bytes::from_static(b"audio"), "audio/mpeg")
        .await
        .unwrap();

    assert_eq!(transcript.text, "fallback transcript");
    assert!(transcript.transcript_id.is_none());
}

#[tokio::test]
async fn deepgram_stand_in_parses_the_first_alternative() {
    use scriba_api::services::providers::{DeepgramClient, TranscriptionProvider};

    let listen = Router::new().route(
        "/listen",
        post(|| async {
            Json(json!({
                "results": {
                    "channels": [
                        { "alternatives": [ { "transcript": "tertiary transcript" } ] }
                    ]
                }
            }))
        }),
    );
    let addr = serve_local(listen).await;

    let client = DeepgramClient::new(
        reqwest::Client::new(),
        "dg-test".to_string(),
        "pt-BR".to_string(),
    )
    .with_endpoint(format!("http://{}/listen", addr));

    let transcript = client
        .transcribe(bytes::Bytes::from_static(b"audio"), "audio/mpeg")
        .await
        .unwrap();

    assert_eq!(transcript.text, "tertiary transcript");
}
