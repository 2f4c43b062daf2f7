use std::path::Path;

use axum::{body::to_bytes, http::Request, Router};
use serde_json::Value;
use template_render::{config::Config, routes, state::AppState};
use tower::ServiceExt;

fn app(templates_root: &Path, temp_root: &Path) -> Router {
    let mut config = Config::default();
    config.templates_root = templates_root.to_path_buf();
    config.temp_root = temp_root.to_path_buf();
    let state = AppState::new(config);
    Router::new().merge(routes::video::router()).with_state(state)
}

async fn post_video(app: Router, body: Value) -> axum::response::Response {
    post_video_raw(app, body.to_string()).await
}

async fn post_video_raw(app: Router, body: String) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .uri("/render/video")
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .expect("request"),
    )
    .await
    .expect("response")
}

async fn error_code(response: axum::response::Response) -> String {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: Value = serde_json::from_slice(&body).expect("json");
    json.get("error")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read dir").count()
}

#[tokio::test]
async fn render_video_requires_template() {
    let templates = tempfile::tempdir().expect("tempdir");
    let scratch = tempfile::tempdir().expect("tempdir");
    let response = post_video(
        app(templates.path(), scratch.path()),
        serde_json::json!({"assets": {"backgroundVideo": "file:///bg.mp4"}}),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn render_video_requires_background_video() {
    let templates = tempfile::tempdir().expect("tempdir");
    let scratch = tempfile::tempdir().expect("tempdir");
    let response = post_video(
        app(templates.path(), scratch.path()),
        serde_json::json!({"template": "card", "assets": {}}),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn render_video_rejects_remote_background_video() {
    let templates = tempfile::tempdir().expect("tempdir");
    let scratch = tempfile::tempdir().expect("tempdir");
    let response = post_video(
        app(templates.path(), scratch.path()),
        serde_json::json!({
            "template": "card",
            "assets": {"backgroundVideo": "https://example.com/bg.mp4"}
        }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn render_video_cleans_up_after_render_failure() {
    let templates = tempfile::tempdir().expect("tempdir");
    let scratch = tempfile::tempdir().expect("tempdir");
    let response = post_video(
        app(templates.path(), scratch.path()),
        serde_json::json!({
            "template": "missing",
            "assets": {"backgroundVideo": "file:///bg.mp4"},
            "options": {"fps": 24, "durationSec": 2}
        }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "TEMPLATE_NOT_FOUND");
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
#[ignore = "requires a local Chrome/Chromium plus ffmpeg and ffprobe"]
async fn render_video_composes_exact_duration_and_rate() {
    let templates = tempfile::tempdir().expect("tempdir");
    let scratch = tempfile::tempdir().expect("tempdir");
    let media = tempfile::tempdir().expect("tempdir");

    let dir = templates.path().join("card");
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(
        dir.join("index.html"),
        r#"<html><head><style>html,body{margin:0}#frame{width:320px;height:240px}</style>
<script>window.__RENDER_READY__ = true;</script></head>
<body><div id="frame"><div data-layer="background" style="background:#000;width:100%;height:100%"></div></div></body></html>"#,
    )
    .expect("write template");

    let background = media.path().join("bg.mp4");
    let status = std::process::Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-f", "lavfi", "-i", "testsrc=size=640x360:rate=30", "-t", "1"])
        .arg(&background)
        .status()
        .expect("ffmpeg");
    assert!(status.success());

    let locator = url::Url::from_file_path(&background).expect("file url").to_string();
    let response = post_video(
        app(templates.path(), scratch.path()),
        serde_json::json!({
            "template": "card",
            "width": 320,
            "height": 240,
            "assets": {"backgroundVideo": locator},
            "options": {"fps": 24, "durationSec": 2}
        }),
    )
    .await;

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
        "video/mp4"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    assert_eq!(entries(scratch.path()), 0);

    let output = media.path().join("out.mp4");
    std::fs::write(&output, &bytes).expect("write output");
    let inspected = std::process::Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate:format=duration",
            "-of", "json",
        ])
        .arg(&output)
        .output()
        .expect("ffprobe");
    let json: Value = serde_json::from_slice(&inspected.stdout).expect("ffprobe json");
    let stream = &json["streams"][0];
    assert_eq!(stream["width"].as_u64(), Some(320));
    assert_eq!(stream["height"].as_u64(), Some(240));
    assert_eq!(stream["r_frame_rate"].as_str(), Some("24/1"));
    let duration: f64 = json["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse().ok())
        .expect("duration");
    assert!((duration - 2.0).abs() < 0.1, "duration {duration}");
}

#[tokio::test]
async fn render_video_rejects_mistyped_template_as_validation_error() {
    let templates = tempfile::tempdir().expect("tempdir");
    let scratch = tempfile::tempdir().expect("tempdir");
    let response = post_video(
        app(templates.path(), scratch.path()),
        serde_json::json!({"template": 5}),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn render_video_rejects_non_json_body_as_validation_error() {
    let templates = tempfile::tempdir().expect("tempdir");
    let scratch = tempfile::tempdir().expect("tempdir");
    let response = post_video_raw(
        app(templates.path(), scratch.path()),
        "nope".to_string(),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn render_video_rejects_out_of_range_timing() {
    let templates = tempfile::tempdir().expect("tempdir");
    let scratch = tempfile::tempdir().expect("tempdir");

    for options in [
        serde_json::json!({"fps": 100000}),
        serde_json::json!({"durationSec": 1e20}),
    ] {
        let response = post_video(
            app(templates.path(), scratch.path()),
            serde_json::json!({
                "template": "card",
                "assets": {"backgroundVideo": "file:///bg.mp4"},
                "options": options
            }),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST, "{options}");
        assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    }
    assert_eq!(entries(scratch.path()), 0);
}
