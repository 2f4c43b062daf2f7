use axum::{body::to_bytes, http::Request, Router};
use serde_json::Value;
use template_render::{config::Config, routes, state::AppState};
use tower::ServiceExt;

fn app(config: Config) -> Router {
    let state = AppState::new(config);
    Router::new()
        .merge(routes::health::router())
        .merge(routes::png::router())
        .merge(routes::video::router())
        .with_state(state)
}

#[tokio::test]
async fn health_returns_ok_and_data_root() {
    let mut config = Config::default();
    config.data_root = "/srv/render-data".into();

    let response = app(config)
        .oneshot(
            Request::builder()
                .uri("/health")
                .method("GET")
                .body(axum::body::Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(json.get("ok").and_then(Value::as_bool), Some(true));
    assert_eq!(
        json.get("dataRoot").and_then(Value::as_str),
        Some("/srv/render-data")
    );
}
