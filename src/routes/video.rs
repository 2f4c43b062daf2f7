use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::error::AppError;
use crate::pipeline::compose::background_video_path;
use crate::state::AppState;
use crate::types::request::RenderRequest;

pub fn router() -> Router<AppState> {
    Router::new().route("/render/video", post(render_video))
}

async fn render_video(
    State(state): State<AppState>,
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    let video = req.into_video_request()?;
    // Reject bad locators before any rendering resource is touched.
    background_video_path(&video.assets)?;

    tracing::info!(
        template = %video.template,
        width = video.width,
        height = video.height,
        fps = video.fps,
        duration_sec = video.duration_sec,
        include_audio = video.include_audio,
        "Composing video"
    );

    let mp4 = state.composer().compose_video(video).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "video/mp4"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        mp4,
    ))
}
