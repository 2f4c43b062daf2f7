use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::error::AppError;
use crate::state::AppState;
use crate::types::request::RenderRequest;

pub fn router() -> Router<AppState> {
    Router::new().route("/render/png", post(render_png))
}

async fn render_png(
    State(state): State<AppState>,
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    let frame = req.into_frame_request()?;

    tracing::info!(
        template = %frame.template,
        width = frame.width,
        height = frame.height,
        transparent = frame.transparent,
        "Rendering PNG"
    );

    let png = state.renderer().render_frame(frame).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    ))
}
