use std::path::PathBuf;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} timed out after {}ms", .timeout.as_millis())]
    Timeout { command: String, timeout: Duration },
    #[error("{command} exited with code {}: {output}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        output: String,
    },
    #[error("I/O error while running {command}: {message}")]
    Io { command: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid template name: {0}")]
    InvalidTemplateName(String),
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Browser error: {0}")]
    Engine(String),
    #[error("Template did not signal readiness within {}ms", .0.as_millis())]
    ReadyTimeout(Duration),
    #[error("Frame capture failed: {0}")]
    Capture(String),
    #[error("Render worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("Composition I/O failed: {0}")]
    Io(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// Malformed or mistyped bodies share the validation contract.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// Machine-readable code and HTTP status for this failure.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Render(err) => classify_render(err),
            AppError::Compose(ComposeError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Compose(ComposeError::Render(err)) => classify_render(err),
            AppError::Compose(ComposeError::Process(err)) => classify_process(err),
            AppError::Compose(ComposeError::Io(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "COMPOSITION_FAILED")
            }
        }
    }
}

fn classify_render(err: &RenderError) -> (StatusCode, &'static str) {
    match err {
        RenderError::InvalidTemplateName(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        RenderError::TemplateNotFound(_) => (StatusCode::NOT_FOUND, "TEMPLATE_NOT_FOUND"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_FAILED"),
    }
}

fn classify_process(err: &ProcessError) -> (StatusCode, &'static str) {
    match err {
        ProcessError::Spawn { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESS_SPAWN_FAILED"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMPOSITION_FAILED"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        if status.is_server_error() {
            tracing::error!(code, "{}", self);
        } else {
            tracing::info!(code, "{}", self);
        }

        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
