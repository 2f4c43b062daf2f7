use axum::Router;
use mimalloc::MiMalloc;
use template_render::{config, pipeline::process, routes, state};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "template_render=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();

    match process::run(&config.ffmpeg_path, ["-version"], config.process_timeout).await {
        Ok(output) => tracing::info!(
            "Using {}",
            output.stdout.lines().next().unwrap_or(&config.ffmpeg_path)
        ),
        Err(err) => tracing::warn!("ffmpeg unavailable, video rendering will fail: {}", err),
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let max_body_size = config.max_body_size;
    tracing::info!("Templates root: {}", config.templates_root.display());

    let state = state::AppState::new(config);

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::png::router())
        .merge(routes::video::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    tracing::info!("Template renderer listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("PNG: POST http://{}/render/png", addr);
    tracing::info!("Video: POST http://{}/render/video", addr);

    axum::serve(listener, app).await.unwrap();
}
