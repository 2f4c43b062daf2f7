//! Overlay-on-background video composition.
//!
//! A video request renders the template once as a transparent overlay, then
//! hands ffmpeg a looping background clip plus that overlay, trimmed to the
//! requested duration and frame rate. Intermediates live in a per-request
//! temporary directory that is removed on every exit path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::ComposeError;
use crate::pipeline::filter_graph::{self, FilterGraph};
use crate::pipeline::page::{FrameRequest, PageRenderer};
use crate::pipeline::process;

pub const FILE_SCHEME_PREFIX: &str = "file://";
const OUTPUT_LABEL: &str = "outv";
const MIN_DURATION_SEC: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub template: String,
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub fps: u32,
    pub duration_sec: f64,
    pub include_audio: bool,
    pub data: Value,
    pub assets: Value,
    pub options: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStage {
    Validating,
    RenderingOverlay,
    Composing,
    Done,
}

impl fmt::Display for VideoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoStage::Validating => "validating",
            VideoStage::RenderingOverlay => "rendering_overlay",
            VideoStage::Composing => "composing",
            VideoStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Extracts `assets.backgroundVideo` and converts it to a local path. Only
/// `file://` locators are accepted.
pub fn background_video_path(assets: &Value) -> Result<PathBuf, ComposeError> {
    let locator = assets
        .get("backgroundVideo")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ComposeError::Validation("assets.backgroundVideo is required".to_string()))?;

    if !locator.starts_with(FILE_SCHEME_PREFIX) {
        return Err(ComposeError::Validation(format!(
            "assets.backgroundVideo must be a {} URL",
            FILE_SCHEME_PREFIX
        )));
    }

    Url::parse(locator)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| {
            ComposeError::Validation(format!(
                "assets.backgroundVideo is not a valid local file URL: {}",
                locator
            ))
        })
}

/// Inputs and outputs of a single ffmpeg composition run.
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    pub background: PathBuf,
    pub overlay: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_sec: f64,
    pub include_audio: bool,
}

impl CompositionPlan {
    pub fn filter_graph(&self) -> FilterGraph {
        filter_graph::cover_and_overlay(self.width, self.height, OUTPUT_LABEL)
    }

    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-stream_loop".into(),
            "-1".into(),
            "-i".into(),
            self.background.to_string_lossy().into_owned(),
            "-loop".into(),
            "1".into(),
            "-i".into(),
            self.overlay.to_string_lossy().into_owned(),
            "-filter_complex".into(),
            self.filter_graph().to_string(),
            "-map".into(),
            format!("[{}]", OUTPUT_LABEL),
        ];

        if self.include_audio {
            args.extend(["-map", "0:a?", "-c:a", "aac"].map(String::from));
        } else {
            args.push("-an".into());
        }

        args.extend([
            "-t".to_string(),
            // Millisecond precision; never round a positive duration to zero.
            format!("{:.3}", self.duration_sec.max(MIN_DURATION_SEC)),
            "-r".to_string(),
            self.fps.to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            self.output.to_string_lossy().into_owned(),
        ]);
        args
    }
}

#[derive(Clone)]
pub struct VideoComposer {
    renderer: PageRenderer,
    ffmpeg_path: String,
    timeout: Duration,
    temp_root: PathBuf,
}

impl VideoComposer {
    pub fn new(
        renderer: PageRenderer,
        ffmpeg_path: String,
        timeout: Duration,
        temp_root: PathBuf,
    ) -> Self {
        Self {
            renderer,
            ffmpeg_path,
            timeout,
            temp_root,
        }
    }

    /// Produces MP4 bytes for the request.
    pub async fn compose_video(&self, request: VideoRequest) -> Result<Vec<u8>, ComposeError> {
        let started = Instant::now();
        let mut stage = VideoStage::Validating;

        if request.template.trim().is_empty() {
            return Err(ComposeError::Validation("template is required".to_string()));
        }
        let background = background_video_path(&request.assets)?;

        let dir = tempfile::Builder::new()
            .prefix("template-render-")
            .tempdir_in(&self.temp_root)
            .map_err(|err| ComposeError::Io(format!("Failed to create temp dir: {}", err)))?;
        let request_id = Uuid::new_v4();

        let result = self
            .compose_in(dir.path(), request_id, background, request, &mut stage)
            .await;

        release_dir(dir);

        match &result {
            Ok(bytes) => info!(
                %request_id,
                bytes = bytes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Composed video"
            ),
            Err(err) => warn!(%request_id, %stage, "Video composition failed: {}", err),
        }
        result
    }

    async fn compose_in(
        &self,
        dir: &Path,
        request_id: Uuid,
        background: PathBuf,
        request: VideoRequest,
        stage: &mut VideoStage,
    ) -> Result<Vec<u8>, ComposeError> {
        *stage = VideoStage::RenderingOverlay;
        let overlay_png = self
            .renderer
            .render_frame(FrameRequest {
                template: request.template,
                width: request.width,
                height: request.height,
                device_scale_factor: request.device_scale_factor,
                transparent: true,
                hide_background: true,
                data: request.data,
                assets: request.assets,
                options: request.options,
            })
            .await?;

        let overlay = dir.join(format!("overlay-{}.png", request_id));
        tokio::fs::write(&overlay, &overlay_png)
            .await
            .map_err(|err| ComposeError::Io(format!("Failed to write overlay: {}", err)))?;

        *stage = VideoStage::Composing;
        let plan = CompositionPlan {
            background,
            overlay,
            output: dir.join(format!("out-{}.mp4", request_id)),
            width: request.width,
            height: request.height,
            fps: request.fps,
            duration_sec: request.duration_sec,
            include_audio: request.include_audio,
        };
        let args = plan.args();
        debug!(%request_id, "Running {} {}", self.ffmpeg_path, args.join(" "));
        process::run(&self.ffmpeg_path, &args, self.timeout).await?;

        let bytes = tokio::fs::read(&plan.output)
            .await
            .map_err(|err| ComposeError::Io(format!("Failed to read composed video: {}", err)))?;

        *stage = VideoStage::Done;
        Ok(bytes)
    }
}

fn release_dir(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(err) = dir.close() {
        warn!(path = %path.display(), "Failed to remove temp dir: {}", err);
    }
}
