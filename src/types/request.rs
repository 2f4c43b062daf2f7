use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::pipeline::compose::VideoRequest;
use crate::pipeline::normalize;
use crate::pipeline::page::FrameRequest;

pub const DEFAULT_WIDTH: u32 = 1080;
pub const DEFAULT_HEIGHT: u32 = 1920;
pub const DEFAULT_DEVICE_SCALE_FACTOR: f64 = 1.0;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_DURATION_SEC: f64 = 6.0;

const MAX_DIM: u32 = 4096;
const MAX_MEGAPIXELS: f64 = 16.0;
const MAX_DEVICE_SCALE_FACTOR: f64 = 4.0;
const MAX_FPS: u32 = 120;
const MAX_DURATION_SEC: f64 = 600.0;

/// Body shared by `/render/png` and `/render/video`. Numeric fields stay raw
/// JSON until normalized so malformed values fall back instead of rejecting
/// the request.
#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub transparent: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub assets: Option<Value>,
    #[serde(default)]
    pub options: Option<Value>,
}

impl RenderRequest {
    /// The template name, or a validation error if it is missing or blank.
    pub fn template(&self) -> Result<&str, AppError> {
        self.template
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::BadRequest("template is required".to_string()))
    }

    fn dimensions(&self) -> Result<(u32, u32), AppError> {
        let width = normalize::positive_u32(self.width.as_ref(), DEFAULT_WIDTH);
        let height = normalize::positive_u32(self.height.as_ref(), DEFAULT_HEIGHT);
        validate_dimensions(width, height)?;
        Ok((width, height))
    }

    fn option(&self, key: &str) -> Option<&Value> {
        self.options.as_ref().and_then(|options| options.get(key))
    }

    fn device_scale_factor(&self) -> f64 {
        normalize::positive_f64(self.option("deviceScaleFactor"), DEFAULT_DEVICE_SCALE_FACTOR)
            .min(MAX_DEVICE_SCALE_FACTOR)
    }

    pub fn into_frame_request(self) -> Result<FrameRequest, AppError> {
        let template = self.template()?.to_string();
        let (width, height) = self.dimensions()?;
        let device_scale_factor = self.device_scale_factor();
        let transparent = normalize::strict_bool(self.transparent.as_ref());

        Ok(FrameRequest {
            template,
            width,
            height,
            device_scale_factor,
            transparent,
            hide_background: false,
            data: object_or_empty(self.data),
            assets: object_or_empty(self.assets),
            options: object_or_empty(self.options),
        })
    }

    pub fn into_video_request(self) -> Result<VideoRequest, AppError> {
        let template = self.template()?.to_string();
        let (width, height) = self.dimensions()?;
        let device_scale_factor = self.device_scale_factor();
        let fps = normalize::positive_u32(self.option("fps"), DEFAULT_FPS);
        let duration_sec = normalize::positive_f64(self.option("durationSec"), DEFAULT_DURATION_SEC);
        let include_audio = normalize::strict_bool(self.option("includeAudio"));
        validate_timing(fps, duration_sec)?;

        Ok(VideoRequest {
            template,
            width,
            height,
            device_scale_factor,
            fps,
            duration_sec,
            include_audio,
            data: object_or_empty(self.data),
            assets: object_or_empty(self.assets),
            options: object_or_empty(self.options),
        })
    }
}

pub fn validate_dimensions(width: u32, height: u32) -> Result<(), AppError> {
    if width > MAX_DIM || height > MAX_DIM {
        return Err(AppError::BadRequest(format!(
            "Invalid dimensions: {}x{}. Width/height must not exceed {}",
            width, height, MAX_DIM
        )));
    }

    let megapixels = (width as f64 * height as f64) / 1_000_000.0;
    if megapixels > MAX_MEGAPIXELS {
        return Err(AppError::BadRequest(format!(
            "Frame too large: {}x{} ({:.2} MP). Max allowed is {:.1} MP",
            width, height, megapixels, MAX_MEGAPIXELS
        )));
    }

    Ok(())
}

pub fn validate_timing(fps: u32, duration_sec: f64) -> Result<(), AppError> {
    if fps > MAX_FPS {
        return Err(AppError::BadRequest(format!(
            "Invalid fps: {}. Must not exceed {}",
            fps, MAX_FPS
        )));
    }

    if duration_sec > MAX_DURATION_SEC {
        return Err(AppError::BadRequest(format!(
            "Invalid durationSec: {}. Must not exceed {}",
            duration_sec, MAX_DURATION_SEC
        )));
    }

    Ok(())
}

fn object_or_empty(value: Option<Value>) -> Value {
    match value {
        Some(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}
