//! Template rendering through a shared headless browser.
//!
//! One browser process serves every request. Each render gets its own browser
//! context and tab, receives the request payload before any template script
//! runs, and is captured once the template raises its readiness flag.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::protocol::cdp::{Emulation, Page, Target};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::RenderError;

pub const ENTRY_DOCUMENT: &str = "index.html";
pub const CAPTURE_SELECTOR: &str = "#frame";
pub const BACKGROUND_SELECTOR: &str = "[data-layer=\"background\"]";
pub const READY_FLAG: &str = "window.__RENDER_READY__";

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(30);
const FONTS_TIMEOUT: Duration = Duration::from_secs(3);
// The browser lives as long as the service; never let the engine reap it.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Everything needed to render one frame of a template.
#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub template: String,
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub transparent: bool,
    pub hide_background: bool,
    pub data: Value,
    pub assets: Value,
    pub options: Value,
}

/// The browser process plus a tab in its default context. Per-request
/// contexts are disposed through that tab once their render tab is closed.
struct SharedBrowser {
    browser: Browser,
    control: Arc<Tab>,
}

#[derive(Clone)]
pub struct PageRenderer {
    templates_root: PathBuf,
    chrome_path: Option<PathBuf>,
    ready_timeout: Duration,
    browser: Arc<OnceCell<Arc<SharedBrowser>>>,
}

impl PageRenderer {
    pub fn new(templates_root: PathBuf, chrome_path: Option<PathBuf>, ready_timeout: Duration) -> Self {
        Self {
            templates_root,
            chrome_path,
            ready_timeout,
            browser: Arc::new(OnceCell::new()),
        }
    }

    /// Maps a template name to its entry document, failing if it is absent.
    pub async fn resolve_template(&self, name: &str) -> Result<PathBuf, RenderError> {
        let entry = template_entry_path(&self.templates_root, name)?;
        match tokio::fs::metadata(&entry).await {
            // Navigation needs an absolute file URL.
            Ok(meta) if meta.is_file() => tokio::fs::canonicalize(&entry)
                .await
                .map_err(|_| RenderError::TemplateNotFound(entry)),
            _ => Err(RenderError::TemplateNotFound(entry)),
        }
    }

    /// Renders the template and returns PNG bytes of the capture target.
    pub async fn render_frame(&self, request: FrameRequest) -> Result<Vec<u8>, RenderError> {
        let started = Instant::now();
        let entry = self.resolve_template(&request.template).await?;
        let browser = self.browser().await?;

        let init_script = payload_script(&request.data, &request.assets, &request.options);
        let ready_timeout = self.ready_timeout;
        let template = request.template.clone();

        let png = tokio::task::spawn_blocking(move || {
            capture(&browser, &entry, &request, &init_script, ready_timeout)
        })
        .await
        .map_err(|err| RenderError::Worker(err.to_string()))??;

        info!(
            template = %template,
            bytes = png.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered frame"
        );
        Ok(png)
    }

    /// Returns the shared browser, launching it on first use. Concurrent
    /// first callers all wait on the same launch.
    async fn browser(&self) -> Result<Arc<SharedBrowser>, RenderError> {
        self.browser
            .get_or_try_init(|| async {
                let chrome_path = self.chrome_path.clone();
                info!("Launching shared headless browser");
                tokio::task::spawn_blocking(move || launch(chrome_path))
                    .await
                    .map_err(|err| RenderError::Worker(err.to_string()))?
                    .map(Arc::new)
            })
            .await
            .cloned()
    }
}

/// Joins `name` under `root`, refusing anything that could escape it.
pub fn template_entry_path(root: &Path, name: &str) -> Result<PathBuf, RenderError> {
    let trimmed = name.trim();
    let relative = Path::new(trimmed);
    let escapes = trimmed.is_empty()
        || relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
    if escapes {
        return Err(RenderError::InvalidTemplateName(name.to_string()));
    }
    Ok(root.join(relative).join(ENTRY_DOCUMENT))
}

/// Script registered before navigation so the payload exists before any
/// template code runs.
pub fn payload_script(data: &Value, assets: &Value, options: &Value) -> String {
    format!(
        "(() => {{\n  window.__RENDER_DATA__ = {};\n  window.__RENDER_ASSETS__ = {};\n  window.__RENDER_OPTIONS__ = {};\n  {} = false;\n}})();",
        data, assets, options, READY_FLAG
    )
}

fn hide_background_script() -> String {
    format!(
        "(() => {{\n  const style = document.createElement('style');\n  style.textContent = '{} {{ display: none !important; }}';\n  (document.head || document.documentElement).appendChild(style);\n}})();",
        BACKGROUND_SELECTOR
    )
}

/// Waits for web fonts, resolving `true` anyway once `timeout` has passed.
pub fn fonts_ready_script(timeout: Duration) -> String {
    format!(
        "(document.fonts && document.fonts.ready) ? Promise.race([document.fonts.ready.then(() => true), new Promise((resolve) => setTimeout(() => resolve(true), {}))]) : true",
        timeout.as_millis()
    )
}

const DOCUMENT_PARSED_SCRIPT: &str =
    "location.protocol === 'file:' && document.readyState !== 'loading'";

fn launch(chrome_path: Option<PathBuf>) -> Result<SharedBrowser, RenderError> {
    let options = LaunchOptionsBuilder::default()
        .headless(true)
        .sandbox(false)
        .path(chrome_path)
        .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
        .args(vec![
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--hide-scrollbars"),
            OsStr::new("--allow-file-access-from-files"),
            OsStr::new("--force-color-profile=srgb"),
        ])
        .build()
        .map_err(|err| RenderError::Launch(err.to_string()))?;
    let browser = Browser::new(options).map_err(|err| RenderError::Launch(err.to_string()))?;
    let control = browser
        .new_tab()
        .map_err(|err| RenderError::Launch(err.to_string()))?;
    Ok(SharedBrowser { browser, control })
}

fn capture(
    shared: &SharedBrowser,
    entry: &Path,
    request: &FrameRequest,
    init_script: &str,
    ready_timeout: Duration,
) -> Result<Vec<u8>, RenderError> {
    let context = shared.browser.new_context().map_err(engine_error)?;
    let context_id = context.get_id().to_string();
    let result = match context.new_tab() {
        Ok(tab) => {
            let result = drive(&tab, entry, request, init_script, ready_timeout);
            release_tab(&tab, &context_id);
            result
        }
        Err(err) => Err(engine_error(err)),
    };
    release_context(&shared.control, context_id);
    result
}

fn drive(
    tab: &Tab,
    entry: &Path,
    request: &FrameRequest,
    init_script: &str,
    ready_timeout: Duration,
) -> Result<Vec<u8>, RenderError> {
    tab.set_default_timeout(ready_timeout);
    tab.call_method(Emulation::SetDeviceMetricsOverride {
        width: request.width,
        height: request.height,
        device_scale_factor: request.device_scale_factor,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    })
    .map_err(engine_error)?;

    if request.transparent {
        tab.set_transparent_background_color().map_err(engine_error)?;
    }

    tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
        source: init_script.to_string(),
        world_name: None,
        include_command_line_api: None,
        run_immediately: None,
    })
    .map_err(engine_error)?;

    let url = Url::from_file_path(entry)
        .map_err(|_| RenderError::Engine(format!("Not an absolute path: {}", entry.display())))?;
    tab.navigate_to(url.as_str()).map_err(engine_error)?;

    if !poll_until(DOCUMENT_TIMEOUT, POLL_INTERVAL, || eval_bool(tab, DOCUMENT_PARSED_SCRIPT)) {
        return Err(RenderError::Engine(format!(
            "Document {} was not parsed within {}ms",
            url,
            DOCUMENT_TIMEOUT.as_millis()
        )));
    }

    if request.hide_background {
        tab.evaluate(&hide_background_script(), false)
            .map_err(engine_error)?;
    }

    tab.set_default_timeout(FONTS_TIMEOUT + POLL_INTERVAL);
    if let Err(err) = tab.evaluate(&fonts_ready_script(FONTS_TIMEOUT), true) {
        debug!("Font readiness unavailable: {}", err);
    }
    tab.set_default_timeout(ready_timeout);

    let ready_check = format!("{} === true", READY_FLAG);
    if !poll_until(ready_timeout, POLL_INTERVAL, || eval_bool(tab, &ready_check)) {
        return Err(RenderError::ReadyTimeout(ready_timeout));
    }

    let element = tab
        .find_element(CAPTURE_SELECTOR)
        .map_err(|err| RenderError::Capture(format!("{} not found: {}", CAPTURE_SELECTOR, err)))?;
    // Clip is in CSS pixels; the emulated scale factor sets the output density.
    let clip = element
        .get_box_model()
        .map_err(|err| RenderError::Capture(err.to_string()))?
        .content_viewport();

    tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, Some(clip), true)
        .map_err(|err| RenderError::Capture(err.to_string()))
}

/// Polls `predicate` until it holds or `timeout` elapses. Returns whether it held.
pub fn poll_until<F>(timeout: Duration, interval: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(interval);
    }
}

fn eval_bool(tab: &Tab, expression: &str) -> bool {
    tab.evaluate(expression, false)
        .ok()
        .and_then(|object| object.value)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

/// Best-effort release; the render outcome is already decided.
fn release_tab(tab: &Tab, context_id: &str) {
    if let Err(err) = tab.close(true) {
        warn!(context_id, "Failed to close render tab: {}", err);
    }
}

fn release_context(control: &Tab, context_id: String) {
    let dispose = Target::DisposeBrowserContext {
        browser_context_id: context_id.clone(),
    };
    if let Err(err) = control.call_method(dispose) {
        warn!(context_id = %context_id, "Failed to dispose browser context: {}", err);
    }
}

fn engine_error(err: impl std::fmt::Display) -> RenderError {
    RenderError::Engine(err.to_string())
}
