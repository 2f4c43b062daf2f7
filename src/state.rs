use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::compose::VideoComposer;
use crate::pipeline::page::PageRenderer;

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    renderer: PageRenderer,
    composer: VideoComposer,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let renderer = PageRenderer::new(
            config.templates_root.clone(),
            config.chrome_path.clone(),
            config.ready_timeout,
        );
        let composer = VideoComposer::new(
            renderer.clone(),
            config.ffmpeg_path.clone(),
            config.compose_timeout,
            config.temp_root.clone(),
        );
        Self {
            config: Arc::new(config),
            renderer,
            composer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &PageRenderer {
        &self.renderer
    }

    pub fn composer(&self) -> &VideoComposer {
        &self.composer
    }
}
