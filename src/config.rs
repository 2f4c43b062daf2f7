use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_root: PathBuf,
    pub templates_root: PathBuf,
    /// Browser binary; `None` lets the engine locate an installed Chrome/Chromium.
    pub chrome_path: Option<PathBuf>,
    pub ffmpeg_path: String,
    pub ready_timeout: Duration,
    pub process_timeout: Duration,
    pub compose_timeout: Duration,
    /// Parent of the per-request scratch directories.
    pub temp_root: PathBuf,
    pub max_body_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_root = PathBuf::from("./data");
        Self {
            port: 3000,
            templates_root: data_root.join("templates"),
            data_root,
            chrome_path: None,
            ffmpeg_path: "ffmpeg".to_string(),
            ready_timeout: Duration::from_millis(20_000),
            process_timeout: Duration::from_millis(120_000),
            compose_timeout: Duration::from_millis(180_000),
            temp_root: std::env::temp_dir(),
            max_body_size: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let data_root = std::env::var("DATA_ROOT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_root);

        let templates_root = std::env::var("TEMPLATES_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root.join("templates"));

        let chrome_path = std::env::var("CHROME_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let ffmpeg_path = std::env::var("FFMPEG_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.ffmpeg_path);

        let ready_timeout = env_parse("READY_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.ready_timeout);

        let process_timeout = env_parse("PROCESS_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.process_timeout);

        let compose_timeout = env_parse("COMPOSE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.compose_timeout);

        let temp_root = std::env::var("RENDER_TMP_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.temp_root);

        let max_body_size = env_parse::<usize>("MAX_BODY_MB")
            .map(|mb| mb * 1024 * 1024)
            .unwrap_or(defaults.max_body_size);

        Self {
            port,
            data_root,
            templates_root,
            chrome_path,
            ffmpeg_path,
            ready_timeout,
            process_timeout,
            compose_timeout,
            temp_root,
            max_body_size,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
