use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "camera_hid.toml";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// REST API のベース URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// リクエストタイムアウト (ms)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// イベントストリームの接続先 (host:port)
    #[serde(default = "default_sync_addr")]
    pub addr: String,
    /// 統計ポーリング間隔 (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 切断後の再接続待ち (ms)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// カウントダウン秒数
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u32,
    /// スナップショット取得のタイムアウト (ms)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CanvasConfig {
    #[serde(default = "default_canvas_width")]
    pub width: usize,
    #[serde(default = "default_canvas_height")]
    pub height: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// ログ出力ディレクトリ
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// tracing のフィルタ (RUST_LOG が優先)
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_base_url() -> String { "http://127.0.0.1:5000".to_string() }
fn default_request_timeout_ms() -> u64 { 3000 }
fn default_sync_addr() -> String { "127.0.0.1:5001".to_string() }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_reconnect_delay_ms() -> u64 { 2000 }
fn default_countdown_secs() -> u32 { crate::capture::COUNTDOWN_SECS }
fn default_fetch_timeout_ms() -> u64 { 4000 }
fn default_canvas_width() -> usize { 640 }
fn default_canvas_height() -> usize { 360 }
fn default_log_dir() -> String { "logs".to_string() }
fn default_log_filter() -> String { "info".to_string() }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            addr: default_sync_addr(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            countdown_secs: default_countdown_secs(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: default_canvas_width(),
            height: default_canvas_height(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            filter: default_log_filter(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl CaptureConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl CanvasConfig {
    pub fn size(&self) -> crate::pose::CanvasSize {
        crate::pose::CanvasSize::new(self.width as f64, self.height as f64)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// ファイルがなければデフォルト値で起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.backend.request_timeout(), Duration::from_millis(3000));
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.sync.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(config.capture.countdown_secs, 5);
        assert_eq!(config.capture.fetch_timeout(), Duration::from_secs(4));
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn test_partial_section() {
        let config: Config = toml::from_str(
            r#"
            [sync]
            addr = "192.168.2.121:5001"
            [capture]
            countdown_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.addr, "192.168.2.121:5001");
        assert_eq!(config.sync.poll_interval_ms, 1000);
        assert_eq!(config.capture.countdown_secs, 3);
        assert_eq!(config.capture.fetch_timeout_ms, 4000);
        assert_eq!(config.canvas.width, 640);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.sync.addr, "127.0.0.1:5001");
    }
}
