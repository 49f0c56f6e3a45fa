// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::link::{Backoff, LinkConfig};
use crate::render::Theme;
use crate::stream::DashboardConfig;
use crate::types::ConnectionMode;

pub const CONFIG_FILE_NAME: &str = "voxmon.json";
pub const CONFIG_PATH_ENV: &str = "VOXMON_CONFIG";
pub const WS_URL_ENV: &str = "VOXMON_WS_URL";
pub const API_URL_ENV: &str = "VOXMON_API_URL";
pub const FALLBACK_WS_URL: &str = "ws://localhost:8000/ws-dashboard";
const DASHBOARD_PATH: &str = "/ws-dashboard";

/// Settings file contents. Every field is optional in the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Direct WebSocket endpoint.
    pub ws_url: Option<String>,
    /// HTTP base URL of the server; converted to its dashboard socket.
    pub api_url: Option<String>,
    pub device_source: String,
    pub command_target: String,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub throttle_ms: u64,
    pub waveform_points: usize,
    pub spectrogram_columns: usize,
    pub log_rows: usize,
    pub start_mode: ConnectionMode,
    pub theme: Theme,
    pub export_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let dashboard = DashboardConfig::default();
        let backoff = Backoff::default();
        Self {
            ws_url: None,
            api_url: None,
            device_source: "esp32".to_owned(),
            command_target: "esp32".to_owned(),
            backoff_base_ms: backoff.base.as_millis() as u64,
            backoff_max_ms: backoff.max.as_millis() as u64,
            throttle_ms: dashboard.throttle.as_millis() as u64,
            waveform_points: dashboard.waveform_capacity,
            spectrogram_columns: dashboard.spectrogram_capacity,
            log_rows: dashboard.log_rows,
            start_mode: ConnectionMode::Live,
            theme: Theme::Dark,
            export_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Reads the settings file named by `VOXMON_CONFIG` (or `voxmon.json`
    /// in the working directory). Unreadable or invalid files fall back to
    /// defaults with a warning; a missing file is not worth one.
    pub fn load_or_default() -> Self {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        if !path.exists() {
            log::info!("no settings file at {path:?}, using defaults");
            return Self::default();
        }
        match Self::read(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("[config] {err:#}");
                Self::default()
            }
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
        serde_json::from_str(&contents).with_context(|| format!("failed to parse {path:?}"))
    }

    /// Environment first, then the file, then the local default.
    pub fn resolve_ws_url(&self) -> String {
        let ws_env = std::env::var(WS_URL_ENV).ok();
        let api_env = std::env::var(API_URL_ENV).ok();
        self.resolve_ws_url_with(ws_env.as_deref(), api_env.as_deref())
    }

    fn resolve_ws_url_with(&self, ws_env: Option<&str>, api_env: Option<&str>) -> String {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }
        if let Some(url) = non_empty(ws_env).or(non_empty(self.ws_url.as_deref())) {
            return url.to_owned();
        }
        if let Some(api) = non_empty(api_env).or(non_empty(self.api_url.as_deref())) {
            return api_to_ws_url(api);
        }
        FALLBACK_WS_URL.to_owned()
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            url: self.resolve_ws_url(),
            device_source: self.device_source.clone(),
            backoff: Backoff::new(
                Duration::from_millis(self.backoff_base_ms),
                Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
            ),
        }
    }

    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            waveform_capacity: self.waveform_points,
            spectrogram_capacity: self.spectrogram_columns,
            log_rows: self.log_rows,
            throttle: Duration::from_millis(self.throttle_ms),
        }
    }
}

/// `https://` → `wss://`, `http://` → `ws://`, bare host → `ws://host`,
/// with the dashboard path appended.
pub fn api_to_ws_url(api: &str) -> String {
    let api = api.trim_end_matches('/');
    let base = if let Some(rest) = api.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{api}")
    };
    base + DASHBOARD_PATH
}
