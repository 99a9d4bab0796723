use crate::models::Window;
use crate::poller::PollConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the stats endpoint, e.g. "http://127.0.0.1:8080".
    pub origin: String,
    /// Raw-sample tail bound passed on every request.
    #[serde(default = "default_tail")]
    pub tail: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default)]
    pub window: Window,
    /// Seconds between automatic refreshes; 0 = manual only.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default)]
    pub filter: String,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            window: Window::default(),
            refresh_secs: default_refresh_secs(),
            filter: String::new(),
        }
    }
}

fn default_tail() -> u64 {
    200_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_refresh_secs() -> u64 {
    15
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let mut config: AppConfig = toml::from_str(s)?;
        // A trailing slash would produce "...//stats" request paths.
        while config.backend.origin.ends_with('/') {
            config.backend.origin.pop();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.backend.origin.starts_with("http://") || self.backend.origin.starts_with("https://"),
            "backend.origin must be an http(s) URL, got {:?}",
            self.backend.origin
        );
        anyhow::ensure!(self.backend.tail > 0, "backend.tail must be > 0");
        anyhow::ensure!(
            self.backend.request_timeout_secs > 0,
            "backend.request_timeout_secs must be > 0"
        );
        Ok(())
    }

    /// Initial poll configuration for the controller.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            window: self.polling.window,
            refresh_secs: self.polling.refresh_secs,
            filter: self.polling.filter.clone(),
        }
    }
}
