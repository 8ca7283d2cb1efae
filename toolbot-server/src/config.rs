// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolbot_core::AdmissionConfig;

/// Toolbot Server Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default)]
    pub admission: AdmissionSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address (e.g., "127.0.0.1:5000")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the conversation log
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Require an API key on chat and history routes (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Accepted API keys
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct LLMConfig {
    /// Gemini API key (required)
    pub gemini_api_key: Option<String>,

    /// Model used for every completion
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Generative Language API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: default_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

// Keeps the key out of the startup log
impl std::fmt::Debug for LLMConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMConfig")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionSettings {
    /// Maximum outbound model calls per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl From<&AdmissionSettings> for AdmissionConfig {
    fn from(settings: &AdmissionSettings) -> Self {
        AdmissionConfig {
            max_requests: settings.max_requests,
            window: Duration::from_secs(settings.window_secs),
        }
    }
}

// Default values
fn default_http_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./toolbot-data")
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_max_requests() -> u32 {
    15
}

fn default_window_secs() -> u64 {
    60
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from environment variables that are set.
    ///
    /// Supported environment variables:
    /// - TOOLBOT_HTTP_ADDR: HTTP listen address (default: 127.0.0.1:5000)
    /// - TOOLBOT_DATA_DIR: Data directory path (default: ./toolbot-data)
    /// - TOOLBOT_AUTH_ENABLED: Require API keys (default: false)
    /// - TOOLBOT_API_KEYS: Comma-separated API keys
    /// - GEMINI_API_KEY: Gemini API key
    /// - TOOLBOT_MODEL: Model name (default: gemini-2.0-flash)
    /// - TOOLBOT_RATE_LIMIT_RPM: Calls per window (default: 15)
    /// - TOOLBOT_RATE_LIMIT_WINDOW_SECS: Window in seconds (default: 60)
    pub fn apply_env(mut self) -> Self {
        if let Ok(addr) = std::env::var("TOOLBOT_HTTP_ADDR") {
            self.server.listen_addr = addr;
        }

        if let Ok(data_dir) = std::env::var("TOOLBOT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(enabled) = std::env::var("TOOLBOT_AUTH_ENABLED") {
            self.auth.enabled = enabled.parse().unwrap_or(false);
        }

        if let Ok(keys) = std::env::var("TOOLBOT_API_KEYS") {
            self.auth.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.llm.gemini_api_key = Some(key);
        }

        if let Ok(model) = std::env::var("TOOLBOT_MODEL") {
            self.llm.model = model;
        }

        if let Ok(rpm) = std::env::var("TOOLBOT_RATE_LIMIT_RPM") {
            if let Ok(val) = rpm.parse() {
                self.admission.max_requests = val;
            }
        }

        if let Ok(window) = std::env::var("TOOLBOT_RATE_LIMIT_WINDOW_SECS") {
            if let Ok(val) = window.parse() {
                self.admission.window_secs = val;
            }
        }

        self
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        Ok(config.apply_env())
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    pub fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig::from(&self.admission)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        self.admission_config().validate()?;

        if self
            .llm
            .gemini_api_key
            .as_deref()
            .map_or(true, |key| key.trim().is_empty())
        {
            anyhow::bail!("GEMINI_API_KEY not found in environment variables or config file");
        }

        if self.auth.enabled && self.auth.api_keys.is_empty() {
            anyhow::bail!("Authentication enabled but no API keys configured");
        }

        if !self.storage.data_dir.exists() {
            std::fs::create_dir_all(&self.storage.data_dir)?;
        }

        Ok(())
    }
}
