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
use postcraft_evals::llm_client::{DEFAULT_EMBEDDING_MODEL, OPENAI_BASE_URL};
use postcraft_evals::EvalConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Postcraft Server Configuration
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default)]
    pub evaluation: EvalConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "0.0.0.0:5006")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Allowed CORS origins (empty = allow all)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct LLMConfig {
    /// OpenAI API key; generation and evaluation are refused without it
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub generation_model: String,

    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,

    /// Model backing the criteria judge
    #[serde(default = "default_model")]
    pub evaluation_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Timeout for outbound provider calls in seconds
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,
}

// Default values
fn default_http_addr() -> String {
    "0.0.0.0:5006".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_enable_cors() -> bool {
    true
}

fn default_base_url() -> String {
    OPENAI_BASE_URL.to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_generation_temperature() -> f32 {
    0.7
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            request_timeout_secs: default_request_timeout(),
            enable_cors: default_enable_cors(),
            cors_origins: vec![],
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            base_url: default_base_url(),
            generation_model: default_model(),
            generation_temperature: default_generation_temperature(),
            evaluation_model: default_model(),
            embedding_model: default_embedding_model(),
            request_timeout_secs: default_llm_timeout(),
        }
    }
}

impl LLMConfig {
    /// API key if one is configured and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

// Keeps the API key out of startup logs
impl fmt::Debug for LLMConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMConfig")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("base_url", &self.base_url)
            .field("generation_model", &self.generation_model)
            .field("generation_temperature", &self.generation_temperature)
            .field("evaluation_model", &self.evaluation_model)
            .field("embedding_model", &self.embedding_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("server", &self.server)
            .field("llm", &self.llm)
            .field("evaluation", &self.evaluation)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - POSTCRAFT_HTTP_ADDR: HTTP listen address (default: 0.0.0.0:5006)
    /// - PORT: listen port on 0.0.0.0, ignored when POSTCRAFT_HTTP_ADDR is set
    /// - POSTCRAFT_REQUEST_TIMEOUT: Request timeout in seconds (default: 300)
    /// - POSTCRAFT_ENABLE_CORS: Enable CORS (default: true)
    /// - OPENAI_API_KEY: provider credential
    /// - OPENAI_BASE_URL: OpenAI-compatible endpoint
    /// - GENERATION_MODEL: post generation model (default: gpt-4o)
    /// - EVALUATION_MODEL: criteria judge model (default: gpt-4o)
    /// - EMBEDDING_MODEL: embedding model (default: text-embedding-3-small)
    /// - POSTCRAFT_EVAL_THRESHOLD: default pass threshold (default: 0.7)
    /// - POSTCRAFT_MAX_CONCURRENT_CASES: batch worker pool size (default: 4)
    /// - POSTCRAFT_STRING_DISTANCE: jaro_winkler or levenshtein (default: jaro_winkler)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server configuration
        if let Ok(addr) = std::env::var("POSTCRAFT_HTTP_ADDR") {
            config.server.listen_addr = addr;
        } else if let Ok(port) = std::env::var("PORT") {
            config.server.listen_addr = format!("0.0.0.0:{}", port);
        }

        if let Ok(timeout) = std::env::var("POSTCRAFT_REQUEST_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                config.server.request_timeout_secs = val;
            }
        }

        if let Ok(cors) = std::env::var("POSTCRAFT_ENABLE_CORS") {
            config.server.enable_cors = cors.parse().unwrap_or(true);
        }

        // LLM configuration
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }

        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.base_url = base_url;
        }

        if let Ok(model) = std::env::var("GENERATION_MODEL") {
            config.llm.generation_model = model;
        }

        if let Ok(model) = std::env::var("EVALUATION_MODEL") {
            config.llm.evaluation_model = model;
        }

        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }

        // Evaluation configuration
        if let Ok(threshold) = std::env::var("POSTCRAFT_EVAL_THRESHOLD") {
            if let Ok(val) = threshold.parse() {
                config.evaluation.default_threshold = val;
            }
        }

        if let Ok(cases) = std::env::var("POSTCRAFT_MAX_CONCURRENT_CASES") {
            if let Ok(val) = cases.parse() {
                config.evaluation.max_concurrent_cases = val;
            }
        }

        if let Ok(algorithm) = std::env::var("POSTCRAFT_STRING_DISTANCE") {
            match algorithm.parse() {
                Ok(kind) => config.evaluation.string_distance = kind,
                Err(e) => tracing::warn!("Ignoring POSTCRAFT_STRING_DISTANCE: {}", e),
            }
        }

        config
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(Self::merge_with_env(config))
    }

    /// Merge config with environment variables (env takes priority)
    fn merge_with_env(mut config: Self) -> Self {
        let env_config = Self::from_env();
        let is_set = |name: &str| std::env::var(name).is_ok();

        // Only override if env var was explicitly set
        if is_set("POSTCRAFT_HTTP_ADDR") || is_set("PORT") {
            config.server.listen_addr = env_config.server.listen_addr;
        }
        if is_set("POSTCRAFT_REQUEST_TIMEOUT") {
            config.server.request_timeout_secs = env_config.server.request_timeout_secs;
        }
        if is_set("POSTCRAFT_ENABLE_CORS") {
            config.server.enable_cors = env_config.server.enable_cors;
        }
        if is_set("OPENAI_API_KEY") {
            config.llm.openai_api_key = env_config.llm.openai_api_key;
        }
        if is_set("OPENAI_BASE_URL") {
            config.llm.base_url = env_config.llm.base_url;
        }
        if is_set("GENERATION_MODEL") {
            config.llm.generation_model = env_config.llm.generation_model;
        }
        if is_set("EVALUATION_MODEL") {
            config.llm.evaluation_model = env_config.llm.evaluation_model;
        }
        if is_set("EMBEDDING_MODEL") {
            config.llm.embedding_model = env_config.llm.embedding_model;
        }
        if is_set("POSTCRAFT_EVAL_THRESHOLD") {
            config.evaluation.default_threshold = env_config.evaluation.default_threshold;
        }
        if is_set("POSTCRAFT_MAX_CONCURRENT_CASES") {
            config.evaluation.max_concurrent_cases = env_config.evaluation.max_concurrent_cases;
        }
        if is_set("POSTCRAFT_STRING_DISTANCE") {
            config.evaluation.string_distance = env_config.evaluation.string_distance;
        }

        config
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        let threshold = self.evaluation.default_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!(
                "Default evaluation threshold must be between 0.0 and 1.0, got {}",
                threshold
            );
        }

        if self.evaluation.max_concurrent_cases == 0 {
            anyhow::bail!("max_concurrent_cases must be at least 1");
        }

        if self.evaluation.metric_timeout_secs == 0 {
            anyhow::bail!("metric_timeout_secs must be at least 1");
        }

        Ok(())
    }
}
