use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for front-desk
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrontDeskConfig {
    /// Dashboard API settings
    pub api: ApiConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the dashboard API
    pub base_url: String,
    /// Bearer token (can be set via env var)
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second limit
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

impl Default for FrontDeskConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8080/api".to_string(),
                token: None, // Read from env at load time
                timeout_seconds: 30,
                rate_limit: RateLimitConfig {
                    requests_per_second: 5,
                    burst_capacity: 10,
                },
            },
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
        }
    }
}

impl FrontDeskConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (front-desk.toml)
    /// 3. Environment variables (prefixed with FRONT_DESK_)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&FrontDeskConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("front-desk.toml").exists() {
            builder = builder.add_source(File::with_name("front-desk"));
        }

        builder = builder.add_source(
            Environment::with_prefix("FRONT_DESK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut front_desk_config: FrontDeskConfig = config.try_deserialize()?;

        // Token fallback: plain env var wins when the layered sources left it unset.
        if front_desk_config.api.token.is_none() {
            if let Ok(token) = std::env::var("FRONT_DESK_API_TOKEN") {
                front_desk_config.api.token = Some(token);
            }
        }

        Ok(front_desk_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
