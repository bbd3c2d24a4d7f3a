//! Application settings and configuration
//!
//! This module provides configuration management for the broker,
//! loading settings from environment variables with sensible defaults.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::services::credential_pool::{DispatchMode, MIN_OWNER_ID_LEN};
use crate::utils::timeout::TimeoutConfig;

/// Repository deployed when neither the request nor the store names one
pub const DEFAULT_REPOSITORY: &str = "https://github.com/TeamYukki/YukkiMusicBot";

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!(
                "Invalid environment: {}. Expected: development, staging, or production",
                s
            ),
        }
    }
}

/// Provisioning platform endpoints and the fixed deployment parameters
/// sent with every create call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    pub api_base: String,
    pub dashboard_base: String,
    pub service_type: String,
    pub runtime: String,
    pub region: String,
    pub plan: String,
    pub name_prefix: String,
    /// Page size requested by the load probe
    pub list_limit: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.render.com/v1".to_string(),
            dashboard_base: "https://dashboard.render.com".to_string(),
            service_type: "web_service".to_string(),
            runtime: "docker".to_string(),
            region: "singapore".to_string(),
            plan: "free".to_string(),
            name_prefix: "bot".to_string(),
            list_limit: 100,
        }
    }
}

/// Credential selection and failover policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    /// Credentials with this many resources or more are never selected
    pub capacity_ceiling: usize,
    /// Blind mode only: stop at the first non-retryable rejection
    pub abort_on_rejection: bool,
    /// Drop empty-valued environment variables before configuring
    pub filter_empty_env: bool,
    /// Owner id substituted when a credential line carries none
    pub fallback_owner_id: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::LoadBased,
            capacity_ceiling: 2,
            abort_on_rejection: false,
            filter_empty_env: true,
            fallback_owner_id: "default".to_string(),
        }
    }
}

/// Best-effort side registration endpoints. Unset endpoints are skipped.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SideRegistrationConfig {
    pub uptime_url: Option<String>,
    pub log_link_url: Option<String>,
}

/// Where the credential pool and defaults are kept
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// JSON document path; `None` selects the in-memory store
    pub path: Option<PathBuf>,
    /// Initial credential blob for the in-memory store
    #[serde(skip_serializing)]
    pub seed_credentials: Option<String>,
    pub default_repository: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            seed_credentials: None,
            default_repository: DEFAULT_REPOSITORY.to_string(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Server settings
    pub host: String,
    pub port: u16,

    pub platform: PlatformConfig,
    pub dispatch: DispatchConfig,
    pub side_registration: SideRegistrationConfig,
    pub store: StoreConfig,

    #[serde(skip)]
    pub timeouts: TimeoutConfig,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        let settings = Self {
            app_name: env_or_default("APP_NAME", "deploy-broker"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: env_or_default("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
            log_level: env_or_default("LOG_LEVEL", "info"),

            host: env_or_default("HOST", "0.0.0.0"),
            port: env_or_default("PORT", "8000")
                .parse()
                .context("Invalid PORT value")?,

            platform: PlatformConfig {
                api_base: env_or_default("PLATFORM_API_BASE", "https://api.render.com/v1"),
                dashboard_base: env_or_default(
                    "PLATFORM_DASHBOARD_BASE",
                    "https://dashboard.render.com",
                ),
                service_type: env_or_default("SERVICE_TYPE", "web_service"),
                runtime: env_or_default("SERVICE_RUNTIME", "docker"),
                region: env_or_default("SERVICE_REGION", "singapore"),
                plan: env_or_default("SERVICE_PLAN", "free"),
                name_prefix: env_or_default("SERVICE_NAME_PREFIX", "bot"),
                list_limit: env_or_default("PROBE_LIST_LIMIT", "100")
                    .parse()
                    .unwrap_or(100),
            },

            dispatch: DispatchConfig {
                mode: DispatchMode::from_str(&env_or_default("DISPATCH_MODE", "load_based")),
                capacity_ceiling: env_or_default("CAPACITY_CEILING", "2")
                    .parse()
                    .context("Invalid CAPACITY_CEILING value")?,
                abort_on_rejection: env_or_default("ABORT_ON_REJECTION", "false")
                    .parse()
                    .unwrap_or(false),
                filter_empty_env: env_or_default("FILTER_EMPTY_ENV", "true")
                    .parse()
                    .unwrap_or(true),
                fallback_owner_id: env_or_default("FALLBACK_OWNER_ID", "default"),
            },

            side_registration: SideRegistrationConfig {
                uptime_url: non_empty_env("UPTIME_REGISTRAR_URL"),
                log_link_url: non_empty_env("LOG_LINK_ISSUER_URL"),
            },

            store: StoreConfig {
                path: non_empty_env("CONFIG_STORE_PATH").map(PathBuf::from),
                seed_credentials: non_empty_env("DEPLOY_CREDENTIALS"),
                default_repository: env_or_default("DEFAULT_REPOSITORY", DEFAULT_REPOSITORY),
            },

            timeouts: TimeoutConfig::from_env(),
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        if self.dispatch.capacity_ceiling == 0 {
            anyhow::bail!("CAPACITY_CEILING must be > 0");
        }

        if self.dispatch.fallback_owner_id.trim().len() < MIN_OWNER_ID_LEN {
            anyhow::bail!(
                "FALLBACK_OWNER_ID must be at least {} characters",
                MIN_OWNER_ID_LEN
            );
        }

        if self.platform.api_base.trim().is_empty() {
            anyhow::bail!("PLATFORM_API_BASE cannot be empty");
        }

        if self.environment == Environment::Production && self.store.path.is_none() {
            tracing::warn!("Running in production with an in-memory credential store!");
        }

        Ok(())
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "deploy-broker".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            platform: PlatformConfig::default(),
            dispatch: DispatchConfig::default(),
            side_registration: SideRegistrationConfig::default(),
            store: StoreConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
