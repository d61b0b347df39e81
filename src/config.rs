//! Configuration module for azure-webapp
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/azure-webapp/config.toml)
//! - User configuration (~/.azure-webapp.toml)
//! - Project configuration (./azure-webapp.toml)
//! - Environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_WEB_API_VERSION: &str = "2022-03-01";
pub const DEFAULT_RESOURCES_API_VERSION: &str = "2021-04-01";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Azure Resource Manager settings
    pub azure: AzureConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Colors and output settings
    pub colors: ColorsConfig,
}

/// Azure Resource Manager connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Subscription that owns the resource groups
    pub subscription_id: Option<String>,

    /// Azure AD tenant for the client-credentials grant
    pub tenant_id: Option<String>,

    /// Service principal application id
    pub client_id: Option<String>,

    /// Service principal secret
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,

    /// Pre-acquired bearer token, used instead of the service principal
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// Management endpoint
    pub resource_manager_endpoint: String,

    /// Azure AD authority
    pub authority_host: String,

    /// `api-version` for `Microsoft.Web` calls
    pub web_api_version: String,

    /// `api-version` for `Microsoft.Resources` calls
    pub resources_api_version: String,

    /// Per-request HTTP timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Delay between long-running operation polls when the service gives none
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Upper bound for waiting on a long-running operation
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            resource_manager_endpoint: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            web_api_version: DEFAULT_WEB_API_VERSION.to_string(),
            resources_api_version: DEFAULT_RESOURCES_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(600),
        }
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("AzureConfig")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("access_token", &redact(&self.access_token))
            .field("resource_manager_endpoint", &self.resource_manager_endpoint)
            .field("authority_host", &self.authority_host)
            .field("web_api_version", &self.web_api_version)
            .field("resources_api_version", &self.resources_api_version)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to this file
    pub log_path: Option<PathBuf>,

    /// Default filter when neither `-v` nor `RUST_LOG` is given
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub enabled: bool,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from files and environment
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Explicit path takes priority
        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        paths.push(PathBuf::from("/etc/azure-webapp/config.toml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".azure-webapp.toml"));
        }

        paths.push(PathBuf::from("azure-webapp.toml"));

        paths
    }

    fn merge_from_file(&self, path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    fn merge(&self, other: Config) -> Config {
        let defaults = AzureConfig::default();
        let pick = |theirs: String, ours: &String, default: &String| {
            if &theirs != default {
                theirs
            } else {
                ours.clone()
            }
        };
        let pick_duration = |theirs: Duration, ours: Duration, default: Duration| {
            if theirs != default {
                theirs
            } else {
                ours
            }
        };

        Config {
            azure: AzureConfig {
                subscription_id: other
                    .azure
                    .subscription_id
                    .or_else(|| self.azure.subscription_id.clone()),
                tenant_id: other
                    .azure
                    .tenant_id
                    .or_else(|| self.azure.tenant_id.clone()),
                client_id: other
                    .azure
                    .client_id
                    .or_else(|| self.azure.client_id.clone()),
                client_secret: other
                    .azure
                    .client_secret
                    .or_else(|| self.azure.client_secret.clone()),
                access_token: other
                    .azure
                    .access_token
                    .or_else(|| self.azure.access_token.clone()),
                resource_manager_endpoint: pick(
                    other.azure.resource_manager_endpoint,
                    &self.azure.resource_manager_endpoint,
                    &defaults.resource_manager_endpoint,
                ),
                authority_host: pick(
                    other.azure.authority_host,
                    &self.azure.authority_host,
                    &defaults.authority_host,
                ),
                web_api_version: pick(
                    other.azure.web_api_version,
                    &self.azure.web_api_version,
                    &defaults.web_api_version,
                ),
                resources_api_version: pick(
                    other.azure.resources_api_version,
                    &self.azure.resources_api_version,
                    &defaults.resources_api_version,
                ),
                request_timeout: pick_duration(
                    other.azure.request_timeout,
                    self.azure.request_timeout,
                    defaults.request_timeout,
                ),
                poll_interval: pick_duration(
                    other.azure.poll_interval,
                    self.azure.poll_interval,
                    defaults.poll_interval,
                ),
                operation_timeout: pick_duration(
                    other.azure.operation_timeout,
                    self.azure.operation_timeout,
                    defaults.operation_timeout,
                ),
            },
            logging: LoggingConfig {
                log_path: other
                    .logging
                    .log_path
                    .or_else(|| self.logging.log_path.clone()),
                log_level: other.logging.log_level,
                log_format: other.logging.log_format,
            },
            colors: other.colors,
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        if let Some(v) = env("AZURE_SUBSCRIPTION_ID") {
            self.azure.subscription_id = Some(v);
        }
        if let Some(v) = env("AZURE_TENANT_ID") {
            self.azure.tenant_id = Some(v);
        }
        if let Some(v) = env("AZURE_CLIENT_ID") {
            self.azure.client_id = Some(v);
        }
        if let Some(v) = env("AZURE_CLIENT_SECRET") {
            self.azure.client_secret = Some(v);
        }
        if let Some(v) = env("AZURE_ACCESS_TOKEN") {
            self.azure.access_token = Some(v);
        }
        if let Some(v) = env("AZURE_RESOURCE_MANAGER_ENDPOINT") {
            self.azure.resource_manager_endpoint = v;
        }
        if let Some(v) = env("AZURE_AUTHORITY_HOST") {
            self.azure.authority_host = v;
        }

        // AZURE_WEBAPP_TIMEOUT, in seconds
        if let Some(timeout) = env("AZURE_WEBAPP_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.azure.operation_timeout = Duration::from_secs(n);
            }
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Load from a specific file, without the environment layer
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        Config::default().merge_from_file(&path_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(
            config.azure.resource_manager_endpoint,
            "https://management.azure.com"
        );
        assert_eq!(config.azure.authority_host, "https://login.microsoftonline.com");
        assert_eq!(config.azure.operation_timeout, Duration::from_secs(600));
        assert!(config.azure.subscription_id.is_none());
        assert_eq!(config.logging.log_format, LogFormat::Text);
        assert!(config.colors.enabled);
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            azure: AzureConfig {
                subscription_id: Some("base-sub".into()),
                tenant_id: Some("base-tenant".into()),
                ..AzureConfig::default()
            },
            ..Config::default()
        };
        let other = Config {
            azure: AzureConfig {
                subscription_id: Some("other-sub".into()),
                poll_interval: Duration::from_secs(1),
                ..AzureConfig::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.azure.subscription_id.as_deref(), Some("other-sub"));
        assert_eq!(merged.azure.tenant_id.as_deref(), Some("base-tenant"));
        assert_eq!(merged.azure.poll_interval, Duration::from_secs(1));
        assert_eq!(merged.azure.web_api_version, DEFAULT_WEB_API_VERSION);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[azure]
subscription_id = "0000"
operation_timeout = "2m"

[logging]
log_format = "json"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.azure.subscription_id.as_deref(), Some("0000"));
        assert_eq!(config.azure.operation_timeout, Duration::from_secs(120));
        assert_eq!(config.logging.log_format, LogFormat::Json);
        assert_eq!(config.azure.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "azure:\n  tenant_id: t-1\ncolors:\n  enabled: false").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.azure.tenant_id.as_deref(), Some("t-1"));
        assert!(!config.colors.enabled);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AzureConfig {
            client_secret: Some("hunter2".into()),
            access_token: Some("eyJ0eXAi".into()),
            ..AzureConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("eyJ0eXAi"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("AZURE_WEBAPP_TIMEOUT", "42");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.azure.operation_timeout, Duration::from_secs(42));
        std::env::remove_var("AZURE_WEBAPP_TIMEOUT");
    }
}
