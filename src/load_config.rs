/// `load_config` module: loads the static YAML config and the secrets from the environment.
///
/// This is the only place where user-supplied YAML is parsed and mapped to the
/// strongly-typed configuration of `blog-migrate-core`.
///
/// # Responsibilities
/// - Parse the YAML config file (site, storage, platform, ledger, migration sections)
/// - Read secrets from the environment (`.env` is honoured by `main`)
/// - Refuse to start when a required setting is missing, before any post is touched
///
/// # Environment
/// - `MEDIUM_ACCESS_TOKEN`: platform integration token
/// - `SPACES_ACCESS_KEY_ID`, `SPACES_SECRET_ACCESS_KEY`: object storage credentials
///
/// # Errors
/// File and YAML errors are `anyhow::Error` with context; missing settings are
/// [`ConfigError`] so callers can tell them apart.
use anyhow::Result;
use blog_migrate_core::config::{
    FileErrorPolicy, LedgerPaths, MigrationConfig, RunMode, SiteConfig, StorageConfig,
    TransformOptions,
};
use blog_migrate_core::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const MEDIUM_TOKEN_ENV: &str = "MEDIUM_ACCESS_TOKEN";
pub const SPACES_KEY_ENV: &str = "SPACES_ACCESS_KEY_ID";
pub const SPACES_SECRET_ENV: &str = "SPACES_SECRET_ACCESS_KEY";

/// Default Medium API base.
pub const DEFAULT_API_BASE: &str = "https://api.medium.com/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub site: SiteConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub platform: PlatformSection,
    #[serde(default)]
    pub ledger: LedgerPaths,
    #[serde(default)]
    pub migration: MigrationSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSection {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub publication_id: Option<String>,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            publication_id: None,
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrationSection {
    #[serde(default)]
    pub on_file_error: FileErrorPolicy,
    #[serde(default)]
    pub keep_fence_language: bool,
}

/// Storage credentials.
#[derive(Clone)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl CliConfig {
    /// Core configuration for a migration run in `mode`.
    pub fn migration_config(&self, mode: RunMode) -> Result<MigrationConfig, ConfigError> {
        let publication_id = self
            .platform
            .publication_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("platform.publication_id".to_string()))?;
        self.site.domain()?;
        Ok(MigrationConfig {
            site: self.site.clone(),
            storage: self.storage.clone(),
            publication_id,
            mode,
            on_file_error: self.migration.on_file_error,
            transform: TransformOptions {
                keep_fence_language: self.migration.keep_fence_language,
            },
        })
    }
}

/// Loads the static YAML config file (no secrets).
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config)
}

/// A non-empty environment variable, or [`ConfigError::Missing`].
pub fn require_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            error!(variable = name, "Required environment variable missing");
            Err(ConfigError::Missing(name.to_string()))
        }
    }
}

pub fn medium_token_from_env() -> Result<String, ConfigError> {
    require_env(MEDIUM_TOKEN_ENV)
}

pub fn storage_credentials_from_env() -> Result<StorageCredentials, ConfigError> {
    Ok(StorageCredentials {
        access_key_id: require_env(SPACES_KEY_ENV)?,
        secret_access_key: require_env(SPACES_SECRET_ENV)?,
    })
}
