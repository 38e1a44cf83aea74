use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::ConfigError;

/// Whether a run may touch the network and the live ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Live,
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// What to do when a single post fails to parse or one of its images fails to upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileErrorPolicy {
    /// Log the failure, leave the post out of the ledger and continue with the next file.
    #[default]
    Skip,
    /// Stop the whole run.
    Abort,
}

/// The blog being migrated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Canonical base URL of the old site, e.g. `https://blog.example.com`.
    pub url: String,
    /// Glob matching the post files, e.g. `_posts/*.md`.
    #[serde(default = "default_posts_glob")]
    pub posts_glob: String,
    /// Local directory mirroring the site's image paths.
    pub image_mirror: PathBuf,
}

fn default_posts_glob() -> String {
    "_posts/*.md".to_string()
}

impl SiteConfig {
    /// Host of the site URL, used to recognise self-hosted absolute image URLs.
    pub fn domain(&self) -> Result<String, ConfigError> {
        let parsed = url::Url::parse(&self.url).map_err(|e| ConfigError::Invalid {
            name: "site.url".to_string(),
            reason: e.to_string(),
        })?;
        parsed
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| ConfigError::Invalid {
                name: "site.url".to_string(),
                reason: "URL has no host".to_string(),
            })
    }
}

/// Object storage bucket that receives the images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint base, e.g. `https://nyc3.digitaloceanspaces.com`.
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl StorageConfig {
    /// Public URL of an object stored under `key`.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.bucket),
            encode_key(key)
        )
    }
}

/// Percent-encode each `/`-separated segment of an object key.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Locations of the two append-only ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPaths {
    #[serde(default = "default_completed")]
    pub completed: PathBuf,
    #[serde(default = "default_redirects")]
    pub redirects: PathBuf,
}

fn default_completed() -> PathBuf {
    PathBuf::from("migrated.txt")
}

fn default_redirects() -> PathBuf {
    PathBuf::from("redirects.jsonl")
}

impl Default for LedgerPaths {
    fn default() -> Self {
        Self {
            completed: default_completed(),
            redirects: default_redirects(),
        }
    }
}

/// Options for the pure rewrite stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Keep the language of `{% highlight <lang> %}` on the opening fence.
    #[serde(default)]
    pub keep_fence_language: bool,
}

/// Everything a migration run needs besides its clients and ledger.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub site: SiteConfig,
    pub storage: StorageConfig,
    pub publication_id: String,
    pub mode: RunMode,
    pub on_file_error: FileErrorPolicy,
    pub transform: TransformOptions,
}

impl MigrationConfig {
    pub fn trace_loaded(&self) {
        info!(
            site = %self.site.url,
            posts_glob = %self.site.posts_glob,
            bucket = %self.storage.bucket,
            mode = ?self.mode,
            on_file_error = ?self.on_file_error,
            "Loaded MigrationConfig"
        );
        debug!(?self, "MigrationConfig loaded (full debug)");
    }
}
