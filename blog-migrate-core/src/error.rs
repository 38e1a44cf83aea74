//! Error taxonomy for the migration pipeline.
//!
//! Each pipeline stage has its own error type so the orchestrator can decide
//! per stage whether a failure skips one post or aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// A post file could not be read or its front-matter is malformed.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read post {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("front-matter in {path} has no closing `---` delimiter")]
    Unterminated { path: PathBuf },
    #[error("invalid YAML front-matter in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("front-matter in {path} is not a key/value mapping")]
    NotAMapping { path: PathBuf },
    #[error("post {path} has no `{field}` in its front-matter")]
    MissingField { path: PathBuf, field: &'static str },
    #[error("post {path} has no usable date (front-matter or file name prefix)")]
    NoDate { path: PathBuf },
}

/// An image could not be moved to object storage.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("local asset {path} for reference `{reference}` could not be read: {source}")]
    MissingAsset {
        reference: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reference `{0}` does not point at a local asset")]
    NotLocal(String),
    #[error("storage write for key `{key}` failed: {message}")]
    Storage { key: String, message: String },
}

/// The publishing platform refused a request, or could not be reached.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("platform rejected the request: {}", .messages.join("; "))]
    Rejected { messages: Vec<String> },
    #[error("platform returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request to platform failed: {0}")]
    Transport(String),
    #[error("no publication named `{0}` for the authenticated user")]
    PublicationNotFound(String),
    #[error("{0} is unavailable in dry-run mode")]
    DryRun(&'static str),
}

/// Required configuration is missing or invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(String),
    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: String, reason: String },
}

/// A ledger file could not be read or appended to.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode redirect record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Top-level error returned by a migration run.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("invalid posts pattern `{pattern}`: {reason}")]
    Discovery { pattern: String, reason: String },
}
