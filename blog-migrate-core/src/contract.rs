#![allow(unused)]

//! # contract: interfaces to the outside world
//!
//! The pipeline talks to two external services: an object store that receives
//! image bytes, and a publishing platform that receives posts. Both are traits
//! here so the binary crate can provide real HTTP clients and tests can use
//! `mockall` mocks.
//!
//! ## Mocking & Testing
//! - The traits are annotated for `mockall`; with the `test-export-mocks`
//!   feature (on by default) `MockObjectStore` and `MockPublisher` are exported
//!   for integration tests in dependent crates.
//!
//! ## Dry runs
//! - [`DryRunPublisher`] and [`DryRunStore`] stand in for the real clients when
//!   no network writes are allowed. Image uploads are already short-circuited
//!   in [`crate::assets`] before any file is read.

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::error::{PublishError, UploadError};

/// Post payload accepted by the platform's create-post endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub content_format: String,
    pub content: String,
    /// RFC 3339 timestamp of the original publication.
    pub published_at: String,
}

impl NewPost {
    pub fn markdown(title: String, content: String, published_at: String) -> Self {
        Self {
            title,
            content_format: "markdown".to_string(),
            content,
            published_at,
        }
    }
}

/// The platform's view of a created post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    pub title: String,
    /// Canonical URL of the post on the platform.
    pub url: String,
}

/// The authenticated platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A publication the user can post into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Write-only access to an object storage bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, publicly readable.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), UploadError>;
}

/// The minimal publishing platform surface used by the migration.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create a post in the given publication.
    async fn create_post(
        &self,
        publication_id: &str,
        post: &NewPost,
    ) -> Result<PublishedPost, PublishError>;

    /// Resolve the user owning the access token.
    async fn current_user(&self) -> Result<User, PublishError>;

    /// List the publications a user belongs to.
    async fn publications(&self, user_id: &str) -> Result<Vec<Publication>, PublishError>;
}

/// Publisher used for dry runs: returns a placeholder URL derived from the title.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPublisher;

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn create_post(
        &self,
        _publication_id: &str,
        post: &NewPost,
    ) -> Result<PublishedPost, PublishError> {
        let slug = slugify(&post.title);
        tracing::info!(title = %post.title, "[PUBLISH][DRY-RUN] Skipping create_post");
        Ok(PublishedPost {
            id: format!("dry-run-{slug}"),
            title: post.title.clone(),
            url: format!("https://medium.com/dry-run/{slug}"),
        })
    }

    async fn current_user(&self) -> Result<User, PublishError> {
        Err(PublishError::DryRun("current_user"))
    }

    async fn publications(&self, _user_id: &str) -> Result<Vec<Publication>, PublishError> {
        Err(PublishError::DryRun("publications"))
    }
}

/// Object store used for dry runs: accepts and drops every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunStore;

#[async_trait]
impl ObjectStore for DryRunStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), UploadError> {
        tracing::info!(key, size = body.len(), "[UPLOAD][DRY-RUN] Dropping object write");
        Ok(())
    }
}

/// Lowercase ASCII slug: alphanumerics kept, every other run of characters becomes one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
