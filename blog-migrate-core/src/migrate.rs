//! High-level pipeline: load → rewrite → upload images → publish → record, one post at a time.
//!
//! # Responsibilities
//! - Discover post files from the configured glob, in sorted order
//! - Skip files already in the completion ledger, and posts marked `published: false`
//! - Transform each post (images moved to object storage) and publish it
//! - Append the completion and redirect records right after each successful publish
//!
//! # Error Handling
//! - A publish failure stops the run at once; everything recorded so far stays recorded.
//! - A ledger write failure stops the run.
//! - A parse or upload failure for one post follows [`FileErrorPolicy`]: by default the
//!   post is logged, left out of the ledger and retried on the next run.
//!
//! Posts are processed strictly sequentially, and so are the image uploads within a post.

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::assets::AssetUploader;
use crate::config::{FileErrorPolicy, MigrationConfig};
use crate::contract::{NewPost, ObjectStore, Publisher};
use crate::error::{MigrateError, PublishError};
use crate::frontmatter::Post;
use crate::ledger::Ledger;
use crate::transform;

/// Outcome of a run that was not aborted.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Post files found by the glob.
    pub discovered: usize,
    /// Files skipped because the ledger already lists them.
    pub already_migrated: usize,
    pub migrated: Vec<MigratedPost>,
    /// Posts with `published: false`.
    pub unpublished: Vec<PathBuf>,
    pub failed: Vec<FailedPost>,
}

#[derive(Debug, Clone)]
pub struct MigratedPost {
    pub source: PathBuf,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct FailedPost {
    pub source: PathBuf,
    pub error: String,
}

/// A post ready to be sent to the platform.
struct PreparedPost {
    post: NewPost,
    original_url: String,
}

/// Post files matching `pattern`, sorted.
pub fn discover_posts(pattern: &str) -> Result<Vec<PathBuf>, MigrateError> {
    let discovery_err = |reason: String| MigrateError::Discovery {
        pattern: pattern.to_string(),
        reason,
    };
    let mut files = Vec::new();
    for entry in glob::glob(pattern).map_err(|e| discovery_err(e.to_string()))? {
        let path = entry.map_err(|e| discovery_err(e.to_string()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Run the migration over every pending post.
pub async fn migrate<S, P>(
    config: &MigrationConfig,
    store: &S,
    publisher: &P,
    ledger: &mut Ledger,
) -> Result<MigrationReport, MigrateError>
where
    S: ObjectStore + ?Sized,
    P: Publisher + ?Sized,
{
    info!(mode = ?config.mode, "[MIGRATE] Starting migration run");
    let site_domain = config.site.domain()?;
    let uploader = AssetUploader::new(
        store,
        &config.storage,
        config.site.image_mirror.clone(),
        site_domain,
        config.mode,
    );

    let candidates = discover_posts(&config.site.posts_glob)?;
    let pending = ledger.pending_files(&candidates);
    let mut report = MigrationReport {
        discovered: candidates.len(),
        already_migrated: candidates.len() - pending.len(),
        ..MigrationReport::default()
    };
    info!(
        discovered = report.discovered,
        pending = pending.len(),
        already_migrated = report.already_migrated,
        "[MIGRATE] Discovered posts"
    );

    for path in pending {
        info!(path = %path.display(), "[MIGRATE] Processing post");
        let prepared = match prepare_post(&path, config, &uploader).await {
            Ok(Some(prepared)) => prepared,
            Ok(None) => {
                info!(path = %path.display(), "[MIGRATE] Skipping unpublished post");
                report.unpublished.push(path);
                continue;
            }
            Err(e) => match config.on_file_error {
                FileErrorPolicy::Skip => {
                    error!(path = %path.display(), error = %e, "[MIGRATE][ERROR] Post failed, continuing with next file");
                    report.failed.push(FailedPost {
                        source: path,
                        error: e.to_string(),
                    });
                    continue;
                }
                FileErrorPolicy::Abort => {
                    error!(path = %path.display(), error = %e, "[MIGRATE][ERROR] Post failed, aborting run");
                    return Err(e);
                }
            },
        };

        let published = publisher
            .create_post(&config.publication_id, &prepared.post)
            .await
            .map_err(|e| {
                error!(path = %path.display(), error = %e, "[PUBLISH][ERROR] Platform rejected post, aborting run");
                e
            })?;
        info!(path = %path.display(), url = %published.url, "[PUBLISH] Post published");

        ledger.record_completion(&path)?;
        ledger.record_redirect(&prepared.original_url, &published.url)?;

        report.migrated.push(MigratedPost {
            source: path,
            from: prepared.original_url,
            to: published.url,
        });
    }

    if !report.failed.is_empty() {
        warn!(failed = report.failed.len(), "[MIGRATE] Some posts failed and will be retried on the next run");
    }
    info!(
        migrated = report.migrated.len(),
        unpublished = report.unpublished.len(),
        failed = report.failed.len(),
        "[MIGRATE] Migration run complete"
    );
    Ok(report)
}

/// Load and transform one post. `None` when the post is marked unpublished.
async fn prepare_post<S: ObjectStore + ?Sized>(
    path: &Path,
    config: &MigrationConfig,
    uploader: &AssetUploader<'_, S>,
) -> Result<Option<PreparedPost>, MigrateError> {
    let post = Post::load(path)?;
    if post.is_unpublished() {
        return Ok(None);
    }
    let title = post.title()?;
    let published_at = post.published_at()?;
    let original_url = post.original_url(&config.site.url)?;
    let content = transform::transform(&post, &config.transform, uploader).await?;
    Ok(Some(PreparedPost {
        post: NewPost::markdown(title, content, published_at),
        original_url,
    }))
}

/// Find the id of the authenticated user's publication called `name`.
pub async fn resolve_publication_id<P: Publisher + ?Sized>(
    publisher: &P,
    name: &str,
) -> Result<String, PublishError> {
    let user = publisher.current_user().await?;
    info!(user_id = %user.id, username = %user.username, "[PUBLISH] Resolved current user");
    let publications = publisher.publications(&user.id).await?;
    publications
        .into_iter()
        .find(|p| p.name == name)
        .map(|p| p.id)
        .ok_or_else(|| PublishError::PublicationNotFound(name.to_string()))
}
