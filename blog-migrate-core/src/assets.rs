//! Moves locally hosted images into object storage.
//!
//! A reference such as `/img/2015/cat.png` or
//! `https://blog.example.com/img/2015/cat.png` is resolved against the local
//! image mirror, stored under `images/cat.png` and replaced by the bucket's
//! public URL. Keys use only the base name, so two different files sharing a
//! name overwrite each other in the bucket.

use std::path::{Component, Path, PathBuf};
use tracing::{error, info};
use url::Url;

use crate::config::{encode_key, RunMode, StorageConfig};
use crate::contract::ObjectStore;
use crate::error::UploadError;
use crate::images::{classify, ImageKind};

/// Prefix for every stored image key.
pub const KEY_PREFIX: &str = "images/";

/// Host used for dry-run placeholder URLs.
pub const DRY_RUN_BASE: &str = "https://dry-run.invalid";

pub struct AssetUploader<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    storage: &'a StorageConfig,
    mirror_dir: PathBuf,
    site_domain: String,
    mode: RunMode,
}

impl<'a, S: ObjectStore + ?Sized> AssetUploader<'a, S> {
    pub fn new(
        store: &'a S,
        storage: &'a StorageConfig,
        mirror_dir: impl Into<PathBuf>,
        site_domain: impl Into<String>,
        mode: RunMode,
    ) -> Self {
        Self {
            store,
            storage,
            mirror_dir: mirror_dir.into(),
            site_domain: site_domain.into(),
            mode,
        }
    }

    pub fn site_domain(&self) -> &str {
        &self.site_domain
    }

    /// Upload the file behind `reference` and return its new public URL.
    pub async fn upload(&self, reference: &str) -> Result<String, UploadError> {
        let relative = self.local_path(reference)?;
        let key = storage_key(&relative)
            .ok_or_else(|| UploadError::NotLocal(reference.to_string()))?;

        if self.mode.is_dry_run() {
            let url = format!("{DRY_RUN_BASE}/{}", encode_key(&key));
            info!(reference, key = %key, url = %url, "[UPLOAD][DRY-RUN] Skipping image upload");
            return Ok(url);
        }

        let path = self.mirror_dir.join(&relative);
        let bytes = std::fs::read(&path).map_err(|source| {
            error!(reference, path = %path.display(), error = %source, "[UPLOAD] Local image missing");
            UploadError::MissingAsset {
                reference: reference.to_string(),
                path: path.clone(),
                source,
            }
        })?;

        info!(reference, key = %key, size = bytes.len(), "[UPLOAD] Uploading image");
        self.store
            .put_object(&key, bytes, content_type(&relative))
            .await?;

        let url = self.storage.public_url(&key);
        info!(reference, url = %url, "[UPLOAD] Image uploaded");
        Ok(url)
    }

    /// Map a reference to a path inside the mirror directory.
    fn local_path(&self, reference: &str) -> Result<PathBuf, UploadError> {
        let not_local = || UploadError::NotLocal(reference.to_string());
        let raw_path = match classify(reference, &self.site_domain) {
            ImageKind::External => return Err(not_local()),
            ImageKind::Relative => reference.to_string(),
            ImageKind::SiteAbsolute if reference.starts_with('/') && !reference.starts_with("//") => {
                reference.to_string()
            }
            ImageKind::SiteAbsolute => {
                let absolute = if reference.starts_with("//") {
                    format!("https:{reference}")
                } else {
                    reference.to_string()
                };
                Url::parse(&absolute).map_err(|_| not_local())?.path().to_string()
            }
        };

        let without_query = raw_path.split(['?', '#']).next().unwrap_or_default();
        let decoded = urlencoding::decode(without_query).map_err(|_| not_local())?;
        let mut relative = PathBuf::new();
        for component in Path::new(decoded.as_ref()).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir | Component::Prefix(_) => return Err(not_local()),
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(not_local());
        }
        Ok(relative)
    }
}

/// `images/<basename>` for a mirror-relative path.
pub fn storage_key(relative: &Path) -> Option<String> {
    let name = relative.file_name()?.to_str()?;
    Some(format!("{KEY_PREFIX}{name}"))
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
