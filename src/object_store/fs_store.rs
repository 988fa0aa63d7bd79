//! Filesystem-backed object store
//!
//! Keys map to files under `<root>/<bucket>/<key>`. Public-read objects are
//! written world-readable so a static file server in front of the bucket
//! directory can serve the notification image links.

use super::{Acl, ObjectStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

pub struct FsObjectStore {
    bucket: String,
    bucket_dir: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    /// Create store rooted at `root/bucket`, creating the directory if needed
    pub async fn new(root: PathBuf, bucket: String, public_base_url: String) -> Result<Self> {
        let bucket_dir = root.join(&bucket);
        fs::create_dir_all(&bucket_dir).await?;

        tracing::debug!(
            bucket = %bucket,
            bucket_dir = %bucket_dir.display(),
            "FsObjectStore ready"
        );

        Ok(Self {
            bucket,
            bucket_dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a key to a path, rejecting keys that escape the bucket
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::Validation("empty object key".to_string()));
        }

        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(Error::Validation(format!("invalid object key: {}", key)));
        }

        Ok(self.bucket_dir.join(relative))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn apply_acl(path: &Path, acl: Acl) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = match acl {
                Acl::PublicRead => 0o644,
                Acl::Private => 0o600,
            };
            fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        }
        #[cfg(not(unix))]
        let _ = (path, acl);
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tracing::debug!(bucket = %self.bucket, key = %key, "GET object");

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "{}/{}",
                self.bucket, key
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str, acl: Acl) -> Result<()> {
        let path = self.path_for(key)?;
        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size = body.len(),
            content_type = %content_type,
            "PUT object"
        );

        Self::ensure_parent(&path).await?;
        fs::write(&path, body).await?;
        Self::apply_acl(&path, acl).await
    }

    async fn copy(&self, source_key: &str, dest_key: &str, acl: Acl) -> Result<()> {
        let source = self.path_for(source_key)?;
        let dest = self.path_for(dest_key)?;
        tracing::debug!(
            bucket = %self.bucket,
            source_key = %source_key,
            dest_key = %dest_key,
            "COPY object"
        );

        Self::ensure_parent(&dest).await?;
        match fs::copy(&source, &dest).await {
            Ok(_) => Self::apply_acl(&dest, acl).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "{}/{}",
                self.bucket, source_key
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        tracing::debug!(bucket = %self.bucket, key = %key, "DELETE object");

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
