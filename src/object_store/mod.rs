//! ObjectStore - Artifact storage capability
//!
//! ## Responsibilities
//!
//! - get / put / copy / delete of image artifacts by key
//! - Public-read ACL on written objects so notification image links resolve
//! - Public URL construction for a stored key
//!
//! The pipelines only see the [`ObjectStore`] trait. The shipped backend is
//! [`FsObjectStore`], a bucket directory on local disk.

mod fs_store;

pub use fs_store::FsObjectStore;

use crate::error::Result;
use async_trait::async_trait;

/// Content type used for every image written by the pipelines
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Object access control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    /// Readable by the owner only
    Private,
    /// Readable by anyone holding the public URL
    PublicRead,
}

/// Storage capability used by the relocator and the thumbnailer
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket (namespace) the keys live in
    fn bucket(&self) -> &str;

    /// Publicly fetchable URL for a key
    fn public_url(&self, key: &str) -> String;

    /// Whether an object is stored under `key`
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Fetch object bytes. Missing keys are `Error::NotFound`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Write object bytes, replacing any existing object
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str, acl: Acl) -> Result<()>;

    /// Server-side copy within the bucket
    async fn copy(&self, source_key: &str, dest_key: &str, acl: Acl) -> Result<()>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}
