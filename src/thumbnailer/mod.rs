//! Thumbnailer - Downscaled copies for notifications
//!
//! ## Responsibilities
//!
//! - Fetch an artifact, decode it, resize to a fixed 400px height
//! - Re-encode as JPEG (quality 90) and store it as `<key>_small`
//!
//! Callers treat every [`ResizeError`] as a degradation and fall back to the
//! full-size key.

use crate::object_store::{Acl, ObjectStore, JPEG_CONTENT_TYPE};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::sync::Arc;

/// Output height in pixels; width keeps the aspect ratio
pub const SMALL_HEIGHT: u32 = 400;

/// JPEG quality of the derived image
pub const JPEG_QUALITY: u8 = 90;

/// Suffix appended to the source key for the derived image
pub const SMALL_SUFFIX: &str = "_small";

#[derive(Debug, thiserror::Error)]
pub enum ResizeError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("decode failed: {0}")]
    Decode(image::ImageError),

    #[error("encode failed: {0}")]
    Encode(image::ImageError),

    #[error("store failed: {0}")]
    Store(String),

    #[error("resize task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Key of the derived image for `key`
pub fn small_key(key: &str) -> String {
    format!("{}{}", key, SMALL_SUFFIX)
}

/// Decode, resize to [`SMALL_HEIGHT`] with a linear filter and re-encode as JPEG
pub fn resize_jpeg(data: &[u8]) -> Result<Vec<u8>, ResizeError> {
    let source = image::load_from_memory(data).map_err(ResizeError::Decode)?;

    let (width, height) = (source.width(), source.height());
    let scaled_width = ((width as f64 * SMALL_HEIGHT as f64) / height as f64).round() as u32;
    let resized = source.resize_exact(scaled_width.max(1), SMALL_HEIGHT, FilterType::Triangle);

    let rgb = resized.to_rgb8();
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder.encode_image(&rgb).map_err(ResizeError::Encode)?;

    Ok(buf)
}

pub struct Thumbnailer {
    store: Arc<dyn ObjectStore>,
}

impl Thumbnailer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Produce `<key>_small` and return its key
    pub async fn shrink(&self, key: &str) -> Result<String, ResizeError> {
        let data = self
            .store
            .get(key)
            .await
            .map_err(|e| ResizeError::Fetch(e.to_string()))?;

        tracing::debug!(key = %key, size = data.len(), "Resizing image");
        // decode / resize / encode is CPU-bound, keep it off the runtime workers
        let small = tokio::task::spawn_blocking(move || resize_jpeg(&data)).await??;

        let derived = small_key(key);
        self.store
            .put(&derived, small, JPEG_CONTENT_TYPE, Acl::PublicRead)
            .await
            .map_err(|e| ResizeError::Store(e.to_string()))?;

        tracing::debug!(key = %key, derived = %derived, "Thumbnail stored");
        Ok(derived)
    }
}
