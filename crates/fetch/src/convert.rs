//! Canonical WebP encoding.
//!
//! Decoding and encoding are CPU bound and run on the blocking pool; a batch
//! is converted concurrently once every download has finished.

use exn::ResultExt;
use futures::future::try_join_all;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

pub const DEFAULT_QUALITY: f32 = 80.0;

/// Re-encodes any supported image (JPEG, PNG, GIF, WebP) as lossy WebP.
pub fn to_webp(data: &[u8], quality: f32) -> Result<Vec<u8>> {
    let image = image::load_from_memory(data).or_raise(|| ErrorKind::Convert("undecodable image".to_string()))?;
    let rgba = image.to_rgba8();
    let encoded = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height())
        .encode_simple(false, quality)
        .map_err(|err| ErrorKind::Convert(format!("{err:?}")))?;
    Ok(encoded.to_vec())
}

/// [`to_webp`] on the blocking pool.
pub async fn convert(data: Vec<u8>, quality: f32) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || to_webp(&data, quality))
        .await
        .or_raise(|| ErrorKind::Convert("conversion task panicked".to_string()))?
}

/// Converts every image in parallel, keeping input order.
#[instrument(level = "debug", skip_all, fields(count = images.len()))]
pub async fn convert_all(images: Vec<Vec<u8>>, quality: f32) -> Result<Vec<Vec<u8>>> {
    try_join_all(images.into_iter().map(|data| convert(data, quality))).await
}
