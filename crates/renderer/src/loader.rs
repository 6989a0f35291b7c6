use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use image::RgbaImage;

use crate::types::ImageSlot;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{path} has no pixels")]
    Empty { path: PathBuf },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Decode { path, .. } | LoadError::Empty { path } => path,
        }
    }
}

/// RGBA pixels ready to upload into one of the kernel's texture slots.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub slot: ImageSlot,
    pub path: PathBuf,
    pub pixels: RgbaImage,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Decodes any raster format `image` understands into 8-bit RGBA.
pub fn decode_file(path: &Path) -> Result<RgbaImage, LoadError> {
    let decoded = image::open(path).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = decoded.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(rgba)
}

pub fn decode(slot: ImageSlot, path: &Path) -> Result<DecodedImage, LoadError> {
    let pixels = decode_file(path)?;
    tracing::debug!(
        %slot,
        path = %path.display(),
        width = pixels.width(),
        height = pixels.height(),
        "decoded image"
    );
    Ok(DecodedImage {
        slot,
        path: path.to_path_buf(),
        pixels,
    })
}

/// Decodes `path` on a worker thread and hands the outcome to `on_done`
/// from that thread.
pub fn spawn_decode<F>(slot: ImageSlot, path: PathBuf, on_done: F) -> Result<JoinHandle<()>>
where
    F: FnOnce(Result<DecodedImage, LoadError>) + Send + 'static,
{
    thread::Builder::new()
        .name(format!("quiltview-decode-{slot}"))
        .spawn(move || on_done(decode(slot, &path)))
        .map_err(|err| anyhow!("failed to spawn decode thread: {err}"))
}
