use std::path::Path;

use anyhow::{anyhow, Context, Result};
use controls::ParameterStore;
use renderer::{decode, render_frame, ImageSlot, TextureImage, ViewportState};

/// Renders one frame on the CPU and writes it as PNG. The canvas follows the
/// color image, or the depth map when only that is given.
pub fn export_frame(
    store: &ParameterStore,
    color: Option<&Path>,
    depth: Option<&Path>,
    output: &Path,
) -> Result<(u32, u32)> {
    if color.is_none() && depth.is_none() {
        anyhow::bail!("--export needs --color or --depth");
    }

    let mut viewport = ViewportState::new();
    let color = load_texture(ImageSlot::Color, color, &mut viewport)?;
    let depth = load_texture(ImageSlot::Depth, depth, &mut viewport)?;
    let canvas = viewport
        .canvas_size()
        .ok_or_else(|| anyhow!("no image decided the export size"))?;

    let frame = render_frame(&color, &depth, store.params(), canvas);
    frame
        .save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(
        path = %output.display(),
        width = canvas.0,
        height = canvas.1,
        "export written"
    );
    Ok(canvas)
}

fn load_texture(
    slot: ImageSlot,
    path: Option<&Path>,
    viewport: &mut ViewportState,
) -> Result<TextureImage> {
    let Some(path) = path else {
        return Ok(TextureImage::placeholder());
    };
    let decoded = decode(slot, path).with_context(|| format!("failed to load {slot} image"))?;
    viewport.record(slot, decoded.dimensions());
    Ok(TextureImage::from_rgba8(&decoded.pixels))
}
