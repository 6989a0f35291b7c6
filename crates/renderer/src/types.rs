use std::fmt;
use std::path::PathBuf;

use controls::ParameterStore;

/// The two texture inputs of the quilt kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    /// Color image, bound as `g_Texture1`.
    Color,
    /// Depth map, bound as `g_Texture2`. Only the red channel is read.
    Depth,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 2] = [ImageSlot::Color, ImageSlot::Depth];

    pub fn label(self) -> &'static str {
        match self {
            ImageSlot::Color => "color",
            ImageSlot::Depth => "depth",
        }
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Dimensions of the images loaded so far. The canvas follows the color
/// image when there is one, otherwise the depth map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportState {
    color: Option<(u32, u32)>,
    depth: Option<(u32, u32)>,
}

impl ViewportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful load. Empty images are ignored.
    pub fn record(&mut self, slot: ImageSlot, dimensions: (u32, u32)) {
        if dimensions.0 == 0 || dimensions.1 == 0 {
            return;
        }
        match slot {
            ImageSlot::Color => self.color = Some(dimensions),
            ImageSlot::Depth => self.depth = Some(dimensions),
        }
    }

    pub fn dimensions(&self, slot: ImageSlot) -> Option<(u32, u32)> {
        match slot {
            ImageSlot::Color => self.color,
            ImageSlot::Depth => self.depth,
        }
    }

    /// `None` until an image has been loaded.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.color.or(self.depth)
    }

    /// Canvas size, or `fallback` when nothing is loaded yet.
    pub fn resolve(&self, fallback: (u32, u32)) -> (u32, u32) {
        self.canvas_size().unwrap_or(fallback)
    }
}

/// Where gyro samples come from in the preview window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TiltSource {
    /// No orientation hardware. Enabling the gyro reports it as unsupported.
    #[default]
    Unavailable,
    /// Arrow keys drive a simulated sensor.
    Simulated,
}

/// Immutable configuration passed to the preview window at start-up.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Parameter state after config and command-line overrides.
    pub store: ParameterStore,
    /// Color image decoded once the window is up.
    pub color_image: Option<PathBuf>,
    /// Depth map decoded once the window is up.
    pub depth_image: Option<PathBuf>,
    /// Window size before any image decides the canvas.
    pub surface_size: (u32, u32),
    pub tilt: TiltSource,
    /// Overrides the configured gyro sensitivity. Clamped to its slider.
    pub gyro_sensitivity: Option<f32>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            store: ParameterStore::default(),
            color_image: None,
            depth_image: None,
            surface_size: (800, 600),
            tilt: TiltSource::default(),
            gyro_sensitivity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_prefers_color_then_depth() {
        let mut viewport = ViewportState::new();
        assert_eq!(viewport.canvas_size(), None);
        assert_eq!(viewport.resolve((640, 480)), (640, 480));

        viewport.record(ImageSlot::Depth, (320, 200));
        assert_eq!(viewport.canvas_size(), Some((320, 200)));

        viewport.record(ImageSlot::Color, (1024, 768));
        assert_eq!(viewport.canvas_size(), Some((1024, 768)));

        viewport.record(ImageSlot::Depth, (10, 10));
        assert_eq!(viewport.canvas_size(), Some((1024, 768)));
        assert_eq!(viewport.dimensions(ImageSlot::Depth), Some((10, 10)));
    }

    #[test]
    fn empty_images_leave_the_viewport_alone() {
        let mut viewport = ViewportState::new();
        viewport.record(ImageSlot::Color, (0, 50));
        assert_eq!(viewport, ViewportState::default());
    }
}
