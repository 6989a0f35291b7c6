//! Renderer crate for quiltview.
//!
//! Synthesizes a shifted view of a color image from its depth map. The same
//! kernel exists twice: as GLSL drawn into the preview window and as a CPU
//! implementation used for PNG export and tests.
//!
//! ```text
//!   CLI / quiltview
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ GpuState::render()
//!          ▲                  │                               │
//!          │                  └─▶ decode workers              └─▶ QuiltParams UBO
//!          │
//!   render_frame() ◀── kernel::shade ◀── TextureImage (export path)
//! ```
//!
//! `WindowState` owns the GPU resources and the input controllers. Images are
//! decoded off the event loop and handed back through a user event, so the
//! window keeps drawing the previous texture until the new one is ready.

mod compile;
mod gpu;
pub mod kernel;
pub mod loader;
pub mod software;
mod types;
mod window;

use anyhow::Result;

pub use compile::{QUILT_FRAGMENT_GLSL, QUILT_VERTEX_GLSL};
pub use kernel::{convolve, mirrored, parallax_offset, shade, BlurKernel, Rgba, Sampler};
pub use loader::{decode, decode_file, spawn_decode, DecodedImage, LoadError};
pub use software::{render_frame, TextureImage};
pub use types::{ImageSlot, RendererConfig, TiltSource, ViewportState};

/// Entry point for the interactive preview.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the preview window and blocks until it closes.
    ///
    /// Fails when no window or adapter can be created, for example on a
    /// headless machine.
    pub fn run(self) -> Result<()> {
        window::run_window(self.config)
    }
}
