//! GPU side of the viewer.
//!
//! - `context` owns the wgpu instance, device and surface, and reconfigures
//!   the swapchain on resize.
//! - `channels` holds the color and depth textures with their samplers.
//! - `pipeline` compiles the quilt GLSL and describes the quad geometry.
//! - `uniforms` mirrors the fragment shader's std140 parameter block.
//! - `state` ties these together behind `GpuState`, which the window drives.

mod channels;
mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
