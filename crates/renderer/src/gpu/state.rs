use anyhow::Result;
use image::RgbaImage;
use quiltconfig::RenderParameters;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::types::{ImageSlot, ViewportState};

use super::channels::{build_slot_entries, SlotResources};
use super::context::GpuContext;
use super::pipeline::{QuiltPipeline, QUAD_VERTEX_COUNT, QUAD_VERTICES};
use super::uniforms::QuiltUniforms;

/// Owns every GPU resource of the preview: surface, pipeline, quad, uniform
/// block and the two texture slots.
pub(crate) struct GpuState {
    context: GpuContext,
    pipeline: QuiltPipeline,
    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: QuiltUniforms,
    color: SlotResources,
    depth: SlotResources,
    slot_bind_group: wgpu::BindGroup,
}

impl GpuState {
    pub(crate) fn new<T>(target: &T, initial_size: PhysicalSize<u32>) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size)?;
        let pipeline = QuiltPipeline::new(&context.device, context.surface_format);

        let vertex_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad vertices"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let uniforms = QuiltUniforms::new((context.size.width, context.size.height));
        let uniform_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quilt uniform buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("quilt uniform bind group"),
                layout: &pipeline.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let color = SlotResources::placeholder(&context.device, &context.queue, ImageSlot::Color);
        let depth = SlotResources::placeholder(&context.device, &context.queue, ImageSlot::Depth);
        let slot_bind_group = create_slot_bind_group(&context.device, &pipeline, &color, &depth);

        Ok(Self {
            context,
            pipeline,
            vertex_buffer,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            color,
            depth,
            slot_bind_group,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    /// Replaces the texture bound to `slot`. On error the previous texture
    /// stays bound.
    pub(crate) fn set_image(&mut self, slot: ImageSlot, pixels: &RgbaImage) -> Result<()> {
        let dimensions = pixels.dimensions();
        let max = self.context.max_texture_dimension();
        if dimensions.0 == 0 || dimensions.1 == 0 {
            anyhow::bail!("{slot} image is empty");
        }
        if dimensions.0 > max || dimensions.1 > max {
            anyhow::bail!(
                "{slot} image is {}x{}, GPU limit is {max}",
                dimensions.0,
                dimensions.1
            );
        }

        let resources = SlotResources::from_rgba(
            &self.context.device,
            &self.context.queue,
            slot,
            pixels.as_raw(),
            dimensions,
        );
        match slot {
            ImageSlot::Color => self.color = resources,
            ImageSlot::Depth => self.depth = resources,
        }
        self.slot_bind_group = create_slot_bind_group(
            &self.context.device,
            &self.pipeline,
            &self.color,
            &self.depth,
        );
        Ok(())
    }

    /// Draws one frame: the quad once, over a viewport sized to the canvas.
    pub(crate) fn render(
        &mut self,
        params: &RenderParameters,
        viewport: &ViewportState,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;

        let surface = (self.context.size.width, self.context.size.height);
        let canvas = viewport.resolve(surface);
        self.uniforms.set_screen(canvas);
        self.uniforms.write_params(params);
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("quilt encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quilt pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let (width, height) = viewport_extent(canvas, surface);
            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            render_pass.set_pipeline(&self.pipeline.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &self.slot_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

/// The canvas shrunk to fit the surface, keeping its aspect ratio. Canvases
/// that already fit are drawn at their own size.
fn viewport_extent(canvas: (u32, u32), surface: (u32, u32)) -> (u32, u32) {
    let width = canvas.0.max(1) as f32;
    let height = canvas.1.max(1) as f32;
    let scale = (surface.0 as f32 / width)
        .min(surface.1 as f32 / height)
        .min(1.0);
    let fit = |extent: f32, limit: u32| ((extent * scale).round() as u32).clamp(1, limit.max(1));
    (fit(width, surface.0), fit(height, surface.1))
}

fn create_slot_bind_group(
    device: &wgpu::Device,
    pipeline: &QuiltPipeline,
    color: &SlotResources,
    depth: &SlotResources,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("quilt texture bind group"),
        layout: &pipeline.slot_layout,
        entries: &build_slot_entries(color, depth),
    })
}
