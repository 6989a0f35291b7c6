use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::types::ImageSlot;

/// Opaque black, bound to both slots until an image arrives.
const PLACEHOLDER_TEXEL: [u8; 4] = [0, 0, 0, 255];

/// Texture, view and sampler backing one kernel input.
pub(crate) struct SlotResources {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl SlotResources {
    pub(crate) fn placeholder(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: ImageSlot,
    ) -> Self {
        Self::from_rgba(device, queue, slot, &PLACEHOLDER_TEXEL, (1, 1))
    }

    /// Uploads tightly packed RGBA8 rows, top row first.
    pub(crate) fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: ImageSlot,
        rgba: &[u8],
        dimensions: (u32, u32),
    ) -> Self {
        let (width, height) = dimensions;
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(&format!("{slot} texture")),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            rgba,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{slot} sampler")),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            _texture: texture,
            view,
            sampler,
        }
    }
}

/// Color at bindings 0/1, depth at 2/3, matching the fragment shader.
pub(crate) fn binding_for(slot: ImageSlot) -> u32 {
    match slot {
        ImageSlot::Color => 0,
        ImageSlot::Depth => 2,
    }
}

pub(crate) fn build_slot_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(ImageSlot::ALL.len() * 2);
    for slot in ImageSlot::ALL {
        let binding = binding_for(slot);
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: binding + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

pub(crate) fn build_slot_entries<'a>(
    color: &'a SlotResources,
    depth: &'a SlotResources,
) -> Vec<wgpu::BindGroupEntry<'a>> {
    let mut entries = Vec::with_capacity(4);
    for (slot, resources) in [(ImageSlot::Color, color), (ImageSlot::Depth, depth)] {
        let binding = binding_for(slot);
        entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::TextureView(&resources.view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: binding + 1,
            resource: wgpu::BindingResource::Sampler(&resources.sampler),
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_pairs_textures_with_samplers() {
        let entries = build_slot_layout_entries();
        let bindings: Vec<u32> = entries.iter().map(|entry| entry.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3]);
        assert!(matches!(entries[0].ty, wgpu::BindingType::Texture { .. }));
        assert!(matches!(entries[3].ty, wgpu::BindingType::Sampler(_)));
    }
}
