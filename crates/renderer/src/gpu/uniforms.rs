use bytemuck::{Pod, Zeroable};
use quiltconfig::RenderParameters;

/// CPU mirror of the `QuiltParams` std140 block in the fragment shader.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct QuiltUniforms {
    /// `g_Screen`: canvas width, height, 1.
    pub screen: [f32; 4],
    /// `u_borderColor` in `rgb`, alpha unused.
    pub border_color: [f32; 4],
    pub threshold: f32,
    pub protrude: f32,
    pub x_diff: f32,
    pub y_diff: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur_size: f32,
    pub blur_depth: f32,
    pub depth_image_blur_size: f32,
    pub max_scale: f32,
    pub border_size_x: f32,
    pub border_size_y: f32,
    pub padding: [f32; 2],
}

unsafe impl Zeroable for QuiltUniforms {}
unsafe impl Pod for QuiltUniforms {}

impl QuiltUniforms {
    pub fn new(canvas: (u32, u32)) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.set_screen(canvas);
        uniforms
    }

    pub fn set_screen(&mut self, canvas: (u32, u32)) {
        self.screen = [canvas.0.max(1) as f32, canvas.1.max(1) as f32, 1.0, 0.0];
    }

    /// Copies every parameter into the block. `max_scale` is left at its
    /// previous value when the control is absent.
    pub fn write_params(&mut self, params: &RenderParameters) {
        let [r, g, b] = params.border_color.to_array();
        self.border_color = [r, g, b, 1.0];
        self.threshold = params.threshold;
        self.protrude = params.protrude;
        self.x_diff = params.x_diff;
        self.y_diff = params.y_diff;
        self.scale_x = params.scale_x;
        self.scale_y = params.scale_y;
        self.offset_x = params.offset_x;
        self.offset_y = params.offset_y;
        self.blur_size = params.blur_size;
        self.blur_depth = params.blur_depth;
        self.depth_image_blur_size = params.depth_image_blur_size;
        if let Some(max_scale) = params.max_scale {
            self.max_scale = max_scale;
        }
        self.border_size_x = params.border_size_x;
        self.border_size_y = params.border_size_y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiltconfig::{BorderColor, ControlSurface, ParamId};
    use std::mem::{offset_of, size_of};

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(size_of::<QuiltUniforms>(), 96);
        assert_eq!(offset_of!(QuiltUniforms, screen), 0);
        assert_eq!(offset_of!(QuiltUniforms, border_color), 16);
        assert_eq!(offset_of!(QuiltUniforms, threshold), 32);
        assert_eq!(offset_of!(QuiltUniforms, y_diff), 44);
        assert_eq!(offset_of!(QuiltUniforms, blur_size), 64);
        assert_eq!(offset_of!(QuiltUniforms, max_scale), 76);
        assert_eq!(offset_of!(QuiltUniforms, border_size_y), 84);
        assert_eq!(offset_of!(QuiltUniforms, padding), 88);
    }

    #[test]
    fn copies_parameters_and_screen() {
        let mut params = ControlSurface::default().initial_parameters();
        params.x_diff = -4.0;
        params.border_color = BorderColor::from_hex("#ff8000");

        let mut uniforms = QuiltUniforms::new((640, 480));
        uniforms.write_params(&params);
        assert_eq!(uniforms.screen, [640.0, 480.0, 1.0, 0.0]);
        assert_eq!(uniforms.x_diff, -4.0);
        assert_eq!(uniforms.threshold, 100.0);
        assert_eq!(uniforms.max_scale, 1.5);
        assert_eq!(uniforms.border_color[0], 1.0);

        let bytes = bytemuck::bytes_of(&uniforms);
        assert_eq!(&bytes[40..44], &(-4.0_f32).to_ne_bytes());
    }

    #[test]
    fn absent_max_scale_keeps_previous_value() {
        let surface = ControlSurface::default().without(ParamId::MaxScale);
        let params = surface.initial_parameters();
        let mut uniforms = QuiltUniforms::new((1, 1));
        uniforms.max_scale = 2.5;
        uniforms.write_params(&params);
        assert_eq!(uniforms.max_scale, 2.5);
    }
}
