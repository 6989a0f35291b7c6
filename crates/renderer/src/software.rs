use image::{Rgba as RgbaPixel, RgbaImage};
use quiltconfig::RenderParameters;

use crate::kernel::{shade, Rgba, Sampler};

/// Float RGBA texture sampled with bilinear filtering and clamp-to-edge
/// addressing, the same sampler state the GPU path binds.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    texels: Vec<Rgba>,
}

impl TextureImage {
    /// The 1x1 opaque black texture bound before anything is loaded.
    pub fn placeholder() -> Self {
        Self {
            width: 1,
            height: 1,
            texels: vec![[0.0, 0.0, 0.0, 1.0]],
        }
    }

    pub fn from_rgba8(image: &RgbaImage) -> Self {
        if image.width() == 0 || image.height() == 0 {
            return Self::placeholder();
        }
        let texels = image
            .pixels()
            .map(|pixel| pixel.0.map(|channel| channel as f32 / 255.0))
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            texels,
        }
    }

    pub fn from_fn(width: u32, height: u32, mut texel: impl FnMut(u32, u32) -> Rgba) -> Self {
        if width == 0 || height == 0 {
            return Self::placeholder();
        }
        let mut texels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                texels.push(texel(x, y));
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn texel(&self, x: i64, y: i64) -> Rgba {
        let x = x.clamp(0, i64::from(self.width) - 1) as usize;
        let y = y.clamp(0, i64::from(self.height) - 1) as usize;
        self.texels[y * self.width as usize + x]
    }
}

impl Default for TextureImage {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl Sampler for TextureImage {
    fn sample(&self, uv: [f32; 2]) -> Rgba {
        let x = uv[0] * self.width as f32 - 0.5;
        let y = uv[1] * self.height as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (ix, iy) = (x0 as i64, y0 as i64);

        let top = lerp(
            self.texel(ix, iy),
            self.texel(ix.saturating_add(1), iy),
            fx,
        );
        let bottom = lerp(
            self.texel(ix, iy.saturating_add(1)),
            self.texel(ix.saturating_add(1), iy.saturating_add(1)),
            fx,
        );
        lerp(top, bottom, fy)
    }
}

fn lerp(a: Rgba, b: Rgba, t: f32) -> Rgba {
    let mut out = a;
    for (channel, target) in out.iter_mut().zip(b) {
        *channel += (target - *channel) * t;
    }
    out
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Evaluates the kernel once per pixel centre of a `canvas`-sized frame.
///
/// Row 0 of the output is the top of the view, matching the texture
/// orientation the GPU quad uses.
pub fn render_frame(
    color: &TextureImage,
    depth: &TextureImage,
    params: &RenderParameters,
    canvas: (u32, u32),
) -> RgbaImage {
    let (width, height) = (canvas.0.max(1), canvas.1.max(1));
    let screen = [width as f32, height as f32];
    RgbaImage::from_fn(width, height, |x, y| {
        let uv = [
            (x as f32 + 0.5) / screen[0],
            (y as f32 + 0.5) / screen[1],
        ];
        let rgba = shade(uv, params, color, depth, screen);
        RgbaPixel(rgba.map(to_byte))
    })
}
