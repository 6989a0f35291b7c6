//! CPU evaluation of the quilt view-synthesis kernel.
//!
//! [`shade`] is the per-pixel function the GPU runs in
//! [`QUILT_FRAGMENT_GLSL`](crate::QUILT_FRAGMENT_GLSL). Both follow
//! the same steps in the same order:
//!
//! 1. Rescale and offset the fractional input coordinate.
//! 2. Read depth (red channel) through an optional 3x3 box blur.
//! 3. Shift the coordinate by `k * diff * 2 / threshold` where
//!    `k = depth - 0.5 + protrude`.
//! 4. Paint the border for receding pixels near an edge.
//! 5. Sample color directly, or through a 3x3 Gaussian at the mirrored
//!    coordinate when the pixel is shallower than `blur_depth`.

use quiltconfig::RenderParameters;

pub type Rgba = [f32; 4];

/// A filtered texture lookup at normalized coordinates.
pub trait Sampler {
    fn sample(&self, uv: [f32; 2]) -> Rgba;
}

impl<S: Sampler + ?Sized> Sampler for &S {
    fn sample(&self, uv: [f32; 2]) -> Rgba {
        (**self).sample(uv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurKernel {
    /// Uniform 1/9 weights, used on the depth map.
    Box,
    /// `{1,2,1, 2,4,2, 1,2,1} / 16`, used on the color image.
    Gaussian,
}

impl BlurKernel {
    /// Weight of the tap at `(dx, dy)`, each in `-1..=1`.
    pub fn weight(self, dx: i32, dy: i32) -> f32 {
        match self {
            BlurKernel::Box => 1.0 / 9.0,
            BlurKernel::Gaussian => {
                let axis = |d: i32| (2 - d.abs()) as f32;
                axis(dx) * axis(dy) / 16.0
            }
        }
    }
}

/// 3x3 convolution with taps `size` pixels apart on a `screen`-sized canvas.
/// Sizes below one pixel collapse to a single direct sample.
pub fn convolve<S: Sampler + ?Sized>(
    sampler: &S,
    uv: [f32; 2],
    kernel: BlurKernel,
    size: f32,
    screen: [f32; 2],
) -> Rgba {
    if size < 1.0 {
        return sampler.sample(uv);
    }
    let mut color = [0.0; 4];
    for dx in -1..=1 {
        for dy in -1..=1 {
            let tap = [
                uv[0] + dx as f32 / screen[0] * size,
                uv[1] + dy as f32 / screen[1] * size,
            ];
            let weight = kernel.weight(dx, dy);
            for (acc, channel) in color.iter_mut().zip(sampler.sample(tap)) {
                *acc += channel * weight;
            }
        }
    }
    color
}

/// Folds each component into `[0, 1]` by reflecting across integer
/// boundaries with period 2.
pub fn mirrored(v: [f32; 2]) -> [f32; 2] {
    v.map(mirror_axis)
}

fn mirror_axis(v: f32) -> f32 {
    let m = v.rem_euclid(2.0);
    if m < 1.0 {
        m
    } else {
        2.0 - m
    }
}

fn fract(v: f32) -> f32 {
    v - v.floor()
}

/// Texture-space shift applied to a pixel whose depth reads `depth`.
pub fn parallax_offset(depth: f32, params: &RenderParameters) -> [f32; 2] {
    let k = depth - 0.5 + params.protrude;
    [
        k * (params.x_diff * 2.0 / params.threshold),
        k * (params.y_diff * 2.0 / params.threshold),
    ]
}

fn near_border(coord: [f32; 2], params: &RenderParameters) -> bool {
    let (bx, by) = (params.border_size_x, params.border_size_y);
    coord[0] < bx || coord[1] < by || coord[0] > 1.0 - bx || coord[1] > 1.0 - by
}

/// Evaluates the kernel at screen coordinate `frag_uv` on a canvas of
/// `screen` pixels.
pub fn shade<C, D>(
    frag_uv: [f32; 2],
    params: &RenderParameters,
    color: &C,
    depth: &D,
    screen: [f32; 2],
) -> Rgba
where
    C: Sampler + ?Sized,
    D: Sampler + ?Sized,
{
    let coord = [fract(frag_uv[0]), fract(frag_uv[1])];
    let uv = [
        params.scale_x * (coord[0] - 0.5) + 0.5 + params.offset_x,
        params.scale_y * (coord[1] - 0.5) + 0.5 + params.offset_y,
    ];

    let depth_r = convolve(
        depth,
        uv,
        BlurKernel::Box,
        params.depth_image_blur_size,
        screen,
    )[0];
    let k = depth_r - 0.5 + params.protrude;
    let offset = parallax_offset(depth_r, params);
    let fake3d = [uv[0] + offset[0], uv[1] + offset[1]];

    if k < 0.0 && near_border(coord, params) {
        let [r, g, b] = params.border_color.to_array();
        return [r, g, b, 1.0];
    }

    if depth_r < params.blur_depth {
        convolve(
            color,
            mirrored(fake3d),
            BlurKernel::Gaussian,
            params.blur_size,
            screen,
        )
    } else {
        color.sample(fake3d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::TextureImage;
    use quiltconfig::{BorderColor, ControlSurface};

    fn params() -> RenderParameters {
        ControlSurface::default().initial_parameters()
    }

    struct Flat(Rgba);

    impl Sampler for Flat {
        fn sample(&self, _uv: [f32; 2]) -> Rgba {
            self.0
        }
    }

    /// Encodes the lookup coordinate into red/green.
    struct Probe;

    impl Sampler for Probe {
        fn sample(&self, uv: [f32; 2]) -> Rgba {
            [uv[0], uv[1], 0.0, 1.0]
        }
    }

    #[test]
    fn mirrored_folds_into_unit_range_and_is_idempotent() {
        for raw in [-3.7_f32, -2.0, -1.25, -0.5, 0.0, 0.3, 1.0, 1.4, 2.0, 2.6, 5.9] {
            let once = mirrored([raw, -raw]);
            for value in once {
                assert!((0.0..=1.0).contains(&value), "{raw} -> {value}");
            }
            assert_eq!(mirrored(once), once);
        }
        assert!((mirrored([1.25, 0.0])[0] - 0.75).abs() < 1e-6);
        assert!((mirrored([-0.25, 0.0])[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn kernels_sum_to_one() {
        for kernel in [BlurKernel::Box, BlurKernel::Gaussian] {
            let total: f32 = (-1..=1)
                .flat_map(|dx| (-1..=1).map(move |dy| kernel.weight(dx, dy)))
                .sum();
            assert!((total - 1.0).abs() < 1e-6, "{kernel:?}");
        }
        assert_eq!(BlurKernel::Gaussian.weight(0, 0), 0.25);
        assert_eq!(BlurKernel::Gaussian.weight(1, -1), 0.0625);
    }

    #[test]
    fn mid_depth_has_no_displacement() {
        let mut p = params();
        p.x_diff = 7.0;
        p.y_diff = -3.0;
        assert_eq!(parallax_offset(0.5, &p), [0.0, 0.0]);

        p.protrude = 0.25;
        let [x, y] = parallax_offset(0.5, &p);
        assert!((x - 0.25 * 14.0 / 100.0).abs() < 1e-6);
        assert!((y + 0.25 * 6.0 / 100.0).abs() < 1e-6);
    }

    #[test]
    fn small_blur_sizes_take_a_single_sample() {
        let screen = [64.0, 64.0];
        let uv = [0.3, 0.6];
        for size in [0.0, 0.5, 0.999] {
            assert_eq!(
                convolve(&Probe, uv, BlurKernel::Gaussian, size, screen),
                Probe.sample(uv)
            );
            assert_eq!(
                convolve(&Probe, uv, BlurKernel::Box, size, screen),
                Probe.sample(uv)
            );
        }
    }

    #[test]
    fn blur_spreads_taps_by_size_over_screen() {
        // A linear ramp averages back to the centre under a symmetric kernel.
        let out = convolve(&Probe, [0.5, 0.5], BlurKernel::Gaussian, 4.0, [100.0, 50.0]);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn border_only_paints_receding_edge_pixels() {
        let mut p = params();
        p.border_color = BorderColor::from_hex("#ff0000");
        p.border_size_x = 0.1;
        p.border_size_y = 0.2;
        let color = Flat([0.0, 0.0, 1.0, 1.0]);
        let screen = [100.0, 100.0];
        let red = [1.0, 0.0, 0.0, 1.0];

        let receding = Flat([0.2, 0.0, 0.0, 1.0]);
        for edge in [[0.05, 0.5], [0.95, 0.5], [0.5, 0.1], [0.5, 0.9]] {
            assert_eq!(shade(edge, &p, &color, &receding, screen), red, "{edge:?}");
        }
        assert_eq!(
            shade([0.5, 0.5], &p, &color, &receding, screen),
            [0.0, 0.0, 1.0, 1.0]
        );

        let forward = Flat([0.8, 0.0, 0.0, 1.0]);
        for edge in [[0.05, 0.5], [0.95, 0.5], [0.5, 0.1], [0.5, 0.9]] {
            assert_eq!(shade(edge, &p, &color, &forward, screen), [0.0, 0.0, 1.0, 1.0]);
        }
    }

    #[test]
    fn border_comparisons_are_strict() {
        let mut p = params();
        p.border_size_x = 0.25;
        p.border_size_y = 0.0;
        let color = Flat([0.0, 1.0, 0.0, 1.0]);
        let receding = Flat([0.0, 0.0, 0.0, 1.0]);
        let out = shade([0.25, 0.5], &p, &color, &receding, [10.0, 10.0]);
        assert_eq!(out, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn shallow_pixels_sample_the_mirrored_coordinate() {
        let mut p = params();
        p.x_diff = 10.0;
        p.threshold = 1.0;
        p.blur_depth = 1.0;
        p.border_size_x = 0.0;
        p.border_size_y = 0.0;
        // k = 0.25, x shift = 0.25 * 20 = 5.0, so 5.5 mirrors to 0.5
        let depth = Flat([0.75, 0.0, 0.0, 1.0]);
        let folded = shade([0.5, 0.5], &p, &Probe, &depth, [10.0, 10.0]);
        assert!((folded[0] - 0.5).abs() < 1e-5, "{folded:?}");

        p.blur_depth = 0.0;
        let unmirrored = shade([0.5, 0.5], &p, &Probe, &depth, [10.0, 10.0]);
        assert!((unmirrored[0] - 5.5).abs() < 1e-5, "{unmirrored:?}");
    }

    #[test]
    fn fractional_input_repeats_the_tile() {
        let p = params();
        let depth = Flat([0.5, 0.0, 0.0, 1.0]);
        let a = shade([0.3, 0.7], &p, &Probe, &depth, [8.0, 8.0]);
        let b = shade([1.3, -0.3], &p, &Probe, &depth, [8.0, 8.0]);
        assert!((a[0] - b[0]).abs() < 1e-5);
        assert!((a[1] - b[1]).abs() < 1e-5);
    }

    #[test]
    fn flat_depth_reproduces_the_color_texel() {
        let image = TextureImage::from_fn(4, 4, |x, y| {
            [x as f32 / 3.0, y as f32 / 3.0, 0.5, 1.0]
        });
        let depth = Flat([0.5, 0.0, 0.0, 1.0]);
        let mut p = params();
        p.x_diff = 9.0;
        p.y_diff = -9.0;
        p.border_size_x = 0.0;
        p.border_size_y = 0.0;
        let out = shade([0.625, 0.125], &p, &image, &depth, [4.0, 4.0]);
        assert!((out[0] - 2.0 / 3.0).abs() < 1e-5, "{out:?}");
        assert!(out[1].abs() < 1e-5, "{out:?}");
    }
}
