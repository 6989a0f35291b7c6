use std::borrow::Cow;

use wgpu::naga::ShaderStage;

/// Compiles the pass-through quad vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quilt quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(QUILT_VERTEX_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Compiles the view-synthesis fragment shader.
pub(crate) fn compile_fragment_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quilt fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(QUILT_FRAGMENT_GLSL),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Passes quad positions straight through and forwards texture coordinates.
pub const QUILT_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec3 a_Position;
layout(location = 1) in vec2 a_TexCoord;
layout(location = 0) out vec2 v_TexCoord;

void main() {
    gl_Position = vec4(a_Position, 1.0);
    v_TexCoord = a_TexCoord;
}
";

/// GPU side of [`crate::kernel::shade`].
///
/// The uniform block layout must match `QuiltUniforms` in `gpu/uniforms.rs`.
/// Kernel input names are macros over the block fields. The textures carry a
/// single mip level, so every lookup uses `textureLod` at level 0, which keeps
/// sampling valid inside depth-dependent branches.
pub const QUILT_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_TexCoord;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform QuiltParams {
    vec4 _screen;
    vec4 _borderColor;
    float _threshold;
    float _protrude;
    float _xDiff;
    float _yDiff;
    float _scaleX;
    float _scaleY;
    float _offsetX;
    float _offsetY;
    float _blurSize;
    float _blurDepth;
    float _depthImageBlurSize;
    float _maxScale;
    float _borderSizeX;
    float _borderSizeY;
    vec2 _padding;
} ubo;

#define g_Screen ubo._screen
#define u_threshold ubo._threshold
#define u_protrude ubo._protrude
#define u_x_diff ubo._xDiff
#define u_y_diff ubo._yDiff
#define u_scaleX ubo._scaleX
#define u_scaleY ubo._scaleY
#define u_offsetX ubo._offsetX
#define u_offsetY ubo._offsetY
#define u_blurSize ubo._blurSize
#define u_blurDepth ubo._blurDepth
#define u_depthImageBlurSize ubo._depthImageBlurSize
#define u_maxScale ubo._maxScale
#define u_borderColor ubo._borderColor.rgb
#define u_borderSizeX ubo._borderSizeX
#define u_borderSizeY ubo._borderSizeY

layout(set = 1, binding = 0) uniform texture2D quilt_color_texture;
layout(set = 1, binding = 1) uniform sampler quilt_color_sampler;
layout(set = 1, binding = 2) uniform texture2D quilt_depth_texture;
layout(set = 1, binding = 3) uniform sampler quilt_depth_sampler;

#define g_Texture1 sampler2D(quilt_color_texture, quilt_color_sampler)
#define g_Texture2 sampler2D(quilt_depth_texture, quilt_depth_sampler)

vec2 mirrored(vec2 v) {
    vec2 m = mod(v, 2.0);
    return mix(m, 2.0 - m, step(1.0, m));
}

vec4 convoluteColor(vec2 uv, float size) {
    if (size < 1.0) {
        return textureLod(g_Texture1, uv, 0.0);
    }
    vec4 color = vec4(0.0);
    for (int x = 0; x < 3; x++) {
        for (int y = 0; y < 3; y++) {
            vec2 offset = vec2(float(x - 1), float(y - 1)) / g_Screen.xy * size;
            float weight = (2.0 - abs(float(x - 1))) * (2.0 - abs(float(y - 1))) / 16.0;
            color += textureLod(g_Texture1, uv + offset, 0.0) * weight;
        }
    }
    return color;
}

vec4 convoluteDepth(vec2 uv, float size) {
    if (size < 1.0) {
        return textureLod(g_Texture2, uv, 0.0);
    }
    vec4 color = vec4(0.0);
    for (int x = 0; x < 3; x++) {
        for (int y = 0; y < 3; y++) {
            vec2 offset = vec2(float(x - 1), float(y - 1)) / g_Screen.xy * size;
            color += textureLod(g_Texture2, uv + offset, 0.0) * (1.0 / 9.0);
        }
    }
    return color;
}

vec4 depthQuilts(vec2 iuv) {
    vec2 fractCoord = fract(iuv);
    vec2 uv = vec2(u_scaleX, u_scaleY) * (fractCoord - 0.5) + 0.5 + vec2(u_offsetX, u_offsetY);

    float depth = convoluteDepth(uv, u_depthImageBlurSize).r;
    float k = depth - 0.5 + u_protrude;
    vec2 fake3d = uv + k * (vec2(u_x_diff, u_y_diff) * 2.0 / u_threshold);

    if (k < 0.0 && (fractCoord.x < u_borderSizeX || fractCoord.y < u_borderSizeY
            || fractCoord.x > 1.0 - u_borderSizeX || fractCoord.y > 1.0 - u_borderSizeY)) {
        return vec4(u_borderColor, 1.0);
    }

    if (depth < u_blurDepth) {
        return convoluteColor(mirrored(fake3d), u_blurSize);
    }
    return textureLod(g_Texture1, fake3d, 0.0);
}

void main() {
    outColor = depthQuilts(v_TexCoord);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use quiltconfig::ParamId;
    use wgpu::naga;

    fn validate(stage: ShaderStage, source: &str) {
        let module = naga::front::glsl::Frontend::default()
            .parse(&naga::front::glsl::Options::from(stage), source)
            .unwrap_or_else(|err| panic!("{stage:?} shader failed to parse: {err:?}"));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{stage:?} shader failed validation: {err:?}"));
    }

    #[test]
    fn fragment_defines_every_kernel_input() {
        for id in ParamId::ALL {
            let define = format!("#define {} ubo.", id.uniform_name());
            assert!(QUILT_FRAGMENT_GLSL.contains(&define), "missing {define}");
        }
        for name in ["g_Screen", "u_borderColor", "g_Texture1", "g_Texture2"] {
            assert!(QUILT_FRAGMENT_GLSL.contains(&format!("#define {name} ")));
        }
    }

    #[test]
    fn shaders_parse_and_validate() {
        validate(ShaderStage::Vertex, QUILT_VERTEX_GLSL);
        validate(ShaderStage::Fragment, QUILT_FRAGMENT_GLSL);
    }
}
