use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),
    #[error("malformed assignment '{0}'; expected NAME=VALUE")]
    MalformedAssignment(String),
    #[error("invalid value '{value}' for parameter '{name}'")]
    InvalidValue { name: String, value: String },
}

/// Every scalar control that feeds the view synthesis kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    Threshold,
    Protrude,
    XDiff,
    YDiff,
    ScaleX,
    ScaleY,
    OffsetX,
    OffsetY,
    BlurSize,
    BlurDepth,
    DepthImageBlurSize,
    MaxScale,
    BorderSizeX,
    BorderSizeY,
}

impl ParamId {
    pub const ALL: [ParamId; 14] = [
        ParamId::Threshold,
        ParamId::Protrude,
        ParamId::XDiff,
        ParamId::YDiff,
        ParamId::ScaleX,
        ParamId::ScaleY,
        ParamId::OffsetX,
        ParamId::OffsetY,
        ParamId::BlurSize,
        ParamId::BlurDepth,
        ParamId::DepthImageBlurSize,
        ParamId::MaxScale,
        ParamId::BorderSizeX,
        ParamId::BorderSizeY,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParamId::Threshold => "threshold",
            ParamId::Protrude => "protrude",
            ParamId::XDiff => "x_diff",
            ParamId::YDiff => "y_diff",
            ParamId::ScaleX => "scale_x",
            ParamId::ScaleY => "scale_y",
            ParamId::OffsetX => "offset_x",
            ParamId::OffsetY => "offset_y",
            ParamId::BlurSize => "blur_size",
            ParamId::BlurDepth => "blur_depth",
            ParamId::DepthImageBlurSize => "depth_image_blur_size",
            ParamId::MaxScale => "max_scale",
            ParamId::BorderSizeX => "border_size_x",
            ParamId::BorderSizeY => "border_size_y",
        }
    }

    /// Name of the matching input in the fragment shader's uniform block.
    pub fn uniform_name(self) -> &'static str {
        match self {
            ParamId::Threshold => "u_threshold",
            ParamId::Protrude => "u_protrude",
            ParamId::XDiff => "u_x_diff",
            ParamId::YDiff => "u_y_diff",
            ParamId::ScaleX => "u_scaleX",
            ParamId::ScaleY => "u_scaleY",
            ParamId::OffsetX => "u_offsetX",
            ParamId::OffsetY => "u_offsetY",
            ParamId::BlurSize => "u_blurSize",
            ParamId::BlurDepth => "u_blurDepth",
            ParamId::DepthImageBlurSize => "u_depthImageBlurSize",
            ParamId::MaxScale => "u_maxScale",
            ParamId::BorderSizeX => "u_borderSizeX",
            ParamId::BorderSizeY => "u_borderSizeY",
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize_name(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|ch| *ch != '_' && *ch != '-')
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

impl FromStr for ParamId {
    type Err = ParamError;

    /// Accepts `x_diff`, `xDiff`, `scaleX`, `border-size-x` and friends.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_name(value);
        ParamId::ALL
            .into_iter()
            .find(|id| normalize_name(id.name()) == wanted)
            .ok_or_else(|| ParamError::Unknown(value.trim().to_string()))
    }
}

/// Parses a `NAME=VALUE` override as given on the command line.
pub fn parse_assignment(raw: &str) -> Result<(ParamId, f32), ParamError> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| ParamError::MalformedAssignment(raw.to_string()))?;
    let id: ParamId = name.parse()?;
    let parsed = value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParamError::InvalidValue {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
        })?;
    Ok((id, parsed))
}

/// RGB triple with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BorderColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl BorderColor {
    pub const BLACK: BorderColor = BorderColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Decodes `#RRGGBB` (the `#` is optional, digits are case-insensitive).
    /// Anything else decodes to black.
    pub fn from_hex(value: &str) -> Self {
        Self::try_from_hex(value).unwrap_or(Self::BLACK)
    }

    pub fn try_from_hex(value: &str) -> Option<Self> {
        let digits = value.strip_prefix('#').unwrap_or(value);
        if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .ok()
                .map(|byte| byte as f32 / 255.0)
        };
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_hex(self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }
}

/// Current value of every rendering control.
///
/// `max_scale` is `None` when the control surface does not expose it; the
/// renderer then leaves the matching uniform untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderParameters {
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
    pub max_scale: Option<f32>,
    pub border_color: BorderColor,
    pub border_size_x: f32,
    pub border_size_y: f32,
}

impl RenderParameters {
    pub fn get(&self, id: ParamId) -> Option<f32> {
        let value = match id {
            ParamId::Threshold => self.threshold,
            ParamId::Protrude => self.protrude,
            ParamId::XDiff => self.x_diff,
            ParamId::YDiff => self.y_diff,
            ParamId::ScaleX => self.scale_x,
            ParamId::ScaleY => self.scale_y,
            ParamId::OffsetX => self.offset_x,
            ParamId::OffsetY => self.offset_y,
            ParamId::BlurSize => self.blur_size,
            ParamId::BlurDepth => self.blur_depth,
            ParamId::DepthImageBlurSize => self.depth_image_blur_size,
            ParamId::MaxScale => return self.max_scale,
            ParamId::BorderSizeX => self.border_size_x,
            ParamId::BorderSizeY => self.border_size_y,
        };
        Some(value)
    }

    pub fn set(&mut self, id: ParamId, value: f32) {
        let slot = match id {
            ParamId::Threshold => &mut self.threshold,
            ParamId::Protrude => &mut self.protrude,
            ParamId::XDiff => &mut self.x_diff,
            ParamId::YDiff => &mut self.y_diff,
            ParamId::ScaleX => &mut self.scale_x,
            ParamId::ScaleY => &mut self.scale_y,
            ParamId::OffsetX => &mut self.offset_x,
            ParamId::OffsetY => &mut self.offset_y,
            ParamId::BlurSize => &mut self.blur_size,
            ParamId::BlurDepth => &mut self.blur_depth,
            ParamId::DepthImageBlurSize => &mut self.depth_image_blur_size,
            ParamId::MaxScale => {
                self.max_scale = Some(value);
                return;
            }
            ParamId::BorderSizeX => &mut self.border_size_x,
            ParamId::BorderSizeY => &mut self.border_size_y,
        };
        *slot = value;
    }

    pub fn displacement(&self) -> (f32, f32) {
        (self.x_diff, self.y_diff)
    }
}
