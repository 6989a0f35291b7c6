use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod params;

pub use params::{parse_assignment, BorderColor, ParamError, ParamId, RenderParameters};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Range and initial value of a single control, the way a range input holds them.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SliderSpec {
    pub min: f32,
    pub max: f32,
    pub value: f32,
}

impl SliderSpec {
    pub const fn new(min: f32, max: f32, value: f32) -> Self {
        Self { min, max, value }
    }

    /// Clamps into `[min, max]`. NaN maps to `min`.
    pub fn clamp(&self, value: f32) -> f32 {
        value.max(self.min).min(self.max)
    }

    pub fn range(&self) -> f32 {
        self.max - self.min
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    fn merged(self, patch: &SliderPatch) -> Self {
        Self {
            min: patch.min.unwrap_or(self.min),
            max: patch.max.unwrap_or(self.max),
            value: patch.value.unwrap_or(self.value),
        }
    }

    fn check(&self, name: &str) -> Result<(), ConfigError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.value.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "slider '{name}' must use finite numbers"
            )));
        }
        if self.min >= self.max {
            return Err(ConfigError::Invalid(format!(
                "slider '{name}' min ({}) must be less than max ({})",
                self.min, self.max
            )));
        }
        if !self.contains(self.value) {
            return Err(ConfigError::Invalid(format!(
                "slider '{name}' value {} lies outside [{}, {}]",
                self.value, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Partial slider table; omitted keys keep the built-in value.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SliderPatch {
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub value: Option<f32>,
}

/// `[sliders.<name>]` accepts a table, or `false` to remove an optional control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SliderEntry {
    Enabled(bool),
    Patch(SliderPatch),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BorderSection {
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GyroSection {
    pub sensitivity: Option<SliderPatch>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuiltConfig {
    pub version: u32,
    #[serde(default)]
    pub sliders: BTreeMap<String, SliderEntry>,
    #[serde(default)]
    pub border: BorderSection,
    #[serde(default)]
    pub gyro: GyroSection,
}

impl Default for QuiltConfig {
    fn default() -> Self {
        Self {
            version: 1,
            sliders: BTreeMap::new(),
            border: BorderSection::default(),
            gyro: GyroSection::default(),
        }
    }
}

/// Every control the viewer exposes, after config has been merged over the
/// built-in table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSurface {
    sliders: BTreeMap<ParamId, SliderSpec>,
    pub border_color: BorderColor,
    pub gyro_sensitivity: SliderSpec,
}

pub const DEFAULT_BORDER_COLOR: &str = "#000000";
pub const DEFAULT_GYRO_SENSITIVITY: SliderSpec = SliderSpec::new(0.0, 20.0, 10.0);

pub fn default_slider(id: ParamId) -> SliderSpec {
    match id {
        ParamId::Threshold => SliderSpec::new(1.0, 500.0, 100.0),
        ParamId::Protrude => SliderSpec::new(-1.0, 1.0, 0.0),
        ParamId::XDiff | ParamId::YDiff => SliderSpec::new(-10.0, 10.0, 0.0),
        ParamId::ScaleX | ParamId::ScaleY => SliderSpec::new(0.5, 2.0, 1.0),
        ParamId::OffsetX | ParamId::OffsetY => SliderSpec::new(-0.5, 0.5, 0.0),
        ParamId::BlurSize | ParamId::DepthImageBlurSize => SliderSpec::new(0.0, 10.0, 0.0),
        ParamId::BlurDepth => SliderSpec::new(0.0, 1.0, 0.0),
        ParamId::MaxScale => SliderSpec::new(1.0, 4.0, 1.5),
        ParamId::BorderSizeX | ParamId::BorderSizeY => SliderSpec::new(0.0, 0.49, 0.02),
    }
}

impl Default for ControlSurface {
    fn default() -> Self {
        Self {
            sliders: ParamId::ALL
                .into_iter()
                .map(|id| (id, default_slider(id)))
                .collect(),
            border_color: BorderColor::from_hex(DEFAULT_BORDER_COLOR),
            gyro_sensitivity: DEFAULT_GYRO_SENSITIVITY,
        }
    }
}

impl ControlSurface {
    pub fn slider(&self, id: ParamId) -> Option<&SliderSpec> {
        self.sliders.get(&id)
    }

    pub fn has(&self, id: ParamId) -> bool {
        self.sliders.contains_key(&id)
    }

    pub fn sliders(&self) -> impl Iterator<Item = (ParamId, &SliderSpec)> {
        self.sliders.iter().map(|(id, spec)| (*id, spec))
    }

    pub fn without(mut self, id: ParamId) -> Self {
        self.sliders.remove(&id);
        self
    }

    /// Parameters as the controls read before any input arrives.
    pub fn initial_parameters(&self) -> RenderParameters {
        let value = |id: ParamId| {
            self.slider(id)
                .map(|spec| spec.value)
                .unwrap_or_else(|| default_slider(id).value)
        };
        RenderParameters {
            threshold: value(ParamId::Threshold),
            protrude: value(ParamId::Protrude),
            x_diff: value(ParamId::XDiff),
            y_diff: value(ParamId::YDiff),
            scale_x: value(ParamId::ScaleX),
            scale_y: value(ParamId::ScaleY),
            offset_x: value(ParamId::OffsetX),
            offset_y: value(ParamId::OffsetY),
            blur_size: value(ParamId::BlurSize),
            blur_depth: value(ParamId::BlurDepth),
            depth_image_blur_size: value(ParamId::DepthImageBlurSize),
            max_scale: self.slider(ParamId::MaxScale).map(|spec| spec.value),
            border_color: self.border_color,
            border_size_x: value(ParamId::BorderSizeX),
            border_size_y: value(ParamId::BorderSizeY),
        }
    }
}

impl QuiltConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: QuiltConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.control_surface().map(|_| ())
    }

    pub fn control_surface(&self) -> Result<ControlSurface, ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let mut surface = ControlSurface::default();

        for (name, entry) in &self.sliders {
            let id: ParamId = name
                .parse()
                .map_err(|err: ParamError| ConfigError::Invalid(err.to_string()))?;
            match entry {
                SliderEntry::Enabled(false) if id == ParamId::MaxScale => {
                    surface.sliders.remove(&id);
                }
                SliderEntry::Enabled(false) => {
                    return Err(ConfigError::Invalid(format!(
                        "slider '{name}' is required and cannot be disabled"
                    )));
                }
                SliderEntry::Enabled(true) => {}
                SliderEntry::Patch(patch) => {
                    let merged = default_slider(id).merged(patch);
                    surface.sliders.insert(id, merged);
                }
            }
        }

        for (id, spec) in &surface.sliders {
            spec.check(id.name())?;
            validate_slider_bounds(*id, spec)?;
        }

        if let Some(raw) = &self.border.color {
            surface.border_color = BorderColor::try_from_hex(raw).unwrap_or_else(|| {
                tracing::debug!(color = %raw, "malformed border colour; using black");
                BorderColor::BLACK
            });
        }

        if let Some(patch) = &self.gyro.sensitivity {
            let merged = DEFAULT_GYRO_SENSITIVITY.merged(patch);
            merged.check("gyro.sensitivity")?;
            if merged.min < 0.0 {
                return Err(ConfigError::Invalid(
                    "gyro.sensitivity min must be >= 0".into(),
                ));
            }
            surface.gyro_sensitivity = merged;
        }

        Ok(surface)
    }
}

fn validate_slider_bounds(id: ParamId, spec: &SliderSpec) -> Result<(), ConfigError> {
    match id {
        ParamId::Threshold if spec.min <= 0.0 => Err(ConfigError::Invalid(
            "slider 'threshold' min must be greater than zero".into(),
        )),
        ParamId::BorderSizeX | ParamId::BorderSizeY if spec.min < 0.0 || spec.max >= 0.5 => {
            Err(ConfigError::Invalid(format!(
                "slider '{id}' must stay within [0, 0.5)"
            )))
        }
        ParamId::BlurSize | ParamId::DepthImageBlurSize | ParamId::BlurDepth
            if spec.min < 0.0 =>
        {
            Err(ConfigError::Invalid(format!("slider '{id}' min must be >= 0")))
        }
        _ => Ok(()),
    }
}
