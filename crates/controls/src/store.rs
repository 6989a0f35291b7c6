use quiltconfig::{BorderColor, ControlSurface, ParamId, RenderParameters, SliderSpec};
use tracing::debug;

/// A single change to the parameter set. Every input source speaks this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    Set { id: ParamId, value: f32 },
    Nudge { id: ParamId, delta: f32 },
    SetBorderColor(BorderColor),
}

/// Owns the current [`RenderParameters`] together with the slider ranges that
/// bound them. Accepted events raise a render request.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    surface: ControlSurface,
    params: RenderParameters,
    render_requested: bool,
}

impl ParameterStore {
    pub fn new(surface: ControlSurface) -> Self {
        let params = surface.initial_parameters();
        Self {
            surface,
            params,
            render_requested: true,
        }
    }

    pub fn params(&self) -> &RenderParameters {
        &self.params
    }

    pub fn surface(&self) -> &ControlSurface {
        &self.surface
    }

    pub fn slider(&self, id: ParamId) -> Option<&SliderSpec> {
        self.surface.slider(id)
    }

    pub fn get(&self, id: ParamId) -> Option<f32> {
        self.params.get(id)
    }

    /// Applies `event`, clamping scalar values into their slider range.
    ///
    /// Returns `false` when the event was dropped: the control is absent or the
    /// value is not finite.
    pub fn apply(&mut self, event: ParamEvent) -> bool {
        match event {
            ParamEvent::Set { id, value } => self.write(id, value),
            ParamEvent::Nudge { id, delta } => match self.params.get(id) {
                Some(current) => self.write(id, current + delta),
                None => false,
            },
            ParamEvent::SetBorderColor(color) => {
                self.params.border_color = color;
                self.render_requested = true;
                true
            }
        }
    }

    fn write(&mut self, id: ParamId, value: f32) -> bool {
        let Some(spec) = self.surface.slider(id) else {
            debug!(param = %id, "control not present; ignoring update");
            return false;
        };
        if !value.is_finite() {
            debug!(param = %id, value, "ignoring non-finite parameter value");
            return false;
        }
        let clamped = spec.clamp(value);
        self.params.set(id, clamped);
        self.render_requested = true;
        true
    }

    pub fn request_render(&mut self) {
        self.render_requested = true;
    }

    pub fn render_pending(&self) -> bool {
        self.render_requested
    }

    /// Clears and returns the pending render flag.
    pub fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_requested)
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(ControlSurface::default())
    }
}
