use quiltconfig::ParamId;

use crate::store::{ParamEvent, ParameterStore};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pointer {
    pub x: f32,
    pub y: f32,
}

impl Pointer {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    start: Pointer,
    start_x_diff: f32,
    start_y_diff: f32,
}

/// Turns a pointer drag into displacement. Dragging pushes the scene, so the
/// pixel delta is negated.
#[derive(Debug, Default)]
pub struct DragController {
    state: Option<DragState>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_some()
    }

    pub fn begin(&mut self, pointer: Pointer, store: &ParameterStore) {
        let params = store.params();
        self.state = Some(DragState {
            start: pointer,
            start_x_diff: params.x_diff,
            start_y_diff: params.y_diff,
        });
    }

    /// Returns `true` when the move produced a parameter write.
    pub fn update(
        &mut self,
        pointer: Pointer,
        client_size: (f32, f32),
        store: &mut ParameterStore,
    ) -> bool {
        let Some(state) = self.state else {
            return false;
        };
        let (width, height) = client_size;
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        // Both axes share the horizontal slider's span.
        let Some(range) = store.slider(ParamId::XDiff).map(|spec| spec.range()) else {
            return false;
        };

        let dx = pointer.x - state.start.x;
        let dy = pointer.y - state.start.y;
        let delta_x = -dx * 2.0 / width * range;
        let delta_y = -dy * 2.0 / height * range;

        store.apply(ParamEvent::Set {
            id: ParamId::XDiff,
            value: state.start_x_diff + delta_x,
        });
        store.apply(ParamEvent::Set {
            id: ParamId::YDiff,
            value: state.start_y_diff + delta_y,
        });
        true
    }

    pub fn end(&mut self) {
        self.state = None;
    }
}
