use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use controls::{
    AnimationLoop, ChannelSensor, DragController, FrameClock, GyroController, OrientationSensor,
    ParamEvent, ParameterStore, Pointer, SystemClock, TiltSimulator, UnavailableSensor,
};
use quiltconfig::ParamId;
use tracing::{debug, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuState;
use crate::loader::{spawn_decode, DecodedImage, LoadError};
use crate::types::{ImageSlot, RendererConfig, TiltSource, ViewportState};

/// Degrees of simulated tilt per arrow key press.
const TILT_STEP_DEGREES: f32 = 5.0;
/// Displacement nudge per arrow key press when no sensor is simulated.
const NUDGE_STEP: f32 = 0.5;
/// Share of the selected slider's range moved per `+`/`-` press.
const ADJUST_FRACTION: f32 = 0.02;

#[derive(Debug)]
enum WindowCommand {
    ImageDecoded(Box<Result<DecodedImage, LoadError>>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyAction {
    ToggleGyro,
    Tilt { beta: f32, gamma: f32 },
    ToggleLandscape,
    SelectNext,
    Adjust { steps: f32 },
    Exit,
}

fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(KeyAction::Exit),
        Key::Named(NamedKey::ArrowLeft) => Some(KeyAction::Tilt {
            beta: 0.0,
            gamma: -TILT_STEP_DEGREES,
        }),
        Key::Named(NamedKey::ArrowRight) => Some(KeyAction::Tilt {
            beta: 0.0,
            gamma: TILT_STEP_DEGREES,
        }),
        Key::Named(NamedKey::ArrowUp) => Some(KeyAction::Tilt {
            beta: -TILT_STEP_DEGREES,
            gamma: 0.0,
        }),
        Key::Named(NamedKey::ArrowDown) => Some(KeyAction::Tilt {
            beta: TILT_STEP_DEGREES,
            gamma: 0.0,
        }),
        Key::Character(value) if value.eq_ignore_ascii_case("g") => Some(KeyAction::ToggleGyro),
        Key::Character(value) if value.eq_ignore_ascii_case("l") => {
            Some(KeyAction::ToggleLandscape)
        }
        Key::Named(NamedKey::Tab) => Some(KeyAction::SelectNext),
        Key::Character(value) if value == "+" || value == "=" => {
            Some(KeyAction::Adjust { steps: 1.0 })
        }
        Key::Character(value) if value == "-" || value == "_" => {
            Some(KeyAction::Adjust { steps: -1.0 })
        }
        _ => None,
    }
}

/// Everything the preview mutates in response to input. Kept apart from the
/// GPU so the control flow can run without a window.
pub(crate) struct ViewerControls<C: FrameClock + Clone = SystemClock> {
    store: ParameterStore,
    drag: DragController,
    gyro: GyroController,
    sensor: Box<dyn OrientationSensor>,
    simulator: Option<TiltSimulator>,
    animation: Option<AnimationLoop<C>>,
    clock: C,
    refresh_millihertz: Option<u32>,
    pointer: Option<Pointer>,
    shift_held: bool,
    selected: ParamId,
}

impl<C: FrameClock + Clone> ViewerControls<C> {
    pub(crate) fn new(config: &RendererConfig, clock: C) -> Self {
        let store = config.store.clone();
        let mut gyro = GyroController::new(store.surface().gyro_sensitivity);
        if let Some(sensitivity) = config.gyro_sensitivity {
            gyro.set_sensitivity(sensitivity);
        }
        let (sensor, simulator): (Box<dyn OrientationSensor>, Option<TiltSimulator>) =
            match config.tilt {
                TiltSource::Unavailable => (Box::new(UnavailableSensor), None),
                TiltSource::Simulated => {
                    let (sensor, simulator) = ChannelSensor::with_simulator();
                    (Box::new(sensor), Some(simulator))
                }
            };
        Self {
            store,
            drag: DragController::new(),
            gyro,
            sensor,
            simulator,
            animation: None,
            clock,
            refresh_millihertz: None,
            pointer: None,
            shift_held: false,
            selected: ParamId::Threshold,
        }
    }

    pub(crate) fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub(crate) fn request_render(&mut self) {
        self.store.request_render();
    }

    pub(crate) fn take_render_request(&mut self) -> bool {
        self.store.take_render_request()
    }

    pub(crate) fn set_refresh_rate(&mut self, millihertz: Option<u32>) {
        self.refresh_millihertz = millihertz;
    }

    pub(crate) fn title(&self) -> String {
        match self.store.get(self.selected) {
            Some(value) => format!(
                "quiltview | {} = {value:.3} | {}",
                self.selected,
                self.gyro.status()
            ),
            None => format!("quiltview | {}", self.gyro.status()),
        }
    }

    /// Moves the keyboard selection to the next control the surface offers,
    /// wrapping around.
    fn select_next(&mut self) {
        let start = ParamId::ALL
            .iter()
            .position(|id| *id == self.selected)
            .unwrap_or(0);
        let next = (1..=ParamId::ALL.len())
            .map(|offset| ParamId::ALL[(start + offset) % ParamId::ALL.len()])
            .find(|id| self.store.surface().has(*id));
        if let Some(id) = next {
            self.selected = id;
        }
    }

    /// Nudges the selected control by a fixed share of its slider range.
    fn adjust_selected(&mut self, steps: f32) {
        let Some(spec) = self.store.slider(self.selected).copied() else {
            return;
        };
        self.store.apply(ParamEvent::Nudge {
            id: self.selected,
            delta: spec.range() * ADJUST_FRACTION * steps,
        });
    }

    pub(crate) fn set_shift(&mut self, held: bool) {
        self.shift_held = held;
    }

    /// Dropped files replace the color image, or the depth map with Shift held.
    pub(crate) fn dropped_slot(&self) -> ImageSlot {
        if self.shift_held {
            ImageSlot::Depth
        } else {
            ImageSlot::Color
        }
    }

    pub(crate) fn pointer_moved(&mut self, pointer: Pointer, client_size: (f32, f32)) {
        self.pointer = Some(pointer);
        self.drag.update(pointer, client_size, &mut self.store);
    }

    pub(crate) fn pointer_pressed(&mut self) {
        if let Some(pointer) = self.pointer {
            self.drag.begin(pointer, &self.store);
        }
    }

    pub(crate) fn pointer_released(&mut self) {
        self.drag.end();
    }

    pub(crate) fn toggle_gyro(&mut self) {
        if self.gyro.is_enabled() {
            self.gyro.disable();
            self.animation = None;
            return;
        }
        match self.gyro.enable(self.sensor.as_mut(), &self.store) {
            Ok(token) => {
                self.animation = Some(AnimationLoop::with_refresh_rate(
                    self.clock.clone(),
                    self.refresh_millihertz,
                    token,
                ));
                // The simulator's current pose becomes the baseline, so the
                // first arrow press after enabling already tilts.
                if let Some(simulator) = self.simulator.as_ref() {
                    if let Err(err) = simulator.publish() {
                        warn!(error = %err, "simulated baseline dropped");
                    }
                }
            }
            Err(err) => debug!(error = %err, "gyro stays disabled"),
        }
    }

    fn apply_key(&mut self, action: KeyAction) {
        match action {
            KeyAction::ToggleGyro => self.toggle_gyro(),
            KeyAction::Tilt { beta, gamma } => match self.simulator.as_mut() {
                Some(simulator) => {
                    if let Err(err) = simulator.tilt(beta, gamma) {
                        warn!(error = %err, "simulated tilt dropped");
                    }
                }
                None => self.nudge(beta, gamma),
            },
            KeyAction::ToggleLandscape => {
                if let Some(simulator) = self.simulator.as_mut() {
                    match simulator.toggle_landscape() {
                        Ok(screen) => info!(?screen, "simulated screen orientation"),
                        Err(err) => warn!(error = %err, "simulated rotation dropped"),
                    }
                }
            }
            KeyAction::SelectNext => self.select_next(),
            KeyAction::Adjust { steps } => self.adjust_selected(steps),
            KeyAction::Exit => {}
        }
    }

    /// Arrow keys move the view directly, in the direction a tilt would.
    fn nudge(&mut self, beta: f32, gamma: f32) {
        if gamma != 0.0 {
            self.store.apply(ParamEvent::Nudge {
                id: ParamId::XDiff,
                delta: -gamma / TILT_STEP_DEGREES * NUDGE_STEP,
            });
        }
        if beta != 0.0 {
            self.store.apply(ParamEvent::Nudge {
                id: ParamId::YDiff,
                delta: -beta / TILT_STEP_DEGREES * NUDGE_STEP,
            });
        }
    }

    /// Runs one gyro smoothing frame when it is due. Returns `true` when the
    /// gyro state changed in a way the title should show.
    pub(crate) fn advance(&mut self) -> bool {
        let Some(animation) = self.animation.as_mut() else {
            return false;
        };
        let gyro = &mut self.gyro;
        let store = &mut self.store;
        animation.run_frame(|| gyro.tick(store));
        if !self.gyro.is_enabled() {
            self.animation = None;
            return true;
        }
        false
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.animation
            .as_ref()
            .and_then(|animation| animation.next_deadline())
    }

    pub(crate) fn frame_due(&self) -> bool {
        self.animation
            .as_ref()
            .is_some_and(|animation| animation.ready_for_frame())
    }
}

/// Aggregates GPU state and input for the preview window. `gpu` is declared
/// before `window` so the surface is dropped first.
pub(crate) struct WindowState {
    gpu: GpuState,
    window: Arc<Window>,
    controls: ViewerControls,
    viewport: ViewportState,
    proxy: EventLoopProxy<WindowCommand>,
}

impl WindowState {
    fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        proxy: EventLoopProxy<WindowCommand>,
    ) -> Result<Self> {
        let gpu = GpuState::new(window.as_ref(), window.inner_size())?;
        let mut controls = ViewerControls::new(config, SystemClock);
        controls.set_refresh_rate(
            window
                .current_monitor()
                .and_then(|monitor| monitor.refresh_rate_millihertz()),
        );
        window.set_title(&controls.title());
        Ok(Self {
            gpu,
            window,
            controls,
            viewport: ViewportState::new(),
            proxy,
        })
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn refresh_title(&self) {
        self.window.set_title(&self.controls.title());
    }

    fn load_image(&self, slot: ImageSlot, path: PathBuf) {
        info!(%slot, path = %path.display(), "loading image");
        let proxy = self.proxy.clone();
        let spawned = spawn_decode(slot, path, move |result| {
            if proxy
                .send_event(WindowCommand::ImageDecoded(Box::new(result)))
                .is_err()
            {
                debug!("window closed before image finished decoding");
            }
        });
        if let Err(err) = spawned {
            warn!(error = %err, "failed to start image decode");
        }
    }

    fn apply_decoded(&mut self, result: Result<DecodedImage, LoadError>) {
        let decoded = match result {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(path = %err.path().display(), error = %err, "image load failed; keeping previous texture");
                return;
            }
        };
        if let Err(err) = self.gpu.set_image(decoded.slot, &decoded.pixels) {
            warn!(slot = %decoded.slot, error = %err, "image upload failed; keeping previous texture");
            return;
        }

        let (width, height) = decoded.dimensions();
        self.viewport.record(decoded.slot, (width, height));
        info!(
            slot = %decoded.slot,
            path = %decoded.path.display(),
            width,
            height,
            "image loaded"
        );
        if let Some((canvas_w, canvas_h)) = self.viewport.canvas_size() {
            if let Some(size) = self
                .window
                .request_inner_size(PhysicalSize::new(canvas_w, canvas_h))
            {
                self.gpu.resize(size);
            }
        }
        self.controls.request_render();
    }

    fn handle_key(&mut self, key: &Key) -> Option<KeyAction> {
        let action = key_action(key)?;
        self.controls.apply_key(action);
        if action != KeyAction::Exit {
            self.refresh_title();
        }
        Some(action)
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let size = self.window.inner_size();
        self.controls.pointer_moved(
            Pointer::new(position.x as f32, position.y as f32),
            (size.width as f32, size.height as f32),
        );
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.gpu.render(self.controls.store().params(), &self.viewport)
    }
}

/// Opens the preview window and runs its event loop on the calling thread
/// until the window closes.
pub(crate) fn run_window(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoopBuilder::<WindowCommand>::with_user_event()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let proxy = event_loop.create_proxy();

    let window = WindowBuilder::new()
        .with_title("quiltview")
        .with_inner_size(PhysicalSize::new(
            config.surface_size.0.max(1),
            config.surface_size.1.max(1),
        ))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &config, proxy)
        .map_err(|err| anyhow!("failed to initialise window renderer: {err:#}"))?;

    for (slot, path) in [
        (ImageSlot::Color, config.color_image.clone()),
        (ImageSlot::Depth, config.depth_image.clone()),
    ] {
        if let Some(path) = path {
            state.load_image(slot, path);
        }
    }

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::UserEvent(WindowCommand::ImageDecoded(result)) => {
            state.apply_decoded(*result);
        }
        Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::ModifiersChanged(modifiers) => {
                    state.controls.set_shift(modifiers.state().shift_key());
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed {
                        let repeatable = matches!(
                            key_action(&event.logical_key),
                            Some(KeyAction::Tilt { .. } | KeyAction::Adjust { .. })
                        );
                        if !event.repeat || repeatable {
                            if let Some(KeyAction::Exit) = state.handle_key(&event.logical_key) {
                                elwt.exit();
                            }
                        }
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    state.handle_cursor_moved(position);
                }
                WindowEvent::CursorLeft { .. } => {
                    state.controls.pointer_released();
                }
                WindowEvent::MouseInput {
                    state: button_state,
                    button: MouseButton::Left,
                    ..
                } => match button_state {
                    ElementState::Pressed => state.controls.pointer_pressed(),
                    ElementState::Released => state.controls.pointer_released(),
                },
                WindowEvent::DroppedFile(path) => {
                    let slot = state.controls.dropped_slot();
                    state.load_image(slot, path);
                }
                WindowEvent::Resized(new_size) => {
                    state.gpu.resize(new_size);
                    state.controls.request_render();
                }
                WindowEvent::RedrawRequested => match state.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.gpu.size();
                        state.gpu.resize(size);
                        state.controls.request_render();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        tracing::error!("surface out of memory; exiting preview");
                        elwt.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        warn!("surface timeout; retrying next frame");
                        state.controls.request_render();
                    }
                    Err(other) => {
                        warn!("surface error: {other:?}; retrying next frame");
                        state.controls.request_render();
                    }
                },
                _ => {}
            }
        }
        Event::AboutToWait => {
            if state.controls.frame_due() && state.controls.advance() {
                state.refresh_title();
            }
            if state.controls.take_render_request() {
                tracing::trace!("scheduler: issuing redraw now");
                state.window().request_redraw();
            }
            if let Some(deadline) = state.controls.next_deadline() {
                let ms = deadline
                    .saturating_duration_since(Instant::now())
                    .as_millis();
                tracing::trace!(deadline_ms = ms, "scheduler: waiting until next frame");
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                tracing::trace!("scheduler: idle (no redraw requested)");
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
