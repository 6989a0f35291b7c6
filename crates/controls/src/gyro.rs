use std::fmt;

use crossbeam_channel::{Receiver, TryRecvError};
use quiltconfig::{ParamId, SliderSpec};
use tracing::{debug, info, warn};

use crate::animation::CancellationToken;
use crate::sensor::{GyroError, OrientationSample, OrientationSensor, ScreenOrientation};
use crate::store::{ParamEvent, ParameterStore};

/// Fraction of the remaining distance covered each frame.
pub const SMOOTHING_ALPHA: f32 = 0.15;
/// Tilt in degrees that maps to full deflection.
pub const FULL_TILT_DEGREES: f32 = 90.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GyroStatus {
    Disabled,
    Enabled,
    Failed(String),
}

impl fmt::Display for GyroStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GyroStatus::Disabled => f.write_str("gyro off"),
            GyroStatus::Enabled => f.write_str("gyro on"),
            GyroStatus::Failed(reason) => write!(f, "gyro denied or unsupported ({reason})"),
        }
    }
}

#[derive(Debug)]
struct ActiveGyro {
    samples: Receiver<OrientationSample>,
    token: CancellationToken,
    /// `(beta0, gamma0)`, captured from the first sample.
    baseline: Option<(f32, f32)>,
    snapshot: (f32, f32),
    current: (f32, f32),
    target: (f32, f32),
}

/// Smooths device tilt into the displacement parameters.
#[derive(Debug)]
pub struct GyroController {
    active: Option<ActiveGyro>,
    sensitivity_range: SliderSpec,
    sensitivity: f32,
    status: GyroStatus,
}

impl GyroController {
    pub fn new(sensitivity: SliderSpec) -> Self {
        Self {
            active: None,
            sensitivity_range: sensitivity,
            sensitivity: sensitivity.value,
            status: GyroStatus::Disabled,
        }
    }

    pub fn status(&self) -> &GyroStatus {
        &self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, value: f32) -> f32 {
        if value.is_finite() {
            self.sensitivity = self.sensitivity_range.clamp(value);
        }
        self.sensitivity
    }

    pub fn current(&self) -> Option<(f32, f32)> {
        self.active.as_ref().map(|gyro| gyro.current)
    }

    pub fn target(&self) -> Option<(f32, f32)> {
        self.active.as_ref().map(|gyro| gyro.target)
    }

    pub fn baseline(&self) -> Option<(f32, f32)> {
        self.active.as_ref().and_then(|gyro| gyro.baseline)
    }

    /// Asks `sensor` for permission and starts listening. On failure the
    /// controller stays disabled and reports [`GyroStatus::Failed`].
    ///
    /// The returned token is cancelled by [`GyroController::disable`]; frame
    /// schedulers should stop when it fires.
    pub fn enable(
        &mut self,
        sensor: &mut dyn OrientationSensor,
        store: &ParameterStore,
    ) -> Result<CancellationToken, GyroError> {
        if let Some(active) = &self.active {
            return Ok(active.token.clone());
        }

        let subscribed = sensor
            .request_permission()
            .and_then(|()| sensor.subscribe());
        let samples = match subscribed {
            Ok(samples) => samples,
            Err(err) => {
                warn!(error = %err, "gyroscope unavailable");
                self.status = GyroStatus::Failed(err.to_string());
                return Err(err);
            }
        };

        let snapshot = store.params().displacement();
        let token = CancellationToken::new();
        self.active = Some(ActiveGyro {
            samples,
            token: token.clone(),
            baseline: None,
            snapshot,
            current: snapshot,
            target: snapshot,
        });
        self.status = GyroStatus::Enabled;
        info!(x = snapshot.0, y = snapshot.1, "gyroscope control enabled");
        Ok(token)
    }

    pub fn disable(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            info!("gyroscope control disabled");
        }
        self.status = GyroStatus::Disabled;
    }

    /// Folds one orientation reading into the smoothing target.
    pub fn handle_sample(&mut self, sample: OrientationSample, store: &ParameterStore) {
        let sensitivity = self.sensitivity;
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.token.is_cancelled() {
            return;
        }

        let Some((beta0, gamma0)) = active.baseline else {
            active.baseline = Some((sample.beta, sample.gamma));
            active.target = active.snapshot;
            debug!(beta = sample.beta, gamma = sample.gamma, "gyro baseline captured");
            return;
        };

        let (x, y) = tilt_to_displacement(
            sample.beta - beta0,
            sample.gamma - gamma0,
            sensitivity,
            sample.screen,
        );
        let clamp = |id: ParamId, value: f32| {
            store
                .slider(id)
                .map(|spec| spec.clamp(value))
                .unwrap_or(value)
        };
        active.target = (
            clamp(ParamId::XDiff, active.snapshot.0 + x),
            clamp(ParamId::YDiff, active.snapshot.1 + y),
        );
    }

    /// One animation frame: drain queued samples, step toward the target and
    /// write the result. Returns `false` when nothing ran.
    pub fn tick(&mut self, store: &mut ParameterStore) -> bool {
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        if active.token.is_cancelled() {
            return false;
        }

        let mut pending = Vec::new();
        let mut disconnected = false;
        loop {
            match active.samples.try_recv() {
                Ok(sample) => pending.push(sample),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        for sample in pending {
            self.handle_sample(sample, store);
        }
        if disconnected {
            warn!("orientation sensor disconnected; disabling gyroscope control");
            self.disable();
            self.status = GyroStatus::Failed(GyroError::Disconnected.to_string());
            return false;
        }

        let Some(active) = self.active.as_mut() else {
            return false;
        };
        active.current.0 += (active.target.0 - active.current.0) * SMOOTHING_ALPHA;
        active.current.1 += (active.target.1 - active.current.1) * SMOOTHING_ALPHA;
        let (x, y) = active.current;
        store.apply(ParamEvent::Set {
            id: ParamId::XDiff,
            value: x,
        });
        store.apply(ParamEvent::Set {
            id: ParamId::YDiff,
            value: y,
        });
        true
    }
}

/// Maps tilt deltas in degrees to a displacement offset. Landscape screens
/// rotate the axes so the control feels the same either way up.
pub fn tilt_to_displacement(
    delta_beta: f32,
    delta_gamma: f32,
    sensitivity: f32,
    screen: ScreenOrientation,
) -> (f32, f32) {
    let norm_gamma = (delta_gamma / FULL_TILT_DEGREES).clamp(-1.0, 1.0);
    let norm_beta = (delta_beta / FULL_TILT_DEGREES).clamp(-1.0, 1.0);
    let x = -norm_gamma * 0.5 * sensitivity;
    let y = -norm_beta * 0.5 * sensitivity;
    match screen {
        ScreenOrientation::Portrait => (x, y),
        ScreenOrientation::Landscape => (-y, x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{ChannelSensor, DeniedSensor, UnavailableSensor};
    use quiltconfig::DEFAULT_GYRO_SENSITIVITY;

    fn controller() -> GyroController {
        GyroController::new(DEFAULT_GYRO_SENSITIVITY)
    }

    #[test]
    fn permission_failure_leaves_controller_disabled() {
        let store = ParameterStore::default();
        let mut gyro = controller();

        assert_eq!(
            gyro.enable(&mut DeniedSensor, &store).unwrap_err(),
            GyroError::Denied
        );
        assert!(!gyro.is_enabled());
        assert!(matches!(gyro.status(), GyroStatus::Failed(_)));

        assert_eq!(
            gyro.enable(&mut UnavailableSensor, &store).unwrap_err(),
            GyroError::Unsupported
        );
        assert!(gyro.status().to_string().contains("denied or unsupported"));
    }

    #[test]
    fn first_sample_only_sets_baseline() {
        let mut store = ParameterStore::default();
        store.apply(ParamEvent::Set {
            id: ParamId::XDiff,
            value: 2.0,
        });
        let (mut sensor, sender) = ChannelSensor::channel();
        let mut gyro = controller();
        gyro.enable(&mut sensor, &store).unwrap();

        sender.send(OrientationSample::new(30.0, -10.0)).unwrap();
        assert!(gyro.tick(&mut store));
        assert_eq!(gyro.baseline(), Some((30.0, -10.0)));
        assert_eq!(gyro.target(), Some((2.0, 0.0)));
        assert_eq!(store.params().displacement(), (2.0, 0.0));
    }

    #[test]
    fn tilt_moves_target_relative_to_baseline() {
        let store = ParameterStore::default();
        let (mut sensor, _sender) = ChannelSensor::channel();
        let mut gyro = controller();
        gyro.enable(&mut sensor, &store).unwrap();

        gyro.handle_sample(OrientationSample::new(10.0, 10.0), &store);
        // gamma +45 -> x = -0.5 * 0.5 * 10; beta -18 -> y = 0.2 * 0.5 * 10
        gyro.handle_sample(OrientationSample::new(-8.0, 55.0), &store);
        let (x, y) = gyro.target().unwrap();
        assert!((x + 2.5).abs() < 1e-5);
        assert!((y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn landscape_rotates_axes() {
        let portrait = tilt_to_displacement(-18.0, 45.0, 10.0, ScreenOrientation::Portrait);
        let landscape = tilt_to_displacement(-18.0, 45.0, 10.0, ScreenOrientation::Landscape);
        assert_eq!(landscape, (-portrait.1, portrait.0));
    }

    #[test]
    fn landscape_samples_steer_the_vertical_axis() {
        let mut store = ParameterStore::default();
        let (mut sensor, sender) = ChannelSensor::channel();
        let mut gyro = controller();
        gyro.enable(&mut sensor, &store).unwrap();

        sender.send(OrientationSample::new(0.0, 0.0).landscape()).unwrap();
        sender.send(OrientationSample::new(0.0, 45.0).landscape()).unwrap();
        assert!(gyro.tick(&mut store));

        // Portrait would give (-2.5, 0); turned sideways that lands on y.
        let (x, y) = gyro.target().unwrap();
        assert!(x.abs() < 1e-5);
        assert!((y + 2.5).abs() < 1e-5);
        let (_, y_diff) = store.params().displacement();
        assert!(y_diff < 0.0);
    }

    #[test]
    fn target_is_clamped_to_sliders() {
        let store = ParameterStore::default();
        let (mut sensor, _sender) = ChannelSensor::channel();
        let mut gyro = GyroController::new(SliderSpec::new(0.0, 100.0, 100.0));
        gyro.enable(&mut sensor, &store).unwrap();
        gyro.handle_sample(OrientationSample::default(), &store);
        gyro.handle_sample(OrientationSample::new(400.0, -400.0), &store);
        assert_eq!(gyro.target(), Some((10.0, -10.0)));
    }

    #[test]
    fn smoothing_shrinks_error_geometrically() {
        let mut store = ParameterStore::default();
        let (mut sensor, _sender) = ChannelSensor::channel();
        let mut gyro = controller();
        gyro.enable(&mut sensor, &store).unwrap();
        gyro.handle_sample(OrientationSample::default(), &store);
        gyro.handle_sample(OrientationSample::new(0.0, -90.0), &store);
        let target = gyro.target().unwrap().0;
        assert_eq!(target, 5.0);

        for n in 1..=30 {
            gyro.tick(&mut store);
            let expected = target * 0.85f32.powi(n);
            let error = (target - gyro.current().unwrap().0).abs();
            assert!((error - expected).abs() < 1e-4, "frame {n}: {error} vs {expected}");
        }
        let range = store.slider(ParamId::XDiff).unwrap().range();
        assert!((target - store.params().x_diff).abs() < 0.01 * range);
    }

    #[test]
    fn disable_cancels_and_reenable_starts_fresh() {
        let mut store = ParameterStore::default();
        let (mut sensor, sender) = ChannelSensor::channel();
        let mut gyro = controller();
        let token = gyro.enable(&mut sensor, &store).unwrap();
        gyro.handle_sample(OrientationSample::new(5.0, 5.0), &store);

        gyro.disable();
        assert!(token.is_cancelled());
        assert_eq!(gyro.baseline(), None);
        assert_eq!(*gyro.status(), GyroStatus::Disabled);

        store.take_render_request();
        sender.send(OrientationSample::new(50.0, 50.0)).unwrap();
        assert!(!gyro.tick(&mut store));
        assert!(!store.render_pending());

        let fresh = gyro.enable(&mut sensor, &store).unwrap();
        assert!(!fresh.is_cancelled());
        assert_eq!(gyro.baseline(), None);
        sender.send(OrientationSample::new(-20.0, 0.0)).unwrap();
        gyro.tick(&mut store);
        assert_eq!(gyro.baseline(), Some((-20.0, 0.0)));
    }

    #[test]
    fn lost_sensor_disables_control() {
        let mut store = ParameterStore::default();
        let (mut sensor, sender) = ChannelSensor::channel();
        let mut gyro = controller();
        gyro.enable(&mut sensor, &store).unwrap();
        drop(sender);
        drop(sensor);
        assert!(!gyro.tick(&mut store));
        assert!(!gyro.is_enabled());
        assert!(matches!(gyro.status(), GyroStatus::Failed(_)));
    }

    #[test]
    fn sensitivity_is_clamped() {
        let mut gyro = controller();
        assert_eq!(gyro.set_sensitivity(50.0), 20.0);
        assert_eq!(gyro.set_sensitivity(f32::NAN), 20.0);
        assert_eq!(gyro.set_sensitivity(4.0), 4.0);
    }
}
