use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GyroError {
    #[error("orientation sensor unsupported")]
    Unsupported,
    #[error("orientation permission denied")]
    Denied,
    #[error("orientation sensor disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenOrientation {
    #[default]
    Portrait,
    Landscape,
}

impl ScreenOrientation {
    pub fn toggled(self) -> Self {
        match self {
            ScreenOrientation::Portrait => ScreenOrientation::Landscape,
            ScreenOrientation::Landscape => ScreenOrientation::Portrait,
        }
    }
}

/// Front-back (`beta`) and left-right (`gamma`) tilt in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationSample {
    pub beta: f32,
    pub gamma: f32,
    pub screen: ScreenOrientation,
}

impl OrientationSample {
    pub fn new(beta: f32, gamma: f32) -> Self {
        Self {
            beta,
            gamma,
            screen: ScreenOrientation::Portrait,
        }
    }

    pub fn landscape(mut self) -> Self {
        self.screen = ScreenOrientation::Landscape;
        self
    }
}

/// Source of device orientation. Samples are delivered over a channel and
/// consumed on the control thread only.
pub trait OrientationSensor {
    fn request_permission(&mut self) -> Result<(), GyroError>;
    fn subscribe(&mut self) -> Result<Receiver<OrientationSample>, GyroError>;
}

/// Platforms without an orientation sensor.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSensor;

impl OrientationSensor for UnavailableSensor {
    fn request_permission(&mut self) -> Result<(), GyroError> {
        Err(GyroError::Unsupported)
    }

    fn subscribe(&mut self) -> Result<Receiver<OrientationSample>, GyroError> {
        Err(GyroError::Unsupported)
    }
}

/// A sensor whose permission gate always refuses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeniedSensor;

impl OrientationSensor for DeniedSensor {
    fn request_permission(&mut self) -> Result<(), GyroError> {
        Err(GyroError::Denied)
    }

    fn subscribe(&mut self) -> Result<Receiver<OrientationSample>, GyroError> {
        Err(GyroError::Denied)
    }
}

/// Sensor fed through a channel by another thread or by [`TiltSimulator`].
#[derive(Debug)]
pub struct ChannelSensor {
    receiver: Receiver<OrientationSample>,
}

impl ChannelSensor {
    pub fn channel() -> (Self, Sender<OrientationSample>) {
        let (sender, receiver) = unbounded();
        (Self { receiver }, sender)
    }

    pub fn with_simulator() -> (Self, TiltSimulator) {
        let (sensor, sender) = Self::channel();
        (sensor, TiltSimulator::new(sender))
    }
}

impl OrientationSensor for ChannelSensor {
    fn request_permission(&mut self) -> Result<(), GyroError> {
        Ok(())
    }

    fn subscribe(&mut self) -> Result<Receiver<OrientationSample>, GyroError> {
        // Anything queued while nobody listened is stale.
        let stale = self.receiver.try_iter().count();
        if stale > 0 {
            tracing::trace!(stale, "discarded queued orientation samples");
        }
        Ok(self.receiver.clone())
    }
}

/// Keyboard-driven stand-in for a physical tilt sensor.
#[derive(Debug)]
pub struct TiltSimulator {
    sender: Sender<OrientationSample>,
    beta: f32,
    gamma: f32,
    screen: ScreenOrientation,
}

impl TiltSimulator {
    pub fn new(sender: Sender<OrientationSample>) -> Self {
        Self {
            sender,
            beta: 0.0,
            gamma: 0.0,
            screen: ScreenOrientation::Portrait,
        }
    }

    pub fn sample(&self) -> OrientationSample {
        OrientationSample {
            beta: self.beta,
            gamma: self.gamma,
            screen: self.screen,
        }
    }

    /// Tilts by the given degrees and publishes the new reading.
    pub fn tilt(&mut self, delta_beta: f32, delta_gamma: f32) -> Result<(), GyroError> {
        self.beta = (self.beta + delta_beta).clamp(-180.0, 180.0);
        self.gamma = (self.gamma + delta_gamma).clamp(-90.0, 90.0);
        self.publish()
    }

    pub fn toggle_landscape(&mut self) -> Result<ScreenOrientation, GyroError> {
        self.screen = self.screen.toggled();
        self.publish()?;
        Ok(self.screen)
    }

    pub fn publish(&self) -> Result<(), GyroError> {
        self.sender
            .send(self.sample())
            .map_err(|_| GyroError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_sensors_refuse() {
        assert_eq!(
            UnavailableSensor.request_permission(),
            Err(GyroError::Unsupported)
        );
        assert_eq!(DeniedSensor.request_permission(), Err(GyroError::Denied));
    }

    #[test]
    fn subscribe_drops_stale_samples() {
        let (mut sensor, sender) = ChannelSensor::channel();
        sender.send(OrientationSample::new(10.0, 0.0)).unwrap();
        let receiver = sensor.subscribe().unwrap();
        assert!(receiver.try_recv().is_err());

        sender.send(OrientationSample::new(20.0, 5.0)).unwrap();
        assert_eq!(receiver.try_recv().unwrap().beta, 20.0);
    }

    #[test]
    fn simulator_publishes_accumulated_tilt() {
        let (mut sensor, mut sim) = ChannelSensor::with_simulator();
        let receiver = sensor.subscribe().unwrap();
        sim.tilt(5.0, -3.0).unwrap();
        sim.tilt(5.0, -3.0).unwrap();
        let latest = receiver.try_iter().last().unwrap();
        assert_eq!((latest.beta, latest.gamma), (10.0, -6.0));

        assert_eq!(sim.toggle_landscape().unwrap(), ScreenOrientation::Landscape);
        assert_eq!(
            receiver.try_recv().unwrap().screen,
            ScreenOrientation::Landscape
        );
    }
}
