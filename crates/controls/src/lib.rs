//! Input side of the viewer: the parameter store and the controllers that
//! write into it.
//!
//! Everything here runs on the control thread. Orientation samples produced
//! elsewhere cross over through a channel and are drained during
//! [`GyroController::tick`].

mod animation;
mod drag;
mod gyro;
mod sensor;
mod store;

pub use animation::{AnimationLoop, CancellationToken, FrameClock, ManualClock, SystemClock};
pub use drag::{DragController, Pointer};
pub use gyro::{tilt_to_displacement, GyroController, GyroStatus, FULL_TILT_DEGREES, SMOOTHING_ALPHA};
pub use sensor::{
    ChannelSensor, DeniedSensor, GyroError, OrientationSample, OrientationSensor,
    ScreenOrientation, TiltSimulator, UnavailableSensor,
};
pub use store::{ParamEvent, ParameterStore};
