use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_REFRESH_HZ: f32 = 60.0;

/// Shared stop flag for a running loop. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Where the animation loop reads time from.
pub trait FrameClock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl FrameClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl FrameClock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Paces per-frame work at the display refresh interval until cancelled.
#[derive(Debug)]
pub struct AnimationLoop<C = SystemClock> {
    clock: C,
    interval: Duration,
    token: CancellationToken,
    next_frame: Instant,
    frames: u64,
}

impl<C: FrameClock> AnimationLoop<C> {
    /// The first frame is due immediately.
    pub fn new(clock: C, interval: Duration, token: CancellationToken) -> Self {
        let next_frame = clock.now();
        Self {
            clock,
            interval,
            token,
            next_frame,
            frames: 0,
        }
    }

    /// Uses a monitor refresh rate in millihertz, falling back to 60 Hz.
    pub fn with_refresh_rate(
        clock: C,
        refresh_millihertz: Option<u32>,
        token: CancellationToken,
    ) -> Self {
        let hz = refresh_millihertz
            .filter(|mhz| *mhz > 0)
            .map(|mhz| mhz as f32 / 1000.0)
            .unwrap_or(DEFAULT_REFRESH_HZ);
        Self::new(clock, Duration::from_secs_f32(1.0 / hz), token)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn ready_for_frame(&self) -> bool {
        !self.is_cancelled() && self.clock.now() >= self.next_frame
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.is_cancelled() {
            None
        } else {
            Some(self.next_frame)
        }
    }

    /// Schedules the following frame one interval out. A loop that fell
    /// behind restarts from the current time instead of bursting.
    pub fn mark_rendered(&mut self) {
        let now = self.clock.now();
        self.frames = self.frames.saturating_add(1);
        self.next_frame += self.interval;
        if self.next_frame <= now {
            self.next_frame = now + self.interval;
        }
    }

    /// Runs `frame` if one is due. Returns `None` when not due or cancelled.
    pub fn run_frame<R>(&mut self, frame: impl FnOnce() -> R) -> Option<R> {
        if !self.ready_for_frame() {
            return None;
        }
        let result = frame();
        self.mark_rendered();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_loop(interval_ms: u64) -> (ManualClock, CancellationToken, AnimationLoop<ManualClock>) {
        let clock = ManualClock::default();
        let token = CancellationToken::new();
        let animation = AnimationLoop::new(
            clock.clone(),
            Duration::from_millis(interval_ms),
            token.clone(),
        );
        (clock, token, animation)
    }

    #[test]
    fn first_frame_is_immediate_then_paced() {
        let (clock, _token, mut animation) = manual_loop(16);
        assert!(animation.ready_for_frame());
        assert_eq!(animation.run_frame(|| 1), Some(1));
        assert!(!animation.ready_for_frame());

        clock.advance(Duration::from_millis(10));
        assert!(animation.run_frame(|| ()).is_none());
        clock.advance(Duration::from_millis(6));
        assert!(animation.run_frame(|| ()).is_some());
        assert_eq!(animation.frames(), 2);
    }

    #[test]
    fn late_loop_does_not_burst() {
        let (clock, _token, mut animation) = manual_loop(10);
        animation.mark_rendered();
        clock.advance(Duration::from_millis(100));
        animation.mark_rendered();
        let deadline = animation.next_deadline().unwrap();
        assert_eq!(deadline, clock.now() + Duration::from_millis(10));
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let (clock, token, mut animation) = manual_loop(16);
        token.cancel();
        assert!(animation.is_cancelled());
        assert_eq!(animation.next_deadline(), None);
        clock.advance(Duration::from_secs(1));
        let mut ran = false;
        assert!(animation.run_frame(|| ran = true).is_none());
        assert!(!ran);
    }

    #[test]
    fn refresh_rate_sets_interval() {
        let token = CancellationToken::new();
        let animation = AnimationLoop::with_refresh_rate(ManualClock::default(), Some(120_000), token);
        let micros = animation.interval().as_micros();
        assert!((8_300..=8_340).contains(&micros), "{micros}");

        let fallback = AnimationLoop::with_refresh_rate(
            ManualClock::default(),
            None,
            CancellationToken::new(),
        );
        assert!((16_600..=16_700).contains(&fallback.interval().as_micros()));
    }
}
