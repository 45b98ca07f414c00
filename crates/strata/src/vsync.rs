use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::warn;
use threading::TaskRunnerHandle;

/// 60Hz, used when the platform reports no display refresh rate.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_nanos(16_666_667);

type FrameCallback = Box<dyn FnMut(Instant, Instant) + Send>;

/// Source of frame timing signals.
///
/// [`await_vsync`](VsyncWaiter::await_vsync) arms a single callback
/// invocation for the next tick; the callback re-arms if it wants a
/// continuous beat. Arming while already armed is a no-op, so callers may
/// request frames eagerly without doubling the rate.
pub trait VsyncWaiter: Send + Sync {
    fn await_vsync(&self);
}

/// Timer-driven vsync substitute for platforms without a native signal.
///
/// Ticks are anchored to a fixed phase: the next tick is always a whole
/// number of intervals past the anchor and strictly in the future, so a
/// callback that overruns its interval skips ticks instead of drifting the
/// beat.
pub struct FallbackVsyncWaiter {
    runner: TaskRunnerHandle,
    phase: Instant,
    interval: Duration,
    callback: Arc<Mutex<Option<FrameCallback>>>,
    armed: Arc<AtomicBool>,
}

impl FallbackVsyncWaiter {
    pub fn new(runner: TaskRunnerHandle, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "vsync interval must be non-zero");
        Self {
            runner,
            phase: Instant::now(),
            interval,
            callback: Arc::new(Mutex::new(None)),
            armed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Install the frame callback. The callback receives the tick's nominal
    /// start time and the target time (start plus one interval).
    pub fn set_frame_callback(
        &self,
        callback: impl FnMut(Instant, Instant) + Send + 'static,
    ) {
        *self
            .callback
            .lock()
            .expect("vsync callback lock poisoned") = Some(Box::new(callback));
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// First phase-aligned tick strictly after `now`.
    pub fn next_tick_after(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.phase);
        let periods = elapsed.as_nanos() / self.interval.as_nanos() + 1;
        self.phase + Duration::from_nanos((self.interval.as_nanos() * periods) as u64)
    }
}

impl VsyncWaiter for FallbackVsyncWaiter {
    fn await_vsync(&self) {
        if self.armed.swap(true, Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        let tick = self.next_tick_after(now);
        let interval = self.interval;
        let callback = self.callback.clone();
        let armed = self.armed.clone();
        self.runner.post_delayed(
            move || {
                armed.store(false, Ordering::SeqCst);
                let mut slot = callback.lock().expect("vsync callback lock poisoned");
                match slot.as_mut() {
                    Some(callback) => callback(tick, tick + interval),
                    None => warn!("vsync fired with no frame callback installed"),
                }
            },
            tick.saturating_duration_since(now),
        );
    }
}
