use chrono::{DateTime, Local, TimeDelta};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Format used for session dates, log file names and response timestamps.
pub const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub fn format_stamp(ts: &DateTime<Local>) -> String {
    ts.format(STAMP_FORMAT).to_string()
}

/// Source of wall-clock time and of the waits used to pace playback.
pub trait Clock: Clone + Send + Sync {
    fn now(&self) -> DateTime<Local>;
    fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, d: Duration) {
        high_precision_sleep(d)
    }
}

#[cfg(target_os = "linux")]
fn high_precision_sleep(duration: Duration) {
    use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

    let req = timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };

    unsafe {
        clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
    }
}

#[cfg(not(target_os = "linux"))]
fn high_precision_sleep(duration: Duration) {
    std::thread::sleep(duration)
}

/// A clock that only moves when told to. `sleep` advances it instantly.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, d: Duration) {
        let Ok(step) = TimeDelta::from_std(d) else {
            return;
        };
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = now.checked_add_signed(step).unwrap_or(*now);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Local::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep(&self, d: Duration) {
        self.advance(d)
    }
}
