//! Performance measurement tools.

use std::{
    fmt,
    sync::Mutex,
    time::{Duration, Instant},
};

/// A timer that measures how long an operation takes and keeps a running total.
///
/// Displaying the timer with `{}` prints the number of measurements and their average duration.
pub struct Timer {
    name: &'static str,
    state: Mutex<State>,
}

#[derive(Default, Clone, Copy)]
struct State {
    total: Duration,
    count: u32,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is recorded.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    /// Returns the number of recorded measurements.
    pub fn count(&self) -> u32 {
        self.state().count
    }

    /// Returns the average recorded duration, or [`None`] if nothing was recorded yet.
    pub fn average(&self) -> Option<Duration> {
        let state = self.state();
        (state.count > 0).then(|| state.total / state.count)
    }

    fn state(&self) -> State {
        *self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn stop(&self, start: Instant) {
        let elapsed = start.elapsed();
        let mut state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        state.total += elapsed;
        state.count += 1;
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.average() {
            Some(avg) => write!(
                f,
                "{}: {}x{:.01}ms",
                self.name,
                self.count(),
                avg.as_secs_f32() * 1000.0
            ),
            None => write!(f, "{}: -", self.name),
        }
    }
}

/// Guard returned by [`Timer::start`]. Records the elapsed time when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_measurements() {
        let timer = Timer::new("infer");
        assert_eq!(timer.average(), None);
        assert_eq!(timer.to_string(), "infer: -");

        let value = timer.time(|| 42);
        assert_eq!(value, 42);
        drop(timer.start());

        assert_eq!(timer.count(), 2);
        assert!(timer.average().is_some());
        assert!(timer.to_string().starts_with("infer: 2x"));
    }
}
