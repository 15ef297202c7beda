//! Coarse phase timing for sweep logging.

use std::fmt;
use std::time::{Duration, Instant};

/// Accumulates wall-clock time across invocations of one named phase.
///
/// Displaying a timer with `{}` shows the invocation count and total time.
pub struct Timer {
    name: &'static str,
    total: Duration,
    count: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total: Duration::ZERO,
            count: 0,
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&mut self, timee: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = timee();
        self.total += start.elapsed();
        self.count += 1;
        value
    }

    pub fn total(&self) -> Duration {
        self.total
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}x in {:.1?}", self.name, self.count, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_invocations() {
        let mut timer = Timer::new("phase");
        assert_eq!(timer.time(|| 7), 7);
        timer.time(|| ());
        assert!(timer.to_string().starts_with("phase: 2x"));
    }
}
