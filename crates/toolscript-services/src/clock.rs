//! Time source for service responses (message timestamps).

use std::fmt::Debug;

/// Seconds since the Unix epoch, fractional.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Always reports the same instant. Used to make responses deterministic in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub f64);

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now() > 1_577_836_800.0);
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(42.5).now(), 42.5);
    }
}
