use std::time::{SystemTime, UNIX_EPOCH};

use crate::CoreError;

/// Convert a wall-clock instant to epoch seconds.
pub fn epoch_seconds(at: SystemTime) -> Result<i64, CoreError> {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// Returns the current wall-clock time as seconds since Unix epoch.
pub fn physical_now() -> Result<i64, CoreError> {
    epoch_seconds(SystemTime::now())
}

/// Assigns the provenance `timestamp` stamped on every recorded fact.
///
/// Timestamps never go backwards and are never 0, since 0 marks an
/// intermediate link node.
pub struct WriteClock {
    last: i64,
    frozen: Option<i64>,
}

impl Default for WriteClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteClock {
    pub fn new() -> Self {
        Self {
            last: 0,
            frozen: None,
        }
    }

    /// A clock pinned to `at`; used to make provenance deterministic.
    pub fn frozen(at: i64) -> Self {
        Self {
            last: 0,
            frozen: Some(at),
        }
    }

    pub fn tick(&mut self) -> Result<i64, CoreError> {
        let now = match self.frozen {
            Some(at) => at,
            None => physical_now()?,
        };
        let stamp = now.max(self.last).max(1);
        self.last = stamp;
        Ok(stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tick_is_monotonic() {
        let mut clock = WriteClock::new();
        let t1 = clock.tick().unwrap();
        let t2 = clock.tick().unwrap();
        assert!(t1 > 0);
        assert!(t2 >= t1);
    }

    #[test]
    fn frozen_clock_never_yields_zero() {
        let mut clock = WriteClock::frozen(0);
        assert_eq!(clock.tick().unwrap(), 1);

        let mut clock = WriteClock::frozen(1_700_000_000);
        assert_eq!(clock.tick().unwrap(), 1_700_000_000);
        assert_eq!(clock.tick().unwrap(), 1_700_000_000);
    }

    #[test]
    fn epoch_seconds_truncates_subsecond() {
        let at = UNIX_EPOCH + Duration::from_millis(12_999);
        assert_eq!(epoch_seconds(at).unwrap(), 12);
        assert!(epoch_seconds(UNIX_EPOCH - Duration::from_secs(1)).is_err());
    }
}
