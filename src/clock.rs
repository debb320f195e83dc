// ⏰ Clock - explicit time for every engine
//
// Timestamps are unix milliseconds. Wall-clock reads go through a Clock so
// tests can pin "now", and hour-of-day rules go through a Zone so they do not
// depend on the machine's timezone.

use chrono::{FixedOffset, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

// ============================================================================
// CLOCK
// ============================================================================

pub trait Clock: Send + Sync {
    /// Current time in unix milliseconds
    fn now_ms(&self) -> i64;
}

/// Real wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Settable clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        ManualClock {
            now: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

// ============================================================================
// ZONE
// ============================================================================

/// Timezone used to read the hour of day off an offering timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// The machine's local timezone (DST aware)
    #[default]
    Local,

    /// Fixed offset east of UTC, in seconds
    Fixed(i32),
}

impl Zone {
    pub fn utc() -> Self {
        Zone::Fixed(0)
    }

    /// Hour of day (0-23) for a unix-millisecond timestamp
    pub fn hour_of(&self, timestamp_ms: i64) -> Option<u32> {
        match self {
            Zone::Local => Local
                .timestamp_millis_opt(timestamp_ms)
                .earliest()
                .map(|dt| dt.hour()),
            Zone::Fixed(secs) => {
                let offset = FixedOffset::east_opt(*secs)?;
                offset
                    .timestamp_millis_opt(timestamp_ms)
                    .single()
                    .map(|dt| dt.hour())
            }
        }
    }

    /// True when the hour falls in [start, end), wrapping midnight when start > end
    pub fn hour_in_range(&self, timestamp_ms: i64, start: u32, end: u32) -> bool {
        let Some(hour) = self.hour_of(timestamp_ms) else {
            return false;
        };

        if start <= end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Local => write!(f, "local"),
            Zone::Fixed(secs) => write!(f, "UTC{:+}s", secs),
        }
    }
}

/// Milliseconds for a UTC wall-clock time, handy for fixtures
pub fn utc_ms(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance_secs(5);
        assert_eq!(clock.now_ms(), 6_000);

        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn test_fixed_zone_hour() {
        let ts = utc_ms(2024, 3, 10, 23, 30);
        assert_eq!(Zone::utc().hour_of(ts), Some(23));
        // UTC+2 → 01:30 next day
        assert_eq!(Zone::Fixed(2 * 3600).hour_of(ts), Some(1));
        // UTC-5 → 18:30
        assert_eq!(Zone::Fixed(-5 * 3600).hour_of(ts), Some(18));
    }

    #[test]
    fn test_hour_range_wraps_midnight() {
        let zone = Zone::utc();
        assert!(zone.hour_in_range(utc_ms(2024, 1, 1, 23, 0), 23, 4));
        assert!(zone.hour_in_range(utc_ms(2024, 1, 1, 3, 59), 23, 4));
        assert!(!zone.hour_in_range(utc_ms(2024, 1, 1, 4, 0), 23, 4));
        assert!(!zone.hour_in_range(utc_ms(2024, 1, 1, 12, 0), 23, 4));

        assert!(zone.hour_in_range(utc_ms(2024, 1, 1, 1, 0), 1, 4));
        assert!(!zone.hour_in_range(utc_ms(2024, 1, 1, 0, 59), 1, 4));
    }

    #[test]
    fn test_invalid_offset_never_matches() {
        // Offsets beyond ±24h are rejected by chrono
        let zone = Zone::Fixed(90_000);
        assert_eq!(zone.hour_of(0), None);
        assert!(!zone.hour_in_range(0, 0, 24));
    }
}
