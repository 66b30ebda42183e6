//! Last-input timestamp shared between input listeners and the poll loop.

#[cfg(target_os = "linux")]
mod linux;

use chrono::{DateTime, Local, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

#[cfg(target_os = "linux")]
pub use linux::ActivityMonitor;

/// Timestamp of the most recent user input.
///
/// Clones share the same value. Any number of listener threads may record
/// input concurrently; the stored value only moves forward.
///
/// A listener that cannot query its input source marks the signal
/// unavailable, and the timestamp must not be read as real input until it
/// reports success again.
#[derive(Debug, Clone)]
pub struct ActivitySignal {
    /// Unix epoch milliseconds.
    last_activity_ms: Arc<AtomicI64>,
    available: Arc<AtomicBool>,
}

impl ActivitySignal {
    /// A signal whose last activity is now.
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    pub fn starting_at(at: DateTime<Local>) -> Self {
        Self {
            last_activity_ms: Arc::new(AtomicI64::new(at.timestamp_millis())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record input observed at `at`. Earlier timestamps are ignored.
    pub fn record(&self, at: DateTime<Local>) {
        self.last_activity_ms
            .fetch_max(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Set whether the last listener query succeeded. Returns the previous
    /// state.
    pub fn set_available(&self, available: bool) -> bool {
        self.available.swap(available, Ordering::SeqCst)
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn last_activity(&self) -> DateTime<Local> {
        let ms = self.last_activity_ms.load(Ordering::SeqCst);
        DateTime::<Utc>::from_timestamp_millis(ms)
            .map(|at| at.with_timezone(&Local))
            .unwrap_or_else(Local::now)
    }
}

impl Default for ActivitySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use super::ActivitySignal;
    use crate::error::ProbeError;
    use std::time::Duration;

    /// Input listener placeholder for platforms without a backend.
    pub struct ActivityMonitor;

    impl ActivityMonitor {
        pub fn start(_signal: ActivitySignal, _interval: Duration) -> Result<Self, ProbeError> {
            Err(ProbeError::Unsupported)
        }

        pub fn stop(&self) {}
    }
}

#[cfg(not(target_os = "linux"))]
pub use unsupported::ActivityMonitor;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::thread;

    fn base() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_record_moves_forward_only() {
        let signal = ActivitySignal::starting_at(base());

        signal.record(base() + TimeDelta::seconds(5));
        assert_eq!(signal.last_activity(), base() + TimeDelta::seconds(5));

        signal.record(base() + TimeDelta::seconds(2));
        assert_eq!(signal.last_activity(), base() + TimeDelta::seconds(5));
    }

    #[test]
    fn test_clones_share_value() {
        let signal = ActivitySignal::starting_at(base());
        let listener = signal.clone();

        listener.record(base() + TimeDelta::seconds(3));
        assert_eq!(signal.last_activity(), base() + TimeDelta::seconds(3));
    }

    #[test]
    fn test_availability_shared_between_clones() {
        let signal = ActivitySignal::starting_at(base());
        let listener = signal.clone();
        assert!(signal.is_available());

        assert!(listener.set_available(false));
        assert!(!signal.is_available());

        assert!(!listener.set_available(true));
        assert!(signal.is_available());
        assert_eq!(signal.last_activity(), base());
    }

    #[test]
    fn test_concurrent_listeners() {
        let signal = ActivitySignal::starting_at(base());

        let handles: Vec<_> = (0..4)
            .map(|listener| {
                let signal = signal.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        let offset = TimeDelta::milliseconds(listener * 1_000 + i);
                        signal.record(base() + offset);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            signal.last_activity(),
            base() + TimeDelta::milliseconds(3_249)
        );
    }
}
