//! timetracker - foreground window and idle time tracker.
//!
//! Samples the focused window once per second, closes an interval whenever
//! the window changes or the user returns from idleness, and records each
//! closed interval to a SQLite table and an append-only CSV log.

pub mod activity;
pub mod config;
pub mod detector;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod poll;
pub mod probe;
pub mod sink;

pub use activity::ActivitySignal;
pub use detector::{DetectorSettings, IntervalDetector, Sample, TrackerState};
pub use dispatch::{DispatchReport, EventDispatcher};
pub use error::{ProbeError, ResolutionError, SinkError};
pub use event::{IntervalEvent, IntervalKind};
pub use poll::PollLoop;
