//! Interval detection state machine.
//!
//! The detector consumes one [`Sample`] per tick and decides whether the open
//! window interval or the open idle interval has ended. Window changes and
//! idle transitions are tracked as two independent interval histories: a
//! single tick may close both.

use chrono::{DateTime, Local, TimeDelta};
use std::mem;

use crate::event::IntervalEvent;

/// Default inactivity span after which the user counts as idle.
pub const IDLE_THRESHOLD: TimeDelta = TimeDelta::seconds(10);

/// One poll of the foreground window and input activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub window_title: String,
    pub app_id: u32,
    /// Resolved application name, `None` if resolution failed.
    pub application_name: Option<String>,
    pub last_activity: DateTime<Local>,
}

/// The window believed active since `interval_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedWindow {
    pub title: String,
    pub app_id: u32,
    pub application_name: Option<String>,
}

impl TrackedWindow {
    fn matches(&self, sample: &Sample) -> bool {
        self.title == sample.window_title && self.app_id == sample.app_id
    }
}

impl From<Sample> for TrackedWindow {
    fn from(sample: Sample) -> Self {
        Self {
            title: sample.window_title,
            app_id: sample.app_id,
            application_name: sample.application_name,
        }
    }
}

/// Mutable tracking state, owned by the detector.
#[derive(Debug, Clone)]
pub struct TrackerState {
    current_window: TrackedWindow,
    interval_start: DateTime<Local>,
    idle_since: Option<DateTime<Local>>,
}

impl TrackerState {
    pub fn current_window(&self) -> &TrackedWindow {
        &self.current_window
    }

    pub fn interval_start(&self) -> DateTime<Local> {
        self.interval_start
    }

    pub fn idle_since(&self) -> Option<DateTime<Local>> {
        self.idle_since
    }

    pub fn is_idle(&self) -> bool {
        self.idle_since.is_some()
    }
}

/// Detector tuning.
#[derive(Debug, Clone, Copy)]
pub struct DetectorSettings {
    /// Inactivity must strictly exceed this to open an idle interval.
    pub idle_threshold: TimeDelta,
    /// Treat a window change as user input at the time it was observed.
    pub window_change_counts_as_activity: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            idle_threshold: IDLE_THRESHOLD,
            window_change_counts_as_activity: false,
        }
    }
}

/// Decides when intervals end and builds the resulting events.
#[derive(Debug)]
pub struct IntervalDetector {
    state: TrackerState,
    settings: DetectorSettings,
    user: String,
}

impl IntervalDetector {
    /// Start tracking `initial` as the current window from `now`.
    pub fn new(
        initial: Sample,
        now: DateTime<Local>,
        settings: DetectorSettings,
        user: impl Into<String>,
    ) -> Self {
        Self {
            state: TrackerState {
                current_window: initial.into(),
                interval_start: now,
                idle_since: None,
            },
            settings,
            user: user.into(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Advance the state machine by one tick.
    ///
    /// Returns the intervals closed by this tick: a window interval first,
    /// then an idle interval, either of which may be absent.
    pub fn on_tick(&mut self, sample: Sample, now: DateTime<Local>) -> Vec<IntervalEvent> {
        let mut events = Vec::with_capacity(2);
        let mut last_activity = sample.last_activity;

        if !self.state.current_window.matches(&sample) {
            let previous = mem::replace(&mut self.state.current_window, sample.into());
            events.push(IntervalEvent::window(
                previous.title,
                previous.application_name,
                self.state.interval_start,
                now,
                self.user.as_str(),
            ));
            self.state.interval_start = now;

            if self.settings.window_change_counts_as_activity {
                last_activity = last_activity.max(now);
            }
        }

        let idle_elapsed = now - last_activity;
        if idle_elapsed > self.settings.idle_threshold {
            if self.state.idle_since.is_none() {
                self.state.idle_since = Some(now);
            }
        } else if let Some(idle_since) = self.state.idle_since.take() {
            events.push(IntervalEvent::idle(idle_since, now, self.user.as_str()));
        }

        events
    }

    /// Close every open interval at shutdown.
    pub fn finish(self, now: DateTime<Local>) -> Vec<IntervalEvent> {
        let Self { state, user, .. } = self;

        let mut events = vec![IntervalEvent::window(
            state.current_window.title,
            state.current_window.application_name,
            state.interval_start,
            now,
            user.as_str(),
        )];
        if let Some(idle_since) = state.idle_since {
            events.push(IntervalEvent::idle(idle_since, now, user));
        }
        events
    }
}
