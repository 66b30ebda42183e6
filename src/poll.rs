//! The fixed-cadence loop driving probe, detector and dispatcher.

use chrono::{DateTime, Local};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::activity::ActivitySignal;
use crate::detector::{DetectorSettings, IntervalDetector, Sample};
use crate::dispatch::EventDispatcher;
use crate::event::{format_duration, IntervalEvent, UNKNOWN};
use crate::probe::{AppResolver, WindowInfo, WindowProbe};

/// Default time between ticks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Samples the foreground window once per tick and dispatches closed intervals.
///
/// Ticks never overlap: sink I/O for one tick finishes before the next
/// sample is taken.
pub struct PollLoop<P, R> {
    probe: P,
    resolver: R,
    activity: ActivitySignal,
    detector: IntervalDetector,
    dispatcher: EventDispatcher,
    paused: Arc<AtomicBool>,
    interval: Duration,
    last_resolved: Option<(u32, Option<String>)>,
}

impl<P: WindowProbe, R: AppResolver> PollLoop<P, R> {
    /// Take the initial sample and start tracking from now.
    pub fn new(
        probe: P,
        resolver: R,
        activity: ActivitySignal,
        dispatcher: EventDispatcher,
        settings: DetectorSettings,
        user: impl Into<String>,
    ) -> Self {
        Self::starting_at(probe, resolver, activity, dispatcher, settings, user, Local::now())
    }

    pub fn starting_at(
        mut probe: P,
        mut resolver: R,
        activity: ActivitySignal,
        dispatcher: EventDispatcher,
        settings: DetectorSettings,
        user: impl Into<String>,
        now: DateTime<Local>,
    ) -> Self {
        let window = probe.probe().unwrap_or_else(|e| {
            warn!("Initial window probe failed, starting with an unknown window: {}", e);
            WindowInfo::default()
        });
        let application_name = resolve_name(&mut resolver, window.app_id);

        info!("Tracking {:?} from {}", window.title, now.format("%H:%M:%S"));

        let last_resolved = Some((window.app_id, application_name.clone()));
        let initial = Sample {
            window_title: window.title,
            app_id: window.app_id,
            application_name,
            last_activity: activity.last_activity(),
        };

        Self {
            probe,
            resolver,
            activity,
            detector: IntervalDetector::new(initial, now, settings, user),
            dispatcher,
            paused: Arc::new(AtomicBool::new(false)),
            interval: POLL_INTERVAL,
            last_resolved,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Flag that suspends sampling while set.
    pub fn pause_flag(&self) -> Arc<AtomicBool> {
        self.paused.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn detector(&self) -> &IntervalDetector {
        &self.detector
    }

    /// Run one tick at the current time.
    pub async fn tick(&mut self) -> Vec<IntervalEvent> {
        self.tick_at(Local::now()).await
    }

    /// Run one tick as of `now`, returning the intervals it closed.
    pub async fn tick_at(&mut self, now: DateTime<Local>) -> Vec<IntervalEvent> {
        if self.is_paused() {
            return Vec::new();
        }

        let Some(sample) = self.sample() else {
            return Vec::new();
        };

        let events = self.detector.on_tick(sample, now);
        for event in &events {
            if !event.is_idle() {
                let current = self.detector.state().current_window();
                info!(
                    "Active window: {:?} ({}), previous lasted {}",
                    current.title,
                    current.application_name.as_deref().unwrap_or(UNKNOWN),
                    format_duration(event.duration())
                );
            } else {
                info!("Idle for {}", format_duration(event.duration()));
            }
            self.dispatcher.dispatch(event).await;
        }
        events
    }

    /// Tick every interval until `shutdown` resolves, then record the open
    /// intervals.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Entering poll loop (interval {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.finish(Local::now()).await;
    }

    /// Close and record every open interval.
    pub async fn finish(self, now: DateTime<Local>) -> Vec<IntervalEvent> {
        let events = self.detector.finish(now);
        for event in &events {
            self.dispatcher.dispatch(event).await;
        }
        info!("Recorded {} open interval(s) at shutdown", events.len());
        events
    }

    fn sample(&mut self) -> Option<Sample> {
        if !self.activity.is_available() {
            warn!("Skipping tick, input activity unavailable");
            return None;
        }

        let window = match self.probe.probe() {
            Ok(window) => window,
            Err(e) => {
                warn!("Skipping tick, window probe failed: {}", e);
                return None;
            }
        };

        let application_name = self.application_name(window.app_id);
        Some(Sample {
            window_title: window.title,
            app_id: window.app_id,
            application_name,
            last_activity: self.activity.last_activity(),
        })
    }

    /// Resolve a process name, reusing the last answer for the same id.
    fn application_name(&mut self, app_id: u32) -> Option<String> {
        if let Some((cached_id, name)) = &self.last_resolved {
            if *cached_id == app_id {
                return name.clone();
            }
        }

        let name = resolve_name(&mut self.resolver, app_id);
        self.last_resolved = Some((app_id, name.clone()));
        name
    }
}

fn resolve_name<R: AppResolver>(resolver: &mut R, app_id: u32) -> Option<String> {
    match resolver.resolve(app_id) {
        Ok(name) => Some(name),
        Err(e) => {
            debug!("Application name unavailable: {}", e);
            None
        }
    }
}
