//! Fan-out of completed intervals to every configured sink.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::event::IntervalEvent;
use crate::sink::Sink;

/// Default upper bound on a single sink write.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of recording one event in one sink.
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub result: Result<(), SinkError>,
}

/// Per-sink results of one dispatch, in sink order.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SinkOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Writes each event to every sink, isolating failures per sink.
///
/// Sinks are attempted one after another. A failing or slow sink is logged
/// and skipped; it never prevents the attempt on the next sink and never
/// surfaces to the caller. Sinks may therefore diverge.
pub struct EventDispatcher {
    sinks: Vec<Arc<dyn Sink>>,
    timeout: Duration,
}

impl EventDispatcher {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks,
            timeout: DEFAULT_SINK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record `event` in every sink once.
    pub async fn dispatch(&self, event: &IntervalEvent) -> DispatchReport {
        let mut report = DispatchReport {
            outcomes: Vec::with_capacity(self.sinks.len()),
        };

        for sink in &self.sinks {
            let name = sink.name().to_string();
            let result = self.record_bounded(Arc::clone(sink), event.clone()).await;

            match &result {
                Ok(()) => debug!("Recorded interval in {}", name),
                Err(e) => warn!("Failed to record interval in {}: {}", name, e),
            }

            report.outcomes.push(SinkOutcome { sink: name, result });
        }

        report
    }

    /// Run one sink write on the blocking pool, giving up after the timeout.
    ///
    /// A timed-out write keeps running in the background; its result is
    /// discarded.
    async fn record_bounded(
        &self,
        sink: Arc<dyn Sink>,
        event: IntervalEvent,
    ) -> Result<(), SinkError> {
        let name = sink.name().to_string();
        let task = tokio::task::spawn_blocking(move || sink.record(&event));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(_join_error)) => Err(SinkError::Panicked { sink: name }),
            Err(_elapsed) => Err(SinkError::Timeout {
                sink: name,
                timeout: self.timeout,
            }),
        }
    }
}
