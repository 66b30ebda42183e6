//! Destinations that durably record completed intervals.

mod csv;
mod sqlite;

pub use self::csv::CsvSink;
pub use self::sqlite::{SqliteSink, DEFAULT_TABLE};

use crate::error::SinkError;
use crate::event::IntervalEvent;

/// A destination for [`IntervalEvent`]s.
///
/// `record` is called once per event, from a blocking thread, and must either
/// commit the event or report why it could not.
pub trait Sink: Send + Sync {
    /// Short name used in logs and dispatch reports.
    fn name(&self) -> &str;

    fn record(&self, event: &IntervalEvent) -> Result<(), SinkError>;
}
