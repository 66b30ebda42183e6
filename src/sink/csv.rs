//! Append-only CSV log of completed intervals.

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Sink;
use crate::error::SinkError;
use crate::event::{IntervalEvent, COLUMNS};

/// Appends one comma-separated row per event to a fixed file.
///
/// The header row is written when the file is new or empty. The file is
/// never truncated, so restarts keep appending to the same log.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &IntervalEvent) -> std::io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = BufWriter::new(file);
        if needs_header {
            write_record(&mut writer, COLUMNS)?;
            debug!("Wrote CSV header to {:?}", self.path);
        }
        write_record(&mut writer, event.row().fields())?;
        writer.flush()
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn record(&self, event: &IntervalEvent) -> Result<(), SinkError> {
        self.append(event).map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn write_record<W: Write>(writer: &mut W, fields: [&str; 9]) -> std::io::Result<()> {
    let line = fields.map(escape).join(",");
    write!(writer, "{}\r\n", line)
}

/// Quote a field if it contains a delimiter, quote or line break.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
