//! Error types for probing, name resolution and sink writes.
//!
//! None of these are fatal while monitoring: probe errors skip a tick,
//! resolution errors become `"Unknown"`, sink errors are logged and dropped.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Foreground window or activity query failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[cfg(target_os = "linux")]
    #[error("failed to connect to X11 display: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[cfg(target_os = "linux")]
    #[error("X11 connection error: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),

    #[cfg(target_os = "linux")]
    #[error("X11 request failed: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),

    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("window manager does not support {0}")]
    MissingSupport(&'static str),

    #[error("window probing is not supported on this platform")]
    Unsupported,
}

/// Application name lookup failed for a process id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no such process: {0}")]
    NotFound(u32),

    #[error("process {0} is defunct")]
    Defunct(u32),

    #[error("name of process {0} is not accessible")]
    Unnamed(u32),
}

/// A sink failed to record an event.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open database {path:?}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database write failed: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sink {sink} did not finish within {timeout:?}")]
    Timeout { sink: String, timeout: Duration },

    #[error("sink {sink} panicked")]
    Panicked { sink: String },
}
