//! Input activity listener for Linux using the X11 XScreenSaver extension.

use chrono::{Local, TimeDelta};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::screensaver::ConnectionExt as ScreensaverConnectionExt;
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use super::ActivitySignal;
use crate::error::ProbeError;

/// Feeds an [`ActivitySignal`] from the X server's "ms since user input".
///
/// Pointer motion, button and key events all reset the server's idle
/// counter, so one query covers every input source.
pub struct ActivityMonitor {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ActivityMonitor {
    /// Connect to the display and start the listener thread.
    pub fn start(signal: ActivitySignal, interval: Duration) -> Result<Self, ProbeError> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        let root = conn.setup().roots[screen_num].root;

        // Fail early if the extension is missing.
        conn.screensaver_query_info(root)?.reply()?;

        info!("Starting activity monitor using X11 XScreenSaver");

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let handle = thread::Builder::new()
            .name("activity-monitor".to_string())
            .spawn(move || run_activity_monitor(conn, root, signal, interval, running_clone))
            .map_err(ProbeError::Spawn)?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        info!("Activity monitor stopped");
    }
}

fn run_activity_monitor(
    conn: RustConnection,
    root: Window,
    signal: ActivitySignal,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        thread::sleep(interval);

        let reply = conn
            .screensaver_query_info(root)
            .map_err(ProbeError::from)
            .and_then(|cookie| cookie.reply().map_err(ProbeError::from));

        match reply {
            Ok(info) => {
                let since_input = TimeDelta::milliseconds(i64::from(info.ms_since_user_input));
                signal.record(Local::now() - since_input);
                if !signal.set_available(true) {
                    info!("X11 idle time available again");
                }
            }
            Err(e) => {
                if signal.set_available(false) {
                    warn!("Failed to query X11 idle time: {}", e);
                } else {
                    debug!("X11 idle time still unavailable: {}", e);
                }
            }
        }
    }

    debug!("Activity monitor thread exiting");
}
