//! Foreground window probe for Linux using X11 EWMH properties.

use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;
use x11rb::NONE;

use super::{WindowInfo, WindowProbe};
use crate::error::ProbeError;

/// Property read size per request, in 32-bit units.
const PROPERTY_CHUNK_LEN: u32 = 1024;

/// Requests per property before giving up on the rest of the value.
const MAX_PROPERTY_CHUNKS: u32 = 64;

/// Reads `_NET_ACTIVE_WINDOW` and its title and pid from the X server.
pub struct X11Probe {
    conn: RustConnection,
    root: Window,
    net_active_window: Atom,
    net_wm_name: Atom,
    net_wm_pid: Atom,
    utf8_string: Atom,
}

impl X11Probe {
    /// Connect to the default display and intern the atoms we need.
    pub fn connect() -> Result<Self, ProbeError> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        let root = conn.setup().roots[screen_num].root;

        let net_active_window = intern(&conn, "_NET_ACTIVE_WINDOW")?;
        let net_wm_name = intern(&conn, "_NET_WM_NAME")?;
        let net_wm_pid = intern(&conn, "_NET_WM_PID")?;
        let utf8_string = intern(&conn, "UTF8_STRING")?;

        debug!("Connected to X11 display (screen {})", screen_num);

        Ok(Self {
            conn,
            root,
            net_active_window,
            net_wm_name,
            net_wm_pid,
            utf8_string,
        })
    }

    fn active_window(&self) -> Result<Option<Window>, ProbeError> {
        let reply = self
            .conn
            .get_property(false, self.root, self.net_active_window, AtomEnum::WINDOW, 0, 1)?
            .reply()?;

        if reply.type_ == NONE {
            return Err(ProbeError::MissingSupport("_NET_ACTIVE_WINDOW"));
        }

        Ok(reply
            .value32()
            .and_then(|mut values| values.next())
            .filter(|&window| window != NONE))
    }

    fn title(&self, window: Window) -> Result<String, ProbeError> {
        let value = self.read_property(window, self.net_wm_name, self.utf8_string)?;
        if !value.is_empty() {
            return Ok(String::from_utf8_lossy(&value).into_owned());
        }

        // Fall back to ICCCM WM_NAME for clients without EWMH titles.
        let value = self.read_property(window, AtomEnum::WM_NAME.into(), AtomEnum::ANY.into())?;
        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    /// Read a whole property value, following `bytes_after` across requests.
    fn read_property(
        &self,
        window: Window,
        property: Atom,
        type_: Atom,
    ) -> Result<Vec<u8>, ProbeError> {
        let mut value = Vec::new();
        let mut offset = 0;

        for _ in 0..MAX_PROPERTY_CHUNKS {
            let reply = self
                .conn
                .get_property(false, window, property, type_, offset, PROPERTY_CHUNK_LEN)?
                .reply()?;
            value.extend_from_slice(&reply.value);

            match next_offset(offset, reply.value.len(), reply.bytes_after) {
                Some(next) => offset = next,
                None => return Ok(value),
            }
        }

        debug!(
            "Property {} on window {} truncated at {} bytes",
            property,
            window,
            value.len()
        );
        Ok(value)
    }

    fn pid(&self, window: Window) -> Result<u32, ProbeError> {
        let reply = self
            .conn
            .get_property(false, window, self.net_wm_pid, AtomEnum::CARDINAL, 0, 1)?
            .reply()?;

        Ok(reply
            .value32()
            .and_then(|mut values| values.next())
            .unwrap_or(0))
    }
}

impl WindowProbe for X11Probe {
    fn probe(&mut self) -> Result<WindowInfo, ProbeError> {
        let Some(window) = self.active_window()? else {
            return Ok(WindowInfo::default());
        };

        Ok(WindowInfo {
            title: self.title(window)?,
            app_id: self.pid(window)?,
        })
    }
}

/// Offset of the next chunk, in 32-bit units, or `None` once the value is
/// complete.
fn next_offset(offset: u32, chunk_bytes: usize, bytes_after: u32) -> Option<u32> {
    if bytes_after == 0 || chunk_bytes == 0 {
        return None;
    }
    let chunk_units = u32::try_from(chunk_bytes / 4).ok()?;
    offset.checked_add(chunk_units)
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom, ProbeError> {
    Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
}
