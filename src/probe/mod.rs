//! Foreground window probing and application name resolution.

#[cfg(target_os = "linux")]
mod linux;

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System};

use crate::error::{ProbeError, ResolutionError};

#[cfg(target_os = "linux")]
pub use linux::X11Probe as NativeProbe;

/// The foreground window as reported by the window system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowInfo {
    /// Window title, empty if the window has none.
    pub title: String,
    /// Owning process id, 0 if unknown or no window is focused.
    pub app_id: u32,
}

/// Source of foreground window samples.
pub trait WindowProbe {
    fn probe(&mut self) -> Result<WindowInfo, ProbeError>;
}

/// Maps a process id to a human-readable application name.
pub trait AppResolver {
    fn resolve(&mut self, app_id: u32) -> Result<String, ResolutionError>;
}

/// Resolves process names through `sysinfo`.
pub struct SysinfoResolver {
    system: System,
}

impl SysinfoResolver {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AppResolver for SysinfoResolver {
    fn resolve(&mut self, app_id: u32) -> Result<String, ResolutionError> {
        if app_id == 0 {
            return Err(ResolutionError::NotFound(app_id));
        }

        let pid = Pid::from_u32(app_id);
        if !self
            .system
            .refresh_process_specifics(pid, ProcessRefreshKind::new())
        {
            return Err(ResolutionError::NotFound(app_id));
        }

        let process = self
            .system
            .process(pid)
            .ok_or(ResolutionError::NotFound(app_id))?;

        if process.status() == ProcessStatus::Zombie {
            return Err(ResolutionError::Defunct(app_id));
        }

        let name = process.name();
        if name.is_empty() {
            return Err(ResolutionError::Unnamed(app_id));
        }
        Ok(name.to_string())
    }
}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use super::{WindowInfo, WindowProbe};
    use crate::error::ProbeError;

    /// Window probe placeholder for platforms without a backend.
    pub struct NativeProbe;

    impl NativeProbe {
        pub fn connect() -> Result<Self, ProbeError> {
            Err(ProbeError::Unsupported)
        }
    }

    impl WindowProbe for NativeProbe {
        fn probe(&mut self) -> Result<WindowInfo, ProbeError> {
            Err(ProbeError::Unsupported)
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use unsupported::NativeProbe;
