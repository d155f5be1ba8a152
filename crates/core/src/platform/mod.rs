pub mod stub;

#[cfg(target_os = "windows")]
pub mod win32;

use std::sync::Arc;

use crate::error::Result;
use crate::logger;
use crate::settings::Settings;
use crate::types::*;

/// The four OS facilities the core needs from the desktop.
pub trait Platform: Send + Sync {
    /// All top-level windows with their titles.
    fn enumerate_windows(&self) -> Vec<(WindowHandle, String)>;
    /// Visible pixels inside `rect`, in `window` client coordinates.
    fn capture(&self, window: WindowHandle, rect: Rect) -> Result<Capture>;
    /// Primary-button click at a point in `window` client coordinates.
    fn click(&self, window: WindowHandle, x: i32, y: i32) -> Result<()>;
    /// Restore and focus the window.
    fn activate(&self, window: WindowHandle) -> Result<()>;
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool, settings: &Settings) -> Arc<dyn Platform> {
    logger::register_prefix("window", logger::COLOR_GRAY);
    logger::register_prefix("input", logger::COLOR_GRAY);
    if force_stub {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Arc::new(stub::StubPlatform::with_game(settings));
    }
    #[cfg(target_os = "windows")]
    {
        logger::register_prefix("win32", logger::COLOR_GRAY);
        Arc::new(win32::Win32Platform::new())
    }
    #[cfg(not(target_os = "windows"))]
    {
        logger::warn("no desktop backend for this OS, using the stub platform");
        logger::register_prefix("stub", logger::COLOR_GRAY);
        Arc::new(stub::StubPlatform::with_game(settings))
    }
}
