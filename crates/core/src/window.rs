//! Finding the game window and calibrating the game's origin inside it.
//!
//! Both probes are single-shot; retrying is the controller's business.

use crate::error::{Result, RunError};
use crate::logger;
use crate::platform::Platform;
use crate::settings::Settings;
use crate::types::*;

/// Per-channel tolerance when matching the signature color.
pub const SIGNATURE_TOLERANCE: u8 = 2;

/// First top-level window whose title contains `title` (case-insensitive).
pub fn locate(platform: &dyn Platform, title: &str) -> Result<WindowHandle> {
    let needle = title.to_lowercase();
    let found = platform
        .enumerate_windows()
        .into_iter()
        .find(|(_, t)| t.to_lowercase().contains(&needle));
    match found {
        Some((handle, t)) => {
            logger::info_p("window", &format!("found window \"{}\" ({})", t, handle));
            Ok(handle)
        }
        None => Err(RunError::WindowNotFound { title: title.to_string() }),
    }
}

/// Scan `region` (window client coordinates) for the first pixel matching
/// `signature`; its position becomes the origin.
pub fn calibrate(
    platform: &dyn Platform,
    window: WindowHandle,
    signature: Color,
    region: Rect,
) -> Result<Point> {
    let capture = platform.capture(window, region)?;
    match capture.find(signature, SIGNATURE_TOLERANCE) {
        Some((x, y)) => {
            let origin = Point::new(region.x1 + x as i32, region.y1 + y as i32);
            logger::info_p("window", &format!("game detected at {}", origin));
            Ok(origin)
        }
        None => Err(RunError::SignatureNotFound),
    }
}

/// `locate` then `calibrate` with the configured title, color and region.
pub fn discover(platform: &dyn Platform, settings: &Settings) -> Result<Target> {
    let window = locate(platform, &settings.window_title)?;
    let origin = calibrate(platform, window, settings.signature_color, settings.search_region)?;
    Ok(Target { window, origin })
}
