//! Gated access to the game's screen and mouse.
//!
//! Coordinates are relative to the calibrated origin. Each primitive passes
//! through the run gate on its own, so a pause lands between any two calls.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, RunError};
use crate::gate::RunGate;
use crate::logger;
use crate::platform::Platform;
use crate::types::*;

/// Luma cut-off used by [`InputController::capture_text_region`].
pub const TEXT_THRESHOLD: u8 = 110;

fn failed(op: &'static str) -> impl Fn(&RunError) {
    move |e| logger::warn_p("input", &format!("{} failed: {}", op, e))
}

#[derive(Clone)]
pub struct InputController {
    platform: Arc<dyn Platform>,
    target: Target,
    gate: Arc<RunGate>,
}

impl InputController {
    pub(crate) fn new(platform: Arc<dyn Platform>, target: Target, gate: Arc<RunGate>) -> Self {
        Self { platform, target, gate }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub(crate) fn gate(&self) -> &Arc<RunGate> {
        &self.gate
    }

    /// Recipe coordinates come from scripts, so bad ones are errors, not panics.
    fn client_point(&self, x: i32, y: i32) -> Result<Point> {
        self.target
            .origin
            .checked_offset(x, y)
            .ok_or_else(|| RunError::OutOfRange(format!("({}, {})", x, y)))
    }

    fn client_rect(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Rect> {
        if x2 <= x1 || y2 <= y1 {
            return Err(RunError::OutOfRange(format!("empty region ({}, {}) - ({}, {})", x1, y1, x2, y2)));
        }
        let a = self.client_point(x1, y1)?;
        let b = self.client_point(x2, y2)?;
        Ok(Rect::new(a.x, a.y, b.x, b.y))
    }

    pub fn read_pixel(&self, x: i32, y: i32) -> Result<Color> {
        let x2 = x.checked_add(1).ok_or_else(|| RunError::OutOfRange(format!("({}, {})", x, y)))?;
        let y2 = y.checked_add(1).ok_or_else(|| RunError::OutOfRange(format!("({}, {})", x, y)))?;
        let rect = self.client_rect(x, y, x2, y2)?;
        let _in_flight = self.gate.enter()?;
        let capture = self.platform.capture(self.target.window, rect).inspect_err(failed("read"))?;
        Ok(capture.pixel(0, 0))
    }

    pub fn check_pixel_color(&self, x: i32, y: i32, expected: Color, tolerance: u8) -> Result<bool> {
        Ok(self.read_pixel(x, y)?.matches(expected, tolerance))
    }

    /// Row-major scan of the rectangle for an exact color match.
    /// `Ok(None)` is a normal answer, not a failure.
    pub fn pixel_search(&self, color: Color, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Option<Point>> {
        let capture = self.capture_region(x1, y1, x2, y2)?;
        Ok(capture
            .find(color, 0)
            .map(|(x, y)| Point::new(x1 + x as i32, y1 + y as i32)))
    }

    pub fn capture_region(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Capture> {
        let rect = self.client_rect(x1, y1, x2, y2)?;
        let _in_flight = self.gate.enter()?;
        self.platform.capture(self.target.window, rect).inspect_err(failed("capture"))
    }

    /// Region prepared for a text recognizer: dark glyphs on white.
    pub fn capture_text_region(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Capture> {
        Ok(self.capture_region(x1, y1, x2, y2)?.to_text_mask(TEXT_THRESHOLD))
    }

    pub fn click(&self, x: i32, y: i32) -> Result<()> {
        let at = self.client_point(x, y)?;
        let _in_flight = self.gate.enter()?;
        self.platform.click(self.target.window, at.x, at.y).inspect_err(failed("click"))
    }

    pub fn activate(&self) -> Result<()> {
        let _in_flight = self.gate.enter()?;
        self.platform.activate(self.target.window).inspect_err(failed("activate"))
    }

    /// Safe point for recipe loops; fails once the run is stopped.
    pub fn checkpoint(&self) -> Result<()> {
        self.gate.checkpoint()
    }

    /// Cancellable sleep.
    pub fn idle(&self, duration: Duration) -> Result<()> {
        self.gate.idle(duration)
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }
}
