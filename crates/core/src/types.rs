use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque OS window identifier (HWND on Windows, synthetic id on the stub platform)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// Screen-space point. The calibrated game origin is a `Point`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, x: i32, y: i32) -> Self {
        Self { x: self.x + x, y: self.y + y }
    }

    pub fn checked_offset(self, x: i32, y: i32) -> Option<Self> {
        Some(Self { x: self.x.checked_add(x)?, y: self.y.checked_add(y)? })
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

/// Rectangle with exclusive right/bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    /// Panics on an empty or inverted rectangle: callers pass literal layout
    /// coordinates, so a bad one is a bug rather than a runtime condition.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        assert!(x2 > x1 && y2 > y1, "invalid rect ({x1}, {y1}) - ({x2}, {y2})");
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1) as u32
    }

    pub fn translate(self, by: Point) -> Self {
        Self::new(self.x1 + by.x, self.y1 + by.y, self.x2 + by.x, self.y2 + by.y)
    }
}

/// RGB color as read from the screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// True when every channel is within `tolerance` of `other`.
    pub fn matches(&self, other: Color, tolerance: u8) -> bool {
        self.r.abs_diff(other.r) <= tolerance
            && self.g.abs_diff(other.g) <= tolerance
            && self.b.abs_diff(other.b) <= tolerance
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    /// Accepts `RRGGBB` with or without a leading `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid color '{}'", s));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Raw screenshot pixel data (BGRA)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

impl Capture {
    /// A tightly packed buffer filled with one color.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[color.b, color.g, color.r, 255]);
        }
        Self { data, width, height, bytes_per_row: width * 4 }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} capture",
            self.width,
            self.height
        );
        (y * self.bytes_per_row + x * 4) as usize
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let idx = self.index(x, y);
        Color::rgb(self.data[idx + 2], self.data[idx + 1], self.data[idx])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        let idx = self.index(x, y);
        self.data[idx] = color.b;
        self.data[idx + 1] = color.g;
        self.data[idx + 2] = color.r;
        self.data[idx + 3] = 255;
    }

    /// Row-major scan for the first pixel matching `color`.
    pub fn find(&self, color: Color, tolerance: u8) -> Option<(u32, u32)> {
        for y in 0..self.height {
            for x in 0..self.width {
                if self.pixel(x, y).matches(color, tolerance) {
                    return Some((x, y));
                }
            }
        }
        None
    }

    /// Copy out a sub-region given in this capture's own coordinates.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Capture {
        assert!(
            x + width <= self.width && y + height <= self.height,
            "crop {width}x{height}+{x}+{y} outside {}x{} capture",
            self.width,
            self.height
        );
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for row in y..y + height {
            let start = self.index(x, row);
            data.extend_from_slice(&self.data[start..start + (width * 4) as usize]);
        }
        Capture { data, width, height, bytes_per_row: width * 4 }
    }

    /// High-contrast copy for text recognition: pixels brighter than
    /// `threshold` become white background, the rest black ink.
    pub fn to_text_mask(&self, threshold: u8) -> Capture {
        let mut out = Capture::filled(self.width, self.height, Color::rgb(255, 255, 255));
        for y in 0..self.height {
            for x in 0..self.width {
                let c = self.pixel(x, y);
                let luma = (299 * c.r as u32 + 587 * c.g as u32 + 114 * c.b as u32) / 1000;
                if luma <= threshold as u32 {
                    out.set_pixel(x, y, Color::rgb(0, 0, 0));
                }
            }
        }
        out
    }

    #[cfg(feature = "debug-capture")]
    pub fn from_image(img: &image::RgbaImage) -> Capture {
        let mut data = Vec::with_capacity(img.as_raw().len());
        for px in img.pixels() {
            data.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
        Capture { data, width: img.width(), height: img.height(), bytes_per_row: img.width() * 4 }
    }

    #[cfg(feature = "debug-capture")]
    pub fn to_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.pixel(x, y);
            image::Rgba([c.r, c.g, c.b, 255])
        })
    }

    #[cfg(feature = "debug-capture")]
    pub fn save_png(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.to_image().save(path)?;
        Ok(())
    }
}

/// Window plus calibrated origin. Produced once by window discovery and
/// never mutated afterwards; a new discovery yields a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub window: WindowHandle,
    pub origin: Point,
}

/// Task recipe selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Questing,
    ItopodSniping,
}

impl RunMode {
    pub const ALL: [RunMode; 2] = [RunMode::Questing, RunMode::ItopodSniping];

    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Questing => "Questing",
            RunMode::ItopodSniping => "ITOPOD sniping",
        }
    }

    /// File name of the recipe script inside the recipes directory.
    pub fn script_name(&self) -> &'static str {
        match self {
            RunMode::Questing => "questing.lua",
            RunMode::ItopodSniping => "itopod.lua",
        }
    }

    pub fn next(&self) -> RunMode {
        match self {
            RunMode::Questing => RunMode::ItopodSniping,
            RunMode::ItopodSniping => RunMode::Questing,
        }
    }
}

/// Lifecycle of one ScriptRunner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parses_with_and_without_hash() {
        assert_eq!("#000408".parse::<Color>().unwrap(), Color::rgb(0, 4, 8));
        assert_eq!("FFa010".parse::<Color>().unwrap(), Color::rgb(255, 160, 16));
        assert!("12345".parse::<Color>().is_err());
        assert!("#GG0000".parse::<Color>().is_err());
    }

    #[test]
    fn color_tolerance_is_per_channel() {
        let c = Color::rgb(100, 100, 100);
        assert!(c.matches(Color::rgb(103, 97, 100), 3));
        assert!(!c.matches(Color::rgb(104, 100, 100), 3));
    }

    #[test]
    fn capture_is_bgra() {
        let mut cap = Capture::filled(2, 2, Color::rgb(1, 2, 3));
        assert_eq!(&cap.data[0..4], &[3, 2, 1, 255]);
        cap.set_pixel(1, 1, Color::rgb(9, 8, 7));
        assert_eq!(cap.pixel(1, 1), Color::rgb(9, 8, 7));
    }

    #[test]
    fn find_scans_row_major() {
        let mut cap = Capture::filled(4, 4, Color::default());
        let red = Color::rgb(255, 0, 0);
        cap.set_pixel(3, 1, red);
        cap.set_pixel(0, 2, red);
        assert_eq!(cap.find(red, 0), Some((3, 1)));
        assert_eq!(cap.find(Color::rgb(0, 255, 0), 0), None);
    }

    #[test]
    fn crop_keeps_pixels() {
        let mut cap = Capture::filled(5, 5, Color::default());
        cap.set_pixel(3, 2, Color::rgb(7, 7, 7));
        let part = cap.crop(2, 1, 2, 2);
        assert_eq!((part.width, part.height), (2, 2));
        assert_eq!(part.pixel(1, 1), Color::rgb(7, 7, 7));
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn out_of_bounds_pixel_panics() {
        Capture::filled(2, 2, Color::default()).pixel(2, 0);
    }

    #[test]
    #[should_panic(expected = "invalid rect")]
    fn inverted_rect_panics() {
        Rect::new(10, 0, 5, 5);
    }

    #[test]
    fn text_mask_splits_on_luma() {
        let mut cap = Capture::filled(2, 1, Color::rgb(250, 250, 250));
        cap.set_pixel(1, 0, Color::rgb(20, 20, 20));
        let mask = cap.to_text_mask(128);
        assert_eq!(mask.pixel(0, 0), Color::rgb(255, 255, 255));
        assert_eq!(mask.pixel(1, 0), Color::rgb(0, 0, 0));
    }
}
