use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::Platform;
use crate::error::{Result, RunError};
use crate::logger;
use crate::settings::Settings;
use crate::types::*;

/// Where `with_game` draws the game's top-left corner.
pub const STUB_GAME_ORIGIN: Point = Point::new(8, 31);

struct StubWindow {
    handle: WindowHandle,
    title: String,
    /// Screen position of the client area's top-left corner.
    client: Point,
}

struct StubScreen {
    windows: Vec<StubWindow>,
    screen: Capture,
    clicks: Vec<Point>,
    activated: Vec<WindowHandle>,
    op_delay: Duration,
}

/// In-memory desktop: a painted screen buffer, a fixed window list, and a log
/// of every injected click in screen coordinates. Counts operations and tracks their overlap so
/// tests can check serialization.
pub struct StubPlatform {
    inner: Mutex<StubScreen>,
    ops: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubScreen {
    fn client(&self, window: WindowHandle) -> Result<Point> {
        self.windows
            .iter()
            .find(|w| w.handle == window)
            .map(|w| w.client)
            .ok_or_else(|| RunError::Platform(format!("window {} is gone", window)))
    }
}

impl StubPlatform {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_screen(Capture::filled(width, height, Color::default()))
    }

    /// A desktop showing `screen`, e.g. a screenshot loaded from disk.
    pub fn with_screen(screen: Capture) -> Self {
        Self {
            inner: Mutex::new(StubScreen {
                windows: Vec::new(),
                screen,
                clicks: Vec::new(),
                activated: Vec::new(),
                op_delay: Duration::ZERO,
            }),
            ops: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A desktop showing the game: one matching window and the signature
    /// pixel at [`STUB_GAME_ORIGIN`].
    pub fn with_game(settings: &Settings) -> Self {
        let stub = Self::new(1280, 800);
        stub.add_window("Untitled - Notepad");
        stub.add_window("Play NGU IDLE - Kongregate - Mozilla Firefox");
        stub.paint(STUB_GAME_ORIGIN.x, STUB_GAME_ORIGIN.y, settings.signature_color);
        stub
    }

    fn screen(&self) -> MutexGuard<'_, StubScreen> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A window whose client area covers the whole screen.
    pub fn add_window(&self, title: &str) -> WindowHandle {
        self.add_window_at(title, Point::new(0, 0))
    }

    /// A window whose client area starts at `client` on screen.
    pub fn add_window_at(&self, title: &str, client: Point) -> WindowHandle {
        let mut s = self.screen();
        let handle = WindowHandle(0x10000 + s.windows.len() as u64);
        s.windows.push(StubWindow { handle, title: title.to_string(), client });
        handle
    }

    pub fn paint(&self, x: i32, y: i32, color: Color) {
        self.screen().screen.set_pixel(x as u32, y as u32, color);
    }

    pub fn fill(&self, rect: Rect, color: Color) {
        let mut s = self.screen();
        for y in rect.y1..rect.y2 {
            for x in rect.x1..rect.x2 {
                s.screen.set_pixel(x as u32, y as u32, color);
            }
        }
    }

    /// Every operation sleeps this long, to simulate a slow desktop.
    pub fn set_op_delay(&self, delay: Duration) {
        self.screen().op_delay = delay;
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.screen().clicks.clone()
    }

    pub fn activated(&self) -> Vec<WindowHandle> {
        self.screen().activated.clone()
    }

    /// Number of capture/click/activate calls so far.
    pub fn ops(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    /// Highest number of operations ever observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn op<R>(&self, f: impl FnOnce(&mut StubScreen) -> Result<R>) -> Result<R> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.screen().op_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let result = f(&mut self.screen());
        self.ops.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Platform for StubPlatform {
    fn enumerate_windows(&self) -> Vec<(WindowHandle, String)> {
        self.screen().windows.iter().map(|w| (w.handle, w.title.clone())).collect()
    }

    fn capture(&self, window: WindowHandle, rect: Rect) -> Result<Capture> {
        self.op(|s| {
            let client = s.client(window)?;
            let rect = rect.translate(client);
            let (w, h) = (s.screen.width as i32, s.screen.height as i32);
            if rect.x1 < 0 || rect.y1 < 0 || rect.x2 > w || rect.y2 > h {
                return Err(RunError::Platform(format!("{:?} is off screen ({}x{})", rect, w, h)));
            }
            Ok(s.screen.crop(rect.x1 as u32, rect.y1 as u32, rect.width(), rect.height()))
        })
    }

    fn click(&self, window: WindowHandle, x: i32, y: i32) -> Result<()> {
        self.op(|s| {
            let at = s.client(window)?.offset(x, y);
            logger::info_p("stub", &format!("click({})", at));
            s.clicks.push(at);
            Ok(())
        })
    }

    fn activate(&self, window: WindowHandle) -> Result<()> {
        self.op(|s| {
            logger::info_p("stub", &format!("activate({})", window));
            s.activated.push(window);
            Ok(())
        })
    }
}
