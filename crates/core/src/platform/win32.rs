use std::ffi::c_void;
use std::mem::size_of;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, TRUE};
use windows::Win32::Graphics::Gdi::{
    BitBlt, ClientToScreen, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HGDIOBJ,
    SRCCOPY,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEINPUT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextW, IsWindowVisible, SetCursorPos, SetForegroundWindow, ShowWindow,
    SW_SHOW,
};

use super::Platform;
use crate::error::{Result, RunError};
use crate::logger;
use crate::types::*;

pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self {
        Win32Platform
    }
}

impl Default for Win32Platform {
    fn default() -> Self {
        Self::new()
    }
}

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as isize as *mut c_void)
}

/// Screen position of the client area's top-left corner.
fn client_origin(window: WindowHandle) -> Result<Point> {
    let mut p = POINT { x: 0, y: 0 };
    if !unsafe { ClientToScreen(hwnd(window), &mut p) }.as_bool() {
        return Err(RunError::Platform(format!("ClientToScreen({}) failed", window)));
    }
    Ok(Point::new(p.x, p.y))
}

fn to_screen(window: WindowHandle, x: i32, y: i32) -> Result<Point> {
    client_origin(window)?
        .checked_offset(x, y)
        .ok_or_else(|| RunError::OutOfRange(format!("({}, {}) in window {}", x, y, window)))
}

unsafe extern "system" fn collect_window(handle: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<(WindowHandle, String)>);
    if IsWindowVisible(handle).as_bool() {
        let mut buf = [0u16; 512];
        let len = GetWindowTextW(handle, &mut buf);
        if len > 0 {
            let title = String::from_utf16_lossy(&buf[..len as usize]);
            windows.push((WindowHandle(handle.0 as isize as u64), title));
        }
    }
    TRUE
}

impl Platform for Win32Platform {
    fn enumerate_windows(&self) -> Vec<(WindowHandle, String)> {
        let mut windows: Vec<(WindowHandle, String)> = Vec::new();
        let lparam = LPARAM(&mut windows as *mut _ as isize);
        if let Err(e) = unsafe { EnumWindows(Some(collect_window), lparam) } {
            logger::warn_p("win32", &format!("EnumWindows failed: {}", e));
        }
        windows
    }

    /// Copies the region from the desktop DC, so the game must be visible.
    fn capture(&self, window: WindowHandle, rect: Rect) -> Result<Capture> {
        let (width, height) = (rect.width() as i32, rect.height() as i32);
        let from = to_screen(window, rect.x1, rect.y1)?;
        unsafe {
            let screen_dc = GetDC(HWND::default());
            if screen_dc.is_invalid() {
                return Err(RunError::Platform("GetDC failed".into()));
            }
            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            let previous = SelectObject(mem_dc, HGDIOBJ(bitmap.0));

            let blit = BitBlt(mem_dc, 0, 0, width, height, screen_dc, from.x, from.y, SRCCOPY);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    biHeight: -height, // top-down rows
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut data = vec![0u8; (width * height * 4) as usize];
            let lines = if blit.is_ok() {
                GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    height as u32,
                    Some(data.as_mut_ptr() as *mut c_void),
                    &mut info,
                    DIB_RGB_COLORS,
                )
            } else {
                0
            };

            SelectObject(mem_dc, previous);
            let _ = DeleteObject(HGDIOBJ(bitmap.0));
            let _ = DeleteDC(mem_dc);
            ReleaseDC(HWND::default(), screen_dc);

            if let Err(e) = blit {
                return Err(RunError::Platform(format!("BitBlt failed: {}", e)));
            }
            if lines != height {
                return Err(RunError::Platform("GetDIBits returned a short read".into()));
            }
            Ok(Capture { data, width: width as u32, height: height as u32, bytes_per_row: width as u32 * 4 })
        }
    }

    fn click(&self, window: WindowHandle, x: i32, y: i32) -> Result<()> {
        let at = to_screen(window, x, y)?;
        unsafe {
            SetCursorPos(at.x, at.y).map_err(|e| RunError::Platform(format!("SetCursorPos failed: {}", e)))?;
            let input = |flags| INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT { dwFlags: flags, ..Default::default() },
                },
            };
            let inputs = [input(MOUSEEVENTF_LEFTDOWN), input(MOUSEEVENTF_LEFTUP)];
            let sent = SendInput(&inputs, size_of::<INPUT>() as i32);
            if sent as usize != inputs.len() {
                return Err(RunError::Platform("SendInput was blocked".into()));
            }
        }
        Ok(())
    }

    fn activate(&self, window: WindowHandle) -> Result<()> {
        unsafe {
            let _ = ShowWindow(hwnd(window), SW_SHOW);
            if !SetForegroundWindow(hwnd(window)).as_bool() {
                logger::warn_p("win32", &format!("SetForegroundWindow({}) refused", window));
            }
        }
        Ok(())
    }
}
