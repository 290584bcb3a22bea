//! Window host backed by a real `HWND`.

use crate::host::{RenderedText, Size, TextPainter, WindowHost};
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, RECT, SIZE, TRUE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    GetDC, GetTextExtentPoint32W, InvalidateRect, ReleaseDC, SetBkMode, SetTextColor, TextOutW,
    HDC, TRANSPARENT,
};
use windows::Win32::UI::WindowsAndMessaging::{GetClientRect, PostMessageW};

/// Host for a window owned by the embedding process. The handle is kept as an
/// integer so the host can be shared with the server thread.
pub struct Win32Host {
    hwnd: isize,
}

impl Win32Host {
    pub fn new(hwnd: HWND) -> Self {
        Self {
            hwnd: hwnd.0 as isize,
        }
    }

    fn hwnd(&self) -> HWND {
        HWND(self.hwnd as *mut core::ffi::c_void)
    }
}

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

impl WindowHost for Win32Host {
    fn client_extent(&self) -> Size {
        let mut rect = RECT::default();
        if unsafe { GetClientRect(self.hwnd(), &mut rect) }.is_err() {
            return Size::default();
        }
        Size {
            width: rect.right - rect.left,
            height: rect.bottom - rect.top,
        }
    }

    fn measure_text(&self, text: &str) -> Size {
        let hwnd = self.hwnd();
        let mut size = SIZE::default();
        unsafe {
            let dc = GetDC(hwnd);
            let _ = GetTextExtentPoint32W(dc, &wide(text), &mut size);
            ReleaseDC(hwnd, dc);
        }
        Size {
            width: size.cx,
            height: size.cy,
        }
    }

    fn invalidate(&self) {
        unsafe {
            let _ = InvalidateRect(self.hwnd(), None, TRUE);
        }
    }

    fn post_message(&self, message_id: u32) {
        if let Err(err) = unsafe { PostMessageW(self.hwnd(), message_id, WPARAM(0), LPARAM(0)) } {
            tracing::warn!(message_id, %err, "failed to post window message");
        }
    }
}

/// Plain GDI text output into a device context the host obtained in `WM_PAINT`.
pub struct GdiPainter {
    hdc: HDC,
}

impl GdiPainter {
    pub fn new(hdc: HDC) -> Self {
        unsafe {
            SetBkMode(hdc, TRANSPARENT);
        }
        Self { hdc }
    }
}

impl TextPainter for GdiPainter {
    fn draw_text(&mut self, text: &RenderedText) {
        let color = text.info.color;
        // COLORREF is 0x00BBGGRR; components are masked, not clamped
        let colorref = COLORREF(
            (color.red & 0xFF) | ((color.green & 0xFF) << 8) | ((color.blue & 0xFF) << 16),
        );
        unsafe {
            SetTextColor(self.hdc, colorref);
            let _ = TextOutW(
                self.hdc,
                text.bounds.left,
                text.bounds.top,
                &wide(&text.info.text),
            );
        }
    }
}
