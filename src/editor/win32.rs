use std::cell::Cell;
use std::os::raw::c_void;
use std::ptr::NonNull;

use windows::core::{w, HSTRING, PCWSTR};
use windows::Win32::Foundation::{
    GetLastError, ERROR_CLASS_ALREADY_EXISTS, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect,
    GetWindowRect, PeekMessageW, RegisterClassExW, SetWindowPos, ShowWindow, TranslateMessage,
    CS_HREDRAW, CS_VREDRAW, CW_USEDEFAULT, MSG, PM_REMOVE, SWP_NOACTIVATE, SWP_NOMOVE,
    SWP_NOZORDER, SW_SHOW, WINDOW_EX_STYLE, WM_CLOSE, WM_QUIT, WNDCLASSEXW, WS_CLIPCHILDREN,
    WS_OVERLAPPEDWINDOW,
};

use super::surface::{EditorSurface, Pump};
use crate::{Error, Result};

const CLASS_NAME: PCWSTR = w!("PlughostEditorWindow");

thread_local! {
    // Set by the window procedure; the window itself stays up until the editor is closed
    static CLOSE_REQUESTED: Cell<bool> = const { Cell::new(false) };
}

unsafe extern "system" fn wnd_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if msg == WM_CLOSE {
        CLOSE_REQUESTED.with(|flag| flag.set(true));
        return LRESULT(0);
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Top-level Win32 window hosting the editor as a child
#[derive(Debug)]
pub struct Win32Surface {
    hwnd: HWND,
    destroyed: bool,
}

impl Win32Surface {
    /// Create and show the window on the calling thread
    pub fn create(title: &str) -> Result<Self> {
        let instance = unsafe { GetModuleHandleW(None) }
            .map(|m| HINSTANCE(m.0))
            .map_err(|e| Error::Window(format!("GetModuleHandleW failed: {}", e)))?;
        register_class(instance)?;

        let title = HSTRING::from(title);
        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(0),
                CLASS_NAME,
                PCWSTR(title.as_ptr()),
                WS_OVERLAPPEDWINDOW | WS_CLIPCHILDREN,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                400,
                300,
                None,
                None,
                Some(instance),
                None,
            )
        }
        .map_err(|e| Error::Window(format!("CreateWindowExW failed: {}", e)))?;

        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOW);
        }
        CLOSE_REQUESTED.with(|flag| flag.set(false));
        tracing::debug!(hwnd = ?hwnd.0, "editor window created");
        Ok(Self {
            hwnd,
            destroyed: false,
        })
    }
}

fn register_class(instance: HINSTANCE) -> Result<()> {
    let class = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(wnd_proc),
        hInstance: instance,
        lpszClassName: CLASS_NAME,
        ..Default::default()
    };
    if unsafe { RegisterClassExW(&class) } == 0 {
        let err = unsafe { GetLastError() };
        // Registered by an earlier editor in this process
        if err != ERROR_CLASS_ALREADY_EXISTS {
            return Err(Error::Window(format!("RegisterClassExW failed: {:?}", err)));
        }
    }
    Ok(())
}

impl EditorSurface for Win32Surface {
    fn parent_handle(&self) -> Option<NonNull<c_void>> {
        NonNull::new(self.hwnd.0)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let mut window = RECT::default();
        let mut client = RECT::default();
        unsafe {
            GetWindowRect(self.hwnd, &mut window)
                .map_err(|e| Error::Window(format!("GetWindowRect failed: {}", e)))?;
            GetClientRect(self.hwnd, &mut client)
                .map_err(|e| Error::Window(format!("GetClientRect failed: {}", e)))?;
        }
        // Grow the frame so the client area matches the editor
        let frame_w = (window.right - window.left) - (client.right - client.left);
        let frame_h = (window.bottom - window.top) - (client.bottom - client.top);
        let width = i32::try_from(width).unwrap_or(i32::MAX).saturating_add(frame_w);
        let height = i32::try_from(height).unwrap_or(i32::MAX).saturating_add(frame_h);

        unsafe {
            SetWindowPos(
                self.hwnd,
                None,
                0,
                0,
                width,
                height,
                SWP_NOMOVE | SWP_NOZORDER | SWP_NOACTIVATE,
            )
        }
        .map_err(|e| Error::Window(format!("SetWindowPos failed: {}", e)))
    }

    fn pump(&mut self) -> Pump {
        let mut msg = MSG::default();
        let mut dispatched = 0;
        unsafe {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    return Pump::Quit;
                }
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
                dispatched += 1;
            }
        }
        if CLOSE_REQUESTED.with(|flag| flag.replace(false)) {
            Pump::Quit
        } else if dispatched > 0 {
            Pump::Dispatched(dispatched)
        } else {
            Pump::Idle
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            tracing::warn!(error = %e, "failed to destroy editor window");
        }
    }
}

impl Drop for Win32Surface {
    fn drop(&mut self) {
        self.destroy();
    }
}
