use std::os::raw::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Result;

/// Outcome of one pass over the native message queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    /// This many messages were dispatched
    Dispatched(usize),
    /// Nothing was pending
    Idle,
    /// The window was closed; the editor thread should wind down
    Quit,
}

/// Host-owned window the plugin editor is attached to
///
/// Created, pumped and destroyed on the editor thread only, so
/// implementations need not be `Send`.
pub trait EditorSurface {
    /// Native handle passed to the plugin as the editor's parent
    fn parent_handle(&self) -> Option<NonNull<c_void>>;

    /// Resize the client area
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Drain and dispatch pending native messages
    fn pump(&mut self) -> Pump;

    /// Tear the window down; called once, after the editor is closed
    fn destroy(&mut self);
}

#[derive(Debug, Default)]
struct HeadlessState {
    size: Mutex<Option<(u32, u32)>>,
    resizes: AtomicUsize,
    quit: AtomicBool,
    destroyed: AtomicBool,
}

/// Surface without a native window
///
/// The editor is opened with a null parent. Useful for plugins that
/// manage their own window and for driving the editor thread in tests.
#[derive(Debug)]
pub struct HeadlessSurface {
    state: Arc<HeadlessState>,
}

/// Observes and closes a [`HeadlessSurface`] from another thread
#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    state: Arc<HeadlessState>,
}

impl HeadlessSurface {
    pub fn new() -> (Self, SurfaceHandle) {
        let state = Arc::new(HeadlessState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            SurfaceHandle { state },
        )
    }
}

impl EditorSurface for HeadlessSurface {
    fn parent_handle(&self) -> Option<NonNull<c_void>> {
        None
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        *self.state.size.lock() = Some((width, height));
        self.state.resizes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn pump(&mut self) -> Pump {
        if self.state.quit.load(Ordering::Acquire) {
            Pump::Quit
        } else {
            Pump::Idle
        }
    }

    fn destroy(&mut self) {
        self.state.destroyed.store(true, Ordering::Release);
    }
}

impl SurfaceHandle {
    /// Simulate the user closing the window
    pub fn close(&self) {
        self.state.quit.store(true, Ordering::Release);
    }

    /// Last size applied
    pub fn size(&self) -> Option<(u32, u32)> {
        *self.state.size.lock()
    }

    pub fn resize_count(&self) -> usize {
        self.state.resizes.load(Ordering::Relaxed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.destroyed.load(Ordering::Acquire)
    }
}
