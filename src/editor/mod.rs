//! Editor thread
//!
//! A plugin editor must be opened, idled, resized and closed on the thread
//! that owns its parent window. [`UiCoordinator`] moves the [`PluginHost`]
//! onto a dedicated thread that creates the window, starts the plugin and
//! opens the editor, then serves requests from other threads one at a time
//! until the window closes or the coordinator is shut down.
//!
//! ```no_run
//! use plughost::editor::{HeadlessSurface, UiCoordinator};
//! use plughost::{HostConfig, PluginHost};
//!
//! # fn main() -> plughost::Result<()> {
//! let host = PluginHost::load_vst2("synth.dll", HostConfig::default())?;
//! let ui = UiCoordinator::spawn(host, |_| Ok(HeadlessSurface::new().0))?;
//! let program = ui.call(|host| host.program())??;
//! let mut host = ui.close()?;
//! host.suspend().ok();
//! # let _ = program;
//! # Ok(())
//! # }
//! ```

mod surface;
#[cfg(windows)]
mod win32;

pub use surface::{EditorSurface, HeadlessSurface, Pump, SurfaceHandle};
#[cfg(windows)]
pub use win32::Win32Surface;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::host::{LifecycleState, PluginHost};
use crate::{Error, HostConfig, Result};

type Job = Box<dyn FnOnce(&mut PluginHost) + Send>;

enum UiMessage {
    Run(Job),
    Shutdown,
}

/// Submits work to the editor thread
///
/// Cheap to clone. Every request runs on the editor thread in arrival
/// order and its caller blocks until the result comes back.
#[derive(Clone)]
pub struct UiHandle {
    tx: Sender<UiMessage>,
    closed: Arc<AtomicBool>,
}

impl UiHandle {
    /// Run `f` against the host on the editor thread and wait for its result
    ///
    /// # Errors
    ///
    /// [`Error::CoordinatorClosed`] when the thread has shut down, including
    /// when it shuts down with this request still queued. A panic inside `f`
    /// is reported as [`Error::Other`] and the thread keeps running.
    pub fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut PluginHost) -> R + Send + 'static,
    {
        if self.is_closed() {
            return Err(Error::CoordinatorClosed);
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded::<Result<R>>(1);
        let job: Job = Box::new(move |host: &mut PluginHost| {
            let result = catch_unwind(AssertUnwindSafe(|| f(host)))
                .map_err(|_| Error::Other("editor request panicked".into()));
            let _ = reply_tx.send(result);
        });
        self.tx
            .send(UiMessage::Run(job))
            .map_err(|_| Error::CoordinatorClosed)?;
        reply_rx.recv().map_err(|_| Error::CoordinatorClosed)?
    }

    /// [`call`](Self::call) for fallible host operations
    pub fn try_call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut PluginHost) -> Result<R> + Send + 'static,
    {
        self.call(f)?
    }

    /// The editor thread has left its loop
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for UiHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Failure to bring the editor thread up
///
/// The host is handed back whenever it survived, so the caller can keep
/// using it without the editor.
#[derive(Debug, thiserror::Error)]
#[error("failed to start editor thread: {source}")]
pub struct SpawnError {
    pub source: Error,
    pub host: Option<PluginHost>,
}

impl SpawnError {
    fn new(source: Error, host: Option<PluginHost>) -> Self {
        Self { source, host }
    }
}

impl From<SpawnError> for Error {
    fn from(err: SpawnError) -> Self {
        err.source
    }
}

/// Owns the editor thread
///
/// Dropping the coordinator shuts the thread down and waits for it; the
/// host is closed along with it. Use [`close`](Self::close) or
/// [`wait`](Self::wait) to get the host back instead.
pub struct UiCoordinator {
    handle: UiHandle,
    thread: Option<JoinHandle<PluginHost>>,
}

impl UiCoordinator {
    /// Move `host` onto a new editor thread
    ///
    /// `make_surface` runs on the new thread and builds the window the
    /// editor is attached to. Before the editor opens, the thread pushes the
    /// configured sample rate and block size to the plugin and starts it.
    /// Returns once the editor is open.
    pub fn spawn<W, F>(host: PluginHost, make_surface: F) -> std::result::Result<Self, SpawnError>
    where
        W: EditorSurface + 'static,
        F: FnOnce(&HostConfig) -> Result<W> + Send + 'static,
    {
        if let Err(err) = host.check_editor() {
            return Err(SpawnError::new(err, Some(host)));
        }
        if matches!(host.state(), LifecycleState::Unloaded | LifecycleState::Closed) {
            let err = Error::invalid_state("open editor", host.state());
            return Err(SpawnError::new(err, Some(host)));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let closed = Arc::new(AtomicBool::new(false));
        let thread_closed = Arc::clone(&closed);

        let thread = std::thread::Builder::new()
            .name("plughost-editor".into())
            .spawn(move || editor_thread(host, make_surface, rx, ready_tx, thread_closed))
            .map_err(|e| SpawnError::new(Error::Io(e), None))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                handle: UiHandle { tx, closed },
                thread: Some(thread),
            }),
            Ok(Err(err)) => Err(SpawnError::new(err, thread.join().ok())),
            Err(_) => Err(SpawnError::new(
                Error::Other("editor thread exited during start-up".into()),
                thread.join().ok(),
            )),
        }
    }

    /// [`spawn`](Self::spawn) with a native top-level window titled after the config
    #[cfg(windows)]
    pub fn spawn_native(host: PluginHost) -> std::result::Result<Self, SpawnError> {
        Self::spawn(host, |config| Win32Surface::create(&config.window_title))
    }

    pub fn handle(&self) -> UiHandle {
        self.handle.clone()
    }

    /// See [`UiHandle::call`]
    pub fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut PluginHost) -> R + Send + 'static,
    {
        self.handle.call(f)
    }

    /// See [`UiHandle::try_call`]
    pub fn try_call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut PluginHost) -> Result<R> + Send + 'static,
    {
        self.handle.try_call(f)
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Block until the user closes the window, then return the suspended host
    pub fn wait(mut self) -> Result<PluginHost> {
        self.join()
    }

    /// Shut the editor thread down and return the suspended host
    ///
    /// Requests queued ahead of the shutdown still run.
    pub fn close(mut self) -> Result<PluginHost> {
        let _ = self.handle.tx.send(UiMessage::Shutdown);
        self.join()
    }

    fn join(&mut self) -> Result<PluginHost> {
        let thread = self.thread.take().ok_or(Error::CoordinatorClosed)?;
        thread
            .join()
            .map_err(|_| Error::Other("editor thread panicked".into()))
    }
}

impl Drop for UiCoordinator {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.tx.send(UiMessage::Shutdown);
            if thread.join().is_err() {
                warn!("editor thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for UiCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiCoordinator")
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn editor_thread<W, F>(
    mut host: PluginHost,
    make_surface: F,
    rx: Receiver<UiMessage>,
    ready: Sender<Result<()>>,
    closed: Arc<AtomicBool>,
) -> PluginHost
where
    W: EditorSurface,
    F: FnOnce(&HostConfig) -> Result<W>,
{
    let mut surface = match open(&mut host, make_surface) {
        Ok(surface) => surface,
        Err(err) => {
            if host.state() == LifecycleState::Running {
                if let Err(e) = host.suspend() {
                    warn!(error = %e, "failed to suspend after editor start-up failure");
                }
            }
            closed.store(true, Ordering::Release);
            let _ = ready.send(Err(err));
            return host;
        }
    };
    let _ = ready.send(Ok(()));

    let reason = run_loop(&mut host, &mut surface, &rx);
    closed.store(true, Ordering::Release);
    info!(reason, "editor thread stopping");

    if host.state() == LifecycleState::Running {
        if let Err(e) = host.suspend() {
            warn!(error = %e, "failed to suspend plugin");
        }
    }
    if let Err(e) = host.close_editor() {
        warn!(error = %e, "failed to close editor");
    }
    surface.destroy();
    host
}

/// Build the window, start the plugin and attach its editor
///
/// On failure the editor is closed and the window destroyed before
/// returning, so no editor call is left for another thread.
fn open<W, F>(host: &mut PluginHost, make_surface: F) -> Result<W>
where
    W: EditorSurface,
    F: FnOnce(&HostConfig) -> Result<W>,
{
    let config = host.config().clone();
    let mut surface = make_surface(&config)?;
    if let Err(err) = attach(host, &config, &mut surface) {
        if host.is_editor_open() {
            if let Err(e) = host.close_editor() {
                warn!(error = %e, "failed to close editor after start-up failure");
            }
        }
        surface.destroy();
        return Err(err);
    }
    Ok(surface)
}

fn attach<W: EditorSurface>(
    host: &mut PluginHost,
    config: &HostConfig,
    surface: &mut W,
) -> Result<()> {
    if host.state() == LifecycleState::Running {
        host.suspend()?;
    }
    host.set_sample_rate(config.sample_rate)?;
    host.set_block_size(config.block_size)?;
    let descriptor = host.descriptor();
    debug!(
        inputs = descriptor.num_inputs,
        outputs = descriptor.num_outputs,
        channels = config.channels,
        "channel layout"
    );
    match host.state() {
        LifecycleState::Loaded => host.start()?,
        _ => host.resume()?,
    }

    if let Some((width, height)) = host.editor_rect() {
        surface.resize(width, height)?;
    }
    let parent = surface
        .parent_handle()
        .map_or(ptr::null_mut(), NonNull::as_ptr);
    host.open_editor(parent)?;
    // Many editors only know their real size once open
    let requested = host.callback().take_resize_request();
    if let Some((width, height)) = host.editor_rect().or(requested) {
        surface.resize(width, height)?;
    }
    Ok(())
}

/// Serve window messages, resize requests and host requests until told to stop
///
/// Native messages go first, then pending resizes, then one queued request.
/// With nothing to do the editor gets an idle tick and the thread sleeps on
/// the request queue for the configured interval.
fn run_loop<W: EditorSurface>(
    host: &mut PluginHost,
    surface: &mut W,
    rx: &Receiver<UiMessage>,
) -> &'static str {
    let idle_interval = host.config().idle_interval;
    loop {
        match surface.pump() {
            Pump::Quit => return "window closed",
            Pump::Dispatched(_) => continue,
            Pump::Idle => {}
        }

        if let Some((width, height)) = host.callback().take_resize_request() {
            if let Err(e) = surface.resize(width, height) {
                warn!(width, height, error = %e, "failed to resize editor window");
            }
        }

        match rx.try_recv() {
            Ok(UiMessage::Run(job)) => {
                job(host);
                continue;
            }
            Ok(UiMessage::Shutdown) => return "shutdown requested",
            Err(TryRecvError::Disconnected) => return "coordinator dropped",
            Err(TryRecvError::Empty) => {}
        }

        host.editor_idle();
        match rx.recv_timeout(idle_interval) {
            Ok(UiMessage::Run(job)) => job(host),
            Ok(UiMessage::Shutdown) => return "shutdown requested",
            Err(RecvTimeoutError::Disconnected) => return "coordinator dropped",
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
