use std::cell::Cell;
use std::os::raw::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use libloading::Library;

use super::ffi::{AEffect, PluginMainProc, VST_MAGIC, VST_VERSION};
use super::opcodes::{host, plugin};
use super::plugin::Vst2Plugin;
use crate::callback::HostCallback;
use crate::error::LoadStage;
use crate::{Error, PluginHandle, PluginLoader, Result};

thread_local! {
    // Responder for callbacks that arrive before the effect exists (inside the entry point)
    static LOADING: Cell<*const HostCallback> = const { Cell::new(ptr::null()) };
}

/// Loads VST 2.x modules (`.dll`, `.so`, `.vst` bundles' binaries)
#[derive(Debug, Clone, Copy, Default)]
pub struct Vst2Loader;

impl PluginLoader for Vst2Loader {
    fn load(&self, path: &Path, callback: Arc<HostCallback>) -> Result<Box<dyn PluginHandle>> {
        let fail = |stage, reason: String| Error::Load {
            path: path.to_path_buf(),
            stage,
            reason,
        };

        let library =
            unsafe { Library::new(path) }.map_err(|e| fail(LoadStage::Opening, e.to_string()))?;

        let main: PluginMainProc = unsafe {
            match library.get::<PluginMainProc>(b"VSTPluginMain\0") {
                Ok(symbol) => *symbol,
                Err(_) => *library
                    .get::<PluginMainProc>(b"main\0")
                    .map_err(|e| fail(LoadStage::EntryPoint, e.to_string()))?,
            }
        };

        let effect = {
            let _slot = LoadingSlot::enter(&callback);
            unsafe { main(host_callback) }
        };
        let effect = NonNull::new(effect).ok_or_else(|| {
            fail(
                LoadStage::Instantiation,
                "entry point returned no instance".to_string(),
            )
        })?;

        let magic = unsafe { effect.as_ref().magic };
        if magic != VST_MAGIC {
            return Err(fail(
                LoadStage::Validation,
                format!("bad magic number {:#010x}", magic),
            ));
        }

        // From here on callbacks find their responder through the effect
        unsafe { (*effect.as_ptr()).user = Arc::as_ptr(&callback) as *mut c_void };

        let mut instance = Vst2Plugin::new(effect, callback, library);
        unsafe { instance.dispatch(plugin::OPEN, 0, 0, ptr::null_mut(), 0.0) };
        tracing::debug!(path = %path.display(), "opened VST2 instance");
        Ok(Box::new(instance))
    }
}

/// Restores the previous loading slot on drop, so nested loads on one thread stay correct
struct LoadingSlot(*const HostCallback);

impl LoadingSlot {
    fn enter(callback: &Arc<HostCallback>) -> Self {
        Self(LOADING.with(|slot| slot.replace(Arc::as_ptr(callback))))
    }
}

impl Drop for LoadingSlot {
    fn drop(&mut self) {
        LOADING.with(|slot| slot.set(self.0));
    }
}

/// Entry point the plugin calls for every host query
extern "C" fn host_callback(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    let responder = if effect.is_null() {
        ptr::null()
    } else {
        // Safety: a non-null effect is one this host instantiated and still owns
        unsafe { (*effect).user as *const HostCallback }
    };
    let responder = if responder.is_null() {
        LOADING.with(Cell::get)
    } else {
        responder
    };

    if responder.is_null() {
        // Queried before any responder is reachable; only the version is meaningful
        return if opcode == host::VERSION { VST_VERSION } else { 0 };
    }

    // Safety: the responder outlives the instance; see Vst2Plugin field order
    let responder = unsafe { &*responder };
    catch_unwind(AssertUnwindSafe(|| responder.respond(opcode, index, value, ptr, opt)))
        .unwrap_or(0)
}
