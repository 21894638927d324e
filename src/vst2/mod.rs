//! VST 2.x plugin binding
//!
//! [`Vst2Loader`] opens a module and instantiates it with the host
//! callback registered; [`Vst2Plugin`] is the resulting
//! [`PluginHandle`](crate::PluginHandle).

pub mod ffi;
mod loader;
pub mod opcodes;
mod plugin;
pub(crate) mod util;

pub use loader::Vst2Loader;
pub use plugin::Vst2Plugin;
