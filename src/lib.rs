//! # plughost - VST 2.x Plugin Hosting
//!
//! plughost loads one VST 2.x plugin module, answers its host callbacks,
//! drives it through a checked lifecycle, runs its editor on a dedicated
//! thread, and renders audio from it offline in fixed-size blocks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plughost::prelude::*;
//!
//! # fn main() -> plughost::Result<()> {
//! let config = HostConfig::default().with_sample_rate(48000.0);
//! let mut host = PluginHost::load_vst2("synth.dll", config)?;
//!
//! if host.supports_editor() {
//!     println!("{} has an editor", host.info().name);
//! }
//!
//! // Two seconds of middle C at full velocity
//! let settings = RenderSettings::from_duration(2.0, 48000).with_note(60, 127);
//! let report = render(&mut host, &settings, MemorySink::new())?;
//! println!("rendered {} frames", report.frames);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **wav** (default) - [`WavSink`] writes rendered audio through `hound`
//! - **cpal** - [`PlaybackSink`] plays rendered audio on the default output device
//!
//! ## Threading
//!
//! A [`PluginHost`] is `Send` but not `Sync`: exactly one thread talks to the
//! plugin at a time. Hand the host to an [`UiCoordinator`] to show the
//! editor, and submit work to it through a [`UiHandle`] from any thread.

pub mod buffer;
pub mod callback;
pub mod capability;
pub mod config;
pub mod editor;
pub mod error;
pub mod host;
pub mod midi;
pub mod plugin_info;
pub mod render;
pub mod sink;
pub mod traits;
pub mod vst2;

#[cfg(test)]
mod mock;

pub use buffer::AudioBlock;
pub use callback::{HostCallback, ProcessLevel, TimingInfo};
pub use capability::{Capability, CapabilityTable};
pub use config::HostConfig;
pub use editor::{SpawnError, UiCoordinator, UiHandle};
pub use error::{Error, LoadStage, Result};
pub use host::{BankBlob, LifecycleState, PluginHost};
pub use midi::{MidiEvent, MidiEventKind};
pub use plugin_info::{ParameterInfo, PluginDescriptor, PluginInfo};
pub use render::{render, render_with_cancel, BitDepth, RenderReport, RenderSettings};
pub use sink::MemorySink;
#[cfg(feature = "cpal")]
pub use sink::PlaybackSink;
#[cfg(feature = "wav")]
pub use sink::WavSink;
pub use traits::{PluginHandle, PluginLoader, SampleSink, StreamFormat};
pub use vst2::Vst2Loader;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        render, AudioBlock, BankBlob, BitDepth, Error, HostConfig, LifecycleState, MemorySink,
        MidiEvent, MidiEventKind, ParameterInfo, PluginHost, PluginInfo, RenderSettings, Result,
        SampleSink, UiCoordinator, UiHandle,
    };

    #[cfg(feature = "wav")]
    pub use crate::WavSink;
}
