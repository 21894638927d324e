use std::os::raw::c_void;
use std::path::Path;
use std::sync::Arc;

use crate::callback::HostCallback;
use crate::{MidiEvent, PluginDescriptor, Result};

/// One loaded, instantiated plugin as an opaque capability
///
/// The lifecycle controller owns the handle exclusively; every other
/// component borrows it for the duration of a call.
///
/// # Thread Safety
///
/// Implementations are `Send` so the handle can move onto an editor
/// thread, but never `Sync`: at most one thread calls into the plugin at
/// any instant. Dropping the handle closes the instance and unloads the
/// module, in that order.
pub trait PluginHandle: Send {
    /// Numeric facts published by the instance
    fn descriptor(&self) -> PluginDescriptor;

    /// Send a raw dispatcher opcode to the plugin
    ///
    /// # Safety
    ///
    /// `ptr` must satisfy whatever the ABI documents for `opcode`: a valid
    /// buffer of the documented size, a valid out-pointer, or null.
    unsafe fn dispatch(
        &mut self,
        opcode: i32,
        index: i32,
        value: isize,
        ptr: *mut c_void,
        opt: f32,
    ) -> isize;

    /// Canonical name of a dispatcher opcode, from the ABI's fixed enumeration
    fn opcode_name(&self, opcode: i32) -> Option<&'static str>;

    /// Current value of a parameter (normalized 0.0 to 1.0)
    fn get_parameter(&self, index: usize) -> f32;

    /// Set the value of a parameter (normalized 0.0 to 1.0)
    fn set_parameter(&mut self, index: usize, value: f32);

    /// Process one block of planar audio
    ///
    /// `inputs.len()` and `outputs.len()` must match the descriptor's
    /// channel counts and every channel must hold at least `frames` samples.
    fn process(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frames: usize,
    ) -> Result<()>;

    /// Queue MIDI events for the next processed block
    fn send_midi(&mut self, events: &[MidiEvent]) -> Result<()>;
}

/// Opens plugin modules
///
/// The responder is registered before the instance exists and must stay
/// alive for as long as the returned handle does.
pub trait PluginLoader {
    fn load(&self, path: &Path, callback: Arc<HostCallback>) -> Result<Box<dyn PluginHandle>>;
}

/// Stream format announced to a [`SampleSink`] before the first write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Receives rendered fixed-point samples, interleaved by channel
pub trait SampleSink {
    /// Called once before any samples are written
    fn begin(&mut self, format: StreamFormat) -> Result<()>;

    /// Append interleaved samples (a whole number of frames)
    fn write(&mut self, samples: &[i32]) -> Result<()>;

    /// Called once after the last block
    fn finish(&mut self) -> Result<()>;
}

impl<S: SampleSink + ?Sized> SampleSink for &mut S {
    fn begin(&mut self, format: StreamFormat) -> Result<()> {
        (**self).begin(format)
    }

    fn write(&mut self, samples: &[i32]) -> Result<()> {
        (**self).write(samples)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
