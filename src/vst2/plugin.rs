use std::mem::size_of;
use std::os::raw::c_void;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use libloading::Library;
use smallvec::SmallVec;

use super::ffi::{AEffect, VstEventBlock, VstMidiEvent, MAX_BLOCK_EVENTS, VST_MIDI_TYPE};
use super::opcodes::{plugin, plugin_opcode_name};
use crate::callback::HostCallback;
use crate::{Error, MidiEvent, PluginDescriptor, PluginHandle, Result};

/// A live VST 2.x instance
///
/// Owns the effect, the responder its `user` field points at, and the
/// module it came from. Dropping it sends `effClose`, then releases the
/// responder, then unloads the module.
pub struct Vst2Plugin {
    effect: NonNull<AEffect>,

    // Pre-allocated so process() never allocates
    input_ptrs: Vec<*const f32>,
    output_ptrs: Vec<*mut f32>,
    events: Box<VstEventBlock>,
    midi: Box<[VstMidiEvent; MAX_BLOCK_EVENTS]>,

    _callback: Arc<HostCallback>,
    _library: Library,
}

// Safety: the instance is only ever driven by one thread at a time (the
// trait is not Sync) and owns everything its raw pointers refer to.
unsafe impl Send for Vst2Plugin {}

impl Vst2Plugin {
    pub(crate) fn new(effect: NonNull<AEffect>, callback: Arc<HostCallback>, library: Library) -> Self {
        let (inputs, outputs) = unsafe {
            let e = effect.as_ref();
            (e.num_inputs.max(0) as usize, e.num_outputs.max(0) as usize)
        };
        Self {
            effect,
            input_ptrs: Vec::with_capacity(inputs.max(8)),
            output_ptrs: Vec::with_capacity(outputs.max(8)),
            events: Box::new(VstEventBlock {
                num_events: 0,
                reserved: 0,
                events: [ptr::null_mut(); MAX_BLOCK_EVENTS],
            }),
            midi: Box::new([VstMidiEvent::default(); MAX_BLOCK_EVENTS]),
            _callback: callback,
            _library: library,
        }
    }

    fn effect(&self) -> &AEffect {
        // Safety: the effect stays valid until effClose in Drop
        unsafe { self.effect.as_ref() }
    }
}

impl PluginHandle for Vst2Plugin {
    fn descriptor(&self) -> PluginDescriptor {
        let e = self.effect();
        PluginDescriptor {
            unique_id: e.unique_id,
            version: e.version,
            num_params: e.num_params.max(0) as usize,
            num_programs: e.num_programs.max(0) as usize,
            num_inputs: e.num_inputs.max(0) as usize,
            num_outputs: e.num_outputs.max(0) as usize,
            flags: e.flags,
        }
    }

    unsafe fn dispatch(
        &mut self,
        opcode: i32,
        index: i32,
        value: isize,
        ptr: *mut c_void,
        opt: f32,
    ) -> isize {
        (self.effect().dispatcher)(self.effect.as_ptr(), opcode, index, value, ptr, opt)
    }

    fn opcode_name(&self, opcode: i32) -> Option<&'static str> {
        plugin_opcode_name(opcode)
    }

    fn get_parameter(&self, index: usize) -> f32 {
        (self.effect().get_parameter)(self.effect.as_ptr(), index as i32)
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        (self.effect().set_parameter)(self.effect.as_ptr(), index as i32, value)
    }

    fn process(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frames: usize,
    ) -> Result<()> {
        let descriptor = self.descriptor();
        if inputs.len() != descriptor.num_inputs || outputs.len() != descriptor.num_outputs {
            return Err(Error::Process(format!(
                "got {} in / {} out, plugin has {} / {}",
                inputs.len(),
                outputs.len(),
                descriptor.num_inputs,
                descriptor.num_outputs
            )));
        }
        if inputs.iter().any(|ch| ch.len() < frames) || outputs.iter().any(|ch| ch.len() < frames) {
            return Err(Error::Process(format!("channel shorter than {} frames", frames)));
        }
        let frames = i32::try_from(frames)
            .map_err(|_| Error::Process(format!("block of {} frames is too large", frames)))?;
        let process = self
            .effect()
            .process_replacing
            .ok_or_else(|| Error::Process("plugin does not support replacing processing".into()))?;

        self.input_ptrs.clear();
        self.input_ptrs.extend(inputs.iter().map(|ch| ch.as_ptr()));
        self.output_ptrs.clear();
        self.output_ptrs.extend(outputs.iter_mut().map(|ch| ch.as_mut_ptr()));

        process(
            self.effect.as_ptr(),
            self.input_ptrs.as_ptr(),
            self.output_ptrs.as_mut_ptr(),
            frames,
        );
        Ok(())
    }

    fn send_midi(&mut self, events: &[MidiEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        if events.len() > MAX_BLOCK_EVENTS {
            return Err(Error::Process(format!(
                "{} events in one block, at most {} supported",
                events.len(),
                MAX_BLOCK_EVENTS
            )));
        }

        // Plugins expect events in delivery order
        let mut ordered: SmallVec<[MidiEvent; 16]> = events.iter().copied().collect();
        ordered.sort_by_key(|event| event.delta_frames);

        for (slot, event) in self.midi.iter_mut().zip(&ordered) {
            let [status, data1, data2] = event.bytes();
            *slot = VstMidiEvent {
                event_type: VST_MIDI_TYPE,
                byte_size: size_of::<VstMidiEvent>() as i32,
                delta_frames: event.delta_frames as i32,
                midi_data: [status, data1, data2, 0],
                ..VstMidiEvent::default()
            };
        }
        for (pointer, slot) in self.events.events.iter_mut().zip(self.midi.iter_mut()) {
            *pointer = (slot as *mut VstMidiEvent).cast();
        }
        self.events.num_events = ordered.len() as i32;

        let block = (&mut *self.events as *mut VstEventBlock).cast();
        unsafe { self.dispatch(plugin::PROCESS_EVENTS, 0, 0, block, 0.0) };
        Ok(())
    }
}

impl Drop for Vst2Plugin {
    fn drop(&mut self) {
        unsafe { self.dispatch(plugin::CLOSE, 0, 0, ptr::null_mut(), 0.0) };
    }
}
