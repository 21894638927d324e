//! In-process plugin double used by the unit tests
//!
//! `MockPlugin` behaves like a small synth: a note-on makes every output
//! channel emit `2 * param[0]` until the matching note-off, its chunk is
//! the parameter values as little-endian f32, and its editor asks the host
//! for a resize when it opens. Everything observable is recorded in a
//! shared [`MockProbe`].

use std::collections::HashSet;
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::callback::HostCallback;
use crate::error::LoadStage;
use crate::vst2::ffi::{self, ERect};
use crate::vst2::opcodes::{host, plugin, plugin_opcode_name};
use crate::vst2::util::write_c_string;
use crate::{Error, MidiEvent, MidiEventKind, PluginDescriptor, PluginHandle, PluginLoader, Result};

pub(crate) const EDITOR_INITIAL: (i16, i16) = (200, 100);
pub(crate) const EDITOR_OPENED: (i16, i16) = (400, 300);

/// Everything the mock observed, shared with the test
#[derive(Default)]
pub(crate) struct MockProbe {
    pub dispatched: Mutex<Vec<i32>>,
    pub sample_rates: Mutex<Vec<f32>>,
    pub block_sizes: Mutex<Vec<isize>>,
    pub processed: Mutex<Vec<usize>>,
    pub midi: Mutex<Vec<MidiEvent>>,
    pub editor_threads: Mutex<HashSet<ThreadId>>,
    pub editor_parent: Mutex<Option<usize>>,
    pub editor_opened: AtomicUsize,
    pub editor_closed: AtomicUsize,
    pub idles: AtomicUsize,
    /// Calls that arrived while another call was still inside the plugin
    pub overlaps: AtomicUsize,
    /// ABI violations: reconfiguring or processing in the wrong power state
    pub violations: AtomicUsize,
    pub closed: AtomicBool,
    in_call: AtomicBool,
}

impl MockProbe {
    pub fn count(&self, opcode: i32) -> usize {
        self.dispatched.lock().iter().filter(|&&op| op == opcode).count()
    }

    pub fn sequence(&self, opcodes: &[i32]) -> Vec<i32> {
        self.dispatched
            .lock()
            .iter()
            .copied()
            .filter(|op| opcodes.contains(op))
            .collect()
    }

    fn enter(&self) -> CallGuard<'_> {
        if self.in_call.swap(true, Ordering::AcqRel) {
            self.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        // Widen the window so overlapping callers are actually caught
        std::thread::yield_now();
        CallGuard(self)
    }
}

struct CallGuard<'a>(&'a MockProbe);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.in_call.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub(crate) struct MockBuilder {
    descriptor: PluginDescriptor,
    hidden: Vec<&'static str>,
    aliases: Vec<(i32, &'static str)>,
}

impl MockBuilder {
    pub fn without_opcode(mut self, name: &'static str) -> Self {
        self.hidden.push(name);
        self
    }

    pub fn alias(mut self, opcode: i32, name: &'static str) -> Self {
        self.aliases.push((opcode, name));
        self
    }

    pub fn flags(mut self, flags: i32) -> Self {
        self.descriptor.flags = flags;
        self
    }

    pub fn channels(mut self, inputs: usize, outputs: usize) -> Self {
        self.descriptor.num_inputs = inputs;
        self.descriptor.num_outputs = outputs;
        self
    }

    pub fn build(self) -> (MockPlugin, Arc<MockProbe>) {
        let probe = Arc::new(MockProbe::default());
        let plugin = MockPlugin {
            params: vec![0.5, 0.25, 0.0, 1.0][..self.descriptor.num_params].to_vec(),
            descriptor: self.descriptor,
            hidden: self.hidden,
            aliases: self.aliases,
            callback: None,
            program: 0,
            powered: false,
            chunk: Vec::new(),
            rect: Box::default(),
            editor_open: false,
            pending: Vec::new(),
            note: None,
            probe: Arc::clone(&probe),
        };
        (plugin, probe)
    }
}

pub(crate) struct MockPlugin {
    descriptor: PluginDescriptor,
    hidden: Vec<&'static str>,
    aliases: Vec<(i32, &'static str)>,
    callback: Option<Arc<HostCallback>>,
    params: Vec<f32>,
    program: isize,
    powered: bool,
    chunk: Vec<u8>,
    rect: Box<ERect>,
    editor_open: bool,
    pending: Vec<MidiEvent>,
    note: Option<u8>,
    probe: Arc<MockProbe>,
}

impl MockPlugin {
    pub fn builder() -> MockBuilder {
        MockBuilder {
            descriptor: PluginDescriptor {
                unique_id: i32::from_be_bytes(*b"Mock"),
                version: 1,
                num_params: 4,
                num_programs: 8,
                num_inputs: 0,
                num_outputs: 2,
                flags: ffi::EFF_FLAGS_HAS_EDITOR
                    | ffi::EFF_FLAGS_CAN_REPLACING
                    | ffi::EFF_FLAGS_PROGRAM_CHUNKS
                    | ffi::EFF_FLAGS_IS_SYNTH,
            },
            hidden: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn new() -> (Self, Arc<MockProbe>) {
        Self::builder().build()
    }

    fn ask_host(&self, opcode: i32, index: i32, value: isize) -> isize {
        match &self.callback {
            Some(cb) => cb.respond(opcode, index, value, std::ptr::null_mut(), 0.0),
            None => 0,
        }
    }

    fn note_editor_thread(&self) {
        self.probe
            .editor_threads
            .lock()
            .insert(std::thread::current().id());
    }
}

impl PluginHandle for MockPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor
    }

    unsafe fn dispatch(
        &mut self,
        opcode: i32,
        index: i32,
        value: isize,
        ptr: *mut c_void,
        opt: f32,
    ) -> isize {
        let _guard = self.probe.enter();
        self.probe.dispatched.lock().push(opcode);

        match opcode {
            plugin::SET_PROGRAM => {
                self.program = value;
                0
            }
            plugin::GET_PROGRAM => self.program,
            plugin::GET_PROGRAM_NAME => {
                write_c_string(ptr.cast(), 24, &format!("Program {}", self.program + 1));
                0
            }
            plugin::GET_PARAM_NAME => {
                write_c_string(ptr.cast(), 8, &format!("Param {}", index));
                0
            }
            plugin::GET_PARAM_LABEL => {
                write_c_string(ptr.cast(), 8, "%");
                0
            }
            plugin::GET_PARAM_DISPLAY => {
                let value = self.params.get(index as usize).copied().unwrap_or(0.0);
                write_c_string(ptr.cast(), 8, &format!("{:.0}", value * 100.0));
                0
            }
            plugin::SET_SAMPLE_RATE => {
                if self.powered {
                    self.probe.violations.fetch_add(1, Ordering::Relaxed);
                }
                self.probe.sample_rates.lock().push(opt);
                0
            }
            plugin::SET_BLOCK_SIZE => {
                if self.powered {
                    self.probe.violations.fetch_add(1, Ordering::Relaxed);
                }
                self.probe.block_sizes.lock().push(value);
                0
            }
            plugin::MAINS_CHANGED => {
                self.powered = value != 0;
                if !self.powered {
                    self.note = None;
                    self.pending.clear();
                }
                0
            }
            plugin::EDIT_GET_RECT => {
                self.note_editor_thread();
                let (w, h) = if self.editor_open { EDITOR_OPENED } else { EDITOR_INITIAL };
                *self.rect = ERect {
                    top: 0,
                    left: 0,
                    bottom: h,
                    right: w,
                };
                *(ptr as *mut *mut ERect) = &mut *self.rect;
                1
            }
            plugin::EDIT_OPEN => {
                self.note_editor_thread();
                self.editor_open = true;
                *self.probe.editor_parent.lock() = Some(ptr as usize);
                self.probe.editor_opened.fetch_add(1, Ordering::Relaxed);
                let (w, h) = EDITOR_OPENED;
                self.ask_host(host::SIZE_WINDOW, i32::from(w), h as isize);
                1
            }
            plugin::EDIT_CLOSE => {
                self.note_editor_thread();
                self.editor_open = false;
                self.probe.editor_closed.fetch_add(1, Ordering::Relaxed);
                0
            }
            plugin::EDIT_IDLE => {
                self.note_editor_thread();
                self.probe.idles.fetch_add(1, Ordering::Relaxed);
                0
            }
            plugin::GET_CHUNK => {
                if self.descriptor.flags & ffi::EFF_FLAGS_PROGRAM_CHUNKS == 0 {
                    return 0;
                }
                self.chunk = self.params.iter().flat_map(|p| p.to_le_bytes()).collect();
                *(ptr as *mut *mut c_void) = self.chunk.as_mut_ptr().cast();
                self.chunk.len() as isize
            }
            plugin::SET_CHUNK => {
                let len = value.max(0) as usize;
                if ptr.is_null() || len % 4 != 0 {
                    return 0;
                }
                let bytes = std::slice::from_raw_parts(ptr as *const u8, len);
                for (param, raw) in self.params.iter_mut().zip(bytes.chunks_exact(4)) {
                    *param = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                }
                1
            }
            plugin::GET_EFFECT_NAME => {
                write_c_string(ptr.cast(), 32, "Mock Synth");
                1
            }
            plugin::GET_VENDOR_STRING => {
                write_c_string(ptr.cast(), 64, "Mock Audio");
                1
            }
            plugin::GET_PRODUCT_STRING => {
                write_c_string(ptr.cast(), 64, "Mock Product");
                1
            }
            plugin::GET_VENDOR_VERSION => 1000,
            plugin::CAN_DO => {
                if ptr.is_null() {
                    return 0;
                }
                match CStr::from_ptr(ptr as *const c_char).to_bytes() {
                    b"receiveVstEvents" | b"receiveVstMidiEvent" => 1,
                    _ => -1,
                }
            }
            _ => 0,
        }
    }

    fn opcode_name(&self, opcode: i32) -> Option<&'static str> {
        if let Some(&(_, name)) = self.aliases.iter().find(|(op, _)| *op == opcode) {
            return Some(name);
        }
        plugin_opcode_name(opcode).filter(|name| !self.hidden.contains(name))
    }

    fn get_parameter(&self, index: usize) -> f32 {
        self.params.get(index).copied().unwrap_or(0.0)
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(param) = self.params.get_mut(index) {
            *param = value;
        }
    }

    fn process(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frames: usize,
    ) -> Result<()> {
        let _guard = self.probe.enter();
        if !self.powered {
            self.probe.violations.fetch_add(1, Ordering::Relaxed);
        }
        if inputs.len() != self.descriptor.num_inputs || outputs.len() != self.descriptor.num_outputs {
            return Err(Error::Process("channel count mismatch".into()));
        }
        self.probe.processed.lock().push(frames);

        let level = self.params.first().copied().unwrap_or(0.0) * 2.0;
        let mut events = std::mem::take(&mut self.pending).into_iter().peekable();
        for frame in 0..frames {
            while let Some(event) = events.next_if(|e| e.delta_frames as usize <= frame) {
                match event.kind {
                    MidiEventKind::NoteOn { note, velocity, .. } if velocity > 0 => {
                        self.note = Some(note)
                    }
                    MidiEventKind::NoteOn { note, .. } | MidiEventKind::NoteOff { note, .. } => {
                        if self.note == Some(note) {
                            self.note = None;
                        }
                    }
                    _ => {}
                }
            }
            let sample = if self.note.is_some() { level } else { 0.0 };
            for channel in outputs.iter_mut() {
                channel[frame] = sample;
            }
        }
        Ok(())
    }

    fn send_midi(&mut self, events: &[MidiEvent]) -> Result<()> {
        let _guard = self.probe.enter();
        self.probe.midi.lock().extend_from_slice(events);
        self.pending.extend_from_slice(events);
        self.pending.sort_by_key(|e| e.delta_frames);
        Ok(())
    }
}

impl Drop for MockPlugin {
    fn drop(&mut self) {
        self.probe.dispatched.lock().push(plugin::CLOSE);
        self.probe.closed.store(true, Ordering::Release);
    }
}

/// Hands out mock instances; path `"missing"` fails like an absent module
pub(crate) struct MockLoader {
    builder: MockBuilder,
    probes: Mutex<Vec<Arc<MockProbe>>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::with(MockPlugin::builder())
    }

    pub fn with(builder: MockBuilder) -> Self {
        Self {
            builder,
            probes: Mutex::new(Vec::new()),
        }
    }

    /// Probe of the most recently loaded instance
    pub fn probe(&self) -> Arc<MockProbe> {
        match self.probes.lock().last() {
            Some(probe) => Arc::clone(probe),
            None => panic!("no instance loaded yet"),
        }
    }
}

impl PluginLoader for MockLoader {
    fn load(&self, path: &Path, callback: Arc<HostCallback>) -> Result<Box<dyn PluginHandle>> {
        if path == Path::new("missing") {
            return Err(Error::Load {
                path: path.to_path_buf(),
                stage: LoadStage::Opening,
                reason: "no such file".into(),
            });
        }
        let (mut plugin, probe) = self.builder.clone().build();
        // Plugins query the host while they are being created
        callback.respond(host::VERSION, 0, 0, std::ptr::null_mut(), 0.0);
        plugin.callback = Some(callback);
        plugin.ask_host(host::WANT_MIDI, 0, 1);
        self.probes.lock().push(probe);
        Ok(Box::new(plugin))
    }
}
