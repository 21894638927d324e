//! Raw VST 2.x ABI declarations
//!
//! Layouts follow the 2.4 SDK headers. Safe wrappers live in loader.rs and
//! plugin.rs.

use std::os::raw::c_void;

/// `'VstP'`, the first field of every valid `AEffect`
pub const VST_MAGIC: i32 = i32::from_be_bytes(*b"VstP");

/// Host version reported for `audioMasterVersion` (VST 2.4)
pub const VST_VERSION: isize = 2400;

pub type HostCallbackProc = extern "C" fn(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize;

pub type DispatcherProc = extern "C" fn(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize;

pub type ProcessProc =
    extern "C" fn(effect: *mut AEffect, inputs: *const *const f32, outputs: *mut *mut f32, frames: i32);

pub type ProcessProcF64 =
    extern "C" fn(effect: *mut AEffect, inputs: *const *const f64, outputs: *mut *mut f64, frames: i32);

pub type SetParameterProc = extern "C" fn(effect: *mut AEffect, index: i32, value: f32);

pub type GetParameterProc = extern "C" fn(effect: *mut AEffect, index: i32) -> f32;

/// Signature of `VSTPluginMain` / `main`
pub type PluginMainProc = unsafe extern "C" fn(callback: HostCallbackProc) -> *mut AEffect;

// Effect flags
pub const EFF_FLAGS_HAS_EDITOR: i32 = 1;
pub const EFF_FLAGS_CAN_REPLACING: i32 = 1 << 4;
pub const EFF_FLAGS_PROGRAM_CHUNKS: i32 = 1 << 5;
pub const EFF_FLAGS_IS_SYNTH: i32 = 1 << 8;
pub const EFF_FLAGS_NO_SOUND_IN_STOP: i32 = 1 << 9;
pub const EFF_FLAGS_CAN_DOUBLE_REPLACING: i32 = 1 << 12;

/// The plugin instance as seen through the ABI
#[repr(C)]
pub struct AEffect {
    pub magic: i32,
    pub dispatcher: DispatcherProc,
    pub _process: Option<ProcessProc>,
    pub set_parameter: SetParameterProc,
    pub get_parameter: GetParameterProc,
    pub num_programs: i32,
    pub num_params: i32,
    pub num_inputs: i32,
    pub num_outputs: i32,
    pub flags: i32,
    pub reserved1: isize,
    pub reserved2: isize,
    pub initial_delay: i32,
    pub _real_qualities: i32,
    pub _off_qualities: i32,
    pub _io_ratio: f32,
    pub object: *mut c_void,
    pub user: *mut c_void,
    pub unique_id: i32,
    pub version: i32,
    pub process_replacing: Option<ProcessProc>,
    pub process_replacing_f64: Option<ProcessProcF64>,
    pub _future: [u8; 56],
}

/// Editor rectangle returned by `effEditGetRect`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ERect {
    pub top: i16,
    pub left: i16,
    pub bottom: i16,
    pub right: i16,
}

impl ERect {
    pub fn width(&self) -> i32 {
        i32::from(self.right) - i32::from(self.left)
    }

    pub fn height(&self) -> i32 {
        i32::from(self.bottom) - i32::from(self.top)
    }
}

pub const VST_MIDI_TYPE: i32 = 1;

/// Generic event header; concrete events share its leading fields
#[repr(C)]
pub struct VstEvent {
    pub event_type: i32,
    pub byte_size: i32,
    pub delta_frames: i32,
    pub flags: i32,
    pub data: [u8; 16],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VstMidiEvent {
    pub event_type: i32,
    pub byte_size: i32,
    pub delta_frames: i32,
    pub flags: i32,
    pub note_length: i32,
    pub note_offset: i32,
    pub midi_data: [u8; 4],
    pub detune: i8,
    pub note_off_velocity: u8,
    pub reserved1: u8,
    pub reserved2: u8,
}

/// Maximum events delivered in one `effProcessEvents` call
pub const MAX_BLOCK_EVENTS: usize = 256;

/// `VstEvents` with room for [`MAX_BLOCK_EVENTS`] pointers.
///
/// The SDK declares a two-element trailing array that hosts over-allocate;
/// the prefix layout is identical.
#[repr(C)]
pub struct VstEventBlock {
    pub num_events: i32,
    pub reserved: isize,
    pub events: [*mut VstEvent; MAX_BLOCK_EVENTS],
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_magic() {
        assert_eq!(VST_MAGIC, 0x5673_7450);
    }

    #[test]
    fn test_event_layouts() {
        assert_eq!(size_of::<VstMidiEvent>(), 32);
        assert_eq!(size_of::<VstEvent>(), 32);
        assert_eq!(size_of::<ERect>(), 8);
    }

    #[test]
    fn test_erect_dimensions() {
        let rect = ERect {
            top: 10,
            left: 20,
            bottom: 310,
            right: 420,
        };
        assert_eq!(rect.width(), 400);
        assert_eq!(rect.height(), 300);
    }
}
