//! Host callback responder
//!
//! Plugins call back into the host at any time and from whichever thread
//! is currently driving them. [`HostCallback::respond`] answers every
//! opcode with a value: the calling convention has no error channel, so
//! anything unrecognized gets a neutral 0. The responder never blocks and
//! never calls into the plugin; all state it reads is atomics or a
//! lock-free published snapshot.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::collections::VecDeque;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::config::HostConfig;
use crate::vst2::ffi::VST_VERSION;
use crate::vst2::opcodes::{host, host_opcode_name};

/// Transport and tempo snapshot handed to the plugin (`VstTimeInfo` layout)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingInfo {
    pub sample_pos: f64,
    pub sample_rate: f64,
    pub nano_seconds: f64,
    /// Musical position in quarter notes
    pub ppq_pos: f64,
    pub tempo: f64,
    pub bar_start_pos: f64,
    pub cycle_start_pos: f64,
    pub cycle_end_pos: f64,
    pub time_sig_numerator: i32,
    pub time_sig_denominator: i32,
    pub smpte_offset: i32,
    pub smpte_frame_rate: i32,
    pub samples_to_next_clock: i32,
    /// Which fields are valid
    pub flags: i32,
}

impl TimingInfo {
    pub const TRANSPORT_CHANGED: i32 = 1;
    pub const TRANSPORT_PLAYING: i32 = 1 << 1;
    pub const PPQ_POS_VALID: i32 = 1 << 9;
    pub const TEMPO_VALID: i32 = 1 << 10;
    pub const BARS_VALID: i32 = 1 << 11;
    pub const TIME_SIG_VALID: i32 = 1 << 13;

    /// Stopped transport at position zero with tempo and time signature valid
    pub fn new(sample_rate: f64, tempo: f64, numerator: i32, denominator: i32) -> Self {
        Self {
            sample_pos: 0.0,
            sample_rate,
            nano_seconds: 0.0,
            ppq_pos: 0.0,
            tempo,
            bar_start_pos: 0.0,
            cycle_start_pos: 0.0,
            cycle_end_pos: 0.0,
            time_sig_numerator: numerator,
            time_sig_denominator: denominator,
            smpte_offset: 0,
            smpte_frame_rate: 0,
            samples_to_next_clock: 0,
            flags: Self::TEMPO_VALID | Self::PPQ_POS_VALID | Self::TIME_SIG_VALID,
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        let (numerator, denominator) = config.time_signature;
        Self::new(config.sample_rate, config.tempo, numerator, denominator)
    }

    pub fn is_valid(&self, flag: i32) -> bool {
        self.flags & flag != 0
    }
}

/// Answer to `audioMasterGetCurrentProcessLevel`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessLevel {
    Unknown = 0,
    User = 1,
    Realtime = 2,
    Prefetch = 3,
    Offline = 4,
}

/// Read-only context the plugin queries through the host callback
pub struct HostCallback {
    sample_rate: AtomicU64,
    block_size: AtomicUsize,
    process_level: AtomicI32,
    vendor_version: isize,
    can_do: Vec<String>,
    timing: Option<ArcSwap<TimingInfo>>,
    // Snapshots replaced while the plugin may still hold a pointer to them
    retired: Mutex<VecDeque<Arc<TimingInfo>>>,
    // width << 32 | height, 0 = nothing pending
    resize_request: AtomicU64,
}

/// Replaced timing snapshots kept alive after a publish
pub const RETIRED_TIMING_LIMIT: usize = 64;

impl HostCallback {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            sample_rate: AtomicU64::new(config.sample_rate.to_bits()),
            block_size: AtomicUsize::new(config.block_size),
            process_level: AtomicI32::new(ProcessLevel::Unknown as i32),
            vendor_version: config.vendor_version as isize,
            can_do: config.can_do.clone(),
            timing: config
                .provide_timing
                .then(|| ArcSwap::from_pointee(TimingInfo::from_config(config))),
            retired: Mutex::new(VecDeque::with_capacity(RETIRED_TIMING_LIMIT)),
            resize_request: AtomicU64::new(0),
        }
    }

    /// Answer one plugin query
    ///
    /// `index`, `value`, `ptr` and `opt` carry the opcode-specific
    /// arguments of the ABI. `ptr` is only dereferenced for
    /// `audioMasterCanDo`, where it must be null or a NUL-terminated string.
    pub fn respond(&self, opcode: i32, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize {
        tracing::trace!(
            opcode,
            name = host_opcode_name(opcode),
            index,
            value,
            opt,
            "host callback"
        );

        match opcode {
            host::VERSION => VST_VERSION,
            host::GET_VENDOR_VERSION => self.vendor_version,
            host::GET_SAMPLE_RATE => self.sample_rate() as isize,
            host::GET_BLOCK_SIZE => self.block_size() as isize,
            host::GET_CURRENT_PROCESS_LEVEL => self.process_level.load(Ordering::Acquire) as isize,
            host::GET_TIME => self.timing_ptr(),
            host::WANT_MIDI => 1,
            host::NEED_IDLE => 1,
            host::CAN_DO => self.answer_can_do(ptr),
            host::SIZE_WINDOW => self.record_resize(index, value),
            host::GET_VENDOR_STRING | host::GET_PRODUCT_STRING => 0,
            host::IDLE => 0,
            _ => 0,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate.load(Ordering::Acquire))
    }

    pub fn block_size(&self) -> usize {
        self.block_size.load(Ordering::Acquire)
    }

    pub fn process_level(&self) -> ProcessLevel {
        match self.process_level.load(Ordering::Acquire) {
            1 => ProcessLevel::User,
            2 => ProcessLevel::Realtime,
            3 => ProcessLevel::Prefetch,
            4 => ProcessLevel::Offline,
            _ => ProcessLevel::Unknown,
        }
    }

    pub(crate) fn set_sample_rate(&self, sample_rate: f64) {
        let previous = self.sample_rate.swap(sample_rate.to_bits(), Ordering::AcqRel);
        if f64::from_bits(previous) != sample_rate {
            if let Some(current) = self.timing() {
                self.publish_timing(TimingInfo {
                    sample_rate,
                    ..*current
                });
            }
        }
    }

    pub(crate) fn set_block_size(&self, block_size: usize) {
        self.block_size.store(block_size, Ordering::Release);
    }

    pub(crate) fn set_process_level(&self, level: ProcessLevel) {
        self.process_level.store(level as i32, Ordering::Release);
    }

    /// Current timing snapshot, `None` when timing is not offered
    pub fn timing(&self) -> Option<Arc<TimingInfo>> {
        self.timing.as_ref().map(|timing| timing.load_full())
    }

    /// Replace the timing snapshot (no-op when timing is not offered)
    ///
    /// A pointer previously handed to the plugin stays valid for the next
    /// [`RETIRED_TIMING_LIMIT`] publishes. Plugins ask for timing again on
    /// every block, so per-block position updates are fine as long as the
    /// plugin is not holding a pointer across that many blocks.
    pub fn publish_timing(&self, info: TimingInfo) {
        if let Some(timing) = &self.timing {
            let old = timing.swap(Arc::new(info));
            let mut retired = self.retired.lock();
            if retired.len() == RETIRED_TIMING_LIMIT {
                retired.pop_front();
            }
            retired.push_back(old);
        }
    }

    /// Editor size the plugin asked for since the last call
    pub fn take_resize_request(&self) -> Option<(u32, u32)> {
        match self.resize_request.swap(0, Ordering::AcqRel) {
            0 => None,
            packed => Some(((packed >> 32) as u32, packed as u32)),
        }
    }

    fn timing_ptr(&self) -> isize {
        match &self.timing {
            Some(timing) => {
                let current = timing.load();
                Arc::as_ptr(&*current) as isize
            }
            None => 0,
        }
    }

    fn answer_can_do(&self, ptr: *mut c_void) -> isize {
        if ptr.is_null() {
            return 0;
        }
        // Safety: the ABI passes a NUL-terminated string for audioMasterCanDo
        let feature = unsafe { CStr::from_ptr(ptr as *const c_char) }.to_bytes();
        let supported = self.can_do.iter().any(|s| s.as_bytes() == feature);
        isize::from(supported)
    }

    fn record_resize(&self, width: i32, height: isize) -> isize {
        let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
            return 0;
        };
        if width == 0 || height == 0 {
            return 0;
        }
        self.resize_request
            .store(u64::from(width) << 32 | u64::from(height), Ordering::Release);
        1
    }
}

impl std::fmt::Debug for HostCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCallback")
            .field("sample_rate", &self.sample_rate())
            .field("block_size", &self.block_size())
            .field("process_level", &self.process_level())
            .field("timing", &self.timing.is_some())
            .finish()
    }
}
