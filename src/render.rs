//! Offline audio rendering
//!
//! [`render`] negotiates rate and block size, powers the plugin up, feeds
//! an optional trigger note with the first block, then pulls fixed-size
//! blocks until the requested frame count is reached. Each output sample
//! is hard-clipped to [-1, 1], scaled to the target bit depth and
//! truncated toward zero (no dither) before it is handed to the sink
//! interleaved by channel.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::callback::ProcessLevel;
use crate::host::{LifecycleState, PluginHost};
use crate::{AudioBlock, Error, MidiEvent, Result, SampleSink, StreamFormat};

/// Upper bound on `block_size * channels` for one interleaved block
pub const MAX_BLOCK_SAMPLES: usize = 1 << 24;

/// Fixed-point sample encoding of the rendered stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    #[default]
    Int16,
    Int24,
    Int32,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Int32 => 32,
        }
    }

    /// Largest positive sample value
    pub fn full_scale(self) -> i32 {
        match self {
            BitDepth::Int16 => i16::MAX as i32,
            BitDepth::Int24 => (1 << 23) - 1,
            BitDepth::Int32 => i32::MAX,
        }
    }

    /// Clip, scale and truncate one sample
    ///
    /// ```
    /// use plughost::render::BitDepth;
    ///
    /// assert_eq!(BitDepth::Int16.to_fixed(1.0), 32767);
    /// assert_eq!(BitDepth::Int16.to_fixed(-4.0), -32767);
    /// assert_eq!(BitDepth::Int16.to_fixed(0.5), 16383);
    /// ```
    pub fn to_fixed(self, sample: f32) -> i32 {
        // f64 keeps the 32-bit scale exact; NaN casts to 0
        (f64::from(sample.clamp(-1.0, 1.0)) * f64::from(self.full_scale())) as i32
    }
}

/// What to render and how to encode it
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub sample_rate: u32,

    /// Channels written to the sink
    pub channels: usize,

    /// Frames per process call; the last block may be shorter
    pub block_size: usize,

    /// Total frames per channel
    pub frames: u64,

    pub bit_depth: BitDepth,

    /// Delivered with the first block
    pub trigger: Option<MidiEvent>,
}

impl RenderSettings {
    /// Stereo, 512-frame blocks, 16-bit, no trigger
    pub fn new(sample_rate: u32, frames: u64) -> Self {
        Self {
            sample_rate,
            channels: 2,
            block_size: 512,
            frames,
            bit_depth: BitDepth::Int16,
            trigger: None,
        }
    }

    /// `ceil(seconds * sample_rate)` frames
    pub fn from_duration(seconds: f64, sample_rate: u32) -> Self {
        let frames = (seconds.max(0.0) * f64::from(sample_rate)).ceil() as u64;
        Self::new(sample_rate, frames)
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_bit_depth(mut self, bit_depth: BitDepth) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn with_trigger(mut self, event: MidiEvent) -> Self {
        self.trigger = Some(event);
        self
    }

    /// Note-on on channel 0 at the first frame
    pub fn with_note(self, note: u8, velocity: u8) -> Self {
        self.with_trigger(MidiEvent::note_on(note, velocity, 0, 0))
    }

    pub fn block_count(&self) -> u64 {
        match self.block_size {
            0 => 0,
            size => self.frames.div_ceil(size as u64),
        }
    }

    /// Length of the final block (`block_size` when the total divides evenly)
    pub fn last_block_frames(&self) -> usize {
        match (self.frames, self.block_size) {
            (0, _) | (_, 0) => 0,
            (frames, size) => ((frames - 1) % size as u64) as usize + 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidSettings("sample rate must be positive".into()));
        }
        if self.channels == 0 || self.channels > usize::from(u16::MAX) {
            return Err(Error::InvalidSettings(format!(
                "channel count out of range: {}",
                self.channels
            )));
        }
        if self.block_size == 0 || self.block_size > i32::MAX as usize {
            return Err(Error::InvalidSettings(format!(
                "block size out of range: {}",
                self.block_size
            )));
        }
        if self.block_size.saturating_mul(self.channels) > MAX_BLOCK_SAMPLES {
            return Err(Error::InvalidSettings(format!(
                "block of {} frames x {} channels exceeds {} samples",
                self.block_size, self.channels, MAX_BLOCK_SAMPLES
            )));
        }
        if let Some(trigger) = self.trigger {
            let first_block = self.frames.min(self.block_size as u64);
            if trigger.delta_frames as u64 >= first_block {
                return Err(Error::InvalidSettings(format!(
                    "trigger at frame {} is outside the first block of {} frames",
                    trigger.delta_frames, first_block
                )));
            }
        }
        Ok(())
    }
}

/// Summary of a finished render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Frames per channel written to the sink
    pub frames: u64,
    pub blocks: u64,
    pub last_block_frames: usize,
    /// Samples outside [-1, 1] before conversion
    pub clipped_samples: u64,
    /// Stopped early at a block boundary
    pub cancelled: bool,
}

/// Render `settings.frames` frames through the plugin into `sink`
///
/// The plugin may be `Loaded`, `Suspended` or `Running`. It is left
/// suspended afterwards, except that a plugin that was running is resumed.
///
/// # Example
///
/// ```no_run
/// use plughost::render::{render, RenderSettings};
/// use plughost::{HostConfig, MemorySink, PluginHost};
///
/// # fn main() -> plughost::Result<()> {
/// let mut host = PluginHost::load_vst2("synth.dll", HostConfig::default())?;
/// let settings = RenderSettings::from_duration(1.0, 48000).with_note(60, 100);
/// let mut sink = MemorySink::new();
/// let report = render(&mut host, &settings, &mut sink)?;
/// assert_eq!(report.frames, 48000);
/// # Ok(())
/// # }
/// ```
pub fn render<S: SampleSink>(
    host: &mut PluginHost,
    settings: &RenderSettings,
    sink: S,
) -> Result<RenderReport> {
    render_with_cancel(host, settings, sink, &AtomicBool::new(false))
}

/// [`render`], stopping at the next block boundary once `cancel` is set
pub fn render_with_cancel<S: SampleSink>(
    host: &mut PluginHost,
    settings: &RenderSettings,
    mut sink: S,
    cancel: &AtomicBool,
) -> Result<RenderReport> {
    settings.validate()?;
    let was_running = match host.state() {
        LifecycleState::Running => {
            host.suspend()?;
            true
        }
        LifecycleState::Loaded | LifecycleState::Suspended => false,
        state => return Err(Error::invalid_state("render", state)),
    };

    host.set_sample_rate(f64::from(settings.sample_rate))?;
    host.set_block_size(settings.block_size)?;
    match host.state() {
        LifecycleState::Loaded => host.start()?,
        _ => host.resume()?,
    }
    host.callback().set_process_level(ProcessLevel::Offline);

    let outcome = render_blocks(host, settings, &mut sink, cancel);

    host.callback().set_process_level(ProcessLevel::Unknown);
    let suspended = host.suspend();
    let outcome = outcome.and_then(|report| {
        sink.finish()?;
        Ok(report)
    });
    let restored = if was_running { host.resume() } else { Ok(()) };

    let report = outcome?;
    suspended?;
    restored?;
    tracing::info!(
        frames = report.frames,
        blocks = report.blocks,
        clipped = report.clipped_samples,
        cancelled = report.cancelled,
        "render finished"
    );
    Ok(report)
}

fn render_blocks<S: SampleSink>(
    host: &mut PluginHost,
    settings: &RenderSettings,
    sink: &mut S,
    cancel: &AtomicBool,
) -> Result<RenderReport> {
    sink.begin(StreamFormat {
        sample_rate: settings.sample_rate,
        channels: settings.channels as u16,
        bits_per_sample: settings.bit_depth.bits(),
    })?;

    let descriptor = host.descriptor();
    let depth = settings.bit_depth;
    let mut report = RenderReport::default();
    let mut trigger = settings.trigger;
    let mut samples = Vec::with_capacity(settings.block_size * settings.channels);
    let mut remaining = settings.frames;

    tracing::debug!(
        frames = settings.frames,
        block_size = settings.block_size,
        sample_rate = settings.sample_rate,
        "render started"
    );

    while remaining > 0 {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!(rendered = report.frames, "render cancelled");
            report.cancelled = true;
            break;
        }
        let frames = remaining.min(settings.block_size as u64) as usize;

        if let Some(event) = trigger.take() {
            host.send_midi(&[event])?;
        }

        let mut block = AudioBlock::new(descriptor.num_inputs, descriptor.num_outputs, frames);
        host.process_block(&mut block)?;

        samples.clear();
        let clipped = &mut report.clipped_samples;
        block.interleave_into(settings.channels, &mut samples, |sample| {
            if sample.abs() > 1.0 {
                *clipped += 1;
            }
            depth.to_fixed(sample)
        });
        sink.write(&samples)?;

        report.frames += frames as u64;
        report.blocks += 1;
        report.last_block_frames = frames;
        remaining -= frames as u64;
    }
    Ok(report)
}
