//! Host configuration

use std::time::Duration;

use crate::{Error, Result};

/// Values the host negotiates with the plugin and answers in callbacks
///
/// # Examples
///
/// ```
/// use plughost::HostConfig;
///
/// let config = HostConfig::default()
///     .with_sample_rate(44100.0)
///     .with_block_size(256)
///     .with_can_do("sendVstEvents");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Sample rate negotiated with the plugin
    pub sample_rate: f64,

    /// Maximum frames per process call
    pub block_size: usize,

    /// Channels the host renders
    pub channels: usize,

    /// Answer to `audioMasterGetVendorVersion`
    pub vendor_version: i32,

    /// Offer timing info to the plugin; `audioMasterGetTime` answers 0 when off
    pub provide_timing: bool,

    /// Tempo published in the timing info
    pub tempo: f64,

    /// Time signature published in the timing info
    pub time_signature: (i32, i32),

    /// Host `canDo` strings answered affirmatively; everything else is 0
    pub can_do: Vec<String>,

    /// Opcodes 0..probe_limit are probed when building the capability table
    pub probe_limit: i32,

    /// How long the editor thread waits for requests before pumping the window again
    pub idle_interval: Duration,

    /// Editor window title
    pub window_title: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            block_size: 512,
            channels: 2,
            vendor_version: 10,
            provide_timing: true,
            tempo: 120.0,
            time_signature: (4, 4),
            can_do: Vec::new(),
            probe_limit: 6000,
            idle_interval: Duration::from_millis(10),
            window_title: "Plugin Editor".to_string(),
        }
    }
}

impl HostConfig {
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_tempo(mut self, tempo: f64) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn with_time_signature(mut self, numerator: i32, denominator: i32) -> Self {
        self.time_signature = (numerator, denominator);
        self
    }

    pub fn without_timing(mut self) -> Self {
        self.provide_timing = false;
        self
    }

    /// Whitelist a host `canDo` string
    pub fn with_can_do(mut self, feature: impl Into<String>) -> Self {
        self.can_do.push(feature.into());
        self
    }

    pub fn with_probe_limit(mut self, limit: i32) -> Self {
        self.probe_limit = limit;
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    /// Reject values no plugin can be configured with
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.block_size == 0 || self.block_size > i32::MAX as usize {
            return Err(Error::InvalidSettings(format!(
                "block size out of range: {}",
                self.block_size
            )));
        }
        if self.channels == 0 {
            return Err(Error::InvalidSettings("channel count must be at least 1".into()));
        }
        if self.time_signature.0 <= 0 || self.time_signature.1 <= 0 {
            return Err(Error::InvalidSettings(format!(
                "invalid time signature {}/{}",
                self.time_signature.0, self.time_signature.1
            )));
        }
        if self.probe_limit < 0 {
            return Err(Error::InvalidSettings("probe limit must not be negative".into()));
        }
        Ok(())
    }
}
