use std::path::PathBuf;

use crate::vst2::ffi;

/// Numeric facts a plugin instance publishes about itself at instantiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PluginDescriptor {
    /// Plugin-assigned unique identifier
    pub unique_id: i32,

    /// Plugin version
    pub version: i32,

    /// Number of automatable parameters
    pub num_params: usize,

    /// Number of programs (presets) in the bank
    pub num_programs: usize,

    /// Audio input channels
    pub num_inputs: usize,

    /// Audio output channels
    pub num_outputs: usize,

    /// Raw effect flags
    pub flags: i32,
}

impl PluginDescriptor {
    /// The plugin ships a native editor
    pub fn has_editor(&self) -> bool {
        self.flags & ffi::EFF_FLAGS_HAS_EDITOR != 0
    }

    /// The plugin supports replacing (non-accumulating) processing
    pub fn can_replace(&self) -> bool {
        self.flags & ffi::EFF_FLAGS_CAN_REPLACING != 0
    }

    /// The plugin serializes its state as an opaque chunk
    pub fn program_chunks(&self) -> bool {
        self.flags & ffi::EFF_FLAGS_PROGRAM_CHUNKS != 0
    }

    /// The plugin is an instrument
    pub fn is_synth(&self) -> bool {
        self.flags & ffi::EFF_FLAGS_IS_SYNTH != 0
    }
}

/// Information about a loaded plugin
#[derive(Debug, Clone)]
pub struct PluginInfo {
    /// Effect name reported by the plugin, or the file stem when it reports none
    pub name: String,

    /// Vendor string ("unknown" when the plugin reports none)
    pub vendor: String,

    /// Product string
    pub product: String,

    /// Vendor-specific version number (0 when not reported)
    pub vendor_version: i32,

    /// Path the module was loaded from
    pub path: PathBuf,

    /// Numeric descriptor
    pub descriptor: PluginDescriptor,
}

impl PluginInfo {
    /// Create a new PluginInfo
    pub fn new(
        name: String,
        vendor: String,
        product: String,
        path: PathBuf,
        descriptor: PluginDescriptor,
    ) -> Self {
        Self {
            name,
            vendor,
            product,
            vendor_version: 0,
            path,
            descriptor,
        }
    }
}

impl std::fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} by {} (v{}) [{} params, {} in / {} out{}]",
            self.name,
            self.vendor,
            self.descriptor.version,
            self.descriptor.num_params,
            self.descriptor.num_inputs,
            self.descriptor.num_outputs,
            if self.descriptor.is_synth() { ", synth" } else { "" }
        )
    }
}

/// Information about a plugin parameter
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    /// Parameter index
    pub index: usize,

    /// Parameter name
    pub name: String,

    /// Unit label (e.g., "dB", "Hz", "%")
    pub label: String,

    /// Current value as the plugin displays it
    pub display: String,

    /// Current normalized value (0.0 to 1.0)
    pub value: f32,
}
