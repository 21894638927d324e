//! Plugin lifecycle controller
//!
//! [`PluginHost`] exclusively owns one plugin instance together with its
//! capability table and host callback responder, and drives it through
//!
//! ```text
//! Unloaded --load--> Loaded --start--> Running --suspend--> Suspended --resume--> Running
//! Loaded | Suspended | Running --close--> Closed
//! ```
//!
//! Every operation checks the current state first; an operation attempted
//! from a state that does not allow it fails with [`Error::InvalidState`]
//! and leaves the plugin untouched.

use std::ffi::CString;
use std::os::raw::c_void;
use std::path::Path;
use std::sync::Arc;

use crate::callback::HostCallback;
use crate::capability::{Capability, CapabilityTable};
use crate::vst2::ffi::ERect;
use crate::vst2::util::c_buffer_to_string;
use crate::{
    AudioBlock, Error, HostConfig, MidiEvent, ParameterInfo, PluginDescriptor, PluginHandle,
    PluginInfo, PluginLoader, Result,
};

// Generous upper bounds for the string queries; the ABI limits are smaller
const NAME_BUFFER_LEN: usize = 256;
const PARAM_BUFFER_LEN: usize = 64;

/// Where an instance is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No instance exists yet
    #[default]
    Unloaded,
    /// Instantiated, never started
    Loaded,
    /// Powered down after running; state may be exported
    Suspended,
    /// Powered up and accepting audio and MIDI
    Running,
    /// Instance released; terminal
    Closed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Unloaded => "unloaded",
            LifecycleState::Loaded => "loaded",
            LifecycleState::Suspended => "suspended",
            LifecycleState::Running => "running",
            LifecycleState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Serialized plugin state, passed through unmodified
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BankBlob(Vec<u8>);

impl BankBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for BankBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for BankBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// One hosted plugin instance and everything needed to drive it
///
/// # Thread Safety
///
/// `PluginHost` is `Send` but not `Sync`. Move it onto an editor thread
/// with [`UiCoordinator::spawn`](crate::UiCoordinator::spawn) when another
/// thread needs to reach it while the editor is open.
pub struct PluginHost {
    plugin: Option<Box<dyn PluginHandle>>,
    capabilities: CapabilityTable,
    callback: Arc<HostCallback>,
    info: PluginInfo,
    config: HostConfig,
    state: LifecycleState,
    editor_open: bool,
}

impl PluginHost {
    /// Load and instantiate a plugin
    ///
    /// The host callback responder is created from `config` and registered
    /// before the instance exists. Once the instance is up its opcodes are
    /// probed into the capability table and its identity strings fetched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] if the module cannot be opened or yields no
    /// instance, and [`Error::InvalidSettings`] for an invalid `config`.
    pub fn load(loader: &dyn PluginLoader, path: impl AsRef<Path>, config: HostConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;

        let callback = Arc::new(HostCallback::new(&config));
        let plugin = loader.load(path, Arc::clone(&callback))?;
        let capabilities = CapabilityTable::probe(plugin.as_ref(), config.probe_limit);
        let descriptor = plugin.descriptor();

        let mut host = Self {
            plugin: Some(plugin),
            capabilities,
            callback,
            info: PluginInfo::new(
                String::new(),
                String::new(),
                String::new(),
                path.to_path_buf(),
                descriptor,
            ),
            config,
            state: LifecycleState::Loaded,
            editor_open: false,
        };

        host.info.name = host
            .query_string(Capability::GetEffectName, 0, NAME_BUFFER_LEN)
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        host.info.vendor = host
            .query_string(Capability::GetVendorString, 0, NAME_BUFFER_LEN)
            .unwrap_or_else(|| "unknown".to_string());
        host.info.product = host
            .query_string(Capability::GetProductString, 0, NAME_BUFFER_LEN)
            .unwrap_or_default();
        if let Some(opcode) = host.capabilities.get(Capability::GetVendorVersion) {
            host.info.vendor_version = host.dispatch(opcode, 0, 0, std::ptr::null_mut(), 0.0) as i32;
        }

        tracing::info!(
            name = %host.info.name,
            vendor = %host.info.vendor,
            unique_id = descriptor.unique_id,
            params = descriptor.num_params,
            inputs = descriptor.num_inputs,
            outputs = descriptor.num_outputs,
            capabilities = host.capabilities.len(),
            "loaded plugin"
        );
        Ok(host)
    }

    /// Load a VST 2.x module from disk
    ///
    /// # Example
    ///
    /// ```no_run
    /// use plughost::{HostConfig, PluginHost};
    ///
    /// # fn main() -> plughost::Result<()> {
    /// let mut host = PluginHost::load_vst2("synth.dll", HostConfig::default())?;
    /// host.start()?;
    /// host.suspend()?;
    /// let bank = host.export_state()?;
    /// std::fs::write("synth.fxb", bank.as_bytes())?;
    /// host.close()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_vst2(path: impl AsRef<Path>, config: HostConfig) -> Result<Self> {
        Self::load(&crate::vst2::Vst2Loader, path, config)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    pub fn descriptor(&self) -> PluginDescriptor {
        self.info.descriptor
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The responder the plugin calls back into
    pub fn callback(&self) -> &Arc<HostCallback> {
        &self.callback
    }

    /// Power the plugin up for the first time
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless the plugin is `Loaded`.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state("start", &[LifecycleState::Loaded])?;
        self.power(true);
        self.transition(LifecycleState::Running);
        Ok(())
    }

    /// Power a running plugin down
    pub fn suspend(&mut self) -> Result<()> {
        self.expect_state("suspend", &[LifecycleState::Running])?;
        self.power(false);
        self.transition(LifecycleState::Suspended);
        Ok(())
    }

    /// Power a suspended plugin back up
    pub fn resume(&mut self) -> Result<()> {
        self.expect_state("resume", &[LifecycleState::Suspended])?;
        self.power(true);
        self.transition(LifecycleState::Running);
        Ok(())
    }

    /// Release the instance and unload its module
    ///
    /// A running plugin is suspended and an open editor closed first.
    /// Closing an already closed host does nothing.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Closed => return Ok(()),
            LifecycleState::Unloaded => return Err(Error::invalid_state("close", self.state)),
            LifecycleState::Running => {
                self.power(false);
                self.transition(LifecycleState::Suspended);
            }
            LifecycleState::Loaded | LifecycleState::Suspended => {}
        }
        if self.editor_open {
            self.close_editor()?;
        }
        // Dropping the handle closes the instance before the module goes away
        self.plugin = None;
        self.transition(LifecycleState::Closed);
        tracing::info!(name = %self.info.name, "closed plugin");
        Ok(())
    }

    /// Serialize the whole bank
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the plugin is `Suspended`
    /// - [`Error::CapabilityUnsupported`] without a get-chunk opcode
    /// - [`Error::Export`] when the plugin keeps no chunk or returns no data
    pub fn export_state(&mut self) -> Result<BankBlob> {
        self.expect_state("export state", &[LifecycleState::Suspended])?;
        let opcode = self.capabilities.require(Capability::GetChunk, "export state")?;
        if !self.info.descriptor.program_chunks() {
            return Err(self.export_error("plugin does not store its state as a chunk"));
        }

        let mut data: *mut c_void = std::ptr::null_mut();
        let len = self.dispatch(opcode, 0, 0, (&mut data as *mut *mut c_void).cast(), 0.0);
        if len <= 0 || data.is_null() {
            return Err(self.export_error("plugin returned no data"));
        }

        // Safety: the plugin owns `len` bytes at `data` until its next call
        let bytes = unsafe { std::slice::from_raw_parts(data as *const u8, len as usize) }.to_vec();
        tracing::debug!(bytes = bytes.len(), "exported bank");
        Ok(BankBlob(bytes))
    }

    /// Restore a bank produced by [`export_state`](Self::export_state)
    ///
    /// Allowed right after load or while suspended.
    pub fn import_state(&mut self, bank: &BankBlob) -> Result<()> {
        self.expect_state(
            "import state",
            &[LifecycleState::Loaded, LifecycleState::Suspended],
        )?;
        let opcode = self.capabilities.require(Capability::SetChunk, "import state")?;
        if bank.is_empty() {
            return Err(self.import_error("bank is empty"));
        }
        if !self.info.descriptor.program_chunks() {
            return Err(self.import_error("plugin does not accept chunks"));
        }

        // The plugin may hold on to the pointer for the duration of the call only
        let mut data = bank.as_bytes().to_vec();
        let result = self.dispatch(opcode, 0, data.len() as isize, data.as_mut_ptr().cast(), 0.0);
        tracing::debug!(bytes = data.len(), result, "imported bank");
        Ok(())
    }

    /// Negotiate the sample rate; the plugin must not be running
    pub fn set_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        self.expect_state(
            "set sample rate",
            &[LifecycleState::Loaded, LifecycleState::Suspended],
        )?;
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(Error::InvalidSettings(format!("sample rate {}", sample_rate)));
        }
        if let Some(opcode) = self.capabilities.get(Capability::SetSampleRate) {
            self.dispatch(opcode, 0, 0, std::ptr::null_mut(), sample_rate as f32);
        }
        self.callback.set_sample_rate(sample_rate);
        self.config.sample_rate = sample_rate;
        tracing::debug!(sample_rate, "negotiated sample rate");
        Ok(())
    }

    /// Negotiate the maximum block size; the plugin must not be running
    pub fn set_block_size(&mut self, block_size: usize) -> Result<()> {
        self.expect_state(
            "set block size",
            &[LifecycleState::Loaded, LifecycleState::Suspended],
        )?;
        if block_size == 0 || block_size > i32::MAX as usize {
            return Err(Error::InvalidSettings(format!("block size {}", block_size)));
        }
        if let Some(opcode) = self.capabilities.get(Capability::SetBlockSize) {
            self.dispatch(opcode, 0, block_size as isize, std::ptr::null_mut(), 0.0);
        }
        self.callback.set_block_size(block_size);
        self.config.block_size = block_size;
        tracing::debug!(block_size, "negotiated block size");
        Ok(())
    }

    pub fn parameter_count(&self) -> usize {
        self.info.descriptor.num_params
    }

    /// Name, unit label and display text of one parameter
    ///
    /// Strings the plugin cannot report come back empty.
    pub fn parameter_info(&mut self, index: usize) -> Result<ParameterInfo> {
        let value = self.get_parameter(index)?;
        let slot = index as i32;
        Ok(ParameterInfo {
            index,
            name: self
                .query_string(Capability::GetParamName, slot, PARAM_BUFFER_LEN)
                .unwrap_or_default(),
            label: self
                .query_string(Capability::GetParamLabel, slot, PARAM_BUFFER_LEN)
                .unwrap_or_default(),
            display: self
                .query_string(Capability::GetParamDisplay, slot, PARAM_BUFFER_LEN)
                .unwrap_or_default(),
            value,
        })
    }

    /// Every parameter, in index order
    pub fn parameters(&mut self) -> Result<Vec<ParameterInfo>> {
        (0..self.parameter_count())
            .map(|index| self.parameter_info(index))
            .collect()
    }

    pub fn get_parameter(&self, index: usize) -> Result<f32> {
        self.check_parameter(index)?;
        let plugin = self.plugin_ref("get parameter")?;
        Ok(plugin.get_parameter(index))
    }

    /// Set a normalized parameter value; clamped to 0.0..=1.0
    pub fn set_parameter(&mut self, index: usize, value: f32) -> Result<()> {
        self.check_parameter(index)?;
        let plugin = self.plugin_mut("set parameter")?;
        plugin.set_parameter(index, value.clamp(0.0, 1.0));
        Ok(())
    }

    pub fn program_count(&self) -> usize {
        self.info.descriptor.num_programs
    }

    /// Index of the current program
    pub fn program(&mut self) -> Result<usize> {
        self.plugin_ref("get program")?;
        let opcode = self.capabilities.require(Capability::GetProgram, "get program")?;
        let program = self.dispatch(opcode, 0, 0, std::ptr::null_mut(), 0.0);
        Ok(program.max(0) as usize)
    }

    pub fn set_program(&mut self, program: usize) -> Result<()> {
        self.plugin_ref("set program")?;
        if program >= self.program_count() {
            return Err(Error::InvalidSettings(format!(
                "program {} out of range (plugin has {})",
                program,
                self.program_count()
            )));
        }
        let opcode = self.capabilities.require(Capability::SetProgram, "set program")?;
        self.dispatch(opcode, 0, program as isize, std::ptr::null_mut(), 0.0);
        Ok(())
    }

    /// Name of the current program
    pub fn program_name(&mut self) -> Result<String> {
        self.plugin_ref("get program name")?;
        self.capabilities
            .require(Capability::GetProgramName, "get program name")?;
        Ok(self
            .query_string(Capability::GetProgramName, 0, NAME_BUFFER_LEN)
            .unwrap_or_default())
    }

    /// Ask the plugin whether it supports a feature such as `"receiveVstMidiEvent"`
    pub fn can_do(&mut self, feature: &str) -> Result<bool> {
        self.plugin_ref("query plugin feature")?;
        let opcode = self.capabilities.require(Capability::CanDo, "query plugin feature")?;
        let feature = CString::new(feature)
            .map_err(|_| Error::InvalidSettings("feature name contains NUL".into()))?;
        let answer = self.dispatch(opcode, 0, 0, feature.as_ptr() as *mut c_void, 0.0);
        Ok(answer > 0)
    }

    /// The plugin has an editor and the opcode to attach it
    pub fn supports_editor(&self) -> bool {
        self.editor_opcode().is_ok()
    }

    pub(crate) fn check_editor(&self) -> Result<()> {
        self.editor_opcode().map(|_| ())
    }

    /// Size the editor would like, if the plugin reports one
    pub fn editor_rect(&mut self) -> Option<(u32, u32)> {
        let opcode = self.capabilities.get(Capability::EditGetRect)?;
        self.plugin.as_ref()?;

        let mut rect: *mut ERect = std::ptr::null_mut();
        self.dispatch(opcode, 0, 0, (&mut rect as *mut *mut ERect).cast(), 0.0);
        if rect.is_null() {
            return None;
        }
        // Safety: the plugin returned a pointer to its own rect
        let rect = unsafe { *rect };
        match (u32::try_from(rect.width()), u32::try_from(rect.height())) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    /// Attach the editor to a host window
    ///
    /// `parent` is the native window handle, or null for surfaces without
    /// one. Must be called on the thread that owns that window.
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityUnsupported`] when the plugin has no editor.
    pub fn open_editor(&mut self, parent: *mut c_void) -> Result<()> {
        self.plugin_ref("open editor")?;
        if self.editor_open {
            return Ok(());
        }
        let opcode = self.editor_opcode()?;
        self.dispatch(opcode, 0, 0, parent, 0.0);
        self.editor_open = true;
        tracing::info!(name = %self.info.name, "editor opened");
        Ok(())
    }

    /// Detach the editor; does nothing when it is not open
    pub fn close_editor(&mut self) -> Result<()> {
        if !self.editor_open {
            return Ok(());
        }
        if let Some(opcode) = self.capabilities.get(Capability::EditClose) {
            self.dispatch(opcode, 0, 0, std::ptr::null_mut(), 0.0);
        } else {
            tracing::warn!("plugin has no editor close opcode");
        }
        self.editor_open = false;
        tracing::info!(name = %self.info.name, "editor closed");
        Ok(())
    }

    /// Give an open editor time to redraw
    pub fn editor_idle(&mut self) {
        if !self.editor_open {
            return;
        }
        if let Some(opcode) = self.capabilities.get(Capability::EditIdle) {
            self.dispatch(opcode, 0, 0, std::ptr::null_mut(), 0.0);
        }
    }

    pub fn is_editor_open(&self) -> bool {
        self.editor_open
    }

    /// Run one block through the plugin
    ///
    /// Outputs are zeroed first. The block's channel counts must match the
    /// plugin's.
    pub fn process_block(&mut self, block: &mut AudioBlock) -> Result<()> {
        self.expect_state("process audio", &[LifecycleState::Running])?;
        let descriptor = self.info.descriptor;
        if block.input_channels() != descriptor.num_inputs
            || block.output_channels() != descriptor.num_outputs
        {
            return Err(Error::Process(format!(
                "block has {} in / {} out, plugin expects {} / {}",
                block.input_channels(),
                block.output_channels(),
                descriptor.num_inputs,
                descriptor.num_outputs
            )));
        }

        let frames = block.frames();
        block.clear_outputs();
        let (inputs, mut outputs) = block.split();
        self.plugin_mut("process audio")?
            .process(&inputs, &mut outputs, frames)
    }

    /// Queue MIDI for the next processed block
    pub fn send_midi(&mut self, events: &[MidiEvent]) -> Result<()> {
        self.expect_state("send MIDI", &[LifecycleState::Running])?;
        if events.is_empty() {
            return Ok(());
        }
        self.capabilities.require(Capability::ProcessEvents, "send MIDI")?;
        self.plugin_mut("send MIDI")?.send_midi(events)
    }

    fn expect_state(&self, operation: &'static str, allowed: &[LifecycleState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::invalid_state(operation, self.state))
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        tracing::debug!(from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
    }

    // MainsChanged brackets Start/StopProcess: on, start ... stop, off
    fn power(&mut self, on: bool) {
        let mains = self.capabilities.get(Capability::MainsChanged);
        let (first, second) = if on {
            (mains.map(|op| (op, 1)), self.capabilities.get(Capability::StartProcess).map(|op| (op, 0)))
        } else {
            (self.capabilities.get(Capability::StopProcess).map(|op| (op, 0)), mains.map(|op| (op, 0)))
        };
        for (opcode, value) in [first, second].into_iter().flatten() {
            self.dispatch(opcode, 0, value, std::ptr::null_mut(), 0.0);
        }
    }

    fn editor_opcode(&self) -> Result<i32> {
        let opcode = self.capabilities.require(Capability::EditOpen, "open editor")?;
        if !self.info.descriptor.has_editor() {
            return Err(Error::CapabilityUnsupported {
                operation: "open editor",
                capability: "effFlagsHasEditor",
            });
        }
        Ok(opcode)
    }

    fn check_parameter(&self, index: usize) -> Result<()> {
        if index >= self.parameter_count() {
            return Err(Error::InvalidSettings(format!(
                "parameter {} out of range (plugin has {})",
                index,
                self.parameter_count()
            )));
        }
        Ok(())
    }

    fn plugin_ref(&self, operation: &'static str) -> Result<&dyn PluginHandle> {
        self.plugin
            .as_deref()
            .ok_or_else(|| Error::invalid_state(operation, self.state))
    }

    fn plugin_mut(&mut self, operation: &'static str) -> Result<&mut (dyn PluginHandle + 'static)> {
        let state = self.state;
        self.plugin
            .as_deref_mut()
            .ok_or_else(|| Error::invalid_state(operation, state))
    }

    /// Send an opcode whose pointer argument is null, a buffer of the size the ABI documents, or an out-pointer
    fn dispatch(&mut self, opcode: i32, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize {
        match self.plugin.as_mut() {
            // Safety: every caller in this module passes pointers valid for the opcode
            Some(plugin) => unsafe { plugin.dispatch(opcode, index, value, ptr, opt) },
            None => 0,
        }
    }

    fn query_string(&mut self, capability: Capability, index: i32, capacity: usize) -> Option<String> {
        let opcode = self.capabilities.get(capability)?;
        self.plugin.as_ref()?;
        let mut buffer = vec![0u8; capacity];
        self.dispatch(opcode, index, 0, buffer.as_mut_ptr().cast(), 0.0);
        let text = c_buffer_to_string(&buffer);
        (!text.is_empty()).then_some(text)
    }

    fn export_error(&self, reason: &str) -> Error {
        Error::Export {
            state: self.state,
            reason: reason.to_string(),
        }
    }

    fn import_error(&self, reason: &str) -> Error {
        Error::Import {
            state: self.state,
            reason: reason.to_string(),
        }
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close plugin");
        }
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("name", &self.info.name)
            .field("state", &self.state)
            .field("capabilities", &self.capabilities.len())
            .field("editor_open", &self.editor_open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLoader, MockPlugin, EDITOR_INITIAL};
    use crate::vst2::ffi;
    use crate::vst2::opcodes::plugin;
    use std::sync::atomic::Ordering;

    fn load(loader: &MockLoader) -> PluginHost {
        PluginHost::load(loader, "mock.dll", HostConfig::default()).unwrap()
    }

    #[test]
    fn test_load_gathers_identity() {
        let loader = MockLoader::new();
        let host = load(&loader);
        assert_eq!(host.state(), LifecycleState::Loaded);
        assert_eq!(host.info().name, "Mock Synth");
        assert_eq!(host.info().vendor, "Mock Audio");
        assert_eq!(host.info().product, "Mock Product");
        assert_eq!(host.info().vendor_version, 1000);
        assert_eq!(host.parameter_count(), 4);
        assert!(!host.capabilities().is_empty());
    }

    #[test]
    fn test_load_falls_back_to_file_stem() {
        let loader = MockLoader::with(
            MockPlugin::builder()
                .without_opcode("effGetEffectName")
                .without_opcode("effGetVendorString"),
        );
        let host = PluginHost::load(&loader, "/plugins/Bright Pad.dll", HostConfig::default()).unwrap();
        assert_eq!(host.info().name, "Bright Pad");
        assert_eq!(host.info().vendor, "unknown");
    }

    #[test]
    fn test_load_failure() {
        let loader = MockLoader::new();
        let err = PluginHost::load(&loader, "missing", HostConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }

    #[test]
    fn test_load_rejects_bad_config() {
        let loader = MockLoader::new();
        let config = HostConfig::default().with_block_size(0);
        assert!(matches!(
            PluginHost::load(&loader, "mock.dll", config),
            Err(Error::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        let probe = loader.probe();

        host.start().unwrap();
        assert_eq!(host.state(), LifecycleState::Running);
        host.suspend().unwrap();
        assert_eq!(host.state(), LifecycleState::Suspended);
        host.resume().unwrap();
        assert_eq!(host.state(), LifecycleState::Running);
        host.close().unwrap();
        assert_eq!(host.state(), LifecycleState::Closed);

        let power = [plugin::MAINS_CHANGED, plugin::START_PROCESS, plugin::STOP_PROCESS];
        assert_eq!(
            probe.sequence(&power),
            vec![
                plugin::MAINS_CHANGED,
                plugin::START_PROCESS,
                plugin::STOP_PROCESS,
                plugin::MAINS_CHANGED,
                plugin::MAINS_CHANGED,
                plugin::START_PROCESS,
                plugin::STOP_PROCESS,
                plugin::MAINS_CHANGED,
            ]
        );
        assert!(probe.closed.load(Ordering::Acquire));
    }

    #[test]
    fn test_start_twice_is_invalid_state() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        host.start().unwrap();
        let err = host.start().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                operation: "start",
                state: LifecycleState::Running
            }
        ));
        assert_eq!(host.state(), LifecycleState::Running);
        assert_eq!(loader.probe().count(plugin::START_PROCESS), 1);
    }

    #[test]
    fn test_invalid_transitions() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        assert!(host.suspend().is_err());
        assert!(host.resume().is_err());
        host.start().unwrap();
        assert!(host.resume().is_err());
        host.suspend().unwrap();
        assert!(host.suspend().is_err());
        assert!(host.start().is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        host.start().unwrap();
        host.close().unwrap();
        host.close().unwrap();
        assert_eq!(loader.probe().count(plugin::CLOSE), 1);

        let err = host.start().unwrap_err();
        assert!(err.to_string().contains("closed"));
        assert!(host.get_parameter(0).is_err());
        assert!(host.export_state().is_err());
    }

    #[test]
    fn test_drop_closes_running_plugin() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        host.start().unwrap();
        drop(host);
        let probe = loader.probe();
        assert!(probe.closed.load(Ordering::Acquire));
        assert_eq!(probe.count(plugin::STOP_PROCESS), 1);
    }

    #[test]
    fn test_export_while_running_is_invalid_state() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        host.start().unwrap();
        let err = host.export_state().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: LifecycleState::Running,
                ..
            }
        ));
        let msg = err.to_string();
        assert!(msg.contains("export state"));
        assert!(msg.contains("running"));
    }

    #[test]
    fn test_bank_round_trip_into_second_instance() {
        let loader = MockLoader::new();
        let mut first = load(&loader);
        first.set_parameter(0, 0.8).unwrap();
        first.set_parameter(2, 0.125).unwrap();
        first.start().unwrap();
        first.suspend().unwrap();
        let bank = first.export_state().unwrap();
        assert_eq!(bank.len(), 16);

        let mut second = load(&loader);
        assert_eq!(second.get_parameter(0).unwrap(), 0.5);
        second.import_state(&bank).unwrap();
        for index in 0..first.parameter_count() {
            assert_eq!(
                second.get_parameter(index).unwrap(),
                first.get_parameter(index).unwrap()
            );
        }
    }

    #[test]
    fn test_import_rules() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        let bank = BankBlob::from(vec![0u8; 16]);

        let err = host.import_state(&BankBlob::default()).unwrap_err();
        assert!(matches!(err, Error::Import { .. }));

        host.start().unwrap();
        assert!(matches!(
            host.import_state(&bank),
            Err(Error::InvalidState { .. })
        ));
        host.suspend().unwrap();
        host.import_state(&bank).unwrap();
        assert_eq!(host.get_parameter(0).unwrap(), 0.0);
    }

    #[test]
    fn test_export_without_chunks() {
        let loader = MockLoader::with(MockPlugin::builder().flags(ffi::EFF_FLAGS_IS_SYNTH));
        let mut host = load(&loader);
        host.start().unwrap();
        host.suspend().unwrap();
        let err = host.export_state().unwrap_err();
        assert!(matches!(
            err,
            Error::Export {
                state: LifecycleState::Suspended,
                ..
            }
        ));
    }

    #[test]
    fn test_export_without_capability() {
        let loader = MockLoader::with(MockPlugin::builder().without_opcode("effGetChunk"));
        let mut host = load(&loader);
        host.start().unwrap();
        host.suspend().unwrap();
        assert!(host.export_state().unwrap_err().is_unsupported());
    }

    #[test]
    fn test_negotiation_only_while_powered_down() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        host.set_sample_rate(44100.0).unwrap();
        host.set_block_size(256).unwrap();
        assert_eq!(host.callback().sample_rate(), 44100.0);
        assert_eq!(host.callback().block_size(), 256);

        host.start().unwrap();
        assert!(host.set_sample_rate(96000.0).is_err());
        assert!(host.set_block_size(64).is_err());
        assert!(host.set_sample_rate(-1.0).is_err());

        let probe = loader.probe();
        assert_eq!(*probe.sample_rates.lock(), vec![44100.0]);
        assert_eq!(*probe.block_sizes.lock(), vec![256]);
        assert_eq!(probe.violations.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_parameters() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        host.set_parameter(1, 1.7).unwrap();
        assert_eq!(host.get_parameter(1).unwrap(), 1.0);

        let info = host.parameter_info(0).unwrap();
        assert_eq!(info.name, "Param 0");
        assert_eq!(info.label, "%");
        assert_eq!(info.display, "50");
        assert_eq!(info.value, 0.5);

        assert_eq!(host.parameters().unwrap().len(), 4);
        assert!(host.get_parameter(4).is_err());
        assert!(host.set_parameter(9, 0.0).is_err());
    }

    #[test]
    fn test_programs_and_can_do() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        host.set_program(3).unwrap();
        assert_eq!(host.program().unwrap(), 3);
        assert_eq!(host.program_name().unwrap(), "Program 4");
        assert!(host.set_program(8).is_err());

        assert!(host.can_do("receiveVstMidiEvent").unwrap());
        assert!(!host.can_do("offline").unwrap());
    }

    #[test]
    fn test_editor_calls() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        let (w, h) = EDITOR_INITIAL;
        assert_eq!(host.editor_rect(), Some((w as u32, h as u32)));

        host.editor_idle();
        assert_eq!(loader.probe().idles.load(Ordering::Relaxed), 0);

        host.open_editor(std::ptr::null_mut()).unwrap();
        assert!(host.is_editor_open());
        assert_eq!(host.callback().take_resize_request(), Some((400, 300)));
        host.editor_idle();
        host.close_editor().unwrap();
        assert!(!host.is_editor_open());

        let probe = loader.probe();
        assert_eq!(probe.editor_opened.load(Ordering::Relaxed), 1);
        assert_eq!(probe.editor_closed.load(Ordering::Relaxed), 1);
        assert_eq!(probe.idles.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_editor_unsupported() {
        let loader = MockLoader::with(MockPlugin::builder().without_opcode("effEditOpen"));
        let mut host = load(&loader);
        assert!(!host.supports_editor());
        assert!(host.open_editor(std::ptr::null_mut()).unwrap_err().is_unsupported());

        let loader = MockLoader::with(MockPlugin::builder().flags(ffi::EFF_FLAGS_PROGRAM_CHUNKS));
        let host = load(&loader);
        assert!(!host.supports_editor());
    }

    #[test]
    fn test_close_detaches_editor() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        host.start().unwrap();
        host.open_editor(std::ptr::null_mut()).unwrap();
        host.close().unwrap();
        let probe = loader.probe();
        assert_eq!(probe.editor_closed.load(Ordering::Relaxed), 1);
        assert_eq!(
            probe.sequence(&[plugin::STOP_PROCESS, plugin::EDIT_CLOSE, plugin::CLOSE]),
            vec![plugin::STOP_PROCESS, plugin::EDIT_CLOSE, plugin::CLOSE]
        );
    }

    #[test]
    fn test_audio_requires_running() {
        let loader = MockLoader::new();
        let mut host = load(&loader);
        let mut block = AudioBlock::new(0, 2, 64);
        assert!(host.process_block(&mut block).is_err());
        assert!(host.send_midi(&[MidiEvent::note_on(60, 100, 0, 0)]).is_err());

        host.start().unwrap();
        host.send_midi(&[MidiEvent::note_on(60, 100, 0, 0)]).unwrap();
        host.process_block(&mut block).unwrap();
        assert!(block.output(0).iter().all(|&s| s == 1.0));

        let mut wrong = AudioBlock::new(2, 2, 64);
        assert!(matches!(host.process_block(&mut wrong), Err(Error::Process(_))));
    }

    #[test]
    fn test_instances_keep_separate_tables() {
        let plain = MockLoader::new();
        let headless = MockLoader::with(MockPlugin::builder().without_opcode("effEditOpen"));
        let a = load(&plain);
        let b = load(&headless);
        assert!(a.supports_editor());
        assert!(!b.supports_editor());
        assert_eq!(a.capabilities().len(), b.capabilities().len() + 1);
    }
}
