//! Capability table: operation names mapped to the plugin's opcodes
//!
//! Built once per instance by asking the plugin's opcode-to-name facility
//! about every value in `0..limit`. The table is owned by the instance's
//! [`PluginHost`](crate::PluginHost), so several instances never share one.

use std::collections::HashMap;

use crate::{Error, PluginHandle, Result};

/// Operations the host looks up by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SetProgram,
    GetProgram,
    GetProgramName,
    GetParamLabel,
    GetParamDisplay,
    GetParamName,
    SetSampleRate,
    SetBlockSize,
    MainsChanged,
    EditGetRect,
    EditOpen,
    EditClose,
    EditIdle,
    GetChunk,
    SetChunk,
    ProcessEvents,
    GetEffectName,
    GetVendorString,
    GetProductString,
    GetVendorVersion,
    CanDo,
    StartProcess,
    StopProcess,
}

impl Capability {
    /// Canonical ABI name the probe records
    pub fn name(self) -> &'static str {
        match self {
            Capability::SetProgram => "effSetProgram",
            Capability::GetProgram => "effGetProgram",
            Capability::GetProgramName => "effGetProgramName",
            Capability::GetParamLabel => "effGetParamLabel",
            Capability::GetParamDisplay => "effGetParamDisplay",
            Capability::GetParamName => "effGetParamName",
            Capability::SetSampleRate => "effSetSampleRate",
            Capability::SetBlockSize => "effSetBlockSize",
            Capability::MainsChanged => "effMainsChanged",
            Capability::EditGetRect => "effEditGetRect",
            Capability::EditOpen => "effEditOpen",
            Capability::EditClose => "effEditClose",
            Capability::EditIdle => "effEditIdle",
            Capability::GetChunk => "effGetChunk",
            Capability::SetChunk => "effSetChunk",
            Capability::ProcessEvents => "effProcessEvents",
            Capability::GetEffectName => "effGetEffectName",
            Capability::GetVendorString => "effGetVendorString",
            Capability::GetProductString => "effGetProductString",
            Capability::GetVendorVersion => "effGetVendorVersion",
            Capability::CanDo => "effCanDo",
            Capability::StartProcess => "effStartProcess",
            Capability::StopProcess => "effStopProcess",
        }
    }
}

/// Immutable name -> opcode mapping for one plugin instance
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    opcodes: HashMap<&'static str, i32>,
}

impl CapabilityTable {
    /// Probe opcodes `0..limit`
    ///
    /// Never fails: values the plugin cannot name are simply absent. When
    /// two values report the same name the lowest wins.
    pub fn probe(plugin: &dyn PluginHandle, limit: i32) -> Self {
        let mut opcodes = HashMap::new();
        for opcode in 0..limit.max(0) {
            if let Some(name) = plugin.opcode_name(opcode) {
                opcodes.entry(name).or_insert(opcode);
            }
        }
        tracing::debug!(probed = limit, mapped = opcodes.len(), "built capability table");
        Self { opcodes }
    }

    /// Opcode recorded for an arbitrary operation name
    pub fn lookup(&self, name: &str) -> Option<i32> {
        self.opcodes.get(name).copied()
    }

    pub fn get(&self, capability: Capability) -> Option<i32> {
        self.lookup(capability.name())
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.get(capability).is_some()
    }

    /// Opcode for a capability an explicitly requested action cannot do without
    pub fn require(&self, capability: Capability, operation: &'static str) -> Result<i32> {
        self.get(capability).ok_or(Error::CapabilityUnsupported {
            operation,
            capability: capability.name(),
        })
    }

    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }

    /// Entries ordered by opcode
    pub fn entries(&self) -> Vec<(&'static str, i32)> {
        let mut entries: Vec<_> = self.opcodes.iter().map(|(&name, &op)| (name, op)).collect();
        entries.sort_by_key(|&(_, op)| op);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlugin;

    #[test]
    fn test_probe_maps_known_opcodes() {
        let (plugin, _probe) = MockPlugin::new();
        let table = CapabilityTable::probe(&plugin, 6000);

        assert_eq!(table.len(), 80);
        assert_eq!(table.get(Capability::EditOpen), Some(14));
        assert_eq!(table.get(Capability::EditClose), Some(15));
        assert_eq!(table.get(Capability::GetChunk), Some(23));
        assert_eq!(table.get(Capability::SetChunk), Some(24));
        assert_eq!(table.lookup("effOpen"), Some(0));
        assert_eq!(table.lookup("PluginOpcode(5000)"), None);
    }

    #[test]
    fn test_probe_limit_bounds_table() {
        let (plugin, _probe) = MockPlugin::new();
        let table = CapabilityTable::probe(&plugin, 13);
        assert_eq!(table.len(), 13);
        assert!(table.supports(Capability::MainsChanged));
        assert!(!table.supports(Capability::EditOpen));

        assert!(CapabilityTable::probe(&plugin, -5).is_empty());
    }

    #[test]
    fn test_missing_capability_is_unsupported_not_fatal() {
        let (plugin, _probe) = MockPlugin::builder().without_opcode("effEditOpen").build();
        let table = CapabilityTable::probe(&plugin, 6000);

        assert_eq!(table.get(Capability::EditOpen), None);
        let err = table.require(Capability::EditOpen, "open editor").unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("effEditOpen"));
        assert!(table.require(Capability::EditClose, "close editor").is_ok());
    }

    #[test]
    fn test_duplicate_names_keep_lowest() {
        let (plugin, _probe) = MockPlugin::builder().alias(300, "effEditOpen").build();
        let table = CapabilityTable::probe(&plugin, 6000);
        assert_eq!(table.get(Capability::EditOpen), Some(14));
    }

    #[test]
    fn test_entries_sorted() {
        let (plugin, _probe) = MockPlugin::new();
        let table = CapabilityTable::probe(&plugin, 6000);
        let entries = table.entries();
        assert_eq!(entries.first(), Some(&("effOpen", 0)));
        assert!(entries.windows(2).all(|w| w[0].1 < w[1].1));
    }
}
