//! VST 2.x opcode enumerations
//!
//! Plugin opcodes (`eff*`) are sent by the host through the effect's
//! dispatcher. Host opcodes (`audioMaster*`) arrive through the host
//! callback. The plugin table doubles as the numeric-opcode-to-name
//! facility that the capability table probes.

/// Canonical names of the plugin dispatcher opcodes, indexed by opcode value
const PLUGIN_OPCODE_NAMES: [&str; 80] = [
    "effOpen",
    "effClose",
    "effSetProgram",
    "effGetProgram",
    "effSetProgramName",
    "effGetProgramName",
    "effGetParamLabel",
    "effGetParamDisplay",
    "effGetParamName",
    "effGetVu",
    "effSetSampleRate",
    "effSetBlockSize",
    "effMainsChanged",
    "effEditGetRect",
    "effEditOpen",
    "effEditClose",
    "effEditDraw",
    "effEditMouse",
    "effEditKey",
    "effEditIdle",
    "effEditTop",
    "effEditSleep",
    "effIdentify",
    "effGetChunk",
    "effSetChunk",
    "effProcessEvents",
    "effCanBeAutomated",
    "effString2Parameter",
    "effGetNumProgramCategories",
    "effGetProgramNameIndexed",
    "effCopyProgram",
    "effConnectInput",
    "effConnectOutput",
    "effGetInputProperties",
    "effGetOutputProperties",
    "effGetPlugCategory",
    "effGetCurrentPosition",
    "effGetDestinationBuffer",
    "effOfflineNotify",
    "effOfflinePrepare",
    "effOfflineRun",
    "effProcessVarIo",
    "effSetSpeakerArrangement",
    "effSetBlockSizeAndSampleRate",
    "effSetBypass",
    "effGetEffectName",
    "effGetErrorText",
    "effGetVendorString",
    "effGetProductString",
    "effGetVendorVersion",
    "effVendorSpecific",
    "effCanDo",
    "effGetTailSize",
    "effIdle",
    "effGetIcon",
    "effSetViewPosition",
    "effGetParameterProperties",
    "effKeysRequired",
    "effGetVstVersion",
    "effEditKeyDown",
    "effEditKeyUp",
    "effSetEditKnobMode",
    "effGetMidiProgramName",
    "effGetCurrentMidiProgram",
    "effGetMidiProgramCategory",
    "effHasMidiProgramsChanged",
    "effGetMidiKeyName",
    "effBeginSetProgram",
    "effEndSetProgram",
    "effGetSpeakerArrangement",
    "effShellGetNextPlugin",
    "effStartProcess",
    "effStopProcess",
    "effSetTotalSampleToProcess",
    "effSetPanLaw",
    "effBeginLoadBank",
    "effBeginLoadProgram",
    "effSetProcessPrecision",
    "effGetNumMidiInputChannels",
    "effGetNumMidiOutputChannels",
];

/// Name of a plugin dispatcher opcode, `None` outside the enumeration
pub fn plugin_opcode_name(opcode: i32) -> Option<&'static str> {
    usize::try_from(opcode)
        .ok()
        .and_then(|i| PLUGIN_OPCODE_NAMES.get(i))
        .copied()
}

/// Plugin dispatcher opcode values used directly by the VST2 wrapper
pub mod plugin {
    pub const OPEN: i32 = 0;
    pub const CLOSE: i32 = 1;
    pub const SET_PROGRAM: i32 = 2;
    pub const GET_PROGRAM: i32 = 3;
    pub const GET_PROGRAM_NAME: i32 = 5;
    pub const GET_PARAM_LABEL: i32 = 6;
    pub const GET_PARAM_DISPLAY: i32 = 7;
    pub const GET_PARAM_NAME: i32 = 8;
    pub const SET_SAMPLE_RATE: i32 = 10;
    pub const SET_BLOCK_SIZE: i32 = 11;
    pub const MAINS_CHANGED: i32 = 12;
    pub const EDIT_GET_RECT: i32 = 13;
    pub const EDIT_OPEN: i32 = 14;
    pub const EDIT_CLOSE: i32 = 15;
    pub const EDIT_IDLE: i32 = 19;
    pub const GET_CHUNK: i32 = 23;
    pub const SET_CHUNK: i32 = 24;
    pub const PROCESS_EVENTS: i32 = 25;
    pub const GET_EFFECT_NAME: i32 = 45;
    pub const GET_VENDOR_STRING: i32 = 47;
    pub const GET_PRODUCT_STRING: i32 = 48;
    pub const GET_VENDOR_VERSION: i32 = 49;
    pub const CAN_DO: i32 = 51;
    pub const START_PROCESS: i32 = 71;
    pub const STOP_PROCESS: i32 = 72;
}

/// Host callback (audioMaster) opcode values
pub mod host {
    pub const AUTOMATE: i32 = 0;
    pub const VERSION: i32 = 1;
    pub const CURRENT_ID: i32 = 2;
    pub const IDLE: i32 = 3;
    pub const PIN_CONNECTED: i32 = 4;
    pub const WANT_MIDI: i32 = 6;
    pub const GET_TIME: i32 = 7;
    pub const PROCESS_EVENTS: i32 = 8;
    pub const IO_CHANGED: i32 = 13;
    pub const NEED_IDLE: i32 = 14;
    pub const SIZE_WINDOW: i32 = 15;
    pub const GET_SAMPLE_RATE: i32 = 16;
    pub const GET_BLOCK_SIZE: i32 = 17;
    pub const GET_INPUT_LATENCY: i32 = 18;
    pub const GET_OUTPUT_LATENCY: i32 = 19;
    pub const GET_CURRENT_PROCESS_LEVEL: i32 = 23;
    pub const GET_AUTOMATION_STATE: i32 = 24;
    pub const GET_VENDOR_STRING: i32 = 32;
    pub const GET_PRODUCT_STRING: i32 = 33;
    pub const GET_VENDOR_VERSION: i32 = 34;
    pub const VENDOR_SPECIFIC: i32 = 35;
    pub const CAN_DO: i32 = 37;
    pub const GET_LANGUAGE: i32 = 38;
    pub const UPDATE_DISPLAY: i32 = 42;
    pub const BEGIN_EDIT: i32 = 43;
    pub const END_EDIT: i32 = 44;
}

/// Name of a host callback opcode, for tracing
pub fn host_opcode_name(opcode: i32) -> &'static str {
    match opcode {
        host::AUTOMATE => "audioMasterAutomate",
        host::VERSION => "audioMasterVersion",
        host::CURRENT_ID => "audioMasterCurrentId",
        host::IDLE => "audioMasterIdle",
        host::PIN_CONNECTED => "audioMasterPinConnected",
        host::WANT_MIDI => "audioMasterWantMidi",
        host::GET_TIME => "audioMasterGetTime",
        host::PROCESS_EVENTS => "audioMasterProcessEvents",
        host::IO_CHANGED => "audioMasterIOChanged",
        host::NEED_IDLE => "audioMasterNeedIdle",
        host::SIZE_WINDOW => "audioMasterSizeWindow",
        host::GET_SAMPLE_RATE => "audioMasterGetSampleRate",
        host::GET_BLOCK_SIZE => "audioMasterGetBlockSize",
        host::GET_INPUT_LATENCY => "audioMasterGetInputLatency",
        host::GET_OUTPUT_LATENCY => "audioMasterGetOutputLatency",
        host::GET_CURRENT_PROCESS_LEVEL => "audioMasterGetCurrentProcessLevel",
        host::GET_AUTOMATION_STATE => "audioMasterGetAutomationState",
        host::GET_VENDOR_STRING => "audioMasterGetVendorString",
        host::GET_PRODUCT_STRING => "audioMasterGetProductString",
        host::GET_VENDOR_VERSION => "audioMasterGetVendorVersion",
        host::VENDOR_SPECIFIC => "audioMasterVendorSpecific",
        host::CAN_DO => "audioMasterCanDo",
        host::GET_LANGUAGE => "audioMasterGetLanguage",
        host::UPDATE_DISPLAY => "audioMasterUpdateDisplay",
        host::BEGIN_EDIT => "audioMasterBeginEdit",
        host::END_EDIT => "audioMasterEndEdit",
        _ => "unknown",
    }
}
