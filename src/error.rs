use std::path::PathBuf;

use crate::host::LifecycleState;

/// Result type for plughost operations
pub type Result<T> = std::result::Result<T, Error>;

/// Step of plugin loading that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    /// Opening the dynamic library
    Opening,
    /// Resolving the plugin entry point
    EntryPoint,
    /// Calling the entry point to create an instance
    Instantiation,
    /// Checking the returned instance
    Validation,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Opening => write!(f, "opening library"),
            LoadStage::EntryPoint => write!(f, "locating entry point"),
            LoadStage::Instantiation => write!(f, "creating instance"),
            LoadStage::Validation => write!(f, "validating instance"),
        }
    }
}

/// Errors that can occur while hosting a plugin
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The module could not be opened or produced no instance. Fatal to the session.
    #[error("failed to load plugin {} while {stage}: {reason}", path.display())]
    Load {
        path: PathBuf,
        stage: LoadStage,
        reason: String,
    },

    /// A lifecycle operation was attempted from a state that does not allow it
    #[error("cannot {operation} while plugin is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// The plugin refused to hand out its state
    #[error("state export failed while plugin is {state}: {reason}")]
    Export {
        state: LifecycleState,
        reason: String,
    },

    /// The plugin refused a state blob
    #[error("state import failed while plugin is {state}: {reason}")]
    Import {
        state: LifecycleState,
        reason: String,
    },

    /// The plugin exposes no opcode for the requested feature
    #[error("cannot {operation}: plugin has no '{capability}' capability")]
    CapabilityUnsupported {
        operation: &'static str,
        capability: &'static str,
    },

    /// A request was submitted to an editor thread that has already shut down
    #[error("editor thread is closed")]
    CoordinatorClosed,

    /// Native editor window failure
    #[error("editor window error: {0}")]
    Window(String),

    /// Audio sink failure
    #[error("audio sink error: {0}")]
    Sink(String),

    /// Rejected configuration or render parameters
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Block processing failure
    #[error("processing error: {0}")]
    Process(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV encoding error
    #[cfg(feature = "wav")]
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn invalid_state(operation: &'static str, state: LifecycleState) -> Self {
        Error::InvalidState { operation, state }
    }

    /// True for errors the caller can recover from by skipping the feature
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::CapabilityUnsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_stage_display() {
        assert_eq!(LoadStage::Opening.to_string(), "opening library");
        assert_eq!(LoadStage::EntryPoint.to_string(), "locating entry point");
        assert_eq!(LoadStage::Instantiation.to_string(), "creating instance");
        assert_eq!(LoadStage::Validation.to_string(), "validating instance");
    }

    #[test]
    fn test_errors_name_operation_and_state() {
        let err = Error::invalid_state("export state", LifecycleState::Running);
        let msg = err.to_string();
        assert!(msg.contains("export state"));
        assert!(msg.contains("running"));

        let err = Error::Import {
            state: LifecycleState::Suspended,
            reason: "empty bank".into(),
        };
        assert!(err.to_string().contains("suspended"));
        assert!(err.to_string().contains("empty bank"));
    }

    #[test]
    fn test_load_error_mentions_path() {
        let err = Error::Load {
            path: PathBuf::from("/plugins/synth.dll"),
            stage: LoadStage::Opening,
            reason: "not found".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("synth.dll"));
        assert!(msg.contains("opening library"));
    }

    #[test]
    fn test_unsupported_is_recoverable() {
        let err = Error::CapabilityUnsupported {
            operation: "open editor",
            capability: "effEditOpen",
        };
        assert!(err.is_unsupported());
        assert!(!Error::CoordinatorClosed.is_unsupported());
    }
}
