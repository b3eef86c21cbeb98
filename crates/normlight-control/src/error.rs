//! Error types for the control system
use normlight_core::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A fixture capability that a command may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Absolute brightness writes
    Brightness,
    /// Native fades
    Transition,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Brightness => f.write_str("brightness"),
            Capability::Transition => f.write_str("transition"),
        }
    }
}

/// Failure reported by a command sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Target cannot be reached
    #[error("target unreachable")]
    Unavailable,

    /// Target lacks the capability the command needs
    #[error("target does not support {0}")]
    UnsupportedCapability(Capability),

    /// Sink-specific refusal
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// Control system errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Target unreachable; surfaced, never retried automatically
    #[error("Target '{target}' is unavailable")]
    Unavailable { target: String },

    /// Target lacks a capability; the proxy degrades to on/off
    #[error("Target '{target}' does not support {capability}")]
    UnsupportedCapability {
        target: String,
        capability: Capability,
    },

    /// Command refused by the sink; state left unchanged
    #[error("Command to '{target}' rejected: {reason}")]
    Rejected { target: String, reason: String },

    /// Invalid command arguments
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No proxy or room with this name
    #[error("Target not found: {0}")]
    UnknownTarget(String),

    /// Calibration or configuration error
    #[error("Configuration error: {0}")]
    Core(String),
}

impl ControlError {
    /// Attach a target id to a sink failure
    pub fn from_sink(target: &str, err: SinkError) -> Self {
        match err {
            SinkError::Unavailable => ControlError::Unavailable {
                target: target.to_string(),
            },
            SinkError::UnsupportedCapability(capability) => ControlError::UnsupportedCapability {
                target: target.to_string(),
                capability,
            },
            SinkError::Rejected(reason) => ControlError::Rejected {
                target: target.to_string(),
                reason,
            },
        }
    }

    /// True for failures caused by the target being unreachable
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ControlError::Unavailable { .. })
    }
}

impl From<CoreError> for ControlError {
    fn from(err: CoreError) -> Self {
        ControlError::Core(err.to_string())
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
