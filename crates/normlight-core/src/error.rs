//! Error types for calibration, transforms and configuration files

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// The named brightness curve is not implemented
    #[error("Unsupported brightness profile: {0}")]
    UnsupportedProfile(String),

    /// Calibration violates `llv <= hld`
    #[error("Invalid calibration for '{target}': llv {llv} > hld {hld}")]
    InvalidCalibration { target: String, llv: u8, hld: u8 },

    /// A target may only be proxied once
    #[error("Target '{0}' is already proxied")]
    DuplicateTarget(String),

    /// Room references a fixture that is not configured
    #[error("Room '{room}' references unknown fixture '{member}'")]
    UnknownMember { room: String, member: String },

    /// Room without members
    #[error("Room '{0}' has no members")]
    EmptyRoom(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON deserialization error
    #[error("RON error: {0}")]
    RonDe(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("RON error: {0}")]
    RonSer(#[from] ron::Error),

    /// Unknown file extension
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Config file exceeds the size limit
    #[error("Config file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    /// Config file written by an incompatible version
    #[error("Config version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
}
