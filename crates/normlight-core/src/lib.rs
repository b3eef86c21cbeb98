//! normlight Core - Brightness normalization model
//!
//! This crate contains the runtime-free part of normlight:
//! - The transform engine between virtual and actual brightness
//! - Per-fixture calibration records
//! - Room configuration records
//! - The on-disk config file format and its validation
//! - Logging settings

#![warn(missing_docs)]

/// Error types
pub mod error;

/// Virtual <-> actual brightness transforms
pub mod transform;

/// Fixture calibration records
pub mod calibration;

/// Room records
pub mod room;

/// Config file format
pub mod config;

/// Logging settings
pub mod logging;

pub use calibration::{parse_level, FixtureCalibration};
pub use config::{ConfigFile, ControlSettings, CONFIG_FILE_VERSION};
pub use error::{CoreError, Result};
pub use logging::LogConfig;
pub use room::{Aggregation, RoomConfig};
pub use transform::{actual_to_virtual, virtual_to_actual, CurveProfile};
