//! On-disk configuration file
//!
//! Calibrations, rooms, controller tuning and logging live in one file,
//! serialized as RON or JSON depending on the extension.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::calibration::FixtureCalibration;
use crate::error::{CoreError, Result};
use crate::logging::LogConfig;
use crate::room::RoomConfig;

/// Current version of the config file format.
pub const CONFIG_FILE_VERSION: &str = "1.0.0";

/// Maximum accepted config file size (1 MiB).
pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Tuning for proxy controllers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// How long an outgoing write may still be matched by a status echo
    pub echo_window_ms: u64,
    /// Spacing between emulated transition steps
    pub tween_step_interval_ms: u64,
    /// Upper bound on emulated transition steps
    pub tween_max_steps: u32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            echo_window_ms: 2000,
            tween_step_interval_ms: 100,
            tween_max_steps: 50,
        }
    }
}

impl ControlSettings {
    /// Echo window as a `Duration`
    pub fn echo_window(&self) -> Duration {
        Duration::from_millis(self.echo_window_ms)
    }

    /// Tween step spacing, never zero
    pub fn tween_step_interval(&self) -> Duration {
        Duration::from_millis(self.tween_step_interval_ms.max(1))
    }
}

/// Top-level structure of a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Format version
    pub version: String,
    /// One calibration per proxied fixture
    #[serde(default)]
    pub fixtures: Vec<FixtureCalibration>,
    /// Rooms over the configured fixtures
    #[serde(default)]
    pub rooms: Vec<RoomConfig>,
    /// Controller tuning
    #[serde(default)]
    pub control: ControlSettings,
    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: CONFIG_FILE_VERSION.to_string(),
            fixtures: Vec::new(),
            rooms: Vec::new(),
            control: ControlSettings::default(),
            log: LogConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Load, version-check and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::load_with_limit(path, MAX_CONFIG_FILE_SIZE)?;

        if config.version != CONFIG_FILE_VERSION {
            return Err(CoreError::VersionMismatch {
                expected: CONFIG_FILE_VERSION.to_string(),
                found: config.version,
            });
        }

        config.validate()?;
        debug!(
            "Loaded {} fixtures and {} rooms from {:?}",
            config.fixtures.len(),
            config.rooms.len(),
            path
        );
        Ok(config)
    }

    fn load_with_limit(path: &Path, limit: u64) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        if size > limit {
            return Err(CoreError::FileTooLarge { size, limit });
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("ron");

        let mut content = String::new();
        match extension {
            "json" => {
                File::open(path)?.read_to_string(&mut content)?;
                Ok(serde_json::from_str(&content)?)
            }
            "ron" => {
                File::open(path)?.read_to_string(&mut content)?;
                Ok(ron::from_str(&content)?)
            }
            _ => Err(CoreError::UnsupportedFormat(extension.to_string())),
        }
    }

    /// Write the config file; format follows the extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("ron");

        match extension {
            "json" => {
                let file = File::create(path)?;
                serde_json::to_writer_pretty(file, self)?;
            }
            "ron" => {
                let s = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
                File::create(path)?.write_all(s.as_bytes())?;
            }
            _ => return Err(CoreError::UnsupportedFormat(extension.to_string())),
        }
        Ok(())
    }

    /// Check calibrations, duplicate targets and room membership
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for fixture in &self.fixtures {
            fixture.validate()?;
            if !seen.insert(fixture.target_id.as_str()) {
                return Err(CoreError::DuplicateTarget(fixture.target_id.clone()));
            }
        }

        for room in &self.rooms {
            if room.members.is_empty() {
                return Err(CoreError::EmptyRoom(room.name.clone()));
            }
            if let Some(member) = room.members.iter().find(|m| !seen.contains(m.as_str())) {
                return Err(CoreError::UnknownMember {
                    room: room.name.clone(),
                    member: member.clone(),
                });
            }
        }
        Ok(())
    }

    /// Look up a fixture calibration by target id
    pub fn fixture(&self, target_id: &str) -> Option<&FixtureCalibration> {
        self.fixtures.iter().find(|f| f.target_id == target_id)
    }

    /// Look up a room by name
    pub fn room(&self, name: &str) -> Option<&RoomConfig> {
        self.rooms.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::CurveProfile;
    use tempfile::NamedTempFile;

    fn sample() -> ConfigFile {
        ConfigFile {
            fixtures: vec![
                FixtureCalibration::identity("light.ceiling"),
                FixtureCalibration::new("light.lamp", 10, 210, CurveProfile::Linear).unwrap(),
            ],
            rooms: vec![RoomConfig::new(
                "living",
                vec!["light.ceiling".to_string(), "light.lamp".to_string()],
            )],
            ..ConfigFile::default()
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_duplicate_target() {
        let mut config = sample();
        config.fixtures.push(FixtureCalibration::identity("light.lamp"));
        assert!(matches!(
            config.validate(),
            Err(CoreError::DuplicateTarget(ref t)) if t == "light.lamp"
        ));
    }

    #[test]
    fn test_unknown_room_member() {
        let mut config = sample();
        config.rooms[0].members.push("light.ghost".to_string());
        assert!(matches!(
            config.validate(),
            Err(CoreError::UnknownMember { ref member, .. }) if member == "light.ghost"
        ));
    }

    #[test]
    fn test_empty_room() {
        let mut config = sample();
        config.rooms.push(RoomConfig::new("hall", vec![]));
        assert!(matches!(config.validate(), Err(CoreError::EmptyRoom(_))));
    }

    #[test]
    fn test_file_size_limit() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("json");
        sample().save(&path).unwrap();

        let result = ConfigFile::load_with_limit(&path, 8);
        assert!(matches!(result, Err(CoreError::FileTooLarge { limit: 8, .. })));
    }

    #[test]
    fn test_settings_durations() {
        let settings = ControlSettings::default();
        assert_eq!(settings.echo_window(), Duration::from_secs(2));
        assert_eq!(settings.tween_step_interval(), Duration::from_millis(100));
    }
}
