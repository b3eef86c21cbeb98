//! Room configuration records

use serde::{Deserialize, Serialize};

/// How a room derives its reported brightness from its members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Adopt the brightness of whichever member changed last
    #[default]
    LastSet,
}

/// A named group of fixtures driven by one virtual command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Room name, unique within a config file
    pub name: String,
    /// Member fixture ids, in fan-out order
    pub members: Vec<String>,
    /// Aggregation policy
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl RoomConfig {
    /// Create a room with the default aggregation
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
            aggregation: Aggregation::LastSet,
        }
    }

    /// Check whether a fixture belongs to this room
    pub fn contains(&self, target_id: &str) -> bool {
        self.members.iter().any(|m| m == target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_serde() {
        let json = r#"{"name":"living","members":["light.a","light.b"]}"#;
        let room: RoomConfig = serde_json::from_str(json).unwrap();
        assert_eq!(room.aggregation, Aggregation::LastSet);
        assert!(room.contains("light.b"));
        assert!(!room.contains("light.c"));

        let out = serde_json::to_string(&room).unwrap();
        assert!(out.contains("\"last_set\""));
    }
}
