//! Boundary to the physical fixtures
//!
//! The core never talks to devices directly. It consumes two capabilities:
//! a [`CommandSink`] that applies absolute power/brightness writes, and a
//! [`StatusSource`] that reports what the fixtures are actually doing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::SinkError;
use crate::origin::OriginToken;

/// What a target can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_brightness: bool,
    pub supports_transition: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_brightness: true,
            supports_transition: false,
        }
    }
}

/// Applies commands to physical fixtures.
///
/// `set_brightness` with a nonzero value implies power on; `0` means off.
/// Implementations should echo `origin` back through the status source when
/// the transport can carry it.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn set_power(
        &self,
        target_id: &str,
        on: bool,
        transition: Option<Duration>,
        origin: OriginToken,
    ) -> Result<(), SinkError>;

    async fn set_brightness(
        &self,
        target_id: &str,
        actual: u8,
        transition: Option<Duration>,
        origin: OriginToken,
    ) -> Result<(), SinkError>;

    async fn capabilities(&self, target_id: &str) -> Result<Capabilities, SinkError>;
}

/// One status report from a fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub target_id: String,
    pub power: bool,
    /// Absent for fixtures that only report on/off
    pub actual_brightness: Option<u8>,
    pub available: bool,
    /// Present when the transport preserved the writer's token
    pub origin: Option<OriginToken>,
}

impl StatusEvent {
    /// Fixture reports on at the given actual level
    pub fn on(target_id: impl Into<String>, actual: u8) -> Self {
        Self {
            target_id: target_id.into(),
            power: true,
            actual_brightness: Some(actual),
            available: true,
            origin: None,
        }
    }

    /// Fixture reports off
    pub fn off(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            power: false,
            actual_brightness: None,
            available: true,
            origin: None,
        }
    }

    /// Fixture dropped off the network
    pub fn unavailable(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            power: false,
            actual_brightness: None,
            available: false,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: OriginToken) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Reports fixture state changes
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Subscribe to events for all targets; receivers filter their own
    fn subscribe(&self) -> broadcast::Receiver<StatusEvent>;

    /// Last known status of a target, if any has been seen
    async fn current(&self, target_id: &str) -> Option<StatusEvent>;
}
