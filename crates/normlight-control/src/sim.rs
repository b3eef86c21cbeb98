//! In-memory fixture bus
//!
//! [`SimulatedBus`] implements both [`CommandSink`] and [`StatusSource`]
//! without hardware. Writes update the simulated fixture and are echoed back
//! as status events; wall-switch style changes can be injected from outside.
//! Every accepted write is logged for inspection.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::{Capability, SinkError};
use crate::origin::OriginToken;
use crate::transport::{Capabilities, CommandSink, StatusEvent, StatusSource};

const STATUS_CHANNEL_CAPACITY: usize = 256;

/// A write as it reached a simulated fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkCommand {
    Power(bool),
    Brightness(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkWrite {
    pub target_id: String,
    pub command: SinkCommand,
    pub transition: Option<Duration>,
    pub origin: OriginToken,
}

#[derive(Debug, Clone)]
struct SimFixture {
    capabilities: Capabilities,
    reachable: bool,
    reject: Option<String>,
    power: bool,
    actual: u8,
}

impl SimFixture {
    fn status(&self, target_id: &str) -> StatusEvent {
        if !self.reachable {
            return StatusEvent::unavailable(target_id);
        }
        StatusEvent {
            target_id: target_id.to_string(),
            power: self.power,
            actual_brightness: if self.capabilities.supports_brightness && self.power {
                Some(self.actual)
            } else {
                None
            },
            available: true,
            origin: None,
        }
    }
}

#[derive(Debug)]
struct BusState {
    fixtures: HashMap<String, SimFixture>,
    writes: Vec<SinkWrite>,
    preserve_origin: bool,
    echo: bool,
}

/// Simulated transport for tests and the demo binary
pub struct SimulatedBus {
    state: Mutex<BusState>,
    status_tx: broadcast::Sender<StatusEvent>,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    /// Empty bus that echoes writes with their origin token
    pub fn new() -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(BusState {
                fixtures: HashMap::new(),
                writes: Vec::new(),
                preserve_origin: true,
                echo: true,
            }),
            status_tx,
        }
    }

    /// Add a fixture, initially off
    pub fn add_fixture(&self, target_id: impl Into<String>, capabilities: Capabilities) {
        self.state.lock().fixtures.insert(
            target_id.into(),
            SimFixture {
                capabilities,
                reachable: true,
                reject: None,
                power: false,
                actual: 0,
            },
        );
    }

    /// Whether echoes carry the writer's origin token
    pub fn set_preserve_origin(&self, preserve: bool) {
        self.state.lock().preserve_origin = preserve;
    }

    /// Whether accepted writes are echoed as status events at all
    pub fn set_echo(&self, echo: bool) {
        self.state.lock().echo = echo;
    }

    /// Take a fixture off (or back onto) the network and report it
    pub fn set_reachable(&self, target_id: &str, reachable: bool) {
        let event = {
            let mut state = self.state.lock();
            let Some(fixture) = state.fixtures.get_mut(target_id) else {
                return;
            };
            fixture.reachable = reachable;
            fixture.status(target_id)
        };
        self.emit(event);
    }

    /// Make every write to the fixture fail with `Rejected`
    pub fn set_reject(&self, target_id: &str, reason: Option<String>) {
        if let Some(fixture) = self.state.lock().fixtures.get_mut(target_id) {
            fixture.reject = reason;
        }
    }

    /// Change a fixture from outside the controllers, as a wall switch would
    pub fn external_change(&self, target_id: &str, power: bool, actual: Option<u8>) {
        let event = {
            let mut state = self.state.lock();
            let Some(fixture) = state.fixtures.get_mut(target_id) else {
                return;
            };
            fixture.power = power;
            if let Some(actual) = actual {
                fixture.actual = actual;
            }
            fixture.status(target_id)
        };
        debug!("External change on {}: {:?}", target_id, event);
        self.emit(event);
    }

    /// Current `(power, actual)` of a fixture
    pub fn fixture_state(&self, target_id: &str) -> Option<(bool, u8)> {
        self.state
            .lock()
            .fixtures
            .get(target_id)
            .map(|f| (f.power, f.actual))
    }

    /// All accepted writes, oldest first
    pub fn writes(&self) -> Vec<SinkWrite> {
        self.state.lock().writes.clone()
    }

    pub fn writes_for(&self, target_id: &str) -> Vec<SinkWrite> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|w| w.target_id == target_id)
            .cloned()
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    fn emit(&self, event: StatusEvent) {
        // No subscribers is fine
        let _ = self.status_tx.send(event);
    }

    fn apply(
        &self,
        target_id: &str,
        command: SinkCommand,
        transition: Option<Duration>,
        origin: OriginToken,
    ) -> Result<(), SinkError> {
        let echo = {
            let mut state = self.state.lock();
            let preserve_origin = state.preserve_origin;
            let echo = state.echo;
            let fixture = state
                .fixtures
                .get_mut(target_id)
                .ok_or_else(|| SinkError::Rejected(format!("unknown target '{}'", target_id)))?;

            if !fixture.reachable {
                return Err(SinkError::Unavailable);
            }
            if let Some(reason) = &fixture.reject {
                return Err(SinkError::Rejected(reason.clone()));
            }

            match command {
                SinkCommand::Brightness(_) if !fixture.capabilities.supports_brightness => {
                    return Err(SinkError::UnsupportedCapability(Capability::Brightness));
                }
                SinkCommand::Brightness(actual) => {
                    fixture.power = actual > 0;
                    fixture.actual = actual;
                }
                SinkCommand::Power(on) => {
                    fixture.power = on;
                    if on && fixture.actual == 0 {
                        fixture.actual = 255;
                    }
                }
            }

            let mut event = fixture.status(target_id);
            if preserve_origin {
                event.origin = Some(origin);
            }

            state.writes.push(SinkWrite {
                target_id: target_id.to_string(),
                command,
                transition,
                origin,
            });
            echo.then_some(event)
        };

        trace!("{} accepted {:?}", target_id, command);
        if let Some(event) = echo {
            self.emit(event);
        }
        Ok(())
    }
}

#[async_trait]
impl CommandSink for SimulatedBus {
    async fn set_power(
        &self,
        target_id: &str,
        on: bool,
        transition: Option<Duration>,
        origin: OriginToken,
    ) -> Result<(), SinkError> {
        self.apply(target_id, SinkCommand::Power(on), transition, origin)
    }

    async fn set_brightness(
        &self,
        target_id: &str,
        actual: u8,
        transition: Option<Duration>,
        origin: OriginToken,
    ) -> Result<(), SinkError> {
        self.apply(target_id, SinkCommand::Brightness(actual), transition, origin)
    }

    async fn capabilities(&self, target_id: &str) -> Result<Capabilities, SinkError> {
        let state = self.state.lock();
        let fixture = state
            .fixtures
            .get(target_id)
            .ok_or_else(|| SinkError::Rejected(format!("unknown target '{}'", target_id)))?;
        if !fixture.reachable {
            return Err(SinkError::Unavailable);
        }
        Ok(fixture.capabilities)
    }
}

#[async_trait]
impl StatusSource for SimulatedBus {
    fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    async fn current(&self, target_id: &str) -> Option<StatusEvent> {
        self.state
            .lock()
            .fixtures
            .get(target_id)
            .map(|f| f.status(target_id))
    }
}
