//! Room controller
//!
//! A room fans one virtual command out to its member proxies. Each member
//! transforms the shared virtual value through its own calibration, so
//! fixtures with different ranges end up at different actual levels.
//! Fan-out is best effort: there is no rollback for lights, so every member
//! gets its own outcome.

use futures::future::join_all;
use normlight_core::{Aggregation, RoomConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};
use crate::proxy::{ProxyController, ProxySnapshot, TurnOn};

/// What happened to one member during a fan-out
#[derive(Debug, Clone, PartialEq)]
pub enum MemberResult {
    Applied,
    /// Member was unavailable or the command was a no-op
    Skipped,
    Failed(ControlError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberOutcome {
    pub target_id: String,
    pub result: MemberResult,
}

/// Combined result of a room command
#[derive(Debug, Clone, PartialEq)]
pub struct RoomOutcome {
    pub room: String,
    pub members: Vec<MemberOutcome>,
}

impl RoomOutcome {
    /// Members that failed, with the reason
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ControlError)> {
        self.members.iter().filter_map(|m| match &m.result {
            MemberResult::Failed(err) => Some((m.target_id.as_str(), err)),
            _ => None,
        })
    }

    pub fn applied(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter(|m| m.result == MemberResult::Applied)
            .map(|m| m.target_id.as_str())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter(|m| m.result == MemberResult::Skipped)
            .map(|m| m.target_id.as_str())
    }

    /// True if no member failed
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    fn result_of(&self, target_id: &str) -> Option<&MemberResult> {
        self.members
            .iter()
            .find(|m| m.target_id == target_id)
            .map(|m| &m.result)
    }
}

/// Aggregated state of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub power: bool,
    /// Virtual brightness, `None` while every member is off
    pub brightness: Option<u8>,
    /// True while at least one member is reachable
    pub available: bool,
    /// Member whose change the room adopted last
    pub last_set: Option<String>,
}

#[derive(Debug)]
struct RoomState {
    members: Vec<(String, ProxySnapshot)>,
    brightness: Option<u8>,
    last_on_brightness: Option<u8>,
    last_set: Option<String>,
}

impl RoomState {
    fn power(&self) -> bool {
        self.members.iter().any(|(_, s)| s.is_on())
    }

    fn snapshot(&self) -> RoomSnapshot {
        let power = self.power();
        RoomSnapshot {
            power,
            brightness: if power { self.brightness } else { None },
            available: self.members.iter().any(|(_, s)| s.available),
            last_set: self.last_set.clone(),
        }
    }

    /// Last-set aggregation: the changed member's brightness becomes the
    /// room's while anything is on.
    fn adopt(&mut self, index: usize, snapshot: ProxySnapshot) {
        let Some((target_id, slot)) = self.members.get_mut(index) else {
            return;
        };
        if *slot == snapshot {
            return;
        }
        *slot = snapshot;
        let target_id = target_id.clone();

        if let Some(brightness) = snapshot.brightness() {
            self.brightness = Some(brightness);
            self.last_on_brightness = Some(brightness);
        }
        self.last_set = Some(target_id);
        if !self.power() {
            self.brightness = None;
        }
    }
}

struct RoomShared {
    name: String,
    state: Mutex<RoomState>,
    state_tx: watch::Sender<RoomSnapshot>,
}

impl RoomShared {
    fn adopt(&self, index: usize, snapshot: ProxySnapshot) {
        let mut state = self.state.lock();
        state.adopt(index, snapshot);
        let next = state.snapshot();
        self.state_tx.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }
}

/// Group of proxies driven by one virtual command
pub struct RoomController {
    members: Vec<Arc<ProxyController>>,
    aggregation: Aggregation,
    shared: Arc<RoomShared>,
    watchers: Vec<JoinHandle<()>>,
}

impl RoomController {
    /// Build a room over existing proxies and start following them.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &RoomConfig, members: Vec<Arc<ProxyController>>) -> Self {
        let mut state = RoomState {
            members: members
                .iter()
                .map(|m| (m.target_id().to_string(), m.snapshot()))
                .collect(),
            brightness: None,
            last_on_brightness: None,
            last_set: None,
        };
        // Seed from members that are already on, in member order
        for index in 0..members.len() {
            if let Some(brightness) = state.members[index].1.brightness() {
                state.brightness = Some(brightness);
                state.last_on_brightness = Some(brightness);
                state.last_set = Some(state.members[index].0.clone());
            }
        }

        let (state_tx, _) = watch::channel(state.snapshot());
        let shared = Arc::new(RoomShared {
            name: config.name.clone(),
            state: Mutex::new(state),
            state_tx,
        });

        let watchers = members
            .iter()
            .enumerate()
            .map(|(index, member)| {
                let mut rx = member.subscribe();
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    while rx.changed().await.is_ok() {
                        let snapshot = *rx.borrow_and_update();
                        shared.adopt(index, snapshot);
                    }
                })
            })
            .collect();

        info!(
            "Room '{}' with {} members ({:?})",
            config.name,
            members.len(),
            config.aggregation
        );

        Self {
            members,
            aggregation: config.aggregation,
            shared,
            watchers,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn members(&self) -> &[Arc<ProxyController>] {
        &self.members
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.shared.state.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<RoomSnapshot> {
        self.shared.state_tx.subscribe()
    }

    /// Turn the room on.
    ///
    /// Arguments are resolved once against the room's own state; every
    /// member then receives the same absolute virtual brightness. Only
    /// argument errors fail the whole call; member failures are reported in
    /// the outcome.
    pub async fn turn_on(&self, args: TurnOn) -> Result<RoomOutcome> {
        let (current, last_on) = {
            let state = self.shared.state.lock();
            let current = if state.power() { state.brightness } else { None };
            (current, state.last_on_brightness)
        };

        let Some(brightness) = args.resolve(current, last_on)? else {
            debug!("Room '{}': nothing to do", self.name());
            return Ok(self.all_skipped());
        };

        let member_args = TurnOn {
            brightness: Some(brightness as i32),
            transition: args.transition,
            ..TurnOn::default()
        };
        debug!("Room '{}' -> virtual {}", self.name(), brightness);

        let outcome = self
            .fan_out(|member| {
                let args = member_args.clone();
                async move { member.turn_on(args).await }
            })
            .await;
        Ok(outcome)
    }

    pub async fn turn_off(&self, transition: Option<Duration>) -> RoomOutcome {
        debug!("Room '{}' -> off", self.name());
        self.fan_out(|member| async move { member.turn_off(transition).await })
            .await
    }

    async fn fan_out<'a, F, Fut>(&'a self, command: F) -> RoomOutcome
    where
        F: Fn(&'a ProxyController) -> Fut,
        Fut: std::future::Future<Output = Result<()>> + 'a,
    {
        let futures = self.members.iter().map(|member| {
            let available = member.snapshot().available;
            let run = if available {
                Some(command(member.as_ref()))
            } else {
                None
            };
            async move {
                let result = match run {
                    None => MemberResult::Skipped,
                    Some(fut) => match fut.await {
                        Ok(()) => MemberResult::Applied,
                        Err(err) => MemberResult::Failed(err),
                    },
                };
                MemberOutcome {
                    target_id: member.target_id().to_string(),
                    result,
                }
            }
        });
        let outcome = RoomOutcome {
            room: self.name().to_string(),
            members: join_all(futures).await,
        };

        for (target, err) in outcome.failures() {
            warn!("Room '{}': {} failed: {}", self.name(), target, err);
        }

        // Adopt straight away so the room reflects the command on return
        for (index, member) in self.members.iter().enumerate() {
            if matches!(
                outcome.result_of(member.target_id()),
                Some(MemberResult::Applied) | Some(MemberResult::Failed(_))
            ) {
                self.shared.adopt(index, member.snapshot());
            }
        }
        outcome
    }

    fn all_skipped(&self) -> RoomOutcome {
        RoomOutcome {
            room: self.name().to_string(),
            members: self
                .members
                .iter()
                .map(|m| MemberOutcome {
                    target_id: m.target_id().to_string(),
                    result: MemberResult::Skipped,
                })
                .collect(),
        }
    }
}

impl Drop for RoomController {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
    }
}

impl std::fmt::Debug for RoomController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomController")
            .field("name", &self.shared.name)
            .field("members", &self.members.len())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
