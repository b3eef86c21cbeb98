//! Normlight Control - virtual brightness controllers
//!
//! This crate puts a uniform 0-255 brightness scale in front of fixtures with
//! very different dimming ranges:
//! - **Proxy**: one controller per fixture, with loop suppression and
//!   transition emulation
//! - **Room**: fan-out of one virtual command to several proxies
//! - **Transport**: the command sink / status source boundary to hardware
//! - **Simulation**: an in-memory bus implementing that boundary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use normlight_control::{Capabilities, ProxyController, SimulatedBus, TurnOn};
//! use normlight_core::{ControlSettings, FixtureCalibration};
//!
//! # async fn demo() -> normlight_control::Result<()> {
//! let bus = Arc::new(SimulatedBus::new());
//! bus.add_fixture("light.desk", Capabilities::default());
//!
//! let calibration = FixtureCalibration::new("light.desk", 10, 210, Default::default())?;
//! let proxy = Arc::new(ProxyController::new(calibration, bus.clone(), ControlSettings::default()));
//! proxy.attach(bus.clone()).await;
//!
//! proxy.turn_on(TurnOn::new().brightness(128)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`proxy`] - Per-fixture controller
//! - [`room`] - Room fan-out and aggregation
//! - [`transport`] - Command sink and status source contracts
//! - [`origin`] - Origin tokens and echo window
//! - [`tween`] - Transition emulation
//! - [`sim`] - Simulated bus
//! - [`installation`] - Wiring from a config file
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;
/// Wiring of proxies and rooms
pub mod installation;
/// Origin tokens and echo suppression
pub mod origin;
/// Per-fixture proxy controller
pub mod proxy;
/// Room controller
pub mod room;
/// Simulated transport
pub mod sim;
/// Command sink and status source contracts
pub mod transport;
/// Transition emulation
pub mod tween;

// Re-exports
pub use error::{Capability, ControlError, Result, SinkError};
pub use installation::Installation;
pub use origin::{EchoGuard, ExpectedState, OriginToken};
pub use proxy::{LightState, ProxyController, ProxySnapshot, TurnOn};
pub use room::{MemberOutcome, MemberResult, RoomController, RoomOutcome, RoomSnapshot};
pub use sim::{SimulatedBus, SinkCommand, SinkWrite};
pub use transport::{Capabilities, CommandSink, StatusEvent, StatusSource};
pub use tween::{TweenHandle, TweenPlan};
