//! Normlight - virtual brightness for mixed fixtures
//!
//! Loads an installation from a config file, runs one command against the
//! simulated fixture bus and prints the resulting state along with every
//! actual write that reached the fixtures.

#![warn(missing_docs)]

mod cli;
mod logging_setup;

use anyhow::{Context, Result};
use cli::{Action, Invocation};
use normlight_control::{
    Capabilities, Installation, RoomOutcome, SimulatedBus, SinkCommand, TurnOn,
};
use normlight_core::ConfigFile;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn turn_on_args(action: &Action, transition: Option<Duration>) -> Option<TurnOn> {
    let args = match action {
        Action::On(None) => TurnOn::new(),
        Action::On(Some(level)) => TurnOn::new().brightness(*level as i32),
        Action::Step(delta) => TurnOn::new().step(*delta),
        Action::Off => return None,
    };
    Some(match transition {
        Some(t) => args.transition(t),
        None => args,
    })
}

fn report_outcome(outcome: &RoomOutcome) {
    for member in &outcome.members {
        println!("  {:<24} {:?}", member.target_id, member.result);
    }
}

/// The main entry point for the application.
#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = Invocation::parse(&args)?;

    let config = ConfigFile::load(&invocation.config)
        .with_context(|| format!("Failed to load {:?}", invocation.config))?;
    let _log_guard = logging_setup::init(&config.log)?;
    info!("=== Normlight session started ===");

    let bus = Arc::new(SimulatedBus::new());
    for fixture in &config.fixtures {
        bus.add_fixture(fixture.target_id.clone(), Capabilities::default());
    }
    let installation = Installation::build(&config, bus.clone(), bus.clone())
        .await
        .context("Failed to set up installation")?;

    let on_args = turn_on_args(&invocation.action, invocation.transition);

    if let Some(room) = installation.room(&invocation.target) {
        let outcome = match on_args {
            Some(args) => room.turn_on(args).await?,
            None => room.turn_off(invocation.transition).await,
        };
        println!("room {}:", room.name());
        report_outcome(&outcome);
    } else if let Some(proxy) = installation.proxy(&invocation.target) {
        let result = match on_args {
            Some(args) => proxy.turn_on(args).await,
            None => proxy.turn_off(invocation.transition).await,
        };
        if let Err(e) = result {
            warn!("{}", e);
            println!("{}: {}", proxy.target_id(), e);
        }
    } else {
        anyhow::bail!(
            "'{}' is neither a fixture nor a room (fixtures: {}; rooms: {})",
            invocation.target,
            installation.proxy_ids().join(", "),
            installation.room_names().join(", ")
        );
    }

    // Let emulated transitions finish before reporting
    if let Some(transition) = invocation.transition {
        tokio::time::sleep(transition + config.control.tween_step_interval()).await;
    }

    println!("writes:");
    for write in bus.writes() {
        let command = match write.command {
            SinkCommand::Power(on) => format!("power {}", if on { "on" } else { "off" }),
            SinkCommand::Brightness(actual) => format!("brightness {}", actual),
        };
        println!("  {:<24} {}", write.target_id, command);
    }

    println!("state:");
    for id in installation.proxy_ids() {
        if let Some(proxy) = installation.proxy(id) {
            let snapshot = proxy.snapshot();
            println!(
                "  {:<24} {:?} available={}",
                id, snapshot.state, snapshot.available
            );
        }
    }
    for name in installation.room_names() {
        if let Some(room) = installation.room(name) {
            let snapshot = room.snapshot();
            println!(
                "  room {:<19} power={} brightness={:?}",
                name, snapshot.power, snapshot.brightness
            );
        }
    }

    Ok(())
}
