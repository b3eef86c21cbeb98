//! Proxy controller
//!
//! One [`ProxyController`] fronts one physical fixture. Callers speak the
//! virtual brightness domain; the proxy transforms every command through the
//! fixture's calibration, hands the actual value to the [`CommandSink`], and
//! mirrors status reports back into virtual state.
//!
//! ## Loop suppression
//!
//! Each write is tagged with a fresh [`OriginToken`] and remembered in an
//! [`EchoGuard`] for the echo window. Status events matching one of those
//! writes are confirmations and are absorbed. Everything else is an external
//! change (wall switch, another controller) and is adopted. Status handling
//! never writes to the sink.
//!
//! ## Transitions
//!
//! Targets with native fades receive the duration unchanged. For the rest the
//! proxy runs a [`TweenPlan`] in a task. A command that changes the light
//! cancels it before issuing its own write; a no-op command lets it finish.

use arc_swap::ArcSwap;
use normlight_core::{ControlSettings, FixtureCalibration};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Capability, ControlError, Result, SinkError};
use crate::origin::{EchoGuard, ExpectedState, OriginToken};
use crate::transport::{Capabilities, CommandSink, StatusEvent, StatusSource};
use crate::tween::{TweenHandle, TweenPlan};

/// Power/brightness state in the virtual domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightState {
    /// No status seen yet, or the fixture is unavailable
    Unknown,
    Off,
    On { brightness: u8 },
}

/// Read-only view of a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySnapshot {
    pub state: LightState,
    pub available: bool,
}

impl ProxySnapshot {
    /// `None` while the state is unknown
    pub fn power(&self) -> Option<bool> {
        match self.state {
            LightState::Unknown => None,
            LightState::Off => Some(false),
            LightState::On { .. } => Some(true),
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self.state, LightState::On { .. })
    }

    /// Virtual brightness, meaningful only while on
    pub fn brightness(&self) -> Option<u8> {
        match self.state {
            LightState::On { brightness } => Some(brightness),
            _ => None,
        }
    }
}

/// Arguments of a turn-on command.
///
/// At most one of `brightness`, `brightness_step` and `brightness_step_pct`
/// may be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOn {
    /// Absolute virtual brightness, clamped to 0-255
    pub brightness: Option<i32>,
    /// Signed delta on the current virtual brightness
    pub brightness_step: Option<i32>,
    /// Signed delta as a percentage of 255
    pub brightness_step_pct: Option<f64>,
    pub transition: Option<Duration>,
}

impl TurnOn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn brightness(mut self, brightness: i32) -> Self {
        self.brightness = Some(brightness);
        self
    }

    pub fn step(mut self, step: i32) -> Self {
        self.brightness_step = Some(step);
        self
    }

    pub fn step_pct(mut self, pct: f64) -> Self {
        self.brightness_step_pct = Some(pct);
        self
    }

    pub fn transition(mut self, transition: Duration) -> Self {
        self.transition = Some(transition);
        self
    }

    /// True if any brightness argument is present
    pub fn has_brightness(&self) -> bool {
        self.brightness.is_some()
            || self.brightness_step.is_some()
            || self.brightness_step_pct.is_some()
    }

    /// Compute the target virtual brightness.
    ///
    /// `current` is the brightness while on (`None` when off or unknown),
    /// `last_on` the brightness the light last had while on. Returns
    /// `Ok(None)` when the command is a no-op: a non-positive step while off
    /// leaves the light off.
    pub fn resolve(&self, current: Option<u8>, last_on: Option<u8>) -> Result<Option<u8>> {
        let supplied = [
            self.brightness.is_some(),
            self.brightness_step.is_some(),
            self.brightness_step_pct.is_some(),
        ]
        .iter()
        .filter(|s| **s)
        .count();
        if supplied > 1 {
            return Err(ControlError::InvalidParameter(
                "only one of brightness, brightness_step, brightness_step_pct may be set".to_string(),
            ));
        }

        if let Some(b) = self.brightness {
            return Ok(Some(b.clamp(0, 255) as u8));
        }

        let step = match (self.brightness_step, self.brightness_step_pct) {
            (Some(step), _) => step as i64,
            (None, Some(pct)) => {
                if !pct.is_finite() {
                    return Err(ControlError::InvalidParameter(
                        "brightness_step_pct must be finite".to_string(),
                    ));
                }
                (255.0 * pct / 100.0).trunc() as i64
            }
            (None, None) => return Ok(Some(current.or(last_on).unwrap_or(255))),
        };

        match current {
            Some(brightness) => Ok(Some((brightness as i64 + step).clamp(0, 255) as u8)),
            None if step > 0 => Ok(Some(step.clamp(0, 255) as u8)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Write {
    Power(bool),
    Brightness(u8),
}

impl Write {
    fn expected(&self) -> ExpectedState {
        match *self {
            Write::Power(on) => ExpectedState {
                power: on,
                actual: None,
            },
            Write::Brightness(actual) => ExpectedState {
                power: actual > 0,
                actual: Some(actual),
            },
        }
    }
}

#[derive(Debug)]
struct ProxyInner {
    state: LightState,
    available: bool,
    last_on_brightness: Option<u8>,
    last_written_actual: Option<u8>,
    echo: EchoGuard,
    capabilities: Option<Capabilities>,
    brightness_degraded: bool,
    degradation_reported: bool,
}

impl ProxyInner {
    fn snapshot(&self) -> ProxySnapshot {
        ProxySnapshot {
            state: self.state,
            available: self.available,
        }
    }

    fn set_on(&mut self, brightness: u8) {
        self.state = LightState::On { brightness };
        self.last_on_brightness = Some(brightness);
    }

    /// Take over the power and level a fixture reports
    fn adopt(&mut self, calibration: &FixtureCalibration, power: bool, actual: Option<u8>) {
        match (power, actual) {
            (true, Some(actual)) => {
                self.last_written_actual = Some(actual);
                match calibration.to_virtual(actual) {
                    0 => self.state = LightState::Off,
                    v => self.set_on(v),
                }
            }
            // On/off-only report: mirror power at full
            (true, None) => {
                self.last_written_actual = None;
                self.set_on(255);
            }
            (false, _) => {
                self.last_written_actual = Some(0);
                self.state = LightState::Off;
            }
        }
        self.available = true;
    }
}

/// State shared between the controller and its tween task
struct ProxyShared {
    target_id: String,
    sink: Arc<dyn CommandSink>,
    inner: Mutex<ProxyInner>,
    state_tx: watch::Sender<ProxySnapshot>,
}

impl ProxyShared {
    fn publish(&self, inner: &ProxyInner) {
        let snapshot = inner.snapshot();
        self.state_tx.send_if_modified(|current| {
            if *current != snapshot {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }

    /// Issue one tagged write and track its outcome
    async fn write(&self, write: Write, transition: Option<Duration>) -> std::result::Result<(), SinkError> {
        let token = OriginToken::new();
        self.inner.lock().echo.record(token, write.expected());

        debug!("{} <- {:?} (transition {:?}, origin {})", self.target_id, write, transition, token);
        let result = match write {
            Write::Power(on) => self.sink.set_power(&self.target_id, on, transition, token).await,
            Write::Brightness(actual) => {
                self.sink
                    .set_brightness(&self.target_id, actual, transition, token)
                    .await
            }
        };

        let mut inner = self.inner.lock();
        match &result {
            Ok(()) => {
                match write {
                    Write::Brightness(actual) => inner.last_written_actual = Some(actual),
                    Write::Power(false) => inner.last_written_actual = Some(0),
                    // The fixture restores a level of its own choosing
                    Write::Power(true) => inner.last_written_actual = None,
                }
                if !inner.available {
                    inner.available = true;
                    self.publish(&inner);
                }
            }
            Err(err) => {
                inner.echo.discard(token);
                if *err == SinkError::Unavailable && inner.available {
                    warn!("{} is unavailable", self.target_id);
                    inner.available = false;
                    self.publish(&inner);
                }
            }
        }
        result
    }

    async fn run_tween(self: Arc<Self>, steps: Vec<u8>, interval: Duration, finish_off: bool) {
        let last = steps.len().saturating_sub(1);
        for (i, value) in steps.into_iter().enumerate() {
            tokio::time::sleep(interval).await;
            let write = if finish_off && i == last {
                Write::Power(false)
            } else {
                Write::Brightness(value)
            };
            if let Err(e) = self.write(write, None).await {
                warn!("Transition on {} stopped: {}", self.target_id, e);
                break;
            }
        }
    }
}

/// Virtual-brightness front for one physical fixture
pub struct ProxyController {
    target_id: String,
    calibration: ArcSwap<FixtureCalibration>,
    settings: ControlSettings,
    shared: Arc<ProxyShared>,
    /// Serializes commands and owns the in-flight tween
    command_gate: tokio::sync::Mutex<Option<TweenHandle>>,
    status_task: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyController {
    pub fn new(
        calibration: FixtureCalibration,
        sink: Arc<dyn CommandSink>,
        settings: ControlSettings,
    ) -> Self {
        let target_id = calibration.target_id.clone();
        let inner = ProxyInner {
            state: LightState::Unknown,
            available: true,
            last_on_brightness: None,
            last_written_actual: None,
            echo: EchoGuard::new(settings.echo_window()),
            capabilities: None,
            brightness_degraded: false,
            degradation_reported: false,
        };
        let (state_tx, _) = watch::channel(inner.snapshot());

        Self {
            target_id: target_id.clone(),
            calibration: ArcSwap::from_pointee(calibration),
            settings,
            shared: Arc::new(ProxyShared {
                target_id,
                sink,
                inner: Mutex::new(inner),
                state_tx,
            }),
            command_gate: tokio::sync::Mutex::new(None),
            status_task: Mutex::new(None),
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn snapshot(&self) -> ProxySnapshot {
        self.shared.inner.lock().snapshot()
    }

    /// Watch state changes (commands and reverse sync alike)
    pub fn subscribe(&self) -> watch::Receiver<ProxySnapshot> {
        self.shared.state_tx.subscribe()
    }

    /// Calibration snapshot currently in effect
    pub fn calibration(&self) -> Arc<FixtureCalibration> {
        self.calibration.load_full()
    }

    /// Replace the calibration; applies from the next command on
    pub fn update_calibration(&self, calibration: FixtureCalibration) -> Result<()> {
        if calibration.target_id != self.target_id {
            return Err(ControlError::InvalidParameter(format!(
                "calibration for '{}' cannot be applied to '{}'",
                calibration.target_id, self.target_id
            )));
        }
        calibration.validate()?;
        info!(
            "Calibration for {} now llv={} hld={} ({})",
            self.target_id, calibration.llv, calibration.hld, calibration.profile
        );
        self.calibration.store(Arc::new(calibration));
        Ok(())
    }

    /// Token of the most recent write still inside the echo window
    pub fn pending_origin(&self) -> Option<OriginToken> {
        self.shared.inner.lock().echo.latest()
    }

    /// True while an emulated transition is still writing
    pub async fn is_transitioning(&self) -> bool {
        let gate = self.command_gate.lock().await;
        gate.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    pub async fn turn_on(&self, args: TurnOn) -> Result<()> {
        let mut gate = self.command_gate.lock().await;

        let (current, last_on) = {
            let inner = self.shared.inner.lock();
            let current = match inner.state {
                LightState::On { brightness } => Some(brightness),
                _ => None,
            };
            (current, inner.last_on_brightness)
        };

        // Rejected and no-op commands leave a running transition alone
        let Some(virtual_brightness) = args.resolve(current, last_on)? else {
            debug!("{}: non-positive step while off, nothing to do", self.target_id);
            return Ok(());
        };

        if let Some(tween) = gate.take() {
            tween.cancel().await;
        }

        let caps = self.capabilities().await?;
        let transition = args.transition.filter(|t| !t.is_zero());

        if self.shared.inner.lock().brightness_degraded {
            return self
                .power_only(virtual_brightness > 0, transition, &caps, args.has_brightness())
                .await;
        }

        if virtual_brightness == 0 {
            return self.switch_off(&mut gate, transition, &caps, true).await;
        }

        let calibration = self.calibration.load_full();
        // A nonzero virtual value must keep the fixture lit
        let actual = calibration.to_actual(virtual_brightness).max(1);

        let result = match transition {
            Some(duration) if !caps.supports_transition => {
                let from = self.tween_origin();
                self.start_tween(&mut gate, from, actual, duration, false).await
            }
            _ => {
                let passthrough = transition.filter(|_| caps.supports_transition);
                self.shared.write(Write::Brightness(actual), passthrough).await
            }
        };

        match result {
            Ok(()) => {
                let mut inner = self.shared.inner.lock();
                inner.set_on(virtual_brightness);
                self.shared.publish(&inner);
                debug!(
                    "{} on at virtual {} (actual {})",
                    self.target_id, virtual_brightness, actual
                );
                Ok(())
            }
            Err(SinkError::UnsupportedCapability(Capability::Brightness)) => {
                self.mark_degraded();
                self.power_only(true, transition, &caps, true).await
            }
            Err(e) => Err(ControlError::from_sink(&self.target_id, e)),
        }
    }

    pub async fn turn_off(&self, transition: Option<Duration>) -> Result<()> {
        let mut gate = self.command_gate.lock().await;
        if let Some(tween) = gate.take() {
            tween.cancel().await;
        }

        let caps = self.capabilities().await?;
        let transition = transition.filter(|t| !t.is_zero());
        self.switch_off(&mut gate, transition, &caps, false).await
    }

    /// Apply a status report from the fixture
    pub async fn handle_status(&self, event: StatusEvent) {
        if event.target_id != self.target_id {
            return;
        }

        let external = {
            let mut inner = self.shared.inner.lock();

            if !event.available {
                inner.state = LightState::Unknown;
                inner.available = false;
                self.shared.publish(&inner);
                debug!("{} reported unavailable", self.target_id);
                return;
            }

            if inner
                .echo
                .absorb(event.origin, event.power, event.actual_brightness)
            {
                // Our own write is the best knowledge after an outage
                if inner.state == LightState::Unknown {
                    inner.adopt(&self.calibration.load(), event.power, event.actual_brightness);
                } else {
                    inner.available = true;
                }
                self.shared.publish(&inner);
                debug!("{}: absorbed echo of own write", self.target_id);
                false
            } else {
                inner.adopt(&self.calibration.load(), event.power, event.actual_brightness);
                self.shared.publish(&inner);
                debug!("{} changed externally: {:?}", self.target_id, inner.state);
                true
            }
        };

        // An external change supersedes our own transition, unless a command
        // is mid-flight and will replace it anyway.
        if external {
            if let Ok(mut gate) = self.command_gate.try_lock() {
                if let Some(tween) = gate.take() {
                    if !tween.is_finished() {
                        debug!("{}: cancelling transition after external change", self.target_id);
                    }
                    tween.cancel().await;
                }
            }
        }
    }

    /// Prime from the status source and keep following it.
    ///
    /// The listener holds only a weak reference and stops when the proxy is
    /// dropped or the source closes.
    pub async fn attach(self: &Arc<Self>, source: Arc<dyn StatusSource>) {
        let mut rx = source.subscribe();
        if let Some(initial) = source.current(&self.target_id).await {
            self.handle_status(initial).await;
        }

        let proxy: Weak<Self> = Arc::downgrade(self);
        let target = self.target_id.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Some(proxy) = proxy.upgrade() else { break };
                        proxy.handle_status(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("{} missed {} status events", target, missed);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.status_task.lock().replace(handle) {
            previous.abort();
        }
    }

    async fn capabilities(&self) -> Result<Capabilities> {
        if let Some(caps) = self.shared.inner.lock().capabilities {
            return Ok(caps);
        }

        let caps = match self.shared.sink.capabilities(&self.target_id).await {
            Ok(caps) => caps,
            Err(e) => {
                if e == SinkError::Unavailable {
                    let mut inner = self.shared.inner.lock();
                    inner.available = false;
                    self.shared.publish(&inner);
                }
                return Err(ControlError::from_sink(&self.target_id, e));
            }
        };

        let mut inner = self.shared.inner.lock();
        inner.capabilities = Some(caps);
        if !caps.supports_brightness && !inner.brightness_degraded {
            warn!("{} has no brightness control, using on/off only", self.target_id);
            inner.brightness_degraded = true;
        }
        Ok(caps)
    }

    fn mark_degraded(&self) {
        let mut inner = self.shared.inner.lock();
        if !inner.brightness_degraded {
            warn!("{} rejected brightness, using on/off only", self.target_id);
            inner.brightness_degraded = true;
        }
    }

    /// On/off fallback for fixtures without brightness control
    async fn power_only(
        &self,
        on: bool,
        transition: Option<Duration>,
        caps: &Capabilities,
        wanted_brightness: bool,
    ) -> Result<()> {
        let passthrough = transition.filter(|_| caps.supports_transition);
        self.shared
            .write(Write::Power(on), passthrough)
            .await
            .map_err(|e| ControlError::from_sink(&self.target_id, e))?;

        let report = {
            let mut inner = self.shared.inner.lock();
            if on {
                inner.set_on(255);
            } else {
                inner.state = LightState::Off;
            }
            self.shared.publish(&inner);

            let report = wanted_brightness && !inner.degradation_reported;
            if report {
                inner.degradation_reported = true;
            }
            report
        };

        if report {
            return Err(ControlError::UnsupportedCapability {
                target: self.target_id.clone(),
                capability: Capability::Brightness,
            });
        }
        Ok(())
    }

    async fn switch_off(
        &self,
        gate: &mut Option<TweenHandle>,
        transition: Option<Duration>,
        caps: &Capabilities,
        via_brightness: bool,
    ) -> Result<()> {
        let degraded = self.shared.inner.lock().brightness_degraded;
        let write = if via_brightness && !degraded {
            Write::Brightness(0)
        } else {
            Write::Power(false)
        };

        let result = match transition {
            Some(duration) if !caps.supports_transition && !degraded => {
                let from = self.tween_origin();
                self.start_tween(gate, from, 0, duration, !via_brightness)
                    .await
            }
            _ => {
                let passthrough = transition.filter(|_| caps.supports_transition);
                self.shared.write(write, passthrough).await
            }
        };
        result.map_err(|e| ControlError::from_sink(&self.target_id, e))?;

        let mut inner = self.shared.inner.lock();
        inner.state = LightState::Off;
        self.shared.publish(&inner);
        debug!("{} off", self.target_id);
        Ok(())
    }

    /// Actual value a transition starts from.
    ///
    /// The last level that reached the fixture wins over the recorded state,
    /// which already reads Off while a fade-out is still running.
    fn tween_origin(&self) -> u8 {
        let inner = self.shared.inner.lock();
        match (inner.last_written_actual, inner.state) {
            (Some(actual), _) => actual,
            (None, LightState::On { brightness }) => self.calibration.load().to_actual(brightness),
            (None, _) => 0,
        }
    }

    /// Write the first step now, schedule the rest.
    ///
    /// Only the first step's failure reaches the caller.
    async fn start_tween(
        &self,
        gate: &mut Option<TweenHandle>,
        from: u8,
        to: u8,
        duration: Duration,
        finish_off: bool,
    ) -> std::result::Result<(), SinkError> {
        let plan = TweenPlan::linear(
            from,
            to,
            duration,
            self.settings.tween_step_interval(),
            self.settings.tween_max_steps,
        );

        if plan.is_single_step() {
            let write = if finish_off {
                Write::Power(false)
            } else {
                Write::Brightness(to)
            };
            return self.shared.write(write, None).await;
        }

        let mut steps = plan.steps.into_iter();
        let first = steps.next().unwrap_or(to);
        let rest: Vec<u8> = steps.collect();
        self.shared.write(Write::Brightness(first), None).await?;

        debug!(
            "{}: emulating transition {} -> {} in {} more steps",
            self.target_id,
            first,
            to,
            rest.len()
        );
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(shared.run_tween(rest, plan.interval, finish_off));
        *gate = Some(TweenHandle::new(handle));
        Ok(())
    }
}

impl Drop for ProxyController {
    fn drop(&mut self) {
        if let Some(task) = self.status_task.get_mut().take() {
            task.abort();
        }
        if let Some(tween) = self.command_gate.get_mut().take() {
            tween.abort();
        }
    }
}

impl std::fmt::Debug for ProxyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyController")
            .field("target_id", &self.target_id)
            .field("calibration", &self.calibration.load_full())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
