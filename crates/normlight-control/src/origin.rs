//! Origin tokens and echo suppression
//!
//! Every write a proxy issues carries a fresh [`OriginToken`]. The proxy keeps
//! the writes it issued within the echo window in an [`EchoGuard`]; a status
//! event that matches one of them is a confirmation of the proxy's own write,
//! not an external change.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Marker attached to one outgoing write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginToken(Uuid);

impl OriginToken {
    /// Generate a fresh token
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OriginToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OriginToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the fixture should report once a write has landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedState {
    pub power: bool,
    /// `None` for pure power writes
    pub actual: Option<u8>,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    token: OriginToken,
    expected: ExpectedState,
    issued_at: Instant,
}

/// Bounded-lifetime record of a proxy's own outstanding writes
#[derive(Debug)]
pub struct EchoGuard {
    window: Duration,
    pending: VecDeque<PendingWrite>,
}

impl EchoGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: VecDeque::new(),
        }
    }

    /// Register a write about to be sent
    pub fn record(&mut self, token: OriginToken, expected: ExpectedState) {
        self.expire();
        self.pending.push_back(PendingWrite {
            token,
            expected,
            issued_at: Instant::now(),
        });
    }

    /// Forget a write the sink refused
    pub fn discard(&mut self, token: OriginToken) {
        self.pending.retain(|p| p.token != token);
    }

    /// Most recent outstanding write, if still inside the window
    pub fn latest(&self) -> Option<OriginToken> {
        let now = Instant::now();
        self.pending
            .back()
            .filter(|p| now.duration_since(p.issued_at) <= self.window)
            .map(|p| p.token)
    }

    /// Decide whether a status event is an echo of one of our writes.
    ///
    /// With a token the match is exact. Without one, the reported power and
    /// brightness must equal what a recent write asked for. A matched write
    /// and everything issued before it are retired.
    pub fn absorb(&mut self, origin: Option<OriginToken>, power: bool, actual: Option<u8>) -> bool {
        self.expire();

        let position = match origin {
            Some(token) => self.pending.iter().rposition(|p| p.token == token),
            None => self
                .pending
                .iter()
                .rposition(|p| Self::value_matches(&p.expected, power, actual)),
        };

        match position {
            Some(idx) => {
                self.pending.drain(..=idx);
                true
            }
            None => false,
        }
    }

    /// Number of writes still awaiting confirmation
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    fn value_matches(expected: &ExpectedState, power: bool, actual: Option<u8>) -> bool {
        if expected.power != power {
            return false;
        }
        if !power {
            return true;
        }
        match (expected.actual, actual) {
            (Some(want), Some(got)) => want == got,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }

    fn expire(&mut self) {
        let now = Instant::now();
        while let Some(front) = self.pending.front() {
            if now.duration_since(front.issued_at) > self.window {
                self.pending.pop_front();
            } else {
                break;
            }
        }
    }
}
