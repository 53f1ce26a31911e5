//! Connection lifecycle state record.
//!
//! All connection state, the attempt counter, and the intentional-close
//! flag live in one value transitioned by named operations. The
//! connection manager holds it behind a lock and acts on the returned
//! decisions; nothing here touches the transport or the clock.

use std::fmt;
use std::time::Duration;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Closing => write!(f, "CLOSING"),
        }
    }
}

/// Exponential backoff policy.
///
/// Growth is uncapped apart from the attempt ceiling; the delay saturates
/// at `Duration::MAX` instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay before the retry that follows `attempt` completed attempts:
    /// `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(5_000))
    }
}

/// What the manager must do after a transport closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectAction {
    /// Do nothing (intentional close, or exhaustion already reported).
    Stop,
    /// Schedule retry number `attempt` after `delay`.
    ScheduleRetry { attempt: u32, delay: Duration },
    /// Ceiling reached; notify the connection-failed subscriber once.
    Exhausted,
}

/// Connection lifecycle state machine.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
    intentionally_closed: bool,
    exhaustion_reported: bool,
}

impl Lifecycle {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
            intentionally_closed: false,
            exhaustion_reported: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn is_intentionally_closed(&self) -> bool {
        self.intentionally_closed
    }

    /// A connection attempt started.
    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// The transport opened: counter and flags reset.
    pub fn open(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.intentionally_closed = false;
        self.exhaustion_reported = false;
    }

    /// The transport closed or failed to open.
    pub fn on_disconnect(&mut self) -> DisconnectAction {
        self.state = ConnectionState::Disconnected;

        if self.intentionally_closed {
            return DisconnectAction::Stop;
        }

        if self.attempts < self.policy.max_attempts {
            return DisconnectAction::ScheduleRetry {
                attempt: self.attempts + 1,
                delay: self.policy.delay_for(self.attempts),
            };
        }

        if self.exhaustion_reported {
            DisconnectAction::Stop
        } else {
            self.exhaustion_reported = true;
            DisconnectAction::Exhausted
        }
    }

    /// A scheduled retry is starting. Returns the new attempt count.
    pub fn begin_retry(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// `close()` was called: suppress every pending and future retry.
    ///
    /// `transport_open` selects between `Closing` (a close handshake is
    /// under way) and `Disconnected`.
    pub fn close_intentionally(&mut self, transport_open: bool) {
        self.intentionally_closed = true;
        self.attempts = self.policy.max_attempts;
        self.state = if transport_open {
            ConnectionState::Closing
        } else {
            ConnectionState::Disconnected
        };
    }

    /// The transport released by `close()` has finished closing.
    pub fn finish_closing(&mut self) {
        if self.state == ConnectionState::Closing {
            self.state = ConnectionState::Disconnected;
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
