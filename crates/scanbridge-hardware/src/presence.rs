//! Device presence state machine.
//!
//! One [`PresenceMachine`] tracks the logical scanner session. It is owned
//! by the watcher task; transitions are the only way to change its state.
//!
//! # States
//!
//! - `Disconnected`: no open device (initial state)
//! - `Connected`: a device was opened that was never seen before, or whose
//!   identity differs from the cached one
//! - `Reconnected`: the cached device came back
//!
//! # Valid Transitions
//!
//! - Disconnected → Connected / Reconnected
//! - Connected / Reconnected → Disconnected
//!
//! The cached identity survives disconnection so that the same physical
//! unit is recognized when it returns.
//!
//! # Examples
//!
//! ```
//! use scanbridge_hardware::presence::{ConnectionState, PresenceMachine};
//! use scanbridge_hardware::DeviceDescriptor;
//!
//! let scanner = DeviceDescriptor::new(0x0c2e, 0x0b61, "/dev/hidraw1").with_serial_number("SN1");
//! let mut machine = PresenceMachine::new();
//!
//! assert_eq!(machine.device_opened(&scanner).unwrap().to, ConnectionState::Connected);
//! machine.device_lost().unwrap();
//! assert_eq!(machine.device_opened(&scanner).unwrap().to, ConnectionState::Reconnected);
//! ```

use crate::error::{HardwareError, Result};
use crate::types::{DeviceDescriptor, DeviceIdentity};
use scanbridge_core::constants::MAX_PRESENCE_HISTORY;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Connection state of the logical scanner session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Reconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnected => "reconnected",
        };
        f.write_str(state_str)
    }
}

impl ConnectionState {
    #[must_use]
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        matches!(
            (self, target),
            (
                ConnectionState::Disconnected,
                ConnectionState::Connected | ConnectionState::Reconnected
            ) | (
                ConnectionState::Connected | ConnectionState::Reconnected,
                ConnectionState::Disconnected
            )
        )
    }

    /// Returns `true` for both connected states.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }
}

/// Record of a single presence transition.
#[derive(Debug, Clone)]
pub struct PresenceTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    /// Identity of the device involved.
    pub identity: Option<DeviceIdentity>,
    pub timestamp: Instant,
}

impl PresenceTransition {
    fn new(from: ConnectionState, to: ConnectionState, identity: Option<DeviceIdentity>) -> Self {
        Self {
            from,
            to,
            identity,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Presence state machine with bounded transition history.
#[derive(Debug)]
pub struct PresenceMachine {
    state: ConnectionState,
    state_entered_at: Instant,
    known_identity: Option<DeviceIdentity>,
    history: VecDeque<PresenceTransition>,
}

impl PresenceMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            state_entered_at: Instant::now(),
            known_identity: None,
            history: VecDeque::with_capacity(MAX_PRESENCE_HISTORY),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity of the last device that was connected, kept across
    /// disconnections.
    pub fn known_identity(&self) -> Option<&DeviceIdentity> {
        self.known_identity.as_ref()
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    pub fn history(&self) -> &VecDeque<PresenceTransition> {
        &self.history
    }

    /// The last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<PresenceTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// State a newly opened device would move the machine to.
    #[must_use]
    pub fn classify(&self, descriptor: &DeviceDescriptor) -> ConnectionState {
        if self.known_identity.as_ref() == Some(&descriptor.identity()) {
            ConnectionState::Reconnected
        } else {
            ConnectionState::Connected
        }
    }

    /// Record that `descriptor` was opened.
    ///
    /// # Errors
    /// Returns `HardwareError::InvalidTransition` unless the machine is
    /// `Disconnected`.
    pub fn device_opened(&mut self, descriptor: &DeviceDescriptor) -> Result<PresenceTransition> {
        let target = self.classify(descriptor);
        let identity = descriptor.identity();
        let transition = self.transition_to(target, Some(identity.clone()))?;
        self.known_identity = Some(identity);
        Ok(transition)
    }

    /// Record that the open device went away. The known identity is kept.
    ///
    /// # Errors
    /// Returns `HardwareError::InvalidTransition` if already `Disconnected`.
    pub fn device_lost(&mut self) -> Result<PresenceTransition> {
        let identity = self.known_identity.clone();
        self.transition_to(ConnectionState::Disconnected, identity)
    }

    fn transition_to(
        &mut self,
        new_state: ConnectionState,
        identity: Option<DeviceIdentity>,
    ) -> Result<PresenceTransition> {
        if !self.state.can_transition_to(&new_state) {
            return Err(HardwareError::InvalidTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = PresenceTransition::new(self.state, new_state, identity);
        self.state = new_state;
        self.state_entered_at = Instant::now();
        self.add_to_history(transition.clone());
        Ok(transition)
    }

    fn add_to_history(&mut self, transition: PresenceTransition) {
        self.history.push_back(transition);
        if self.history.len() > MAX_PRESENCE_HISTORY {
            self.history.pop_front();
        }
    }
}

impl Default for PresenceMachine {
    fn default() -> Self {
        Self::new()
    }
}
