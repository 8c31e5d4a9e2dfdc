//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state (transport connected, no handshake yet)
    Initial,

    /// `hello` handshake in flight
    Handshaking,

    /// SASL conversation in progress
    Authenticating,

    /// Idle (ready for a command)
    Idle,

    /// Command sent, awaiting the reply
    AwaitingReply,

    /// Closed
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Initial, Handshaking)
                | (Handshaking, Authenticating)
                | (Handshaking, Idle)
                | (Authenticating, Idle)
                | (Idle, AwaitingReply)
                | (AwaitingReply, Idle)
                | (_, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Handshaking => write!(f, "handshaking"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Idle => write!(f, "idle"),
            Self::AwaitingReply => write!(f, "awaiting_reply"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
