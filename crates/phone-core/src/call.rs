//! Call state and the single in-flight session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::SessionId;

/// Direction of a call relative to this endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

/// State of the (at most one) current call.
///
/// `Idle` is both the initial and the terminal-resting state: `Ended` and
/// `Failed` are transient and decay back to `Idle` after a short grace
/// period so observers can display the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CallState {
    Idle,
    /// Outbound call in progress, not yet answered.
    Calling,
    /// Inbound call ringing, awaiting answer or decline.
    Incoming,
    /// Call established.
    Active,
    /// Held by this endpoint.
    Held,
    /// Held by the remote party.
    RemoteHeld,
    /// Ended normally; decays to `Idle`.
    Ended { cause: String },
    /// Ended abnormally; decays to `Idle`.
    Failed { cause: String },
}

impl CallState {
    pub fn ended(cause: impl Into<String>) -> Self {
        Self::Ended {
            cause: cause.into(),
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self::Failed {
            cause: cause.into(),
        }
    }

    /// True for the transient terminal states that decay to `Idle`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended { .. } | Self::Failed { .. })
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Calling => write!(f, "Calling"),
            Self::Incoming => write!(f, "Incoming"),
            Self::Active => write!(f, "Active"),
            Self::Held => write!(f, "Held"),
            Self::RemoteHeld => write!(f, "RemoteHeld"),
            Self::Ended { cause } => write!(f, "Ended({cause})"),
            Self::Failed { cause } => write!(f, "Failed({cause})"),
        }
    }
}

/// The single in-flight call session.
///
/// Created when the transport reports a new session, cleared when the
/// transport reports it ended or failed. At most one exists at any time;
/// a second concurrent session is refused at the transport boundary and
/// never represented by this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    /// Transport-assigned handle.
    pub id: SessionId,
    pub direction: CallDirection,
    /// Remote party identity (SIP URI or display string).
    pub remote: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_flagged() {
        assert!(CallState::ended("Terminated").is_terminal());
        assert!(CallState::failed("dial-error").is_terminal());
        assert!(!CallState::Idle.is_terminal());
        assert!(!CallState::Active.is_terminal());
    }

    #[test]
    fn display_carries_the_cause() {
        assert_eq!(CallState::ended("Busy").to_string(), "Ended(Busy)");
        assert_eq!(CallState::Calling.to_string(), "Calling");
    }

    #[test]
    fn serializes_tagged_camel_case() {
        let json = serde_json::to_value(CallState::ended("Terminated")).unwrap();
        assert_eq!(json["state"], "ended");
        assert_eq!(json["cause"], "Terminated");

        let json = serde_json::to_value(CallState::RemoteHeld).unwrap();
        assert_eq!(json["state"], "remoteHeld");
    }
}
