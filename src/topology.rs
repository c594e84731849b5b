//! Topology policies governing which sessions may address which peers
//!
//! A single topology is selected at team startup:
//!
//! - **PeerToPeer** — any session may address any other routable session
//!   directly by name.
//! - **Centralized** — all inter-agent traffic passes through one
//!   designated coordinator session; the coordinator alone may fan
//!   messages out to peers.

use serde::{Deserialize, Serialize};

/// Process-wide topology policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum Topology {
    /// Any session may address any other session directly
    #[default]
    PeerToPeer,
    /// All traffic flows through the named coordinator session
    Centralized {
        /// Name of the coordinator agent
        coordinator: String,
    },
}

impl Topology {
    /// Convenience constructor for centralized mode
    pub fn centralized(coordinator: impl Into<String>) -> Self {
        Self::Centralized {
            coordinator: coordinator.into(),
        }
    }

    /// The coordinator name, if centralized
    pub fn coordinator(&self) -> Option<&str> {
        match self {
            Self::Centralized { coordinator } => Some(coordinator),
            Self::PeerToPeer => None,
        }
    }

    /// Whether the named agent is the coordinator
    pub fn is_coordinator(&self, name: &str) -> bool {
        self.coordinator() == Some(name)
    }
}

/// What the router does when a non-coordinator addresses a peer
/// directly under centralized topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationPolicy {
    /// Redirect the message to the coordinator, recording the intended
    /// recipient in metadata
    #[default]
    Redirect,
    /// Fail the send with a topology violation error
    Reject,
}
