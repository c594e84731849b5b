//! Core message types for inter-agent communication
//!
//! All types use camelCase JSON serialization for wire compatibility.
//! The routing core treats `Message.payload` as opaque — it addresses
//! messages by `AgentIdentity.name` only and never inspects content.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Metadata key recording the originally intended recipient when a
/// message is redirected to the coordinator under centralized topology.
pub const ORIGINAL_RECIPIENT_KEY: &str = "originalRecipient";

/// Identity of a registered agent
///
/// `name` is unique within a registry and is the addressing key for
/// routing; `kind` describes what flavor of agent this is (e.g.
/// "dispatcher", "langgraph-adapter").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentity {
    /// Unique agent name, the routing address
    pub name: String,

    /// Agent kind/role label
    pub kind: String,
}

impl AgentIdentity {
    /// Create a new identity
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Addressing target of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Recipient {
    /// A single named agent
    Agent { name: String },
    /// All eligible sessions per the active topology
    Broadcast,
}

impl Recipient {
    /// Convenience constructor for a named recipient
    pub fn agent(name: impl Into<String>) -> Self {
        Self::Agent { name: name.into() }
    }

    /// The target name, if this is a direct recipient
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Agent { name } => Some(name),
            Self::Broadcast => None,
        }
    }
}

/// A single message exchanged between agents
///
/// Messages are immutable once routed. `causation_id` links a reply to
/// the message that triggered it and is used for ordering diagnostics
/// and supervision correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier (msg-<uuid>)
    pub id: String,

    /// Sender agent name
    pub from: String,

    /// Destination
    pub to: Recipient,

    /// Message payload — arbitrary JSON data, never inspected by the core
    pub payload: serde_json::Value,

    /// ID of the message this one was produced in response to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,

    /// Unix timestamp in milliseconds
    pub timestamp: u64,

    /// Optional key-value metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Base64 HMAC tag when message signing is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Message {
    /// Create a message addressed to a single agent
    pub fn direct(
        from: impl Into<String>,
        to: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            from: from.into(),
            to: Recipient::agent(to),
            payload,
            causation_id: None,
            timestamp: now_millis(),
            metadata: HashMap::new(),
            signature: None,
        }
    }

    /// Create a broadcast message
    pub fn broadcast(from: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            from: from.into(),
            to: Recipient::Broadcast,
            payload,
            causation_id: None,
            timestamp: now_millis(),
            metadata: HashMap::new(),
            signature: None,
        }
    }

    /// Link this message to the one that caused it
    pub fn caused_by(mut self, message_id: impl Into<String>) -> Self {
        self.causation_id = Some(message_id.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The originally intended recipient, if this message was redirected
    pub fn original_recipient(&self) -> Option<&str> {
        self.metadata.get(ORIGINAL_RECIPIENT_KEY).map(|s| s.as_str())
    }
}

/// Current time in Unix milliseconds
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
