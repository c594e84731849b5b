//! Error types for teamwire

use thiserror::Error;

/// Errors that can occur in the agent session and routing core
#[derive(Debug, Error)]
pub enum Error {
    /// An agent with this name is already registered
    #[error("Agent '{0}' is already registered")]
    DuplicateIdentity(String),

    /// No routable session with this name
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// The target session's mailbox is at capacity (backpressure)
    #[error("Mailbox full for agent '{agent}' (capacity {capacity})")]
    MailboxFull { agent: String, capacity: usize },

    /// The active topology forbids this sender/recipient pair
    #[error("Topology violation: '{from}' may not address '{to}' directly")]
    TopologyViolation { from: String, to: String },

    /// The wrapped agent failed while processing a turn
    #[error("Capability failure in agent '{agent}': {reason}")]
    Capability { agent: String, reason: String },

    /// A supervised action received no decision before the timeout
    #[error("Approval request '{0}' timed out")]
    ApprovalTimedOut(String),

    /// Decision targeted an unknown or already-resolved approval
    #[error("No pending approval with id '{0}'")]
    UnknownApproval(String),

    /// A message policy rejected an outgoing message
    #[error("Policy '{policy}' rejected message: {reason}")]
    PolicyViolation { policy: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for teamwire operations
pub type Result<T> = std::result::Result<T, Error>;
