//! The behavioral contract any registrable agent must satisfy
//!
//! A capability is the adapter seam between the routing core and an
//! agent implementation — native or wrapped around a foreign agent
//! framework. The adapter's sole job is translating the framework's
//! own turn-taking model into one `receive` call per inbound message.
//! The core never inspects the adapted framework's internals.

use crate::error::{Error, Result};
use crate::message::Message;
use crate::supervision::ApprovalOutcome;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An outgoing action produced by a capability turn
///
/// Wraps the outbound message together with a human-readable
/// description shown in approval prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAction {
    /// Unique action identifier (act-<uuid>); doubles as the approval
    /// request id when the action is supervised
    pub id: String,
    /// What this action does, for the human supervisor
    pub description: String,
    /// The message to deliver if the action is approved
    pub message: Message,
}

impl AgentAction {
    /// Create an action that sends a message
    pub fn send(description: impl Into<String>, message: Message) -> Self {
        Self {
            id: format!("act-{}", uuid::Uuid::new_v4()),
            description: description.into(),
            message,
        }
    }
}

/// Contract for registrable agents
///
/// Implementations must be cheap to share (`Arc`) and safe to call
/// from the session worker task. `receive` is never re-entered for the
/// same session: the worker serializes turns even when messages queue
/// up concurrently.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    /// Process one inbound message and produce zero or more outgoing
    /// actions, in emission order.
    async fn receive(&self, message: Message) -> Result<Vec<AgentAction>>;

    /// Classify whether an action needs human approval.
    ///
    /// The capability owns this policy; the supervision gate is only
    /// the choke point that enforces it.
    fn requires_approval(&self, action: &AgentAction) -> bool;

    /// Called once after the session is registered, before it turns
    /// Active. Use this to acknowledge readiness.
    async fn on_registered(&self) {}

    /// Called with the terminal outcome of every emitted action.
    ///
    /// Rejected and timed-out actions arrive here as failed results;
    /// the capability may retry, ignore, or escalate. The gate never
    /// retries on its own.
    async fn on_action_result(&self, _action: &AgentAction, _outcome: ApprovalOutcome) {}

    /// Called when a turn or delivery fails on this session.
    async fn on_error(&self, _error: &Error) {}
}
