//! Human-in-the-loop supervision of agent actions
//!
//! When a capability classifies one of its actions as requiring
//! approval, the `SupervisionGate` publishes an `ActionRequest` on the
//! owning session's event channel and suspends only that session's
//! pipeline until a decision arrives or the configured timeout elapses.
//! Unrelated sessions keep processing throughout.
//!
//! The gate is a generic choke point, not a policy engine: the decision
//! of *which* actions need approval belongs to the capability.

use crate::capability::AgentAction;
use crate::error::{Error, Result};
use crate::message::now_millis;
use crate::session::SessionEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, RwLock};
use tokio::time::{timeout, Duration};

/// Default timeout for human approval (seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Outcome of a supervised action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// Awaiting a human decision
    #[default]
    Pending,
    /// Human approved the action
    Approved,
    /// Human rejected the action
    Rejected,
    /// No decision arrived before the timeout
    TimedOut,
}

impl ApprovalOutcome {
    /// Whether the action may proceed
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// A supervised action awaiting (or past) a human decision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// Request identifier — matches the emitting action's id
    pub id: String,
    /// Name of the agent that emitted the action
    pub agent: String,
    /// Human-readable description of what is being approved
    pub description: String,
    /// Whether a human decision was required at all
    pub requires_approval: bool,
    /// Current outcome
    pub outcome: ApprovalOutcome,
    /// Unix timestamp (milliseconds) when the request was created
    pub created_at: u64,
    /// How long the decision took (milliseconds)
    pub response_time_ms: u64,
}

/// Configuration for the supervision gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupervisionConfig {
    /// Whether supervision is enabled at all
    pub enabled: bool,
    /// Timeout in seconds for approval requests
    pub timeout_secs: u64,
    /// Outcome applied when a pending request is cancelled
    /// (e.g. the responder is dropped during shutdown)
    pub timeout_action: ApprovalOutcome,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            timeout_action: ApprovalOutcome::Rejected,
        }
    }
}

/// A pending approval with its decision channel
struct PendingApproval {
    request: ActionRequest,
    responder: oneshot::Sender<ApprovalOutcome>,
}

/// Choke point enforcing human approval on flagged actions
///
/// Tracks pending approvals and matches incoming decisions to
/// outstanding requests. Thread-safe; shared by all session workers.
pub struct SupervisionGate {
    /// Pending approvals keyed by request ID
    pending: Arc<RwLock<HashMap<String, PendingApproval>>>,
    config: SupervisionConfig,
}

impl SupervisionGate {
    /// Create a new gate
    pub fn new(config: SupervisionConfig) -> Self {
        Self {
            pending: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Submit an action for approval, returning the terminal request.
    ///
    /// Actions that do not require approval (or when the gate is
    /// disabled) resolve immediately to `Approved` and never enter the
    /// pending table. Otherwise the request is published on the owning
    /// session's event channel and this call blocks — suspending only
    /// the calling session's worker — until a decision or timeout.
    pub async fn submit(
        &self,
        agent: &str,
        action: &AgentAction,
        requires_approval: bool,
        events: &broadcast::Sender<SessionEvent>,
    ) -> ActionRequest {
        let mut request = ActionRequest {
            id: action.id.clone(),
            agent: agent.to_string(),
            description: action.description.clone(),
            requires_approval,
            outcome: ApprovalOutcome::Pending,
            created_at: now_millis(),
            response_time_ms: 0,
        };

        if !self.config.enabled || !requires_approval {
            request.outcome = ApprovalOutcome::Approved;
            return request;
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.write().await;
            pending.insert(
                request.id.clone(),
                PendingApproval {
                    request: request.clone(),
                    responder: tx,
                },
            );
        }

        // Notify the supervisor channel; no subscribers is fine,
        // the request stays discoverable via pending_for().
        let _ = events.send(SessionEvent::ApprovalRequested(request.clone()));

        tracing::info!(
            agent = agent,
            request_id = %request.id,
            timeout_secs = self.config.timeout_secs,
            "Awaiting human approval"
        );

        let start = tokio::time::Instant::now();
        let outcome = match timeout(Duration::from_secs(self.config.timeout_secs), rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                // Responder dropped without a decision (cancellation)
                self.config.timeout_action
            }
            Err(_) => {
                tracing::warn!(
                    agent = agent,
                    request_id = %request.id,
                    "Approval request timed out"
                );
                ApprovalOutcome::TimedOut
            }
        };

        self.pending.write().await.remove(&request.id);

        request.outcome = outcome;
        request.response_time_ms = start.elapsed().as_millis() as u64;
        request
    }

    /// Resolve a pending approval.
    ///
    /// Fails with `UnknownApproval` if the request does not exist or
    /// has already reached a terminal outcome (including `TimedOut` —
    /// a timed-out request can never be approved afterward).
    pub async fn decide(&self, request_id: &str, approved: bool) -> Result<()> {
        let entry = self.pending.write().await.remove(request_id);
        match entry {
            Some(pending) => {
                let outcome = if approved {
                    ApprovalOutcome::Approved
                } else {
                    ApprovalOutcome::Rejected
                };
                tracing::info!(
                    request_id = request_id,
                    agent = %pending.request.agent,
                    outcome = ?outcome,
                    "Approval decided"
                );
                let _ = pending.responder.send(outcome);
                Ok(())
            }
            None => Err(Error::UnknownApproval(request_id.to_string())),
        }
    }

    /// Pending approvals for one agent
    pub async fn pending_for(&self, agent: &str) -> Vec<ActionRequest> {
        self.pending
            .read()
            .await
            .values()
            .filter(|p| p.request.agent == agent)
            .map(|p| p.request.clone())
            .collect()
    }

    /// Force-resolve all pending approvals for an agent with `TimedOut`.
    ///
    /// Used on deregistration so a suspended worker unblocks promptly.
    /// Returns the number of requests cancelled.
    pub async fn cancel_agent(&self, agent: &str) -> usize {
        let mut pending = self.pending.write().await;
        let ids: Vec<String> = pending
            .iter()
            .filter(|(_, p)| p.request.agent == agent)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &ids {
            if let Some(p) = pending.remove(id) {
                let _ = p.responder.send(ApprovalOutcome::TimedOut);
            }
        }

        if !ids.is_empty() {
            tracing::info!(agent = agent, count = ids.len(), "Cancelled pending approvals");
        }
        ids.len()
    }

    /// Cancel all pending approvals (shutdown path)
    pub async fn cancel_all(&self) {
        let mut pending = self.pending.write().await;
        let count = pending.len();
        for (_, p) in pending.drain() {
            let _ = p.responder.send(ApprovalOutcome::TimedOut);
        }
        if count > 0 {
            tracing::info!(count = count, "Cancelled all pending approvals");
        }
    }

    /// Number of pending approvals
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }
}

impl Default for SupervisionGate {
    fn default() -> Self {
        Self::new(SupervisionConfig::default())
    }
}
