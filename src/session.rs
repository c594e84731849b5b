//! Agent session lifecycle and the per-session processing loop
//!
//! A `Session` binds one registered agent to its mailbox, its event
//! channel, and its lifecycle state. Each session is driven by exactly
//! one worker task (`run_session`): messages enqueued concurrently by
//! many producers are processed strictly in order, and the wrapped
//! capability is never re-entered — a slow or stateful foreign-framework
//! agent sees at most one in-flight turn.
//!
//! Suspension points (capability latency, human approval) pause only
//! the owning worker. Inbound mail keeps flowing into the mailbox and
//! every other session keeps processing.

use crate::capability::AgentCapability;
use crate::crypto::MessageSigner;
use crate::error::{Error, Result};
use crate::message::{AgentIdentity, Message};
use crate::policy::PolicyEngine;
use crate::router::Router;
use crate::supervision::{ActionRequest, ApprovalOutcome, SupervisionGate};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Buffer size for the per-session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Name reserved, wrapped agent not yet ready
    Registering,
    /// Processing normally
    Active,
    /// Worker paused awaiting a human decision
    Suspended,
    /// Deregistered; mailbox closed and drained
    Terminated,
}

/// Events published on a session's broadcast channel
///
/// This is both the transport-facing outgoing surface (approved
/// `Outgoing` frames to push to the agent's connection) and the
/// supervisor channel (`ApprovalRequested` / `ActionResolved`) and
/// error channel (`CapabilityError`) of the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// An approved action's message left this agent
    Outgoing(Message),
    /// An action awaits a human decision
    ApprovalRequested(ActionRequest),
    /// A supervised action reached a terminal outcome
    ActionResolved(ActionRequest),
    /// The wrapped capability failed during a turn
    CapabilityError { agent: String, error: String },
}

/// A live agent session
#[derive(Debug)]
pub struct Session {
    /// Identity of the registered agent
    pub identity: AgentIdentity,
    /// Peers this agent may address directly; empty means everyone
    pub can_contact: Vec<String>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Current state
    state: Arc<RwLock<SessionState>>,
    /// Mailbox sender; taken on termination to close the mailbox
    mailbox: RwLock<Option<mpsc::Sender<Message>>>,
    /// Mailbox capacity, reported in backpressure errors
    capacity: usize,
    /// Per-session event channel
    events: broadcast::Sender<SessionEvent>,
    /// Last activity timestamp
    last_activity: Arc<RwLock<i64>>,
    /// Messages accepted into the mailbox
    message_count: Arc<RwLock<u64>>,
}

impl Session {
    /// Create a new session with a bounded mailbox.
    ///
    /// Returns the session and the receiving half of its mailbox,
    /// which the worker task consumes.
    pub fn new(
        identity: AgentIdentity,
        capacity: usize,
        can_contact: Vec<String>,
    ) -> (Self, mpsc::Receiver<Message>) {
        let now = chrono::Utc::now().timestamp_millis();
        let (tx, rx) = mpsc::channel(capacity);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let session = Self {
            identity,
            can_contact,
            created_at: now,
            state: Arc::new(RwLock::new(SessionState::Registering)),
            mailbox: RwLock::new(Some(tx)),
            capacity,
            events,
            last_activity: Arc::new(RwLock::new(now)),
            message_count: Arc::new(RwLock::new(0)),
        };
        (session, rx)
    }

    /// Get current state
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Set state
    pub async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }

    /// Whether this session can receive mail.
    ///
    /// Suspended counts as active: a gate wait pauses only the
    /// session's own worker, never inbound delivery.
    pub async fn is_active(&self) -> bool {
        matches!(
            self.state().await,
            SessionState::Active | SessionState::Suspended
        )
    }

    /// Append a message to the mailbox without blocking.
    ///
    /// Fails with `MailboxFull` when the bounded mailbox is at
    /// capacity (backpressure) and `UnknownAgent` once the session
    /// has been terminated.
    pub async fn enqueue(&self, message: Message) -> Result<()> {
        let result = {
            let guard = self.mailbox.read().await;
            let tx = guard
                .as_ref()
                .ok_or_else(|| Error::UnknownAgent(self.identity.name.clone()))?;
            tx.try_send(message)
        };

        match result {
            Ok(()) => {
                self.touch().await;
                *self.message_count.write().await += 1;
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(Error::MailboxFull {
                agent: self.identity.name.clone(),
                capacity: self.capacity,
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::UnknownAgent(self.identity.name.clone()))
            }
        }
    }

    /// Subscribe to this session's event stream.
    ///
    /// Consumers that fall behind see `RecvError::Lagged` and can skip
    /// to the latest events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Update last activity
    pub async fn touch(&self) {
        *self.last_activity.write().await = chrono::Utc::now().timestamp_millis();
    }

    /// Get last activity timestamp
    pub async fn last_activity(&self) -> i64 {
        *self.last_activity.read().await
    }

    /// Messages accepted into the mailbox so far
    pub async fn message_count(&self) -> u64 {
        *self.message_count.read().await
    }

    /// Close the mailbox; queued mail is discarded by the exiting worker.
    pub(crate) async fn close_mailbox(&self) {
        self.mailbox.write().await.take();
    }

    /// Publish an event; no subscribers is fine.
    pub(crate) fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// The raw event sender, for the supervision gate.
    pub(crate) fn events(&self) -> &broadcast::Sender<SessionEvent> {
        &self.events
    }
}

/// Shared services a session worker needs
pub(crate) struct SessionContext {
    pub(crate) router: Arc<Router>,
    pub(crate) gate: Arc<SupervisionGate>,
    pub(crate) policies: Arc<PolicyEngine>,
    pub(crate) signer: Option<Arc<MessageSigner>>,
}

/// Per-session processing loop.
///
/// Dequeues messages in order, invokes the capability once per
/// message, and pushes each produced action through policies, the
/// supervision gate, and the router. Runs until the mailbox closes or
/// the session is terminated.
pub(crate) async fn run_session(
    session: Arc<Session>,
    capability: Arc<dyn AgentCapability>,
    mut rx: mpsc::Receiver<Message>,
    ctx: SessionContext,
) {
    let agent = session.identity.name.clone();

    while let Some(message) = rx.recv().await {
        if session.state().await == SessionState::Terminated {
            break;
        }

        if let Some(signer) = &ctx.signer {
            if !signer.verify(&message) {
                tracing::warn!(
                    agent = %agent,
                    message_id = %message.id,
                    "Dropping message that failed signature verification"
                );
                continue;
            }
        }

        session.touch().await;
        let incoming_id = message.id.clone();

        let actions = match capability.receive(message).await {
            Ok(actions) => actions,
            Err(e) => {
                let error = Error::Capability {
                    agent: agent.clone(),
                    reason: e.to_string(),
                };
                tracing::warn!(agent = %agent, error = %error, "Capability failed, turn skipped");
                session.publish(SessionEvent::CapabilityError {
                    agent: agent.clone(),
                    error: error.to_string(),
                });
                capability.on_error(&error).await;
                continue;
            }
        };

        for mut action in actions {
            if session.state().await == SessionState::Terminated {
                break;
            }

            // The session, not the capability, owns envelope provenance.
            action.message.from = agent.clone();
            if action.message.causation_id.is_none() {
                action.message.causation_id = Some(incoming_id.clone());
            }

            let violations = ctx.policies.evaluate(&action.message);
            if let Some(violation) = violations.first() {
                let error = Error::PolicyViolation {
                    policy: violation.policy.clone(),
                    reason: violation.reason.clone(),
                };
                tracing::warn!(agent = %agent, error = %error, "Action blocked by policy");
                capability.on_error(&error).await;
                capability
                    .on_action_result(&action, ApprovalOutcome::Rejected)
                    .await;
                continue;
            }

            let requires_approval = capability.requires_approval(&action);
            if requires_approval {
                session.set_state(SessionState::Suspended).await;
            }

            let request = ctx
                .gate
                .submit(&agent, &action, requires_approval, session.events())
                .await;

            if requires_approval && session.state().await == SessionState::Suspended {
                session.set_state(SessionState::Active).await;
                session.publish(SessionEvent::ActionResolved(request.clone()));
            }

            if request.outcome.is_approved() {
                match ctx.router.route(action.message.clone()).await {
                    Ok(delivery) => {
                        tracing::debug!(
                            agent = %agent,
                            message_id = %action.message.id,
                            delivered = delivery.delivered_to.len(),
                            redirected = delivery.redirected,
                            "Action delivered"
                        );
                        session.publish(SessionEvent::Outgoing(action.message.clone()));
                        capability
                            .on_action_result(&action, ApprovalOutcome::Approved)
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!(agent = %agent, error = %e, "Delivery failed");
                        capability.on_error(&e).await;
                        capability
                            .on_action_result(&action, ApprovalOutcome::Rejected)
                            .await;
                    }
                }
            } else {
                tracing::info!(
                    agent = %agent,
                    request_id = %request.id,
                    outcome = ?request.outcome,
                    "Action not approved"
                );
                if request.outcome == ApprovalOutcome::TimedOut {
                    capability
                        .on_error(&Error::ApprovalTimedOut(request.id.clone()))
                        .await;
                }
                capability.on_action_result(&action, request.outcome).await;
            }
        }

        if session.state().await == SessionState::Terminated {
            break;
        }
    }

    tracing::debug!(agent = %agent, "Session worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(capacity: usize) -> (Session, mpsc::Receiver<Message>) {
        Session::new(AgentIdentity::new("alice", "test"), capacity, Vec::new())
    }

    #[tokio::test]
    async fn test_session_starts_registering() {
        let (session, _rx) = make_session(8);
        assert_eq!(session.state().await, SessionState::Registering);
        assert!(!session.is_active().await);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (session, _rx) = make_session(8);

        session.set_state(SessionState::Active).await;
        assert!(session.is_active().await);

        session.set_state(SessionState::Suspended).await;
        assert!(session.is_active().await);

        session.set_state(SessionState::Terminated).await;
        assert!(!session.is_active().await);
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order() {
        let (session, mut rx) = make_session(8);

        for i in 0..5 {
            session
                .enqueue(Message::direct("x", "alice", serde_json::json!(i)))
                .await
                .unwrap();
        }

        for i in 0..5 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.payload, serde_json::json!(i));
        }
        assert_eq!(session.message_count().await, 5);
    }

    #[tokio::test]
    async fn test_enqueue_full_mailbox() {
        let (session, _rx) = make_session(2);

        session
            .enqueue(Message::direct("x", "alice", serde_json::json!(1)))
            .await
            .unwrap();
        session
            .enqueue(Message::direct("x", "alice", serde_json::json!(2)))
            .await
            .unwrap();

        let err = session
            .enqueue(Message::direct("x", "alice", serde_json::json!(3)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MailboxFull { capacity: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_enqueue_after_close() {
        let (session, _rx) = make_session(8);
        session.close_mailbox().await;

        let err = session
            .enqueue(Message::direct("x", "alice", serde_json::json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAgent(_)));
    }

    #[tokio::test]
    async fn test_close_ends_worker_receive() {
        let (session, mut rx) = make_session(8);
        session.close_mailbox().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_receives_published_events() {
        let (session, _rx) = make_session(8);
        let mut events = session.subscribe();

        let msg = Message::direct("alice", "bob", serde_json::json!("out"));
        session.publish(SessionEvent::Outgoing(msg.clone()));

        let event = events.recv().await.unwrap();
        let SessionEvent::Outgoing(received) = event else {
            panic!("expected Outgoing");
        };
        assert_eq!(received.id, msg.id);
    }

    #[tokio::test]
    async fn test_touch_updates_activity() {
        let (session, _rx) = make_session(8);
        let before = session.last_activity().await;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        session.touch().await;

        assert!(session.last_activity().await >= before);
    }
}
