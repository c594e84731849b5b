//! The team facade wiring registry, router, gate, and policies
//!
//! `Team` is the transport-facing surface of the core: registration,
//! inbound enqueue, per-agent event subscriptions, and the human
//! decision endpoints. It owns the shared services and spawns one
//! worker task per registered session.

use crate::capability::AgentCapability;
use crate::config::TeamConfig;
use crate::crypto::MessageSigner;
use crate::error::Result;
use crate::message::{AgentIdentity, Message};
use crate::policy::PolicyEngine;
use crate::registry::Registry;
use crate::router::{Delivery, Router};
use crate::session::{run_session, Session, SessionContext, SessionEvent, SessionState};
use crate::supervision::{ActionRequest, SupervisionGate};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Per-registration options
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Peers this agent may address directly; empty means everyone
    pub can_contact: Vec<String>,
    /// Override the team-wide mailbox capacity for this session
    pub mailbox_capacity: Option<usize>,
}

/// A team of agent sessions sharing one registry, router, and gate
pub struct Team {
    config: TeamConfig,
    registry: Arc<Registry>,
    router: Arc<Router>,
    gate: Arc<SupervisionGate>,
    policies: Arc<PolicyEngine>,
    signer: Option<Arc<MessageSigner>>,
}

impl Team {
    /// Create a team from configuration
    pub fn new(config: TeamConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let signer = config
            .secret_key
            .as_ref()
            .map(|key| Arc::new(MessageSigner::new(key.as_bytes())));

        let mut router = Router::new(
            registry.clone(),
            config.topology.clone(),
            config.violation_policy,
        );
        if let Some(signer) = &signer {
            router = router.with_signer(signer.clone());
        }

        let policies = if config.policies_enabled {
            PolicyEngine::with_defaults()
        } else {
            PolicyEngine::empty()
        };

        Self {
            registry,
            router: Arc::new(router),
            gate: Arc::new(SupervisionGate::new(config.supervision.clone())),
            policies: Arc::new(policies),
            signer,
            config,
        }
    }

    /// The team configuration
    pub fn config(&self) -> &TeamConfig {
        &self.config
    }

    /// Register an agent with default options
    pub async fn register(
        &self,
        identity: AgentIdentity,
        capability: Arc<dyn AgentCapability>,
    ) -> Result<Arc<Session>> {
        self.register_with(identity, capability, RegisterOptions::default())
            .await
    }

    /// Register an agent, spawn its worker, and activate the session.
    ///
    /// The name is reserved first (`Registering`); the session turns
    /// `Active` — and becomes routable — only after the capability
    /// acknowledges readiness via `on_registered`.
    pub async fn register_with(
        &self,
        identity: AgentIdentity,
        capability: Arc<dyn AgentCapability>,
        options: RegisterOptions,
    ) -> Result<Arc<Session>> {
        let capacity = options
            .mailbox_capacity
            .unwrap_or(self.config.mailbox_capacity);
        let (session, rx) = self
            .registry
            .register(identity, capacity, options.can_contact)?;

        let ctx = SessionContext {
            router: self.router.clone(),
            gate: self.gate.clone(),
            policies: self.policies.clone(),
            signer: self.signer.clone(),
        };
        tokio::spawn(run_session(session.clone(), capability.clone(), rx, ctx));

        capability.on_registered().await;
        session.set_state(SessionState::Active).await;
        tracing::info!(agent = %session.identity.name, "Agent session active");

        Ok(session)
    }

    /// Deregister an agent. Idempotent.
    ///
    /// Terminates the session, discards its mailbox, and cancels its
    /// pending supervision waits so a suspended worker unblocks.
    pub async fn deregister(&self, name: &str) {
        if self.registry.deregister(name).await.is_some() {
            self.gate.cancel_agent(name).await;
            tracing::info!(agent = name, "Agent deregistered");
        }
    }

    /// Deliver an inbound message into an agent's mailbox.
    ///
    /// This is the transport-facing entry point: the message is signed
    /// (when signing is enabled) and enqueued without waiting for the
    /// target to process it.
    pub async fn enqueue(&self, name: &str, mut message: Message) -> Result<()> {
        if let Some(signer) = &self.signer {
            signer.sign(&mut message);
        }
        self.registry.resolve(name).await?.enqueue(message).await
    }

    /// Route a message per the active topology.
    ///
    /// What a coordinator-side transport uses to fan traffic out; the
    /// same path session workers take for approved actions.
    pub async fn deliver(&self, message: Message) -> Result<Delivery> {
        self.router.route(message).await
    }

    /// Subscribe to an agent's event stream: outgoing frames, approval
    /// requests and resolutions, and capability errors.
    pub async fn subscribe_outgoing(
        &self,
        name: &str,
    ) -> Result<broadcast::Receiver<SessionEvent>> {
        Ok(self.registry.resolve(name).await?.subscribe())
    }

    /// Pending approval requests for an agent
    pub async fn pending_approvals(&self, name: &str) -> Vec<ActionRequest> {
        self.gate.pending_for(name).await
    }

    /// Resolve a pending approval request
    pub async fn decide(&self, request_id: &str, approved: bool) -> Result<()> {
        self.gate.decide(request_id, approved).await
    }

    /// Snapshot of routable agent identities
    pub async fn list_active(&self) -> Vec<AgentIdentity> {
        self.registry.list_active().await
    }

    /// Number of sessions in the registry
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Terminate sessions idle longer than `max_idle_ms`.
    ///
    /// Returns how many sessions were cleaned up.
    pub async fn cleanup_inactive(&self, max_idle_ms: i64) -> usize {
        let now = chrono::Utc::now().timestamp_millis();
        let mut cleaned = 0;
        for session in self.registry.active_sessions().await {
            let idle = now - session.last_activity().await;
            if idle > max_idle_ms {
                self.deregister(&session.identity.name).await;
                cleaned += 1;
            }
        }
        if cleaned > 0 {
            tracing::info!(count = cleaned, "Cleaned up inactive sessions");
        }
        cleaned
    }

    /// Shut the team down: cancel pending approvals and terminate
    /// every session.
    pub async fn shutdown(&self) {
        self.gate.cancel_all().await;
        let removed = self.registry.clear().await;
        tracing::info!(sessions = removed, "Team shut down");
    }
}

impl Default for Team {
    fn default() -> Self {
        Self::new(TeamConfig::default())
    }
}
