//! Message routing under the active topology
//!
//! The router resolves a message's destination set, enforces topology
//! and contact rules, and delivers into target mailboxes via
//! `Session::enqueue`. Delivery is fire-and-forget from the sender's
//! perspective: the router never waits for a target to process.

use crate::crypto::MessageSigner;
use crate::error::{Error, Result};
use crate::message::{AgentIdentity, Message, Recipient, ORIGINAL_RECIPIENT_KEY};
use crate::registry::Registry;
use crate::topology::{Topology, ViolationPolicy};
use std::sync::Arc;

/// Outcome of a routing call
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Identities the message was enqueued to
    pub delivered_to: Vec<AgentIdentity>,
    /// Whether the message was redirected to the coordinator
    pub redirected: bool,
}

/// Resolves destinations per the active topology and delivers
pub struct Router {
    registry: Arc<Registry>,
    topology: Topology,
    violation_policy: ViolationPolicy,
    signer: Option<Arc<MessageSigner>>,
}

impl Router {
    /// Create a router over a registry
    pub fn new(registry: Arc<Registry>, topology: Topology, violation_policy: ViolationPolicy) -> Self {
        Self {
            registry,
            topology,
            violation_policy,
            signer: None,
        }
    }

    /// Enable broker-side message signing
    pub fn with_signer(mut self, signer: Arc<MessageSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// The active topology
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Route a message to its destination set.
    ///
    /// Resolution:
    /// 1. Broadcast — peer-to-peer: every routable session except the
    ///    sender; centralized: only the coordinator, unless the sender
    ///    *is* the coordinator, whose broadcast fans out to all peers.
    /// 2. Direct — peer-to-peer: the named target (subject to the
    ///    sender's contact list); centralized: the coordinator may
    ///    address anyone, spokes may only address the coordinator —
    ///    other targets trigger the violation policy (redirect to the
    ///    coordinator with the intended recipient recorded in
    ///    metadata, or a hard `TopologyViolation`).
    pub async fn route(&self, mut message: Message) -> Result<Delivery> {
        if let Some(signer) = &self.signer {
            signer.sign(&mut message);
        }

        match message.to.clone() {
            Recipient::Broadcast => self.route_broadcast(message).await,
            Recipient::Agent { name } => self.route_direct(message, &name).await,
        }
    }

    async fn route_broadcast(&self, message: Message) -> Result<Delivery> {
        match &self.topology {
            Topology::PeerToPeer => Ok(Delivery {
                delivered_to: self.fan_out(&message).await,
                redirected: false,
            }),
            Topology::Centralized { coordinator } => {
                if self.topology.is_coordinator(&message.from) {
                    // The hub alone may fan out
                    Ok(Delivery {
                        delivered_to: self.fan_out(&message).await,
                        redirected: false,
                    })
                } else {
                    let delivered = self.deliver(coordinator, message).await?;
                    Ok(Delivery {
                        delivered_to: vec![delivered],
                        redirected: false,
                    })
                }
            }
        }
    }

    async fn route_direct(&self, mut message: Message, target: &str) -> Result<Delivery> {
        match &self.topology {
            Topology::PeerToPeer => {
                self.check_contact_list(&message.from, target).await?;
                let delivered = self.deliver(target, message).await?;
                Ok(Delivery {
                    delivered_to: vec![delivered],
                    redirected: false,
                })
            }
            Topology::Centralized { coordinator } => {
                if self.topology.is_coordinator(&message.from)
                    || self.topology.is_coordinator(target)
                {
                    let delivered = self.deliver(target, message).await?;
                    return Ok(Delivery {
                        delivered_to: vec![delivered],
                        redirected: false,
                    });
                }

                match self.violation_policy {
                    ViolationPolicy::Reject => Err(Error::TopologyViolation {
                        from: message.from,
                        to: target.to_string(),
                    }),
                    ViolationPolicy::Redirect => {
                        tracing::warn!(
                            from = %message.from,
                            target = target,
                            coordinator = %coordinator,
                            "Peer-addressed message redirected to coordinator"
                        );
                        message
                            .metadata
                            .insert(ORIGINAL_RECIPIENT_KEY.to_string(), target.to_string());
                        message.to = Recipient::agent(coordinator.clone());
                        let delivered = self.deliver(coordinator, message).await?;
                        Ok(Delivery {
                            delivered_to: vec![delivered],
                            redirected: true,
                        })
                    }
                }
            }
        }
    }

    /// Deliver to a single named session
    async fn deliver(&self, name: &str, message: Message) -> Result<AgentIdentity> {
        let session = self.registry.resolve(name).await?;
        session.enqueue(message).await?;
        Ok(session.identity.clone())
    }

    /// Deliver to every routable session except the sender.
    ///
    /// Per-target failures (a full mailbox, a session terminating
    /// mid-snapshot) are logged and skipped so one slow agent never
    /// sinks the whole fan-out.
    async fn fan_out(&self, message: &Message) -> Vec<AgentIdentity> {
        let mut delivered = Vec::new();
        for session in self.registry.active_sessions().await {
            if session.identity.name == message.from {
                continue;
            }
            match session.enqueue(message.clone()).await {
                Ok(()) => delivered.push(session.identity.clone()),
                Err(e) => {
                    tracing::warn!(
                        agent = %session.identity.name,
                        message_id = %message.id,
                        error = %e,
                        "Broadcast delivery skipped"
                    );
                }
            }
        }
        delivered
    }

    /// Enforce the sender's contact list, when it has one.
    ///
    /// Unregistered senders (e.g. transport-injected traffic) are not
    /// restricted.
    async fn check_contact_list(&self, from: &str, target: &str) -> Result<()> {
        let Ok(sender) = self.registry.resolve(from).await else {
            return Ok(());
        };
        if sender.can_contact.is_empty() || sender.can_contact.iter().any(|n| n == target) {
            return Ok(());
        }
        Err(Error::TopologyViolation {
            from: from.to_string(),
            to: target.to_string(),
        })
    }
}
