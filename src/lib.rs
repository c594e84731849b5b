//! # teamwire
//!
//! Agent team sessions, message routing, and human-supervised actions
//! for multi-agent systems.
//!
//! ## Overview
//!
//! `teamwire` lets independently-built conversational agents — native
//! or adapted from foreign agent frameworks — register into a shared
//! team, exchange messages under a topology policy, and have flagged
//! actions paused for human approval before they take effect.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Team                              │
//! │  ┌──────────┐   ┌───────────────────────────────────────┐  │
//! │  │ Registry │   │ Session "alice"                        │  │
//! │  │  alice ──┼──▶│  mailbox ─▶ worker ─▶ AgentCapability │  │
//! │  │  bob     │   │                │ actions               │  │
//! │  │  hub     │   │                ▼                       │  │
//! │  └──────────┘   │         PolicyEngine                   │  │
//! │                 │                ▼                       │  │
//! │                 │        SupervisionGate ◀── decide()    │  │
//! │                 │                ▼ approved              │  │
//! │                 │             Router ── Topology ──▶ ────┼──▶ peer mailboxes
//! │                 └───────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use teamwire::{AgentAction, AgentCapability, AgentIdentity, Message, Team};
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl AgentCapability for Echo {
//!     async fn receive(&self, message: Message) -> teamwire::Result<Vec<AgentAction>> {
//!         let reply = Message::direct("", message.from.clone(), message.payload.clone());
//!         Ok(vec![AgentAction::send("echo back", reply)])
//!     }
//!
//!     fn requires_approval(&self, _action: &AgentAction) -> bool {
//!         false
//!     }
//! }
//!
//! # async fn example() -> teamwire::Result<()> {
//! let team = Team::default();
//! team.register(AgentIdentity::new("alice", "echo"), Arc::new(Echo)).await?;
//! team.enqueue("alice", Message::direct("user", "alice", serde_json::json!("hi"))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **AgentCapability** trait — the contract any registrable agent
//!   (or framework adapter) must satisfy
//! - **Session** — one registered agent: bounded mailbox, event
//!   channel, lifecycle state, and a single worker task
//! - **Registry** — process-wide table of live sessions, the source of
//!   truth for who is reachable
//! - **Router** + **Topology** — destination resolution: peer-to-peer
//!   or centralized through a coordinator
//! - **SupervisionGate** — human approval choke point; suspends only
//!   the emitting session
//! - **PolicyEngine** — outgoing-message guards (length, loops, rate)
//! - **Team** — the facade wiring it all together
//!
//! One slow or awaiting-approval agent never stalls delivery to, or
//! processing by, any other agent.

pub mod capability;
pub mod config;
pub mod crypto;
pub mod error;
pub mod message;
pub mod policy;
pub mod registry;
pub mod router;
pub mod session;
pub mod supervision;
pub mod team;
pub mod topology;

// Re-export core types
pub use capability::{AgentAction, AgentCapability};
pub use config::TeamConfig;
pub use crypto::MessageSigner;
pub use error::{Error, Result};
pub use message::{AgentIdentity, Message, Recipient, ORIGINAL_RECIPIENT_KEY};
pub use policy::{MessagePolicy, PolicyEngine, PolicyViolation};
pub use registry::Registry;
pub use router::{Delivery, Router};
pub use session::{Session, SessionEvent, SessionState};
pub use supervision::{ActionRequest, ApprovalOutcome, SupervisionConfig, SupervisionGate};
pub use team::{RegisterOptions, Team};
pub use topology::{Topology, ViolationPolicy};
