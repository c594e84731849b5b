//! Process-wide table of active agent sessions
//!
//! The registry is the single source of truth for who exists and is
//! reachable. Mutations are serialized per name through the concurrent
//! map's entry API, so two concurrent registrations can never race on
//! the same name.

use crate::error::{Error, Result};
use crate::message::{AgentIdentity, Message};
use crate::session::{Session, SessionState};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Table of live sessions indexed by agent name
pub struct Registry {
    sessions: DashMap<String, Arc<Session>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Reserve a name and create its session.
    ///
    /// The new session starts in `Registering`; the caller flips it to
    /// `Active` once the wrapped agent acknowledges readiness. Fails
    /// with `DuplicateIdentity` if the name is already present.
    pub fn register(
        &self,
        identity: AgentIdentity,
        mailbox_capacity: usize,
        can_contact: Vec<String>,
    ) -> Result<(Arc<Session>, mpsc::Receiver<Message>)> {
        match self.sessions.entry(identity.name.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateIdentity(identity.name)),
            Entry::Vacant(slot) => {
                let (session, rx) = Session::new(identity, mailbox_capacity, can_contact);
                let session = Arc::new(session);
                slot.insert(session.clone());
                tracing::info!(
                    agent = %session.identity.name,
                    kind = %session.identity.kind,
                    "Registered agent session"
                );
                Ok((session, rx))
            }
        }
    }

    /// Remove a session, terminating it.
    ///
    /// Idempotent: deregistering an unknown name is a no-op. Returns
    /// the removed session so the caller can cancel its pending
    /// supervision waits.
    pub async fn deregister(&self, name: &str) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(name)?;
        session.set_state(SessionState::Terminated).await;
        session.close_mailbox().await;
        tracing::info!(agent = name, "Deregistered agent session");
        Some(session)
    }

    /// Resolve a name to a routable session.
    ///
    /// Fails with `UnknownAgent` if the name is absent or the session
    /// is not active.
    pub async fn resolve(&self, name: &str) -> Result<Arc<Session>> {
        let session = self
            .sessions
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::UnknownAgent(name.to_string()))?;
        if !session.is_active().await {
            return Err(Error::UnknownAgent(name.to_string()));
        }
        Ok(session)
    }

    /// Snapshot of all routable sessions.
    ///
    /// May be stale immediately after return; callers must tolerate
    /// registration/deregistration races.
    pub async fn active_sessions(&self) -> Vec<Arc<Session>> {
        let sessions: Vec<Arc<Session>> =
            { self.sessions.iter().map(|r| r.value().clone()).collect() };
        let mut active = Vec::new();
        for session in sessions {
            if session.is_active().await {
                active.push(session);
            }
        }
        active
    }

    /// Snapshot of routable agent identities
    pub async fn list_active(&self) -> Vec<AgentIdentity> {
        self.active_sessions()
            .await
            .into_iter()
            .map(|s| s.identity.clone())
            .collect()
    }

    /// Number of sessions in the table (any state)
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Deregister every session; returns how many were removed.
    pub async fn clear(&self) -> usize {
        let names: Vec<String> = self.sessions.iter().map(|r| r.key().clone()).collect();
        let removed = futures::future::join_all(names.iter().map(|name| self.deregister(name)));
        removed.await.into_iter().flatten().count()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> AgentIdentity {
        AgentIdentity::new(name, "test")
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = Registry::new();
        let (session, _rx) = registry.register(identity("alice"), 8, Vec::new()).unwrap();

        // Registering sessions are not yet routable
        assert!(registry.resolve("alice").await.is_err());

        session.set_state(SessionState::Active).await;
        let resolved = registry.resolve("alice").await.unwrap();
        assert_eq!(resolved.identity.name, "alice");
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = Registry::new();
        let (session, _rx) = registry.register(identity("alice"), 8, Vec::new()).unwrap();
        session.set_state(SessionState::Active).await;

        let err = registry
            .register(identity("alice"), 8, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(name) if name == "alice"));

        // The existing session is untouched
        assert!(registry.resolve("alice").await.is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown() {
        let registry = Registry::new();
        let err = registry.resolve("ghost").await.unwrap_err();
        assert!(matches!(err, Error::UnknownAgent(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let registry = Registry::new();
        let (session, _rx) = registry.register(identity("alice"), 8, Vec::new()).unwrap();
        session.set_state(SessionState::Active).await;

        let removed = registry.deregister("alice").await.unwrap();
        assert_eq!(removed.state().await, SessionState::Terminated);
        assert!(registry.deregister("alice").await.is_none());
        assert!(registry.resolve("alice").await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_list_active_snapshot() {
        let registry = Registry::new();
        for name in ["alice", "bob", "carol"] {
            let (session, _rx) = registry.register(identity(name), 8, Vec::new()).unwrap();
            session.set_state(SessionState::Active).await;
            // Leak the receiver so the mailbox stays open for the test
            std::mem::forget(_rx);
        }

        let mut names: Vec<String> = registry
            .list_active()
            .await
            .into_iter()
            .map(|i| i.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["alice", "bob", "carol"]);

        registry.deregister("bob").await;
        assert_eq!(registry.list_active().await.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let registry = Arc::new(Registry::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.register(identity("alice"), 8, Vec::new()).is_ok()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_terminates_everything() {
        let registry = Registry::new();
        for name in ["a", "b"] {
            let (session, rx) = registry.register(identity(name), 8, Vec::new()).unwrap();
            session.set_state(SessionState::Active).await;
            std::mem::forget(rx);
        }

        assert_eq!(registry.clear().await, 2);
        assert!(registry.is_empty());
    }
}
