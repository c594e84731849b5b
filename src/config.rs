//! Team configuration

use crate::error::{Error, Result};
use crate::supervision::SupervisionConfig;
use crate::topology::{Topology, ViolationPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default mailbox capacity per session.
const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Configuration for a team of agent sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamConfig {
    /// Topology policy, selected at startup
    pub topology: Topology,

    /// What to do when a spoke addresses a peer under centralized mode
    pub violation_policy: ViolationPolicy,

    /// Bounded mailbox size per session
    pub mailbox_capacity: usize,

    /// Human supervision settings
    pub supervision: SupervisionConfig,

    /// Whether the default message policies are installed
    pub policies_enabled: bool,

    /// Shared secret enabling HMAC message signing when set
    pub secret_key: Option<String>,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            topology: Topology::default(),
            violation_policy: ViolationPolicy::default(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            supervision: SupervisionConfig::default(),
            policies_enabled: true,
            secret_key: None,
        }
    }
}

impl TeamConfig {
    /// Default configuration with a centralized topology
    pub fn centralized(coordinator: impl Into<String>) -> Self {
        Self {
            topology: Topology::centralized(coordinator),
            ..Default::default()
        }
    }

    /// Parse a configuration from YAML
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load a configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TeamConfig::default();
        assert_eq!(config.topology, Topology::PeerToPeer);
        assert_eq!(config.violation_policy, ViolationPolicy::Redirect);
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
        assert!(config.policies_enabled);
        assert!(config.supervision.enabled);
        assert!(config.secret_key.is_none());
    }

    #[test]
    fn test_centralized_constructor() {
        let config = TeamConfig::centralized("hub");
        assert!(config.topology.is_coordinator("hub"));
    }

    #[test]
    fn test_from_yaml() {
        let config = TeamConfig::from_yaml(
            r#"
topology:
  mode: centralized
  coordinator: hub
violationPolicy: reject
mailboxCapacity: 16
supervision:
  timeoutSecs: 30
policiesEnabled: false
secretKey: s3cret
"#,
        )
        .unwrap();

        assert!(config.topology.is_coordinator("hub"));
        assert_eq!(config.violation_policy, ViolationPolicy::Reject);
        assert_eq!(config.mailbox_capacity, 16);
        assert_eq!(config.supervision.timeout_secs, 30);
        // Unspecified supervision fields keep their defaults
        assert!(config.supervision.enabled);
        assert!(!config.policies_enabled);
        assert_eq!(config.secret_key.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_empty_yaml_is_defaults() {
        let config = TeamConfig::from_yaml("{}").unwrap();
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let err = TeamConfig::from_yaml("mailboxCapacity: not-a-number").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
