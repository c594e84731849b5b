//! Message policies applied to outgoing actions
//!
//! Policies run on the session worker path after a capability emits an
//! action and before the supervision gate. A violation blocks only that
//! action; it is logged and reported back to the emitting capability as
//! a failed result.
//!
//! The default set guards against the failure modes of unattended
//! agent-to-agent chatter: unbounded payloads, repetitive message
//! loops, and runaway send rates.

use crate::message::{Message, Recipient};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Maximum serialized payload size accepted by the default length policy.
const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4000;
/// Identical sends to the same recipient allowed inside the loop window.
const DEFAULT_MAX_REPEATS: usize = 3;
/// Sliding window for loop detection (seconds).
const DEFAULT_LOOP_WINDOW_SECS: u64 = 300;
/// Maximum messages per sender per minute.
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 30;

/// A policy rejection with the reason reported back to the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    /// Name of the violated policy
    pub policy: String,
    /// Why the message was rejected
    pub reason: String,
}

/// A single message policy
pub trait MessagePolicy: Send + Sync {
    /// Policy name, used in violation reports
    fn name(&self) -> &str;

    /// Check a message; `None` means the message passes.
    fn check(&self, message: &Message) -> Option<PolicyViolation>;
}

/// Rejects messages whose serialized payload exceeds a byte cap
pub struct MessageLengthPolicy {
    max_bytes: usize,
}

impl MessageLengthPolicy {
    /// Create a length policy with an explicit cap
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for MessageLengthPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

impl MessagePolicy for MessageLengthPolicy {
    fn name(&self) -> &str {
        "message_length"
    }

    fn check(&self, message: &Message) -> Option<PolicyViolation> {
        let size = message.payload.to_string().len();
        if size > self.max_bytes {
            return Some(PolicyViolation {
                policy: self.name().to_string(),
                reason: format!(
                    "payload is {} bytes, cap is {} bytes",
                    size, self.max_bytes
                ),
            });
        }
        None
    }
}

/// Detects a sender repeating the same payload to the same recipient
///
/// Keeps a sliding window of payload hashes per (sender, recipient)
/// pair. Once the identical payload has gone out `max_repeats` times
/// inside the window, further copies are rejected. Blocked sends are
/// not recorded — only traffic that actually went out counts.
pub struct AntiLoopPolicy {
    max_repeats: usize,
    window_secs: u64,
    recent: Mutex<HashMap<String, VecDeque<(u64, u64)>>>,
}

impl AntiLoopPolicy {
    /// Create a loop policy with explicit thresholds
    pub fn new(max_repeats: usize, window_secs: u64) -> Self {
        Self {
            max_repeats,
            window_secs,
            recent: Mutex::new(HashMap::new()),
        }
    }

    fn pair_key(message: &Message) -> String {
        let to = match &message.to {
            Recipient::Agent { name } => name.as_str(),
            Recipient::Broadcast => "*",
        };
        format!("{}\u{1f}{}", message.from, to)
    }

    fn payload_hash(message: &Message) -> u64 {
        let mut hasher = DefaultHasher::new();
        message.payload.to_string().hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for AntiLoopPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REPEATS, DEFAULT_LOOP_WINDOW_SECS)
    }
}

impl MessagePolicy for AntiLoopPolicy {
    fn name(&self) -> &str {
        "anti_loop"
    }

    fn check(&self, message: &Message) -> Option<PolicyViolation> {
        let now = now_secs();
        let hash = Self::payload_hash(message);
        let key = Self::pair_key(message);

        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        let window = recent.entry(key).or_default();

        while let Some((_, ts)) = window.front() {
            if now.saturating_sub(*ts) >= self.window_secs {
                window.pop_front();
            } else {
                break;
            }
        }

        let repeats = window.iter().filter(|(h, _)| *h == hash).count();
        if repeats >= self.max_repeats {
            return Some(PolicyViolation {
                policy: self.name().to_string(),
                reason: format!(
                    "identical payload sent {} times to the same recipient in the last {}s",
                    repeats, self.window_secs
                ),
            });
        }

        window.push_back((hash, now));
        None
    }
}

/// Per-sender rate limit: (count, window_start_secs) sliding windows
pub struct RateLimitPolicy {
    max_per_minute: u32,
    windows: Mutex<HashMap<String, (u32, u64)>>,
}

impl RateLimitPolicy {
    /// Create a rate limit policy with an explicit cap
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_PER_MINUTE)
    }
}

impl MessagePolicy for RateLimitPolicy {
    fn name(&self) -> &str {
        "rate_limit"
    }

    fn check(&self, message: &Message) -> Option<PolicyViolation> {
        let now = now_secs();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let entry = windows.entry(message.from.clone()).or_insert((0, now));

        // Reset window if more than 60 seconds have passed
        if now.saturating_sub(entry.1) >= 60 {
            entry.0 = 0;
            entry.1 = now;
        }

        if entry.0 >= self.max_per_minute {
            return Some(PolicyViolation {
                policy: self.name().to_string(),
                reason: format!(
                    "sender exceeded {} messages per minute",
                    self.max_per_minute
                ),
            });
        }

        entry.0 += 1;
        None
    }
}

/// Ordered set of policies evaluated on every outgoing message
pub struct PolicyEngine {
    policies: Vec<Box<dyn MessagePolicy>>,
}

impl PolicyEngine {
    /// Engine with no policies — everything passes
    pub fn empty() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    /// Engine with the default policy set
    pub fn with_defaults() -> Self {
        Self {
            policies: vec![
                Box::new(MessageLengthPolicy::default()),
                Box::new(AntiLoopPolicy::default()),
                Box::new(RateLimitPolicy::default()),
            ],
        }
    }

    /// Add a custom policy
    pub fn push(&mut self, policy: Box<dyn MessagePolicy>) {
        self.policies.push(policy);
    }

    /// Number of installed policies
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no policies are installed
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Evaluate all policies; returns every violation found
    pub fn evaluate(&self, message: &Message) -> Vec<PolicyViolation> {
        self.policies
            .iter()
            .filter_map(|p| p.check(message))
            .collect()
    }
}

/// Current time in Unix seconds
fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
