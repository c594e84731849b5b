//! Message signing for inter-agent traffic
//!
//! Provides application-level HMAC-SHA256 signing of message envelopes,
//! independent of transport encryption. The router signs every message
//! before delivery; session workers verify on receipt and drop messages
//! that fail verification.
//!
//! The tag covers `(id, from, payload)` — the immutable parts of the
//! envelope. Routing metadata (e.g. the redirect marker) stays outside
//! the signed input so a coordinator redirect does not invalidate the tag.

use crate::message::Message;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::hmac;

/// HMAC-SHA256 signer for message envelopes
pub struct MessageSigner {
    key: hmac::Key,
}

impl MessageSigner {
    /// Create a signer from a shared secret
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Canonical signing input for a message
    fn signing_input(message: &Message) -> Vec<u8> {
        format!("{}\n{}\n{}", message.id, message.from, message.payload).into_bytes()
    }

    /// Sign a message in place, setting its `signature` field
    pub fn sign(&self, message: &mut Message) {
        let tag = hmac::sign(&self.key, &Self::signing_input(message));
        message.signature = Some(BASE64.encode(tag.as_ref()));
    }

    /// Verify a message's signature
    ///
    /// Unsigned messages and undecodable tags fail verification.
    pub fn verify(&self, message: &Message) -> bool {
        let Some(signature) = &message.signature else {
            return false;
        };
        let Ok(tag) = BASE64.decode(signature) else {
            return false;
        };
        hmac::verify(&self.key, &Self::signing_input(message), &tag).is_ok()
    }
}
