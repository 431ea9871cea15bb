// src/transport/secure_envelope.rs

//! Optional HMAC-SHA256 envelope around a `WireMessage`, modelled directly
//! on the teacher's `core::cluster::secure_gossip::SecureGossipMessage`:
//! when no shared secret is configured the signature is all-zero and
//! `verify` only checks that it stayed zero, so the feature costs nothing
//! when disabled.

use crate::core::wire::WireMessage;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;
pub type Signature = [u8; 32];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureEnvelope {
    pub message: WireMessage,
    pub signature: Signature,
}

impl SecureEnvelope {
    pub fn seal(message: WireMessage, secret: &Option<String>) -> anyhow::Result<Self> {
        let Some(secret) = secret else {
            return Ok(Self { message, signature: [0u8; 32] });
        };
        let body = serde_json::to_vec(&message)?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
        mac.update(&body);
        let signature: Signature = mac.finalize().into_bytes().as_slice().try_into()?;
        Ok(Self { message, signature })
    }

    /// Returns the message if the envelope is authentic under `secret`
    /// (or carries the expected all-zero signature when `secret` is
    /// `None`), otherwise `None` so the caller can drop it silently.
    pub fn open(self, secret: &Option<String>) -> Option<WireMessage> {
        let Some(secret) = secret else {
            return (self.signature == [0u8; 32]).then_some(self.message);
        };
        if self.signature == [0u8; 32] {
            return None;
        }
        let body = serde_json::to_vec(&self.message).ok()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(&body);
        mac.verify_slice(&self.signature).ok()?;
        Some(self.message)
    }
}
