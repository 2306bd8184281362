//! Signed download tokens for backends without native presigning.
//!
//! Token = base64url(expiry_ts (u64 BE) || storage_key || HMAC-SHA256(secret, expiry_ts || storage_key)).

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

const EXPIRY_LEN: usize = 8;
const MAC_LEN: usize = 32; // SHA256
const MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkTokenError {
    #[error("Invalid download token")]
    Malformed,

    #[error("Invalid download token")]
    BadSignature,

    #[error("Download token has expired")]
    Expired,
}

/// Mints and verifies download tokens with a shared HMAC key.
#[derive(Clone)]
pub struct LinkSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner").finish_non_exhaustive()
    }
}

impl LinkSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Build a token granting access to `storage_key` for `expires_in`.
    pub fn create(&self, storage_key: &str, expires_in: Duration) -> String {
        let expiry_ts = unix_now().saturating_add(expires_in.as_secs());
        self.create_with_expiry(storage_key, expiry_ts)
    }

    fn create_with_expiry(&self, storage_key: &str, expiry_ts: u64) -> String {
        let mut payload = Vec::with_capacity(EXPIRY_LEN + storage_key.len() + MAC_LEN);
        payload.extend_from_slice(&expiry_ts.to_be_bytes());
        payload.extend_from_slice(storage_key.as_bytes());

        let tag = self.mac(&payload).finalize().into_bytes();
        payload.extend_from_slice(&tag);

        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload)
    }

    /// Verify a token and return the storage key it grants access to.
    pub fn verify(&self, token: &str) -> Result<String, LinkTokenError> {
        self.verify_at(token, unix_now())
    }

    fn verify_at(&self, token: &str, now_ts: u64) -> Result<String, LinkTokenError> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| LinkTokenError::Malformed)?;
        if decoded.len() <= EXPIRY_LEN + MAC_LEN || decoded.len() > EXPIRY_LEN + MAX_KEY_LEN + MAC_LEN
        {
            return Err(LinkTokenError::Malformed);
        }

        let (payload, tag) = decoded.split_at(decoded.len() - MAC_LEN);
        self.mac(payload)
            .verify_slice(tag)
            .map_err(|_| LinkTokenError::BadSignature)?;

        let (expiry_bytes, key_bytes) = payload.split_at(EXPIRY_LEN);
        let mut expiry = [0u8; EXPIRY_LEN];
        expiry.copy_from_slice(expiry_bytes);
        if now_ts > u64::from_be_bytes(expiry) {
            return Err(LinkTokenError::Expired);
        }

        String::from_utf8(key_bytes.to_vec()).map_err(|_| LinkTokenError::Malformed)
    }

    fn mac(&self, payload: &[u8]) -> Hmac<Sha256> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(payload);
        mac
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
