//! Session id signing for the cookie value and the sign-in receipt
//!
//! Signed form: `s:<id>.<base64(HMAC-SHA256(secret, id))>` with padding
//! stripped.

use crate::error::{AuthError, AuthResult};
use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine as _,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNED_PREFIX: &str = "s:";
const SESSION_ID_BYTES: usize = 24;

/// New random session id (base64url, 32 chars)
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: &[u8]) -> AuthResult<Self> {
        if secret.is_empty() {
            return Err(AuthError::TokenSigning(
                "session secret is empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, id: &str) -> String {
        let signature = self.mac.clone().chain_update(id.as_bytes()).finalize();
        format!(
            "{}{}.{}",
            SIGNED_PREFIX,
            id,
            STANDARD_NO_PAD.encode(signature.into_bytes())
        )
    }

    /// Recover the id from a signed value; `None` if unsigned or tampered
    pub fn unsign(&self, value: &str) -> Option<String> {
        let signed = value.strip_prefix(SIGNED_PREFIX)?;
        let (id, signature) = signed.rsplit_once('.')?;
        let signature = STANDARD_NO_PAD.decode(signature).ok()?;

        self.mac
            .clone()
            .chain_update(id.as_bytes())
            .verify_slice(&signature)
            .ok()?;
        Some(id.to_string())
    }

    /// Cookie value for `id`
    pub fn encode_cookie(&self, id: &str) -> String {
        urlencoding::encode(&self.sign(id)).into_owned()
    }

    /// Session id from a raw cookie value
    pub fn decode_cookie(&self, raw: &str) -> Option<String> {
        let value = urlencoding::decode(raw).ok()?;
        self.unsign(&value)
    }
}
