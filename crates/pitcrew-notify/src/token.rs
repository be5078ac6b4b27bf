//! Signed one-time action tokens for notification links.
//!
//! A token is base64url over `user:task:action:expiry:signature`, where the
//! signature is HMAC-SHA256 of the first four fields under a server secret.
//! These are capability URLs: anyone holding the link can perform that one
//! action until expiry, without further authentication. That is a deliberate
//! trade-off for one-click email actions — do not replace it with a session
//! scheme.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use pitcrew_core::config::NotifySettings;

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// The three actions a notification link can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    Complete,
    Snooze,
    Dismiss,
}

impl TokenAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenAction::Complete => "complete",
            TokenAction::Snooze => "snooze",
            TokenAction::Dismiss => "dismiss",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(TokenAction::Complete),
            "snooze" => Some(TokenAction::Snooze),
            "dismiss" => Some(TokenAction::Dismiss),
            _ => None,
        }
    }
}

/// Verified token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: String,
    pub task_id: String,
    pub action: TokenAction,
}

/// Signs and verifies action tokens.
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Configured secret, or a machine-derived key when none is set.
    pub fn from_settings(settings: &NotifySettings) -> Self {
        match &settings.token_secret {
            Some(secret) => Self::new(secret.as_bytes().to_vec()),
            None => Self::new(derive_machine_secret()),
        }
    }

    /// Generate a signed token for one action on one task, valid 7 days.
    pub fn generate(&self, user_id: &str, task_id: &str, action: TokenAction) -> String {
        let expiry = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp();
        self.generate_at(user_id, task_id, action, expiry)
    }

    fn generate_at(&self, user_id: &str, task_id: &str, action: TokenAction, expiry: i64) -> String {
        let payload = format!("{user_id}:{task_id}:{}:{expiry}", action.as_str());
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));
        URL_SAFE_NO_PAD.encode(format!("{payload}:{signature}"))
    }

    /// Verify a token. Any malformed, expired, or forged token yields `None` —
    /// the caller surfaces a generic "invalid or expired link".
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        let raw = URL_SAFE_NO_PAD.decode(token).ok()?;
        let raw = String::from_utf8(raw).ok()?;

        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() != 5 {
            return None;
        }
        let (user_id, task_id, action_str, expiry_str, signature) =
            (parts[0], parts[1], parts[2], parts[3], parts[4]);

        let action = TokenAction::parse(action_str)?;
        let expiry: i64 = expiry_str.parse().ok()?;
        if Utc::now().timestamp() > expiry {
            return None;
        }

        let payload = format!("{user_id}:{task_id}:{action_str}:{expiry}");
        let expected = self.sign(&payload);
        let given = URL_SAFE_NO_PAD.decode(signature).ok()?;
        if !constant_time_eq(&expected, &given) {
            return None;
        }

        Some(TokenClaims {
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            action,
        })
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Full comparison with no early exit, so signature checking leaks no timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Derive a machine-specific token secret from hostname + username.
fn derive_machine_secret() -> Vec<u8> {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "pitcrew".into());
    let username = whoami::username();
    let salt = format!("pitcrew::{username}@{hostname}::action-tokens");
    Sha256::digest(salt.as_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"paddock-test-secret".to_vec())
    }

    #[test]
    fn test_round_trip() {
        let signer = signer();
        let token = signer.generate("user-9", "task-42", TokenAction::Snooze);
        let claims = signer.verify(&token).unwrap();
        assert_eq!(
            claims,
            TokenClaims {
                user_id: "user-9".into(),
                task_id: "task-42".into(),
                action: TokenAction::Snooze,
            }
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = signer();
        let past = (Utc::now() - Duration::hours(1)).timestamp();
        let token = signer.generate_at("u", "t", TokenAction::Complete, past);
        assert!(signer.verify(&token).is_none());
    }

    #[test]
    fn test_any_altered_character_is_rejected() {
        let signer = signer();
        let token = signer.generate("user-9", "task-42", TokenAction::Complete);

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            if tampered == token {
                continue;
            }
            assert!(
                signer.verify(&tampered).is_none(),
                "altered position {i} should not verify"
            );
        }
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = signer().generate("u", "t", TokenAction::Dismiss);
        let other = TokenSigner::new(b"another-secret".to_vec());
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let signer = signer();
        assert!(signer.verify("").is_none());
        assert!(signer.verify("not-base64!!!").is_none());
        // Valid base64, wrong field count
        let short = URL_SAFE_NO_PAD.encode("a:b:c");
        assert!(signer.verify(&short).is_none());
        // Unknown action
        let bad_action = URL_SAFE_NO_PAD.encode("u:t:explode:9999999999:sig");
        assert!(signer.verify(&bad_action).is_none());
    }
}
