//! Access tokens and password hashes.
//!
//! Access tokens are `v1.<payload>.<signature>` where the payload is the
//! base64url JSON of [`Claims`] and the signature is HMAC-SHA256 over the
//! encoded payload. Passwords are stored as PBKDF2-HMAC-SHA256.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::types::Role;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION_V1: &str = "v1";
const MAX_TOKEN_LEN: usize = 2048;
const PASSWORD_SCHEME: &str = "pbkdf2-sha256";
const PASSWORD_ITERATIONS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorCode {
    InvalidFormat,
    UnsupportedVersion,
    InvalidSignature,
    InvalidPayload,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct TokenError {
    pub code: TokenErrorCode,
    pub message: String,
}

impl TokenError {
    fn new(code: TokenErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_access_token(claims: &Claims, secret: &[u8]) -> Result<String, TokenError> {
    let payload = serde_json::to_vec(claims)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidPayload, e.to_string()))?;
    let payload_part = URL_SAFE_NO_PAD.encode(payload);
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidPayload, e.to_string()))?;
    mac.update(payload_part.as_bytes());
    let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}.{}", TOKEN_VERSION_V1, payload_part, sig_part))
}

/// Verify signature and expiry. `now` is unix seconds.
pub fn verify_access_token(token: &str, secret: &[u8], now: i64) -> Result<Claims, TokenError> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(TokenError::new(
            TokenErrorCode::InvalidFormat,
            "token exceeds max length",
        ));
    }
    let mut parts = token.split('.');
    let (version, payload_part, sig_part) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(v), Some(p), Some(s), None) if !p.is_empty() && !s.is_empty() => (v, p, s),
        _ => {
            return Err(TokenError::new(
                TokenErrorCode::InvalidFormat,
                "token must have three parts",
            ))
        }
    };
    if version != TOKEN_VERSION_V1 {
        return Err(TokenError::new(
            TokenErrorCode::UnsupportedVersion,
            format!("unsupported token version {}", version),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidPayload, e.to_string()))?;
    mac.update(payload_part.as_bytes());
    let expected = URL_SAFE_NO_PAD
        .decode(sig_part)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidFormat, e.to_string()))?;
    mac.verify_slice(&expected)
        .map_err(|_| TokenError::new(TokenErrorCode::InvalidSignature, "token signature mismatch"))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_part)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidFormat, e.to_string()))?;
    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(|e| TokenError::new(TokenErrorCode::InvalidPayload, e.to_string()))?;

    if claims.exp <= now {
        return Err(TokenError::new(TokenErrorCode::Expired, "token has expired"));
    }
    Ok(claims)
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4();
    let derived = pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), PASSWORD_ITERATIONS);
    format!(
        "{}${}${}${}",
        PASSWORD_SCHEME,
        PASSWORD_ITERATIONS,
        URL_SAFE_NO_PAD.encode(salt.as_bytes()),
        URL_SAFE_NO_PAD.encode(derived)
    )
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    if parts.len() != 4 || parts[0] != PASSWORD_SCHEME {
        return false;
    }
    let iterations = match parts[1].parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => return false,
    };
    let (salt, expected) = match (URL_SAFE_NO_PAD.decode(parts[2]), URL_SAFE_NO_PAD.decode(parts[3])) {
        (Ok(s), Ok(e)) => (s, e),
        _ => return false,
    };
    let derived = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
    derived.as_slice().ct_eq(expected.as_slice()).into()
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: 7,
            email: "amal@example.lk".to_string(),
            role: Role::Student,
            iat: 1_000,
            exp,
        }
    }

    #[test]
    fn test_token_verifies() {
        let token = issue_access_token(&claims(2_000), SECRET).unwrap();
        assert!(token.starts_with("v1."));
        let decoded = verify_access_token(&token, SECRET, 1_500).unwrap();
        assert_eq!(decoded, claims(2_000));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_access_token(&claims(2_000), SECRET).unwrap();
        let err = verify_access_token(&token, SECRET, 2_000).unwrap_err();
        assert_eq!(err.code, TokenErrorCode::Expired);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_access_token(&claims(2_000), SECRET).unwrap();
        let err = verify_access_token(&token, b"other", 1_500).unwrap_err();
        assert_eq!(err.code, TokenErrorCode::InvalidSignature);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = issue_access_token(&claims(2_000), SECRET).unwrap();
        let mut forged = claims(9_999);
        forged.role = Role::Admin;
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("v1.{}.{}", forged_payload, parts[2]);
        let err = verify_access_token(&tampered, SECRET, 1_500).unwrap_err();
        assert_eq!(err.code, TokenErrorCode::InvalidSignature);
    }

    #[test]
    fn test_malformed_tokens() {
        assert_eq!(
            verify_access_token("garbage", SECRET, 0).unwrap_err().code,
            TokenErrorCode::InvalidFormat
        );
        assert_eq!(
            verify_access_token("v2.abc.def", SECRET, 0).unwrap_err().code,
            TokenErrorCode::UnsupportedVersion
        );
    }

    #[test]
    fn test_password_hash_verifies() {
        let stored = hash_password("correct horse");
        assert!(stored.starts_with("pbkdf2-sha256$10000$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
        assert!(!verify_password("correct horse", "plain-text"));
    }

    #[test]
    fn test_pbkdf2_known_vector() {
        // RFC 7914 section 11, first 32 bytes
        let derived = pbkdf2_sha256(b"passwd", b"salt", 1);
        let hex: String = derived.iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(hex, "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc");
    }

    #[test]
    fn test_truncated_hash_rejected() {
        let stored = hash_password("correct horse");
        let (head, digest) = stored.rsplit_once('$').unwrap();
        let short = format!("{}${}", head, &digest[..20]);
        assert!(!verify_password("correct horse", &short));
        let empty_password = hash_password("");
        assert!(verify_password("", &empty_password));
    }

    #[test]
    fn test_password_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }
}
