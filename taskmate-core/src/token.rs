//! Bearer token expiry.
//!
//! Tokens are JWT-shaped: the second `.`-separated segment is base64 JSON
//! carrying an `exp` claim in seconds since the epoch. Signatures are the
//! server's business; only the expiry is read here.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: f64,
}

/// The `exp` claim in seconds, or `None` if the token can't be decoded.
pub fn expiry_seconds(token: &str) -> Option<f64> {
    let payload = token.split('.').nth(1)?.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims.exp.is_finite().then_some(claims.exp)
}

/// Expired iff `exp * 1000 <= now_millis`; undecodable counts as expired.
pub fn is_expired_at(token: &str, now_millis: i64) -> bool {
    match expiry_seconds(token) {
        Some(exp) => exp * 1000.0 <= now_millis as f64,
        None => true,
    }
}

pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn future_exp_is_valid_past_exp_is_not() {
        let t = token_with(r#"{"id":"u1","exp":1700000000}"#);
        assert!(!is_expired_at(&t, 1_699_999_999_999));
        assert!(is_expired_at(&t, 1_700_000_000_000));
        assert!(is_expired_at(&t, 1_800_000_000_000));
    }

    #[test]
    fn padded_standard_alphabet_is_accepted() {
        let payload = base64::engine::general_purpose::STANDARD.encode(r#"{"exp":42}"#);
        let t = format!("h.{payload}.s");
        assert_eq!(expiry_seconds(&t), Some(42.0));
    }

    #[test]
    fn malformed_tokens_count_as_expired() {
        assert!(is_expired_at("", 0));
        assert!(is_expired_at("no-dots-here", 0));
        assert!(is_expired_at("a.!!!.c", 0));
        assert!(is_expired_at(&token_with(r#"{"sub":"x"}"#), 0));
        assert!(is_expired_at(&token_with(r#"{"exp":"soon"}"#), 0));
        assert!(is_expired_at(&token_with("not json"), 0));
    }
}
