//! Session credential envelope
//!
//! The gateway is stateless: the signed envelope issued here is the only
//! record of an authenticated session. `issue` wraps identity claims and the
//! provider token pair in an HS256-signed compact token with an embedded
//! validity window; `verify` checks signature and expiry on every request.
//! Both are pure functions of their inputs plus the clock, so there is
//! nothing to revoke server-side before expiry.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Error, Result};

/// Longest a session envelope may stay valid. `issue` clamps anything above.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Identity and authorization claims carried inside the signed envelope.
///
/// `access_token` is the provider-issued bearer credential the gateway
/// attaches to outbound API calls on the user's behalf; the rest is the
/// minimal identity the `/user` route reports back to the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Wire form of the envelope: claims plus the validity window stamped at
/// issuance. Callers never see `iat`/`exp` directly; expiry is enforced
/// here and the cookie lifetime is configured separately.
#[derive(Serialize, Deserialize)]
struct EnvelopePayload {
    #[serde(flatten)]
    identity: SessionClaims,
    iat: u64,
    exp: u64,
}

/// Sign `claims` into a self-contained envelope valid for `ttl`.
///
/// TTLs longer than [`MAX_SESSION_TTL`] are clamped; a session never
/// outlives 24 hours regardless of configuration.
pub fn issue(claims: &SessionClaims, secret: &[u8], ttl: Duration) -> Result<String> {
    let ttl = ttl.min(MAX_SESSION_TTL);
    let iat = now_secs();
    let payload = EnvelopePayload {
        identity: claims.clone(),
        iat,
        exp: iat + ttl.as_secs(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &payload,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| Error::Envelope(format!("failed to sign session envelope: {e}")))
}

/// Verify an envelope and recover its claims.
///
/// Expiry is checked with zero leeway so the boundary is exact. The three
/// failure modes are the only ones callers may distinguish:
/// [`AuthError::Invalid`] for a signature mismatch, [`AuthError::Expired`]
/// for an authentic-but-stale envelope, and [`AuthError::Malformed`] when
/// the token cannot be decoded at all.
pub fn verify(envelope: &str, secret: &[u8]) -> std::result::Result<SessionClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<EnvelopePayload>(envelope, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims.identity)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::Invalid,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::Malformed,
            _ => AuthError::Invalid,
        })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
