//! JWT session token creation and verification.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{Config, SessionConfig},
    db::models::users::UserDBResponse,
    errors::Error,
    types::{Level, UserId},
};

/// The only algorithm ever produced or accepted.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT session claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub name: String,
    /// Level at issue time. Authorization uses the live record, not this snapshot.
    pub lvl: Level,
    /// Revocation counter at issue time
    pub epoch: i64,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl SessionClaims {
    /// Claims for a freshly authenticated user, valid for `ttl`.
    pub fn for_user(user: &UserDBResponse, ttl: Duration) -> Self {
        let now = Utc::now();
        let exp = now + ttl;

        Self {
            sub: user.id,
            name: user.name.clone(),
            lvl: user.level,
            epoch: user.session_epoch,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4(),
        }
    }
}

/// The configured signing secret. Minting a session without one is a server error.
pub fn signing_secret(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "sign session: secret_key is not configured".to_string(),
    })
}

/// Sign claims into a compact JWT.
pub fn encode_session_token(claims: &SessionClaims, secret: &str) -> Result<String, Error> {
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(ALGORITHM), claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode a JWT session token.
///
/// Anything wrong with the token itself is `Unauthenticated`; only key-material problems are
/// `Internal`.
pub fn decode_session_token(token: &str, secret: &str) -> Result<SessionClaims, Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    // Pinned: a token whose header names any other algorithm is rejected before verification.
    let validation = Validation::new(ALGORITHM);

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed, tampered, expired or foreign tokens
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::ExpiredSignature
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => Error::Unauthenticated {
            message: Some("Invalid session token".to_string()),
        },

        // Server errors (500) - key issues
        ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::RsaFailedSigning
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    Ok(token_data.claims)
}

/// `Set-Cookie` value carrying a session token.
///
/// No `Domain` attribute, so the cookie is host-only.
pub fn session_cookie(token: &str, config: &SessionConfig) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        config.cookie_name,
        token,
        same_site(&config.cookie_same_site),
        config.timeout.as_secs()
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite={}; Max-Age=0",
        config.cookie_name,
        same_site(&config.cookie_same_site)
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn same_site(value: &str) -> &'static str {
    match value.to_ascii_lowercase().as_str() {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}
