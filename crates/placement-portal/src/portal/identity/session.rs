use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::{Capability, IdentityError, Principal};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    principal: Principal,
    exp: i64,
}

/// Token returned to the client after login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

/// Stateless session tokens: `base64url(claims).base64url(hmac-sha256)`.
#[derive(Clone)]
pub struct SessionSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl SessionSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
            ttl,
        }
    }

    pub fn issue(
        &self,
        principal: Principal,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, IdentityError> {
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            principal,
            exp: expires_at.timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|err| IdentityError::Hashing(err.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let signature =
            URL_SAFE_NO_PAD.encode(self.mac(payload.as_bytes())?.finalize().into_bytes());

        Ok(IssuedSession {
            token: format!("{payload}.{signature}"),
            principal,
            expires_at,
        })
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Capability, IdentityError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or(IdentityError::Unauthenticated("malformed session token"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| IdentityError::Unauthenticated("malformed session token"))?;

        self.mac(payload.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| IdentityError::Unauthenticated("session signature mismatch"))?;

        let claims: SessionClaims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|raw| serde_json::from_slice(&raw).ok())
            .ok_or(IdentityError::Unauthenticated("malformed session token"))?;

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(IdentityError::Unauthenticated("malformed session token"))?;
        if expires_at <= now {
            return Err(IdentityError::Unauthenticated("session expired"));
        }

        Ok(Capability::new(claims.principal, expires_at))
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, IdentityError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|err| IdentityError::Hashing(err.to_string()))?;
        mac.update(payload);
        Ok(mac)
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
