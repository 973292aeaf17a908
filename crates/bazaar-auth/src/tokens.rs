use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use bazaar_db::models::RotateOutcome;
use bazaar_db::{Database, format_ts};
use bazaar_types::api::Claims;

use crate::config::Config;
use crate::error::AuthError;

/// Why access-token validation failed. The HTTP boundary collapses both
/// variants into one generic 401; the distinction exists for logs and
/// tests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
}

/// A freshly rotated refresh credential plus the identity it belongs to.
pub struct RotatedSession {
    pub user_id: String,
    pub device_id: String,
    pub refresh_token: String,
}

/// Mints and validates signed access tokens; mints, rotates and revokes
/// refresh tokens. Keys and ttls come from [`Config`] once at startup.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    header: Header,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let algorithm: Algorithm = config
            .algorithm
            .parse()
            .map_err(|_| anyhow::anyhow!("Unsupported ALGORITHM: {}", config.algorithm))?;

        let mut validation = Validation::new(algorithm);
        // No leeway: exp elapsed means expired.
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret_key.as_bytes()),
            header: Header::new(algorithm),
            validation,
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
        })
    }

    pub fn mint_access(&self, subject: &str) -> Result<String, AuthError> {
        self.mint_access_with_ttl(subject, self.access_ttl)
    }

    pub fn mint_access_with_ttl(&self, subject: &str, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: (Utc::now() + ttl).timestamp() as usize,
        };
        encode(&self.header, &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Token encoding failed: {}", e)))
    }

    /// Check signature and expiry, returning the subject. Stateless: no
    /// storage read happens here.
    pub fn validate_access(&self, token: &str) -> Result<String, TokenError> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims.sub),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            },
        }
    }

    /// Issue a refresh token bound to a device. The caller gets the raw
    /// secret; storage keeps only its SHA-256 digest.
    pub fn mint_refresh(
        &self,
        db: &Database,
        user_id: &str,
        device_id: &str,
    ) -> Result<String, AuthError> {
        let raw = new_refresh_secret();
        let expires_at = format_ts(Utc::now() + self.refresh_ttl);
        db.insert_refresh_token(
            &Uuid::new_v4().to_string(),
            user_id,
            device_id,
            &digest(&raw),
            &expires_at,
        )
        .map_err(AuthError::Internal)?;
        Ok(raw)
    }

    /// Atomically retire `raw` and issue a replacement bound to the same
    /// device. Presenting an already-retired token is treated as theft:
    /// every session of that user is revoked before the call fails.
    pub fn rotate_refresh(&self, db: &Database, raw: &str) -> Result<RotatedSession, AuthError> {
        let new_raw = new_refresh_secret();
        let now = Utc::now();

        let outcome = db
            .rotate_refresh_token(
                &digest(raw),
                &Uuid::new_v4().to_string(),
                &digest(&new_raw),
                &format_ts(now + self.refresh_ttl),
                &format_ts(now),
            )
            .map_err(AuthError::Internal)?;

        match outcome {
            RotateOutcome::Rotated { user_id, device_id } => Ok(RotatedSession {
                user_id,
                device_id,
                refresh_token: new_raw,
            }),
            RotateOutcome::Reused { user_id } => {
                warn!(
                    "Refresh token reuse detected for user {}; all sessions revoked",
                    user_id
                );
                Err(AuthError::Unauthorized)
            }
            RotateOutcome::NotFound | RotateOutcome::Expired => Err(AuthError::Unauthorized),
        }
    }

    /// Logout path: retire the presented token. Idempotent; a token that
    /// is already dead stays dead.
    pub fn revoke_refresh(&self, db: &Database, raw: &str) -> Result<(), AuthError> {
        db.revoke_refresh_token_by_hash(&digest(raw))
            .map_err(AuthError::Internal)?;
        Ok(())
    }
}

fn new_refresh_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
