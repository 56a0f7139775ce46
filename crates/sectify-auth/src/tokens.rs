//! HS256 session tokens: two purposes, `mfa_verification` and
//! `access`, sharing one verification path with purpose/age/IP checks.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AuthError, Result};

pub const MFA_TOKEN_TTL_SECS: i64 = 5 * 60;
pub const ACCESS_TOKEN_TTL_SECS: i64 = 30 * 60;
pub const MAX_TOKEN_AGE_SECS: i64 = 86_400;
pub const CLOCK_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Access,
    MfaVerification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub purpose: Purpose,
    pub iat: i64,
    pub exp: i64,
    pub ip_hash: String,
    pub session_id: String,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ip_hash_secret: Vec<u8>,
    access_ttl_secs: i64,
    mfa_ttl_secs: i64,
}

impl TokenService {
    pub fn new(master_secret: &[u8]) -> Self {
        Self::with_ttls(master_secret, ACCESS_TOKEN_TTL_SECS, MFA_TOKEN_TTL_SECS)
    }

    /// Like [`TokenService::new`] but with explicit TTLs, for callers
    /// honoring `TOKEN_TTL_ACCESS_MIN`/`TOKEN_TTL_MFA_MIN` config rather than
    /// the defaults.
    pub fn with_ttls(master_secret: &[u8], access_ttl_secs: i64, mfa_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(master_secret),
            decoding_key: DecodingKey::from_secret(master_secret),
            ip_hash_secret: master_secret.to_vec(),
            access_ttl_secs,
            mfa_ttl_secs,
        }
    }

    /// `ip_hash` = first 16 bytes of SHA-256(ip || secret). This same
    /// formula binds both session tokens and key aliases; `AccessGrant`
    /// binding uses a coarser octet-prefix scheme instead, which is why
    /// it isn't derived from this method.
    pub fn ip_hash_bytes(&self, ip: &str) -> [u8; 16] {
        let mut hasher = Sha256::new();
        hasher.update(ip.as_bytes());
        hasher.update(&self.ip_hash_secret);
        let digest = hasher.finalize();
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest[..16]);
        out
    }

    /// Hex-encoded form of [`TokenService::ip_hash_bytes`], as stored in
    /// [`Claims::ip_hash`].
    pub fn ip_hash(&self, ip: &str) -> String {
        hex::encode(self.ip_hash_bytes(ip))
    }

    pub fn issue_access_token(&self, user_id: Uuid, session_id: &[u8; 32], ip: &str) -> Result<String> {
        self.issue(user_id, Purpose::Access, self.access_ttl_secs, session_id, ip)
    }

    pub fn issue_mfa_token(&self, user_id: Uuid, session_id: &[u8; 32], ip: &str) -> Result<String> {
        self.issue(user_id, Purpose::MfaVerification, self.mfa_ttl_secs, session_id, ip)
    }

    fn issue(
        &self,
        user_id: Uuid,
        purpose: Purpose,
        ttl_secs: i64,
        session_id: &[u8; 32],
        ip: &str,
    ) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            purpose,
            iat: now,
            exp: now + ttl_secs,
            ip_hash: self.ip_hash(ip),
            session_id: hex::encode(session_id),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Verifies signature, expected `purpose`, expiry, 86 400 s max age and
    /// 30 s clock skew, and — when `caller_ip` is given — that its hash
    /// matches the token's binding.
    pub fn verify(
        &self,
        token: &str,
        expected_purpose: Purpose,
        caller_ip: Option<&str>,
    ) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_SECS as u64;
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims = data.claims;

        if claims.purpose != expected_purpose {
            return Err(AuthError::InvalidToken);
        }

        let now = Utc::now().timestamp();
        if now - claims.iat > MAX_TOKEN_AGE_SECS {
            return Err(AuthError::InvalidToken);
        }

        if let Some(ip) = caller_ip {
            if self.ip_hash(ip) != claims.ip_hash {
                return Err(AuthError::InvalidToken);
            }
        }

        Ok(claims)
    }
}
