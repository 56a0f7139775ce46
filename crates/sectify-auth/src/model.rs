use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded audio asset. Immutable after creation except `is_public`
/// and `title`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub track_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub is_public: bool,
    pub ciphertext_path: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A registered account. `password_hash` and `mfa_secret` are never
/// serialized back to the wire; callers that need the wire-safe view
/// should project the fields they want rather than serialize this type
/// directly.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub mfa_secret: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Stream,
    Write,
    Delete,
}

/// Short-lived, in-memory proof that a `(user, track, operation)` triple
/// was authorized. Keyed by a random 32-byte `session_id` when stored.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub session_id: [u8; 32],
    pub track_id: Uuid,
    pub user_id: Option<Uuid>,
    pub operation: Operation,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub minting_ip_prefix: IpPrefix,
}

/// The caller's address truncated to the binding granularity used for
/// grant/token IP checks: first two octets of an IPv4, or first 32 bits
/// of an IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpPrefix(pub [u8; 4]);

impl IpPrefix {
    pub fn from_ipv4_octets(octets: [u8; 4]) -> Self {
        IpPrefix([octets[0], octets[1], 0, 0])
    }

    pub fn from_ipv6_segment(first_32_bits: [u8; 4]) -> Self {
        IpPrefix(first_32_bits)
    }
}
