use rand::RngCore;
use uuid::Uuid;

/// A fresh 32-byte CSPRNG session id (well over the 128 bits of entropy
/// needed), shared as the `AccessGrant`/`SessionToken` `session_id`.
pub fn random_session_id() -> [u8; 32] {
    let mut id = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut id);
    id
}

/// Folds a 32-byte session id down to a `Uuid` for use as a packaging/
/// on-disk key. Deterministic so repeated calls for the same session
/// collapse onto the same directory, keeping packaging idempotent.
pub fn session_uuid(session_id: &[u8; 32]) -> Uuid {
    Uuid::from_slice(&session_id[..16]).expect("16-byte slice is a valid UUID")
}

pub fn session_hex(session_id: &[u8; 32]) -> String {
    hex::encode(session_id)
}
