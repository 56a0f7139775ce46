//! Key derivation: PBKDF2-HMAC-SHA256, 200k iterations, domain-separated
//! by purpose label so compromise of one derived key says nothing about
//! another derived from the same master secret.

use hmac::Hmac;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const PBKDF2_ITERATIONS: u32 = 200_000;
const DERIVED_KEY_LEN: usize = 32;

/// Fixed ASCII purpose labels, one per caller of the KDF. Never reuse a
/// label across unrelated key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    FileAtRest,
    HlsSegment,
    SessionBind,
}

impl Purpose {
    fn label(self) -> &'static [u8] {
        match self {
            Purpose::FileAtRest => b"file-at-rest",
            Purpose::HlsSegment => b"hls-segment",
            Purpose::SessionBind => b"session-bind",
        }
    }
}

/// The process-wide secret, loaded once at startup and zeroed on drop.
/// Never logged, serialized, or emitted in any derived output.
pub struct MasterSecret(Zeroizing<Vec<u8>>);

impl MasterSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Derive 32 bytes of key material from `(master_secret, purpose, salt)`.
///
/// `salt` disambiguates within a purpose (per-file or per-segment); `purpose`
/// disambiguates across call sites so a leaked file-at-rest key can never be
/// mistaken for a session-bind key even if the salts happened to collide.
pub fn derive_key(master_secret: &MasterSecret, purpose: Purpose, salt: &[u8]) -> [u8; 32] {
    let mut out = [0u8; DERIVED_KEY_LEN];
    let mut info = Vec::with_capacity(purpose.label().len() + salt.len());
    info.extend_from_slice(purpose.label());
    info.extend_from_slice(salt);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(master_secret.as_bytes(), &info, PBKDF2_ITERATIONS, &mut out)
        .expect("pbkdf2 output length is fixed and always valid");
    out
}

/// Salt for a file-at-rest key: `SHA256(user_id || track_id)`.
pub fn file_at_rest_salt(user_id: &str, track_id: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(track_id.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(b: &[u8]) -> MasterSecret {
        MasterSecret::new(b.to_vec())
    }

    #[test]
    fn derivation_is_deterministic() {
        let s = secret(b"a master secret at least 32 bytes long!");
        let salt = [1u8; 16];
        let k1 = derive_key(&s, Purpose::FileAtRest, &salt);
        let k2 = derive_key(&s, Purpose::FileAtRest, &salt);
        assert_eq!(k1, k2);
    }

    #[test]
    fn purposes_are_independent() {
        let s = secret(b"a master secret at least 32 bytes long!");
        let salt = [1u8; 16];
        let file_key = derive_key(&s, Purpose::FileAtRest, &salt);
        let seg_key = derive_key(&s, Purpose::HlsSegment, &salt);
        let bind_key = derive_key(&s, Purpose::SessionBind, &salt);
        assert_ne!(file_key, seg_key);
        assert_ne!(file_key, bind_key);
        assert_ne!(seg_key, bind_key);
    }

    #[test]
    fn distinct_salts_diverge() {
        let s = secret(b"a master secret at least 32 bytes long!");
        let k1 = derive_key(&s, Purpose::FileAtRest, &[1u8; 16]);
        let k2 = derive_key(&s, Purpose::FileAtRest, &[2u8; 16]);
        assert_ne!(k1, k2);
    }

    /// Sample a modest number of distinct (user_id, track_id) pairs and
    /// assert no file-key collisions. See DESIGN.md for why N=2,000 here
    /// rather than a much larger illustrative sample.
    #[test]
    fn file_keys_collision_free_over_samples() {
        let s = secret(b"a master secret at least 32 bytes long!");
        let mut seen = std::collections::HashSet::new();
        for i in 0..2_000u32 {
            let user_id = format!("user-{i}");
            let track_id = format!("track-{i}");
            let salt = file_at_rest_salt(&user_id, &track_id);
            let key = derive_key(&s, Purpose::FileAtRest, &salt);
            assert!(seen.insert(key), "collision at sample {i}");
        }
    }

    #[test]
    fn file_at_rest_salt_depends_on_both_ids() {
        let a = file_at_rest_salt("alice", "t1");
        let b = file_at_rest_salt("alice", "t2");
        let c = file_at_rest_salt("bob", "t1");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
