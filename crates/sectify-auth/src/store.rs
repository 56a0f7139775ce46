//! In-memory store implementations behind trait objects, so a real
//! document-store driver can be substituted without touching callers.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::model::{AccessGrant, Track, User};

pub trait UserStore: Send + Sync {
    fn insert(&self, user: User);
    fn by_id(&self, user_id: Uuid) -> Option<User>;
    fn by_email(&self, email: &str) -> Option<User>;
    fn remove(&self, user_id: Uuid);
}

#[derive(Default)]
pub struct InMemoryUserStore {
    by_id: DashMap<Uuid, User>,
    email_index: DashMap<String, Uuid>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    fn insert(&self, user: User) {
        self.email_index.insert(user.email.clone(), user.user_id);
        self.by_id.insert(user.user_id, user);
    }

    fn by_id(&self, user_id: Uuid) -> Option<User> {
        self.by_id.get(&user_id).map(|u| u.clone())
    }

    fn by_email(&self, email: &str) -> Option<User> {
        let id = *self.email_index.get(email)?;
        self.by_id(id)
    }

    fn remove(&self, user_id: Uuid) {
        if let Some((_, user)) = self.by_id.remove(&user_id) {
            self.email_index.remove(&user.email);
        }
    }
}

pub trait TrackStore: Send + Sync {
    fn insert(&self, track: Track);
    fn by_id(&self, track_id: Uuid) -> Option<Track>;
    fn remove(&self, track_id: Uuid) -> Option<Track>;
    fn set_public(&self, track_id: Uuid, is_public: bool) -> Option<Track>;
    fn public_tracks(&self) -> Vec<Track>;
}

#[derive(Default)]
pub struct InMemoryTrackStore {
    tracks: DashMap<Uuid, Track>,
}

impl InMemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackStore for InMemoryTrackStore {
    fn insert(&self, track: Track) {
        self.tracks.insert(track.track_id, track);
    }

    fn by_id(&self, track_id: Uuid) -> Option<Track> {
        self.tracks.get(&track_id).map(|t| t.clone())
    }

    fn remove(&self, track_id: Uuid) -> Option<Track> {
        self.tracks.remove(&track_id).map(|(_, t)| t)
    }

    fn set_public(&self, track_id: Uuid, is_public: bool) -> Option<Track> {
        self.tracks.get_mut(&track_id).map(|mut t| {
            t.is_public = is_public;
            t.clone()
        })
    }

    fn public_tracks(&self) -> Vec<Track> {
        self.tracks
            .iter()
            .filter(|entry| entry.is_public)
            .map(|entry| entry.clone())
            .collect()
    }
}

/// Access grants keyed by their 32-byte `session_id`. Lookups purge the
/// entry lazily once `expires_at` has passed; [`GrantStore::sweep_expired`]
/// offers an explicit sweep for callers that run one on a timer.
#[derive(Default)]
pub struct GrantStore {
    grants: DashMap<[u8; 32], AccessGrant>,
    by_user: DashMap<Uuid, Vec<[u8; 32]>>,
}

impl GrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, grant: AccessGrant) {
        if let Some(user_id) = grant.user_id {
            self.by_user.entry(user_id).or_default().push(grant.session_id);
        }
        self.grants.insert(grant.session_id, grant);
    }

    pub fn get(&self, session_id: &[u8; 32]) -> Option<AccessGrant> {
        let grant = self.grants.get(session_id)?;
        if grant.expires_at < Utc::now() {
            let grant = grant.clone();
            drop(grant);
            self.grants.remove(session_id);
            return None;
        }
        Some(grant.clone())
    }

    pub fn sweep_expired(&self) {
        let now = Utc::now();
        self.grants.retain(|_, grant| grant.expires_at >= now);
    }

    /// Removes every grant belonging to `user_id`, returning the count
    /// removed. Used on password change, logout-all, and 2FA reset.
    pub fn revoke_user_sessions(&self, user_id: Uuid) -> usize {
        let session_ids = self.by_user.remove(&user_id).map(|(_, ids)| ids).unwrap_or_default();
        let mut removed = 0;
        for session_id in session_ids {
            if self.grants.remove(&session_id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
