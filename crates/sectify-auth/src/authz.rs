//! Authorization decision procedure.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::model::{AccessGrant, IpPrefix, Operation, Track};
use crate::store::{GrantStore, TrackStore};

pub const GRANT_TTL_SECS: i64 = 5 * 60;

pub struct AuthorizationService {
    tracks: Arc<dyn TrackStore>,
    grants: Arc<GrantStore>,
}

impl AuthorizationService {
    pub fn new(tracks: Arc<dyn TrackStore>, grants: Arc<GrantStore>) -> Self {
        Self { tracks, grants }
    }

    /// Single entry point for all track access decisions. Returns the
    /// track and a freshly minted grant on success.
    ///
    /// Absent and forbidden tracks both resolve to [`AuthError::NotFound`]
    /// here so the response carries no existence oracle; callers that need
    /// to distinguish the two for logging should check `tracks.by_id`
    /// themselves before calling this.
    pub fn check_track_access(
        &self,
        track_id: Uuid,
        user_id: Option<Uuid>,
        operation: Operation,
        caller_ip: IpPrefix,
    ) -> Result<(Track, AccessGrant)> {
        let track = self.tracks.by_id(track_id).ok_or(AuthError::NotFound)?;

        let allowed = match operation {
            Operation::Read | Operation::Stream => {
                track.is_public || user_id == Some(track.owner_id)
            }
            Operation::Write | Operation::Delete => user_id == Some(track.owner_id),
        };

        if !allowed {
            return Err(if user_id.is_none() {
                AuthError::AuthRequired
            } else {
                AuthError::Forbidden
            });
        }

        let mut session_id = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut session_id);
        let now = Utc::now();
        let grant = AccessGrant {
            session_id,
            track_id,
            user_id,
            operation,
            created_at: now,
            expires_at: now + Duration::seconds(GRANT_TTL_SECS),
            minting_ip_prefix: caller_ip,
        };
        self.grants.insert(grant.clone());

        Ok((track, grant))
    }

    /// Validates a previously minted grant against the request it is now
    /// being presented for: existence/expiry, `track_id`/`user_id`/
    /// `operation` match, and IP-prefix binding.
    pub fn validate_grant(
        &self,
        session_id: &[u8; 32],
        track_id: Uuid,
        user_id: Option<Uuid>,
        operation: Operation,
        caller_ip: IpPrefix,
    ) -> Result<AccessGrant> {
        let grant = self.grants.get(session_id).ok_or(AuthError::AuthRequired)?;
        if grant.track_id != track_id
            || grant.user_id != user_id
            || grant.operation != operation
            || grant.minting_ip_prefix != caller_ip
        {
            return Err(AuthError::Forbidden);
        }
        Ok(grant)
    }

    pub fn revoke_user_sessions(&self, user_id: Uuid) -> usize {
        self.grants.revoke_user_sessions(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use crate::store::InMemoryTrackStore;
    use chrono::Utc as ChronoUtc;

    fn make_track(owner_id: Uuid, is_public: bool) -> Track {
        Track {
            track_id: Uuid::new_v4(),
            owner_id,
            title: "test".into(),
            is_public,
            ciphertext_path: "/tmp/x.enc".into(),
            content_hash: "deadbeef".into(),
            created_at: ChronoUtc::now(),
        }
    }

    fn service_with(track: Track) -> (AuthorizationService, Uuid) {
        let tracks = Arc::new(InMemoryTrackStore::new());
        let track_id = track.track_id;
        tracks.insert(track);
        let grants = Arc::new(GrantStore::new());
        (AuthorizationService::new(tracks, grants), track_id)
    }

    #[test]
    fn anonymous_read_of_public_track_is_allowed() {
        let owner = Uuid::new_v4();
        let (svc, track_id) = service_with(make_track(owner, true));
        let (_, grant) = svc
            .check_track_access(track_id, None, Operation::Read, IpPrefix([1, 2, 0, 0]))
            .unwrap();
        assert_eq!(grant.operation, Operation::Read);
    }

    #[test]
    fn anonymous_read_of_private_track_requires_auth() {
        let owner = Uuid::new_v4();
        let (svc, track_id) = service_with(make_track(owner, false));
        let err = svc
            .check_track_access(track_id, None, Operation::Read, IpPrefix([1, 2, 0, 0]))
            .unwrap_err();
        assert_eq!(err, AuthError::AuthRequired);
    }

    /// A non-owner is forbidden from every operation on a private track.
    #[test]
    fn non_owner_cannot_read_write_or_delete_private_track() {
        let owner = Uuid::new_v4();
        let intruder = Some(Uuid::new_v4());
        for op in [Operation::Read, Operation::Write, Operation::Delete] {
            let (svc, track_id) = service_with(make_track(owner, false));
            let err = svc
                .check_track_access(track_id, intruder, op, IpPrefix([1, 2, 0, 0]))
                .unwrap_err();
            assert_eq!(err, AuthError::Forbidden);
        }
    }

    #[test]
    fn owner_can_write_and_delete() {
        let owner = Uuid::new_v4();
        let (svc, track_id) = service_with(make_track(owner, false));
        svc.check_track_access(track_id, Some(owner), Operation::Write, IpPrefix([1, 2, 0, 0]))
            .unwrap();
        svc.check_track_access(track_id, Some(owner), Operation::Delete, IpPrefix([1, 2, 0, 0]))
            .unwrap();
    }

    #[test]
    fn missing_track_is_not_found_regardless_of_requester() {
        let tracks = Arc::new(InMemoryTrackStore::new());
        let grants = Arc::new(GrantStore::new());
        let svc = AuthorizationService::new(tracks, grants);
        let err = svc
            .check_track_access(Uuid::new_v4(), None, Operation::Read, IpPrefix([1, 2, 0, 0]))
            .unwrap_err();
        assert_eq!(err, AuthError::NotFound);
    }

    #[test]
    fn revoke_user_sessions_removes_only_that_user_grants() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (svc, track_id) = service_with(make_track(owner, true));
        svc.check_track_access(track_id, Some(owner), Operation::Read, IpPrefix([1, 2, 0, 0]))
            .unwrap();
        svc.check_track_access(track_id, Some(other), Operation::Read, IpPrefix([1, 2, 0, 0]))
            .unwrap();

        let removed = svc.revoke_user_sessions(owner);
        assert_eq!(removed, 1);
    }

    #[test]
    fn validate_grant_rejects_ip_prefix_mismatch() {
        let owner = Uuid::new_v4();
        let (svc, track_id) = service_with(make_track(owner, true));
        let (_, grant) = svc
            .check_track_access(track_id, None, Operation::Read, IpPrefix([1, 2, 0, 0]))
            .unwrap();
        let err = svc
            .validate_grant(&grant.session_id, track_id, None, Operation::Read, IpPrefix([9, 9, 0, 0]))
            .unwrap_err();
        assert_eq!(err, AuthError::Forbidden);
    }

    #[test]
    fn user_without_account_cannot_satisfy_owner_check() {
        let owner = Uuid::new_v4();
        let _user = User {
            user_id: owner,
            email: "a@example.com".into(),
            password_hash: "ignored".into(),
            mfa_secret: None,
            created_at: ChronoUtc::now(),
        };
        let (svc, track_id) = service_with(make_track(owner, false));
        let err = svc
            .check_track_access(track_id, None, Operation::Write, IpPrefix([1, 2, 0, 0]))
            .unwrap_err();
        assert_eq!(err, AuthError::AuthRequired);
    }
}
