use super::*;
use agora_core::ID;
use agora_core::Unique;
use std::collections::HashMap;
use std::sync::Arc;

/// Both credentials handed out by a successful login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Session state machine: issuance, verification, rotation, and
/// revocation over a [`CredentialStore`].
///
/// Per user there is at most one live refresh token. Issuing a new pair
/// blacklists the previous session's access token; refreshing rotates
/// only the access token; logout drops the refresh record as well.
/// Mutations for the same user are serialized through a keyed mutex so
/// concurrent logins resolve deterministically: last writer wins, and
/// the loser's access token ends up blacklisted.
pub struct Sessions<S> {
    crypto: Crypto,
    store: S,
    locks: std::sync::Mutex<HashMap<ID<Member>, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S> Sessions<S>
where
    S: CredentialStore + Directory,
{
    pub fn new(crypto: Crypto, store: S) -> Self {
        Self {
            crypto,
            store,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    async fn guard(&self, user: ID<Member>) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .expect("session locks")
            .entry(user)
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Start a fresh session. The caller has already verified the
    /// password; this only enforces the ban flag. Any previous session's
    /// access token is blacklisted before the record is replaced, so a
    /// second login from elsewhere kills the first one's credentials.
    pub async fn issue(&self, member: &Member) -> Result<TokenPair, AuthError> {
        if member.banned() {
            return Err(AuthError::Forbidden);
        }
        let _guard = self.guard(member.id()).await;
        let access = self.crypto.encode(&Claims::access(member))?;
        let refresh = self.crypto.encode(&Claims::refresh(member))?;
        if let Some(previous) = self.store.record(member.id()).await? {
            if let Some(stale) = previous.access() {
                self.store
                    .blacklist(&BlacklistEntry::new(member.id(), stale.to_vec()))
                    .await?;
            }
        }
        let record = RefreshRecord::new(
            member.id(),
            Crypto::digest(&refresh),
            Some(Crypto::digest(&access)),
        );
        self.store.replace(&record).await?;
        log::debug!("[sessions] issued session for user {}", member.id());
        Ok(TokenPair { access, refresh })
    }

    /// Accept an access token: decode, then reject revoked ones.
    /// Refresh-record expiry is not consulted here; access and refresh
    /// lifetimes are independent.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.crypto.decode(token)?;
        if claims.kind() != Kind::Access {
            return Err(AuthError::Malformed);
        }
        if self
            .store
            .is_blacklisted(claims.user(), &Crypto::digest(token))
            .await?
        {
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }

    /// [`Self::verify`] plus the admin claim as frozen at issuance.
    pub async fn verify_admin(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify(token).await?;
        match claims.admin() {
            true => Ok(claims),
            false => Err(AuthError::Forbidden),
        }
    }

    /// Trade a refresh token for a new access token. The presented token
    /// must match the stored digest, not merely carry a valid signature:
    /// a refresh token superseded by a later login is dead. Claims are
    /// re-derived from the user record, so permission changes take
    /// effect here. The refresh token itself is not rotated.
    pub async fn refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.crypto.decode(token)?;
        if claims.kind() != Kind::Refresh {
            return Err(AuthError::Malformed);
        }
        let user = claims.user();
        let _guard = self.guard(user).await;
        let record = self.store.record(user).await?.ok_or(AuthError::NotFound)?;
        if record.refresh() != Crypto::digest(token).as_slice() {
            return Err(AuthError::Revoked);
        }
        let member = self.store.member(user).await?.ok_or(AuthError::NotFound)?;
        if member.banned() {
            return Err(AuthError::Forbidden);
        }
        if let Some(stale) = record.access() {
            self.store
                .blacklist(&BlacklistEntry::new(user, stale.to_vec()))
                .await?;
        }
        let access = self.crypto.encode(&Claims::access(&member))?;
        self.store
            .update_access(user, &Crypto::digest(&access))
            .await?;
        log::debug!("[sessions] refreshed access for user {}", user);
        Ok(access)
    }

    /// End the session: blacklist the last-issued access token and drop
    /// the refresh record. Subsequent refresh attempts find no record.
    pub async fn logout(&self, user: ID<Member>) -> Result<(), AuthError> {
        let _guard = self.guard(user).await;
        if let Some(record) = self.store.record(user).await? {
            if let Some(stale) = record.access() {
                self.store
                    .blacklist(&BlacklistEntry::new(user, stale.to_vec()))
                    .await?;
            }
            self.store.remove(user).await?;
        }
        log::debug!("[sessions] logged out user {}", user);
        Ok(())
    }

    /// Kill the cached access token but keep the refresh record: the
    /// user's next refresh re-derives their claims instead of forcing a
    /// full re-login. This is the cascade's per-user step.
    pub async fn revoke(&self, user: ID<Member>) -> Result<(), AuthError> {
        let _guard = self.guard(user).await;
        if let Some(record) = self.store.record(user).await? {
            if let Some(stale) = record.access() {
                self.store
                    .blacklist(&BlacklistEntry::new(user, stale.to_vec()))
                    .await?;
            }
        }
        log::debug!("[sessions] revoked access for user {}", user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: i64, name: &str) -> Member {
        Member::new(
            ID::from(id),
            name.to_string(),
            format!("{}@example.com", name),
            false,
            false,
        )
    }

    fn sessions(members: &[Member]) -> Sessions<MemoryStore> {
        let store = MemoryStore::new();
        for member in members {
            store.enroll(member.clone());
        }
        Sessions::new(Crypto::new(b"test-secret"), store)
    }

    #[tokio::test]
    async fn relogin_invalidates_previous_access() {
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let first = sessions.issue(&alice).await.unwrap();
        let second = sessions.issue(&alice).await.unwrap();
        assert_eq!(
            sessions.verify(&first.access).await,
            Err(AuthError::Revoked)
        );
        assert!(sessions.verify(&second.access).await.is_ok());
    }

    #[tokio::test]
    async fn superseded_refresh_token_is_dead() {
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let first = sessions.issue(&alice).await.unwrap();
        let _second = sessions.issue(&alice).await.unwrap();
        assert_eq!(
            sessions.refresh(&first.refresh).await,
            Err(AuthError::Revoked)
        );
    }

    #[tokio::test]
    async fn refresh_rotates_only_the_access_token() {
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let pair = sessions.issue(&alice).await.unwrap();
        let rotated = sessions.refresh(&pair.refresh).await.unwrap();
        assert_eq!(sessions.verify(&pair.access).await, Err(AuthError::Revoked));
        assert!(sessions.verify(&rotated).await.is_ok());
        // same refresh token remains valid for the next rotation
        assert!(sessions.refresh(&pair.refresh).await.is_ok());
    }

    #[tokio::test]
    async fn logout_kills_access_and_refresh() {
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let pair = sessions.issue(&alice).await.unwrap();
        sessions.logout(alice.id()).await.unwrap();
        assert_eq!(sessions.verify(&pair.access).await, Err(AuthError::Revoked));
        assert_eq!(
            sessions.refresh(&pair.refresh).await,
            Err(AuthError::NotFound)
        );
    }

    #[tokio::test]
    async fn revoke_preserves_the_refresh_path() {
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let pair = sessions.issue(&alice).await.unwrap();
        sessions.revoke(alice.id()).await.unwrap();
        assert_eq!(sessions.verify(&pair.access).await, Err(AuthError::Revoked));
        let minted = sessions.refresh(&pair.refresh).await.unwrap();
        assert!(sessions.verify(&minted).await.is_ok());
    }

    #[tokio::test]
    async fn full_lifecycle_scenario() {
        // login (refresh_a1, access_a1) -> refresh (access_a2) ->
        // re-login (refresh_a2, access_a3): everything before the
        // re-login is dead, everything after is live.
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let first = sessions.issue(&alice).await.unwrap();
        let access_a2 = sessions.refresh(&first.refresh).await.unwrap();
        let second = sessions.issue(&alice).await.unwrap();
        assert_eq!(
            sessions.verify(&first.access).await,
            Err(AuthError::Revoked)
        );
        assert_eq!(sessions.verify(&access_a2).await, Err(AuthError::Revoked));
        assert_eq!(
            sessions.refresh(&first.refresh).await,
            Err(AuthError::Revoked)
        );
        assert!(sessions.verify(&second.access).await.is_ok());
        assert!(sessions.refresh(&second.refresh).await.is_ok());
    }

    #[tokio::test]
    async fn banned_member_cannot_login_or_refresh() {
        let mallory = Member::new(
            ID::from(3),
            "mallory".into(),
            "mallory@example.com".into(),
            false,
            false,
        );
        let store = MemoryStore::new();
        store.enroll(mallory.clone());
        let sessions = Sessions::new(Crypto::new(b"test-secret"), store);
        let pair = sessions.issue(&mallory).await.unwrap();
        let banned = Member::new(
            mallory.id(),
            mallory.name().into(),
            mallory.email().into(),
            false,
            true,
        );
        assert_eq!(sessions.issue(&banned).await.err(), Some(AuthError::Forbidden));
        // directory now reports the ban, so the surviving refresh token is useless
        sessions.store.enroll(banned);
        assert_eq!(
            sessions.refresh(&pair.refresh).await,
            Err(AuthError::Forbidden)
        );
    }

    #[tokio::test]
    async fn wrong_kind_tokens_are_malformed() {
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let pair = sessions.issue(&alice).await.unwrap();
        assert_eq!(
            sessions.verify(&pair.refresh).await,
            Err(AuthError::Malformed)
        );
        assert_eq!(
            sessions.refresh(&pair.access).await,
            Err(AuthError::Malformed)
        );
    }

    #[tokio::test]
    async fn refresh_rederives_claims_from_the_directory() {
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let pair = sessions.issue(&alice).await.unwrap();
        assert!(!sessions.verify(&pair.access).await.unwrap().admin());
        let promoted = Member::new(
            alice.id(),
            alice.name().into(),
            alice.email().into(),
            true,
            false,
        );
        sessions.store.enroll(promoted);
        let minted = sessions.refresh(&pair.refresh).await.unwrap();
        assert!(sessions.verify(&minted).await.unwrap().admin());
    }

    #[tokio::test]
    async fn admin_flag_is_frozen_at_issuance() {
        let alice = member(1, "alice");
        let sessions = sessions(&[alice.clone()]);
        let pair = sessions.issue(&alice).await.unwrap();
        let promoted = Member::new(
            alice.id(),
            alice.name().into(),
            alice.email().into(),
            true,
            false,
        );
        sessions.store.enroll(promoted);
        // promotion is invisible until the next login or refresh
        assert_eq!(
            sessions.verify_admin(&pair.access).await,
            Err(AuthError::Forbidden)
        );
    }
}
