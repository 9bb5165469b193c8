use super::*;
use agora_core::ACCESS_TOKEN_TTL;
use agora_core::ID;
use agora_core::REFRESH_TOKEN_TTL;
use agora_pg::*;
use std::collections::HashMap;

/// Persisted session state for one user: the single live refresh token
/// and the most recently issued access token, both as digests.
/// Replaced wholesale on every login; only the access pointer moves on
/// refresh.
#[derive(Debug, Clone)]
pub struct RefreshRecord {
    user: ID<Member>,
    refresh: Vec<u8>,
    access: Option<Vec<u8>>,
    expires: std::time::SystemTime,
}

impl RefreshRecord {
    pub fn new(user: ID<Member>, refresh: Vec<u8>, access: Option<Vec<u8>>) -> Self {
        Self {
            user,
            refresh,
            access,
            expires: std::time::SystemTime::now() + REFRESH_TOKEN_TTL,
        }
    }
    /// Rebuild from a stored row.
    pub fn hydrate(
        user: ID<Member>,
        refresh: Vec<u8>,
        access: Option<Vec<u8>>,
        expires: std::time::SystemTime,
    ) -> Self {
        Self {
            user,
            refresh,
            access,
            expires,
        }
    }
    pub fn user(&self) -> ID<Member> {
        self.user
    }
    pub fn refresh(&self) -> &[u8] {
        &self.refresh
    }
    pub fn access(&self) -> Option<&[u8]> {
        self.access.as_deref()
    }
    pub fn expires_at(&self) -> std::time::SystemTime {
        self.expires
    }
}

impl Schema for RefreshRecord {
    fn name() -> &'static str {
        REFRESH
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            REFRESH,
            " (
                user_id        BIGINT PRIMARY KEY REFERENCES ",
            USERS,
            "(id) ON DELETE CASCADE,
                refresh_digest BYTEA NOT NULL,
                access_digest  BYTEA,
                expires_at     TIMESTAMPTZ NOT NULL
            );"
        )
    }
    fn indices() -> &'static str {
        ""
    }
}

/// One revoked access token. Expiry bounds how long the row has to be
/// kept: it must outlive the token it bans, so it is stamped a full
/// access lifetime ahead.
#[derive(Debug, Clone)]
pub struct BlacklistEntry {
    user: ID<Member>,
    access: Vec<u8>,
    expires: std::time::SystemTime,
}

impl BlacklistEntry {
    pub fn new(user: ID<Member>, access: Vec<u8>) -> Self {
        Self {
            user,
            access,
            expires: std::time::SystemTime::now() + ACCESS_TOKEN_TTL,
        }
    }
    pub fn user(&self) -> ID<Member> {
        self.user
    }
    pub fn access(&self) -> &[u8] {
        &self.access
    }
    pub fn expires_at(&self) -> std::time::SystemTime {
        self.expires
    }
}

impl Schema for BlacklistEntry {
    fn name() -> &'static str {
        BLACKLIST
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            BLACKLIST,
            " (
                user_id       BIGINT NOT NULL REFERENCES ",
            USERS,
            "(id) ON DELETE CASCADE,
                access_digest BYTEA NOT NULL,
                expires_at    TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (user_id, access_digest)
            );"
        )
    }
    fn indices() -> &'static str {
        const_format::concatcp!(
            "CREATE INDEX IF NOT EXISTS idx_blacklist_expires ON ",
            BLACKLIST,
            " (expires_at);"
        )
    }
}

/// Persistence seam for refresh records and the blacklist. The session
/// manager is the only writer; per-user mutual exclusion is its job,
/// not the store's.
#[allow(async_fn_in_trait)]
pub trait CredentialStore {
    /// Upsert the user's record, discarding any previous one.
    async fn replace(&self, record: &RefreshRecord) -> Result<(), AuthError>;
    async fn record(&self, user: ID<Member>) -> Result<Option<RefreshRecord>, AuthError>;
    async fn remove(&self, user: ID<Member>) -> Result<(), AuthError>;
    /// Move the record's last-issued access pointer.
    async fn update_access(&self, user: ID<Member>, access: &[u8]) -> Result<(), AuthError>;
    async fn blacklist(&self, entry: &BlacklistEntry) -> Result<(), AuthError>;
    async fn is_blacklisted(&self, user: ID<Member>, access: &[u8]) -> Result<bool, AuthError>;
    /// Garbage-collect blacklist entries whose expiry has passed.
    /// Returns the number of rows dropped.
    async fn purge(&self, now: std::time::SystemTime) -> Result<u64, AuthError>;
}

/// User lookup by id, consulted when a refresh re-derives claims.
#[allow(async_fn_in_trait)]
pub trait Directory {
    async fn member(&self, user: ID<Member>) -> Result<Option<Member>, AuthError>;
}

/// In-process store for tests and single-node development. Presence in
/// the maps mirrors the postgres rows exactly.
#[derive(Default)]
pub struct MemoryStore {
    records: std::sync::Mutex<HashMap<ID<Member>, RefreshRecord>>,
    banned: std::sync::Mutex<HashMap<(ID<Member>, Vec<u8>), std::time::SystemTime>>,
    members: std::sync::Mutex<HashMap<ID<Member>, Member>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Register a member so [`Directory`] lookups can find them.
    pub fn enroll(&self, member: Member) {
        use agora_core::Unique;
        self.members
            .lock()
            .expect("members lock")
            .insert(member.id(), member);
    }
}

impl CredentialStore for MemoryStore {
    async fn replace(&self, record: &RefreshRecord) -> Result<(), AuthError> {
        self.records
            .lock()
            .expect("records lock")
            .insert(record.user(), record.clone());
        Ok(())
    }
    async fn record(&self, user: ID<Member>) -> Result<Option<RefreshRecord>, AuthError> {
        Ok(self.records.lock().expect("records lock").get(&user).cloned())
    }
    async fn remove(&self, user: ID<Member>) -> Result<(), AuthError> {
        self.records.lock().expect("records lock").remove(&user);
        Ok(())
    }
    async fn update_access(&self, user: ID<Member>, access: &[u8]) -> Result<(), AuthError> {
        if let Some(record) = self.records.lock().expect("records lock").get_mut(&user) {
            record.access = Some(access.to_vec());
        }
        Ok(())
    }
    async fn blacklist(&self, entry: &BlacklistEntry) -> Result<(), AuthError> {
        self.banned
            .lock()
            .expect("banned lock")
            .entry((entry.user(), entry.access().to_vec()))
            .or_insert(entry.expires_at());
        Ok(())
    }
    async fn is_blacklisted(&self, user: ID<Member>, access: &[u8]) -> Result<bool, AuthError> {
        Ok(self
            .banned
            .lock()
            .expect("banned lock")
            .contains_key(&(user, access.to_vec())))
    }
    async fn purge(&self, now: std::time::SystemTime) -> Result<u64, AuthError> {
        let mut banned = self.banned.lock().expect("banned lock");
        let before = banned.len();
        banned.retain(|_, expires| *expires > now);
        Ok((before - banned.len()) as u64)
    }
}

impl Directory for MemoryStore {
    async fn member(&self, user: ID<Member>) -> Result<Option<Member>, AuthError> {
        Ok(self.members.lock().expect("members lock").get(&user).cloned())
    }
}
