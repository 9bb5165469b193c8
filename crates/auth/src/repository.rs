use super::*;
use agora_core::ID;
use agora_pg::*;
use std::sync::Arc;
use tokio_postgres::Client;

/// Account rows. Abstracts SQL from domain modules.
#[allow(async_fn_in_trait)]
pub trait UserRepository {
    async fn exists(&self, name: &str, email: &str) -> Result<bool, AuthError>;
    /// Insert a new account; the database assigns the id.
    async fn create(&self, name: &str, email: &str, hashword: &str) -> Result<ID<Member>, AuthError>;
    async fn lookup(&self, name: &str) -> Result<Option<(Member, String)>, AuthError>;
    async fn set_banned(&self, user: ID<Member>, banned: bool) -> Result<(), AuthError>;
}

impl UserRepository for Arc<Client> {
    async fn exists(&self, name: &str, email: &str) -> Result<bool, AuthError> {
        self.query_opt(
            const_format::concatcp!("SELECT 1 FROM ", USERS, " WHERE name = $1 OR email = $2"),
            &[&name, &email],
        )
        .await
        .map(|opt| opt.is_some())
        .map_err(AuthError::from)
    }

    async fn create(&self, name: &str, email: &str, hashword: &str) -> Result<ID<Member>, AuthError> {
        self.query_one(
            const_format::concatcp!(
                "INSERT INTO ",
                USERS,
                " (name, email, hashword) VALUES ($1, $2, $3) RETURNING id"
            ),
            &[&name, &email, &hashword],
        )
        .await
        .map(|row| ID::from(row.get::<_, i64>(0)))
        .map_err(AuthError::from)
    }

    async fn lookup(&self, name: &str) -> Result<Option<(Member, String)>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT id, name, email, admin, banned, hashword FROM ",
                USERS,
                " WHERE name = $1"
            ),
            &[&name],
        )
        .await
        .map(|opt| {
            opt.map(|row| {
                (
                    Member::new(
                        ID::from(row.get::<_, i64>(0)),
                        row.get::<_, String>(1),
                        row.get::<_, String>(2),
                        row.get::<_, bool>(3),
                        row.get::<_, bool>(4),
                    ),
                    row.get::<_, String>(5),
                )
            })
        })
        .map_err(AuthError::from)
    }

    async fn set_banned(&self, user: ID<Member>, banned: bool) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!("UPDATE ", USERS, " SET banned = $2 WHERE id = $1"),
            &[&user.inner(), &banned],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }
}

impl Directory for Arc<Client> {
    async fn member(&self, user: ID<Member>) -> Result<Option<Member>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT id, name, email, admin, banned FROM ",
                USERS,
                " WHERE id = $1"
            ),
            &[&user.inner()],
        )
        .await
        .map(|opt| {
            opt.map(|row| {
                Member::new(
                    ID::from(row.get::<_, i64>(0)),
                    row.get::<_, String>(1),
                    row.get::<_, String>(2),
                    row.get::<_, bool>(3),
                    row.get::<_, bool>(4),
                )
            })
        })
        .map_err(AuthError::from)
    }
}

impl CredentialStore for Arc<Client> {
    async fn replace(&self, record: &RefreshRecord) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                REFRESH,
                " (user_id, refresh_digest, access_digest, expires_at)
                  VALUES ($1, $2, $3, $4)
                  ON CONFLICT (user_id) DO UPDATE SET
                    refresh_digest = EXCLUDED.refresh_digest,
                    access_digest  = EXCLUDED.access_digest,
                    expires_at     = EXCLUDED.expires_at"
            ),
            &[
                &record.user().inner(),
                &record.refresh(),
                &record.access(),
                &record.expires_at(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn record(&self, user: ID<Member>) -> Result<Option<RefreshRecord>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT refresh_digest, access_digest, expires_at FROM ",
                REFRESH,
                " WHERE user_id = $1"
            ),
            &[&user.inner()],
        )
        .await
        .map(|opt| {
            opt.map(|row| {
                RefreshRecord::hydrate(
                    user,
                    row.get::<_, Vec<u8>>(0),
                    row.get::<_, Option<Vec<u8>>>(1),
                    row.get::<_, std::time::SystemTime>(2),
                )
            })
        })
        .map_err(AuthError::from)
    }

    async fn remove(&self, user: ID<Member>) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!("DELETE FROM ", REFRESH, " WHERE user_id = $1"),
            &[&user.inner()],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn update_access(&self, user: ID<Member>, access: &[u8]) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                REFRESH,
                " SET access_digest = $2 WHERE user_id = $1"
            ),
            &[&user.inner(), &access],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn blacklist(&self, entry: &BlacklistEntry) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                BLACKLIST,
                " (user_id, access_digest, expires_at) VALUES ($1, $2, $3)
                  ON CONFLICT DO NOTHING"
            ),
            &[
                &entry.user().inner(),
                &entry.access(),
                &entry.expires_at(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn is_blacklisted(&self, user: ID<Member>, access: &[u8]) -> Result<bool, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT 1 FROM ",
                BLACKLIST,
                " WHERE user_id = $1 AND access_digest = $2"
            ),
            &[&user.inner(), &access],
        )
        .await
        .map(|opt| opt.is_some())
        .map_err(AuthError::from)
    }

    async fn purge(&self, now: std::time::SystemTime) -> Result<u64, AuthError> {
        self.execute(
            const_format::concatcp!("DELETE FROM ", BLACKLIST, " WHERE expires_at <= $1"),
            &[&now],
        )
        .await
        .map_err(AuthError::from)
    }
}
