use agora_core::ID;
use agora_core::Unique;
use agora_pg::*;

/// Registered user account as seen by the session subsystem.
/// The password hash lives only in the database row, never here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    id: ID<Self>,
    name: String,
    email: String,
    admin: bool,
    banned: bool,
}

impl Member {
    pub fn new(id: ID<Self>, name: String, email: String, admin: bool, banned: bool) -> Self {
        Self {
            id,
            name,
            email,
            admin,
            banned,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn email(&self) -> &str {
        &self.email
    }
    pub fn admin(&self) -> bool {
        self.admin
    }
    pub fn banned(&self) -> bool {
        self.banned
    }
}

impl Unique for Member {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

impl Schema for Member {
    fn name() -> &'static str {
        USERS
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            USERS,
            " (
                id          BIGSERIAL PRIMARY KEY,
                name        VARCHAR(64) UNIQUE NOT NULL,
                email       VARCHAR(256) UNIQUE NOT NULL,
                hashword    TEXT NOT NULL,
                admin       BOOLEAN NOT NULL DEFAULT FALSE,
                banned      BOOLEAN NOT NULL DEFAULT FALSE
            );"
        )
    }
    fn indices() -> &'static str {
        const_format::concatcp!(
            "CREATE INDEX IF NOT EXISTS idx_users_name ON ",
            USERS,
            " (name);"
        )
    }
}
