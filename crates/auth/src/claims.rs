use super::*;
use agora_core::ACCESS_TOKEN_TTL;
use agora_core::ID;
use agora_core::REFRESH_TOKEN_TTL;
use agora_core::Unique;

/// Discriminates the two credential kinds carried in the `sub` claim.
/// An access token presented where a refresh token is expected (or the
/// reverse) is rejected as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Access,
    Refresh,
}

/// Signed JWT payload. The admin flag is captured at issuance time and is
/// never re-read from the user record while the token lives; a privilege
/// change takes effect on the next login or refresh. Revocation bounds
/// this staleness window.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Kind,
    pub uid: i64,
    pub usr: String,
    pub adm: bool,
    pub jti: uuid::Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Short-lived credential proving identity and role for one request.
    pub fn access(member: &Member) -> Self {
        let now = epoch();
        Self {
            sub: Kind::Access,
            uid: member.id().inner(),
            usr: member.name().to_string(),
            adm: member.admin(),
            jti: uuid::Uuid::now_v7(),
            iat: now,
            exp: now + ACCESS_TOKEN_TTL.as_secs() as i64,
        }
    }
    /// Long-lived credential used solely to mint new access tokens.
    pub fn refresh(member: &Member) -> Self {
        let now = epoch();
        Self {
            sub: Kind::Refresh,
            uid: member.id().inner(),
            usr: member.name().to_string(),
            adm: member.admin(),
            jti: uuid::Uuid::now_v7(),
            iat: now,
            exp: now + REFRESH_TOKEN_TTL.as_secs() as i64,
        }
    }
    pub fn kind(&self) -> Kind {
        self.sub
    }
    pub fn user(&self) -> ID<Member> {
        ID::from(self.uid)
    }
    pub fn username(&self) -> &str {
        &self.usr
    }
    pub fn admin(&self) -> bool {
        self.adm
    }
    pub fn expired(&self) -> bool {
        epoch() >= self.exp
    }
}

/// Integer Unix-epoch seconds, the time base for every expiry comparison.
pub(crate) fn epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time")
        .as_secs() as i64
}
