use serde::Deserialize;
use serde::Serialize;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response; the refresh token additionally travels as an
/// HTTP-only cookie.
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

#[derive(Serialize)]
pub struct AccessResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct BanRequest {
    pub user_id: i64,
    pub banned: bool,
}

/// Roster affected by a board permission change, as computed by the
/// board layer, plus the user-id watermark in force at that time.
#[derive(Deserialize)]
pub struct RosterRequest {
    pub user_ids: Vec<i64>,
    pub watermark: i64,
}
