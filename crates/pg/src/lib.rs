//! PostgreSQL integration for agora.
//!
//! Low-level database connectivity plus the schema plumbing shared by all
//! persisted entities. Domain crates implement [`Schema`] next to their
//! types; the server runs the collected DDL at startup.
//!
//! ## Connectivity
//!
//! - [`db()`] — Establishes a database connection from `DB_URL`
//!
//! ## Table Names
//!
//! Constants for all persistent entities consumed by this core: users,
//! refresh tokens, the token blacklist, and chat messages.

use std::sync::Arc;
use tokio_postgres::Client;

/// Establishes a database connection.
///
/// Connects to PostgreSQL using the `DB_URL` environment variable.
/// Returns an `Arc<Client>` suitable for sharing across async tasks.
///
/// # Panics
///
/// Panics if `DB_URL` is not set or if connection fails.
pub async fn db() -> Arc<Client> {
    log::info!("connecting to database");
    let tls = tokio_postgres::tls::NoTls;
    let ref url = std::env::var("DB_URL").expect("DB_URL must be set");
    let (client, connection) = tokio_postgres::connect(url, tls)
        .await
        .expect("database connection failed");
    tokio::spawn(connection);
    client
        .execute("SET client_min_messages TO WARNING", &[])
        .await
        .expect("set client_min_messages");
    Arc::new(client)
}

/// PostgreSQL error type alias.
pub type PgErr = tokio_postgres::Error;

/// Table metadata and DDL generation, implemented next to each persisted type.
pub trait Schema {
    fn name() -> &'static str;
    /// `CREATE TABLE IF NOT EXISTS` statement for this entity.
    fn creates() -> &'static str;
    /// Index statements, or an empty string when none apply.
    fn indices() -> &'static str;
}

/// Table for registered user accounts.
#[rustfmt::skip]
pub const USERS:     &str = "users";
/// Table for the single live refresh token per user.
#[rustfmt::skip]
pub const REFRESH:   &str = "refresh_tokens";
/// Table for access tokens revoked before natural expiry.
#[rustfmt::skip]
pub const BLACKLIST: &str = "token_blacklist";
/// Table for persisted chat messages.
#[rustfmt::skip]
pub const MESSAGES:  &str = "messages";
