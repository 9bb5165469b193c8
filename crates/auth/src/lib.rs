//! Authentication, session lifecycle, and revocation.
//!
//! JWT-based sessions with Argon2 password hashing. Every user holds at
//! most one live refresh token; access tokens are short-lived and can be
//! revoked early through an append-only blacklist.
//!
//! ## Token Lifecycle
//!
//! - [`Crypto`] — JWT signing and verification (the pure codec)
//! - [`Claims`] — JWT payload structure, access and refresh kinds
//! - [`Sessions`] — issuance, verification, rotation, and revocation
//! - [`Cascade`] — bulk revocation after a board permission change
//!
//! ## Persistence
//!
//! - [`CredentialStore`] — refresh records and the token blacklist
//! - [`Directory`] — user lookup by id
//! - [`MemoryStore`] — in-process store for tests and single-node dev
//! - [`UserRepository`] — account rows (postgres)
//!
//! ## HTTP Surface
//!
//! - [`Auth`] / [`Admin`] — actix extractors for protected routes
//! - handlers for register, login, refresh, logout, me, ban, roster,
//!   and blacklist purge
mod cascade;
mod claims;
mod crypto;
mod dto;
mod error;
mod handlers;
mod member;
mod middleware;
pub mod password;
mod repository;
mod session;
mod store;

pub use cascade::*;
pub use claims::*;
pub use crypto::*;
pub use dto::*;
pub use error::*;
pub use handlers::*;
pub use member::*;
pub use middleware::*;
pub use repository::*;
pub use session::*;
pub use store::*;
