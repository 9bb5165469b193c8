//! Argon2 password hashing, treated as an opaque hash+verify capability.

use super::AuthError;
use argon2::Argon2;
use argon2::PasswordHash;
use argon2::PasswordHasher;
use argon2::PasswordVerifier;
use argon2::password_hash::SaltString;

fn salt() -> SaltString {
    use rand::Rng;
    let ref mut bytes = [0u8; 16];
    rand::rng().fill(bytes);
    SaltString::encode_b64(bytes).expect("salt")
}

pub fn hash(password: &str) -> Result<String, AuthError> {
    Argon2::default()
        .hash_password(password.as_bytes(), &salt())
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Internal(e.to_string()))
}

pub fn verify(password: &str, hashword: &str) -> bool {
    PasswordHash::new(hashword)
        .ok()
        .as_ref()
        .map(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), hash)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_own_hash() {
        let hashword = hash("correct horse").unwrap();
        assert!(verify("correct horse", &hashword));
    }
    #[test]
    fn verify_rejects_wrong_password() {
        let hashword = hash("correct horse").unwrap();
        assert!(!verify("battery staple", &hashword));
    }
    #[test]
    fn verify_rejects_junk_hash() {
        assert!(!verify("anything", "not-a-phc-string"));
    }
}
