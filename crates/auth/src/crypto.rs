use super::*;

/// Stateless token codec: encodes and decodes signed, expiring claim
/// sets. Knows nothing of users, bans, or revocation, so the signature
/// scheme can change without touching session logic.
pub struct Crypto {
    encoding: jsonwebtoken::EncodingKey,
    decoding: jsonwebtoken::DecodingKey,
}

impl Crypto {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: jsonwebtoken::EncodingKey::from_secret(secret),
            decoding: jsonwebtoken::DecodingKey::from_secret(secret),
        }
    }
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| String::default())
                .as_bytes(),
        )
    }
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
    /// Expiry comparison is `now >= exp`: no leeway.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = jsonwebtoken::Validation::default();
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::Signature,
                _ => AuthError::Malformed,
            })
    }
    /// At-rest digest of a token. Stored rows never hold raw tokens;
    /// a digest match is exactly a textual match.
    pub fn digest(token: &str) -> Vec<u8> {
        use sha2::Digest;
        sha2::Sha256::digest(token.as_bytes()).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::ID;

    fn bob() -> Member {
        Member::new(ID::from(2), "bob".into(), "bob@example.com".into(), true, false)
    }

    #[test]
    fn roundtrip_preserves_claims() {
        let crypto = Crypto::new(b"secret");
        let claims = Claims::access(&bob());
        let token = crypto.encode(&claims).unwrap();
        let decoded = crypto.decode(&token).unwrap();
        assert_eq!(decoded.user(), claims.user());
        assert_eq!(decoded.username(), "bob");
        assert_eq!(decoded.jti, claims.jti);
        assert!(decoded.admin());
    }
    #[test]
    fn rejects_foreign_signature() {
        let ours = Crypto::new(b"ours");
        let theirs = Crypto::new(b"theirs");
        let token = theirs.encode(&Claims::access(&bob())).unwrap();
        assert_eq!(ours.decode(&token), Err(AuthError::Signature));
    }
    #[test]
    fn rejects_expired_token() {
        let crypto = Crypto::new(b"secret");
        let mut claims = Claims::access(&bob());
        claims.iat -= 7200;
        claims.exp -= 7200;
        let token = crypto.encode(&claims).unwrap();
        assert_eq!(crypto.decode(&token), Err(AuthError::Expired));
    }
    #[test]
    fn rejects_garbage() {
        let crypto = Crypto::new(b"secret");
        assert_eq!(crypto.decode("not-a-token"), Err(AuthError::Malformed));
    }
    #[test]
    fn digest_is_stable() {
        assert_eq!(Crypto::digest("abc"), Crypto::digest("abc"));
        assert_ne!(Crypto::digest("abc"), Crypto::digest("abd"));
    }
}
