use actix_web::HttpResponse;
use actix_web::http::StatusCode;

/// Rejections surfaced by the session subsystem.
///
/// `Malformed`/`Signature`/`Expired` are the decode family. All variants
/// are terminal; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token cannot be parsed, lacks required claims, or is the wrong kind.
    Malformed,
    /// Token signature does not verify against the configured secret.
    Signature,
    /// Token is past its embedded expiry.
    Expired,
    /// No refresh record or no such user.
    NotFound,
    /// Token is syntactically valid but has been revoked or superseded.
    Revoked,
    /// Valid credential with insufficient privilege.
    Forbidden,
    /// Store or codec infrastructure failure.
    Internal(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed token"),
            Self::Signature => write!(f, "invalid token signature"),
            Self::Expired => write!(f, "token expired"),
            Self::NotFound => write!(f, "no session"),
            Self::Revoked => write!(f, "token revoked"),
            Self::Forbidden => write!(f, "insufficient privilege"),
            Self::Internal(s) => write!(f, "internal error: {}", s),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<agora_pg::PgErr> for AuthError {
    fn from(e: agora_pg::PgErr) -> Self {
        Self::Internal(e.to_string())
    }
}

impl actix_web::ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if self.status_code() == StatusCode::UNAUTHORIZED {
            response.insert_header(("WWW-Authenticate", "Bearer"));
        }
        response.body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn auth_denied_maps_to_unauthorized() {
        for e in [
            AuthError::Malformed,
            AuthError::Signature,
            AuthError::Expired,
            AuthError::NotFound,
            AuthError::Revoked,
        ] {
            assert_eq!(e.status_code(), StatusCode::UNAUTHORIZED);
            let response = e.error_response();
            assert_eq!(
                response
                    .headers()
                    .get("WWW-Authenticate")
                    .and_then(|h| h.to_str().ok()),
                Some("Bearer")
            );
        }
    }
    #[test]
    fn privilege_maps_to_forbidden() {
        assert_eq!(AuthError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert!(
            AuthError::Forbidden
                .error_response()
                .headers()
                .get("WWW-Authenticate")
                .is_none()
        );
    }
}
