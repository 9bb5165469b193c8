use super::*;
use agora_core::ID;
use actix_web::FromRequest;
use actix_web::HttpRequest;
use actix_web::dev::Payload;
use actix_web::web;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_postgres::Client;

/// The concrete session manager wired into the actix app.
pub type LiveSessions = Sessions<Arc<Client>>;

/// Strip the bearer scheme off an Authorization header.
pub(crate) fn bearer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

/// Extractor for authenticated requests.
/// Validates the access token and checks it is not blacklisted.
pub struct Auth(pub Claims);

impl Auth {
    pub fn claims(&self) -> &Claims {
        &self.0
    }
    pub fn user(&self) -> ID<Member> {
        self.0.user()
    }
}

impl FromRequest for Auth {
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;
    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let sessions = req.app_data::<web::Data<LiveSessions>>().cloned();
        let token = bearer(req);
        Box::pin(async move {
            let token = token.ok_or(AuthError::Malformed)?;
            let sessions = sessions.ok_or_else(|| {
                actix_web::error::ErrorInternalServerError("session manager not configured")
            })?;
            let claims = sessions.verify(&token).await?;
            Ok(Auth(claims))
        })
    }
}

/// Extractor for admin-only requests. The admin claim was frozen at
/// token issuance; a demotion takes effect on the next login/refresh.
pub struct Admin(pub Claims);

impl Admin {
    pub fn claims(&self) -> &Claims {
        &self.0
    }
    pub fn user(&self) -> ID<Member> {
        self.0.user()
    }
}

impl FromRequest for Admin {
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;
    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let sessions = req.app_data::<web::Data<LiveSessions>>().cloned();
        let token = bearer(req);
        Box::pin(async move {
            let token = token.ok_or(AuthError::Malformed)?;
            let sessions = sessions.ok_or_else(|| {
                actix_web::error::ErrorInternalServerError("session manager not configured")
            })?;
            let claims = sessions.verify_admin(&token).await?;
            Ok(Admin(claims))
        })
    }
}
