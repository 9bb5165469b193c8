use super::*;
use agora_core::ID;
use agora_core::REFRESH_TOKEN_TTL;
use agora_core::Unique;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::Responder;
use actix_web::ResponseError;
use actix_web::cookie::Cookie;
use actix_web::cookie::SameSite;
use actix_web::web;
use std::sync::Arc;
use tokio_postgres::Client;

pub async fn register(
    db: web::Data<Arc<Client>>,
    req: web::Json<RegisterRequest>,
) -> impl Responder {
    if req.username.is_empty() || req.username.len() > 64 {
        return HttpResponse::BadRequest().body("username must be 1-64 characters");
    }
    if req.password.len() < 8 {
        return HttpResponse::BadRequest().body("password must be at least 8 characters");
    }
    match db.exists(&req.username, &req.email).await {
        Ok(false) => {}
        Ok(true) => return HttpResponse::Conflict().body("username or email already exists"),
        Err(e) => return e.error_response(),
    }
    let hashword = match password::hash(&req.password) {
        Ok(h) => h,
        Err(e) => return e.error_response(),
    };
    match db.create(&req.username, &req.email, &hashword).await {
        Ok(id) => HttpResponse::Created()
            .json(serde_json::json!({ "result": "success", "id": id.inner() })),
        Err(e) => e.error_response(),
    }
}

pub async fn login(
    db: web::Data<Arc<Client>>,
    sessions: web::Data<LiveSessions>,
    req: web::Json<LoginRequest>,
) -> impl Responder {
    let (member, hashword) = match db.lookup(&req.username).await {
        Ok(Some(row)) => row,
        Ok(None) => return HttpResponse::Unauthorized().body("invalid credentials"),
        Err(e) => return e.error_response(),
    };
    if !password::verify(&req.password, &hashword) {
        return HttpResponse::Unauthorized().body("invalid credentials");
    }
    let pair = match sessions.issue(&member).await {
        Ok(pair) => pair,
        Err(e) => return e.error_response(),
    };
    log::info!("user {} logged in", member.id());
    let cookie = Cookie::build("refresh_token", pair.refresh.clone())
        .http_only(true)
        .max_age(actix_web::cookie::time::Duration::seconds(
            REFRESH_TOKEN_TTL.as_secs() as i64,
        ))
        .path("/")
        .same_site(SameSite::Lax)
        .finish();
    HttpResponse::Ok().cookie(cookie).json(TokenResponse {
        access_token: pair.access,
        refresh_token: pair.refresh,
        token_type: "bearer",
    })
}

/// The refresh token arrives in the Authorization header, not the
/// cookie; the cookie only serves browser clients that mirror it there.
pub async fn refresh(sessions: web::Data<LiveSessions>, req: HttpRequest) -> impl Responder {
    let token = match bearer(&req) {
        Some(token) => token,
        None => return AuthError::Malformed.error_response(),
    };
    match sessions.refresh(&token).await {
        Ok(access) => HttpResponse::Ok().json(AccessResponse {
            access_token: access,
            token_type: "bearer",
        }),
        Err(e) => e.error_response(),
    }
}

pub async fn logout(sessions: web::Data<LiveSessions>, auth: Auth) -> impl Responder {
    match sessions.logout(auth.user()).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "result": "success" })),
        Err(e) => e.error_response(),
    }
}

pub async fn me(auth: Auth) -> impl Responder {
    HttpResponse::Ok().json(UserInfo {
        id: auth.user().inner(),
        name: auth.claims().username().to_string(),
    })
}

/// Flip the ban flag. Banning also tears the session down so the user
/// can neither present their access token nor refresh it.
pub async fn ban(
    db: web::Data<Arc<Client>>,
    sessions: web::Data<LiveSessions>,
    _admin: Admin,
    req: web::Json<BanRequest>,
) -> impl Responder {
    let user: ID<Member> = ID::from(req.user_id);
    if let Err(e) = db.set_banned(user, req.banned).await {
        return e.error_response();
    }
    if req.banned {
        if let Err(e) = sessions.logout(user).await {
            return e.error_response();
        }
        log::info!("user {} banned and logged out", user);
    }
    HttpResponse::Ok().json(serde_json::json!({ "result": "success" }))
}

/// Trigger surface for board permission changes: the board layer
/// computes the affected roster and watermark, this fans out the
/// revocations.
pub async fn roster(
    sessions: web::Data<LiveSessions>,
    _admin: Admin,
    req: web::Json<RosterRequest>,
) -> impl Responder {
    let affected: Vec<ID<Member>> = req.user_ids.iter().copied().map(ID::from).collect();
    let outcomes =
        Cascade::on_roster_changed(sessions.get_ref(), &affected, ID::from(req.watermark)).await;
    let revoked = outcomes
        .iter()
        .filter(|(_, outcome)| outcome.is_ok())
        .count();
    log::info!("roster change revoked {} of {} affected users", revoked, outcomes.len());
    HttpResponse::Ok().json(serde_json::json!({ "result": "success", "revoked": revoked }))
}

/// Drop expired blacklist rows. Exposed for operational use; safe to
/// call at any time.
pub async fn purge(db: web::Data<Arc<Client>>, _admin: Admin) -> impl Responder {
    match CredentialStore::purge(db.get_ref(), std::time::SystemTime::now()).await {
        Ok(dropped) => HttpResponse::Ok().json(serde_json::json!({ "dropped": dropped })),
        Err(e) => e.error_response(),
    }
}
