use agora_auth::AuthError;
use agora_auth::LiveSessions;
use agora_auth::Member;
use agora_chat::Gateway;
use agora_chat::Room;
use agora_core::ID;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::Responder;
use actix_web::ResponseError;
use actix_web::web;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_postgres::Client;

/// WebSocket upgrade for `/chat/{room_id}/{user_id}`. The access token
/// rides the `token` query parameter; the path user must match the
/// token's subject unless the token carries the admin claim. After the
/// handshake the connection belongs entirely to the gateway task.
pub async fn connect(
    sessions: web::Data<LiveSessions>,
    gateway: web::Data<Gateway<Arc<Client>>>,
    path: web::Path<(i64, i64)>,
    query: web::Query<HashMap<String, String>>,
    req: HttpRequest,
    body: web::Payload,
) -> impl Responder {
    let (room, user) = path.into_inner();
    let room: ID<Room> = ID::from(room);
    let user: ID<Member> = ID::from(user);
    let token = match query.get("token") {
        Some(token) => token,
        None => return AuthError::Malformed.error_response(),
    };
    let claims = match sessions.verify(token).await {
        Ok(claims) => claims,
        Err(e) => return e.error_response(),
    };
    if claims.user() != user && !claims.admin() {
        return AuthError::Forbidden.error_response();
    }
    match actix_ws::handle(&req, body) {
        Ok((response, session, stream)) => {
            let gateway = gateway.into_inner();
            actix_web::rt::spawn(async move {
                gateway.run(room, user, session, stream).await;
            });
            response
        }
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}
