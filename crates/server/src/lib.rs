//! Unified Backend Server
//!
//! Wires the auth surface and the chat gateway into a single actix-web
//! server: token lifecycle routes under `/auth`, admin operations under
//! `/admin`, and the WebSocket chat upgrade under `/chat`.

pub mod chat;

use agora_auth::BlacklistEntry;
use agora_auth::Crypto;
use agora_auth::Member;
use agora_auth::RefreshRecord;
use agora_auth::Sessions;
use agora_chat::ChatRecord;
use agora_chat::Gateway;
use agora_chat::Registry;
use agora_pg::PgErr;
use agora_pg::Schema;
use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::middleware::Logger;
use actix_web::web;
use std::sync::Arc;
use tokio_postgres::Client;

async fn health(client: web::Data<Arc<Client>>) -> impl Responder {
    match client
        .execute("SELECT 1", &[])
        .await
        .inspect_err(|e| log::error!("health check failed: {}", e))
    {
        Ok(_) => HttpResponse::Ok().body("ok"),
        Err(_) => HttpResponse::ServiceUnavailable().body("database unavailable"),
    }
}

/// Create tables and indices for every persisted entity this core owns.
async fn migrate(client: &Client) -> Result<(), PgErr> {
    for ddl in [
        Member::creates(),
        Member::indices(),
        RefreshRecord::creates(),
        RefreshRecord::indices(),
        BlacklistEntry::creates(),
        BlacklistEntry::indices(),
        ChatRecord::creates(),
        ChatRecord::indices(),
    ] {
        if !ddl.is_empty() {
            client.batch_execute(ddl).await?;
        }
    }
    Ok(())
}

#[rustfmt::skip]
pub async fn run() -> Result<(), std::io::Error> {
    let client = agora_pg::db().await;
    migrate(&client).await.expect("run migrations");
    let registry = Arc::new(Registry::new());
    let sessions = web::Data::new(Sessions::new(Crypto::from_env(), client.clone()));
    let gateway = web::Data::new(Gateway::new(registry, client.clone()));
    let client = web::Data::new(client);
    log::info!("starting unified server");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .app_data(sessions.clone())
            .app_data(gateway.clone())
            .app_data(client.clone())
            .route("/health", web::get().to(health))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(agora_auth::register))
                    .route("/login", web::post().to(agora_auth::login))
                    .route("/refresh", web::post().to(agora_auth::refresh))
                    .route("/logout", web::post().to(agora_auth::logout))
                    .route("/me", web::get().to(agora_auth::me)),
            )
            .service(
                web::scope("/admin")
                    .route("/ban", web::post().to(agora_auth::ban))
                    .route("/roster", web::post().to(agora_auth::roster))
                    .route("/purge", web::post().to(agora_auth::purge)),
            )
            .route("/chat/{room_id}/{user_id}", web::get().to(chat::connect))
    })
    .workers(6)
    .bind(std::env::var("BIND_ADDR").expect("BIND_ADDR must be set"))?
    .run()
    .await
}
