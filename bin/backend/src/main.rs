//! Unified Backend Binary
//!
//! Serves the auth surface and the chat gateway in a single process.
//! Runs on BIND_ADDR (e.g. 0.0.0.0:8888); needs DB_URL and JWT_SECRET.

#[tokio::main]
async fn main() {
    agora_core::log();
    agora_server::run().await.unwrap();
}
