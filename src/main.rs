use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod email;
mod error;
mod routes;
mod state;
mod users;

use crate::{
    auth::oauth::UnconfiguredExchange,
    config::AppConfig,
    email::{mailer::run_mailer, topic::TopicPublisher},
    state::AppState,
    users::repo::PgUserStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "keystone=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;

    let (publisher, outbox) = TopicPublisher::channel();
    tokio::spawn(run_mailer(outbox, config.app_url.clone()));

    let state = AppState::from_parts(
        Arc::new(PgUserStore::new(pool)),
        config,
        Arc::new(publisher),
        Arc::new(UnconfiguredExchange),
    );

    app::serve(app::build_app(state)).await
}
