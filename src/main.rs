use anyhow::Result;
use std::{env, net::SocketAddr, sync::Arc};
use tokio::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warp::Filter;

use controllers::SessionController;
use models::Config;
use repository::MemoryRepository;

mod api;
mod controllers;
mod error;
mod filters;
mod lifecycle;
mod models;
mod repository;
mod results;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info")),
        )
        .init();

    let bind_addr = env::var("BIND").unwrap_or_else(|_err| "127.0.0.1:3030".into());
    let bind_addr: SocketAddr = bind_addr.parse()?;

    let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_err| "http://localhost:1313".into());

    let config_path = env::var("QUIZ_CONFIG").unwrap_or_else(|_err| "quiz.toml".into());
    let config = fs::read_to_string(&config_path).await?;
    let config: Config = toml::from_str(&config)?;

    info!(
        path = %config_path,
        quizzes = config.quiz.len(),
        countdown_secs = config.session.countdown_secs,
        "loaded config"
    );

    let repository = MemoryRepository::new(config.quiz.iter());
    let controller = SessionController::new(Arc::new(repository), config.session);

    let cors = warp::cors()
        .allow_origin(cors_origin.as_str())
        .allow_methods(vec!["GET", "POST", "PUT"])
        .allow_headers(vec!["Content-Type"]);

    let server = api::routes(controller)
        .with(cors)
        .with(warp::trace::request());

    info!(%bind_addr, "listening");
    warp::serve(server).run(bind_addr).await;

    Ok(())
}
