mod email;
mod error;
mod model;
mod network;
mod prompt;
mod request_tracing;
mod routes;
mod server_config;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use std::{env, net::SocketAddr};

use anyhow::Context;
use axum::{extract::FromRef, Router};
use mimalloc::MiMalloc;
use routes::AppRouter;
use server_config::ServerConfig;
use state::ingest::Ingestor;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
struct ServerState {
    ingestor: Ingestor,
}

impl ServerState {
    fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;
        let ingestor = Ingestor::from_config(config, http_client)?;

        Ok(Self { ingestor })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let json_logs = env::var("LOG_FORMAT").is_ok_and(|v| v == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with((!json_logs).then(|| tracing_subscriber::fmt::Layer::default().with_ansi(false)))
        .with(json_logs.then(|| tracing_subscriber::fmt::Layer::default().json()))
        .init();

    let config = ServerConfig::load().context("Failed to load configuration")?;
    tracing::info!("{}", config);

    let state = ServerState::from_config(&config)?;
    let router = AppRouter::create(state);

    run_server(router, config.env.port).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining in-flight invocations");
}

async fn run_server(router: Router, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Offer ingest server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
