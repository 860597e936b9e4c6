//! doorman is a small session gateway in front of Google sign-in
//!
//! Users log in through Google's OAuth consent screen; the profile Google
//! returns is kept in a server-side session and served back to the frontend
//! from session-gated routes.

use std::env::var;
use std::sync::Arc;

use anyhow::Context;
use doorman::{config::Config, oidc::GoogleProvider, shutdown, ServerState};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let provider = GoogleProvider::discover(&config)
        .await
        .context("unable to set up Google sign-in")?;

    let addr = config.addr();
    let app = doorman::app(ServerState::new(config, Arc::new(provider)));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("unable to bind {}", addr))?;

    info!("serving on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await
        .context("server unexpectedly stopped")
}
