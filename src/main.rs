// src/main.rs

//! # Credential agent entry point
//!
//! Opens the ledger pool and wallet described by the configuration and
//! serves the issuer and holder API until interrupted.
//!
//! ## Configuration
//! - `anoncreds.toml` in the working directory (optional)
//! - `ANONCREDS__*` environment variables, e.g. `ANONCREDS__API__BIND_ADDR`
//! - `.env` is loaded first when present
//! - `RUST_LOG` overrides `log_level`

use anyhow::Context;
use did_anoncreds::services::ApiServer;
use did_anoncreds::wallet::KeyHandle;
use did_anoncreds::{AgentContext, Settings};
use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use std::time::Duration;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment and configuration
/// 2. Open the ledger pool and wallet
/// 3. Start the API server
///
/// The context guard lives until `main` returns, so the pool and wallet are
/// closed on shutdown and on every startup failure after they were opened.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let settings = Settings::load().context("failed to load configuration")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log_level)).init();

    let guard = AgentContext::open(&settings)
        .await
        .context("failed to open ledger pool and wallet")?;
    let steward = KeyHandle::from_seed(settings.ledger.steward_seed.as_bytes())?;
    info!("steward {} ready on pool {}", steward.did(), settings.ledger.pool_name);

    let addr: SocketAddr = settings
        .api
        .bind_addr
        .parse()
        .with_context(|| format!("invalid api.bind_addr {:?}", settings.api.bind_addr))?;
    let server = ApiServer::new(
        guard.context().clone(),
        steward.did().clone(),
        Duration::from_millis(settings.api.request_timeout_ms),
    );

    tokio::select! {
        served = server.run(addr) => served.context("API server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}
