//! recon_server: HTTP entry point for the image reconstruction service.
//!
//! Router assembly, tracing initialization, and the listener loop follow the
//! teacher's `tinyzkp_api::main` shape, pared down to this service's single
//! job-submission endpoint plus a health check.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use cgnr_recon::config::Config;
use cgnr_recon::server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "recon_server=info,tower_http=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env();
    info!(addr = %config.addr, max_concurrent_jobs = config.max_concurrent_jobs, "starting recon_server");

    let addr = config.addr;
    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
