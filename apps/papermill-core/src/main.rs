use anyhow::Context;
use axum::Router;
use papermill_core::{api, app, config};
use std::net::SocketAddr;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    papermill_telemetry::init();

    let (cfg, cfg_path) = config::Config::load().context("loading papermill config")?;
    info!(?cfg_path, "config loaded");

    let addr: SocketAddr = cfg
        .bind_addr()
        .parse()
        .context("invalid bind address (PAPERMILL_BIND / PORT / [server].bind)")?;
    let sessions_dir = cfg.sessions_dir();
    tokio::fs::create_dir_all(&sessions_dir)
        .await
        .with_context(|| format!("creating sessions dir {}", sessions_dir.display()))?;

    let state = app::AppState::new(cfg).context("building app state")?;
    let router: Router = api::build_router(state);

    info!(%addr, version = env!("CARGO_PKG_VERSION"), "papermill-core listening");

    let server = axum::serve(
        tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let graceful = server.with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received; shutting down");
    });

    if let Err(e) = graceful.await {
        error!(error = %e, "server error");
    }

    Ok(())
}
