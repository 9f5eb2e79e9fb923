use clap::Parser; // for cli
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rate_gate::config::Args;
use rate_gate::handlers;
use rate_gate::rate_limit::{RateLimiter, spawn_cleanup};
use rate_gate::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments, bad policies stop us here
    let args = Args::parse();
    let policies = args.policy_table();
    let cleanup = args.cleanup_config(&policies)?;

    let limiter = RateLimiter::new();
    let state = AppState::new(limiter.clone(), policies);

    // spawn the background sweeper, stopped through the watch channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_cleanup(limiter, cleanup, shutdown_rx);

    let app = handlers::router(state.clone())?;

    let listener = tokio::net::TcpListener::bind(args.bind_addr()).await?;
    info!("rate-gate listening on {}", listener.local_addr()?);
    for (name, options) in state.policies.iter() {
        info!(
            "Policy {}: {} requests per {} ms",
            name,
            options.max(),
            options.window_ms()
        );
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    sweeper.await?;
    info!("rate-gate stopped");
    Ok(())
}

// wait for SIGTERM or Ctrl+C
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
