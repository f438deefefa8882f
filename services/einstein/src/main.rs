//! einstein: the BMI operation server.

use anyhow::Result;
use bmi_einstein::{
    api,
    authz::build_policy,
    backends::Deployment,
    config::Config,
    orchestrator::{Orchestrator, Settings},
    state::AppState,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Prefer RUST_LOG, fall back to BMI_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting einstein");
    info!(
        listen_addr = %config.rpc.listen_addr,
        uid = config.bmi.uid,
        pool = %config.fs.pool,
        policy = ?config.bmi.policy,
        "Configuration loaded"
    );

    let settings = Settings::from(&config.bmi);
    let policy = build_policy(
        config.bmi.policy,
        &config.bmi.admin_project,
        &config.bmi.admin_users,
    );
    let listen_addr = config.rpc.listen_addr;
    let service = config.bmi.service;
    let deployment = Deployment::new(config)?;

    let state = AppState::new(Box::new(deployment), policy, settings);

    if service {
        let state = state.clone();
        let restored = tokio::task::spawn_blocking(move || {
            match Orchestrator::bootstrap(state.provider(), state.policy(), state.settings().clone()) {
                Ok(orch) => {
                    orch.remake_mappings();
                    orch.close();
                }
                Err(e) => error!(error = %e, "Failed to open orchestrator for target restore"),
            }
        })
        .await;
        if let Err(e) = restored {
            warn!(error = %e, "Target restore task failed");
        }
    }

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("einstein shut down");
    Ok(())
}
