use slither_client::config::ClientConfig;
use slither_client::{game, session};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env();
    let world = game::world::shared();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    // The input collaborator publishes `(heading, boost)` through the
    // handle; the headless binary leaves the defaults in place.
    let (input_handle, input_rx) = session::input::channel();
    let _input = input_handle;

    let summary = session::run(&config, &world, input_rx, shutdown_rx).await?;
    tracing::debug!(
        world = %serde_json::to_string(&world.read().snapshot())?,
        "final world snapshot"
    );
    tracing::info!(summary = %serde_json::to_string(&summary)?, "session summary");
    Ok(())
}
