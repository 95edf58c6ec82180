mod bgp;
mod config;
mod control;
mod error;
mod fabric;
mod ipam;
mod models;
mod planner;
mod topology;
mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use control::NetvisorCli;
use fabric::FabricOrchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge_ztp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = Config::load();
    let settings = cfg.fabric_settings()?;
    let session = cfg.cli_session()?;
    tracing::info!("Starting ForgeConfig ZTP");
    tracing::info!("Fabric: {} ({})", settings.fabric_name, settings.mode);
    tracing::info!("CLI host: {}", session.host);
    tracing::info!("Spines: {}", settings.spines.join(", "));
    tracing::info!("Leaves: {}", settings.leaves.join(", "));

    let control = NetvisorCli::new(session);
    let run = FabricOrchestrator::new(&control, settings).run().await;

    println!("{}", serde_json::to_string_pretty(&run)?);

    if !run.succeeded() {
        anyhow::bail!("fabric run {} failed", run.run_id);
    }
    Ok(())
}
