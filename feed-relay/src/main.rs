use feed_relay::{Relay, RelayConfig, RunOutcome};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    ExitCode::from(exit_status(&run().await))
}

fn exit_status(result: &anyhow::Result<RunOutcome>) -> u8 {
    match result {
        Ok(outcome) => {
            if let RunOutcome::Aborted(e) = outcome {
                warn!("Delivery stopped early: {}", e);
            }
            outcome.exit_code()
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

async fn run() -> anyhow::Result<RunOutcome> {
    let config = RelayConfig::from_env()?;
    info!("Starting feed relay: {} -> {}", config.feed_url, config.channel);

    let relay = Relay::from_config(&config)?;
    let summary = relay.run().await?;

    Ok(summary.outcome)
}
