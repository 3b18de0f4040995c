use anyhow::{Context, Result};
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil_keeper::{DryRunSink, FileTelemetryProvider, Keeper, KeeperConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_keeper=info,ncn_oracle=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = KeeperConfig::from_env().context("loading keeper configuration")?;
    info!(
        markets = config.markets.len(),
        interval_secs = config.interval_secs,
        telemetry_dir = %config.telemetry_dir.display(),
        "starting vigil keeper"
    );
    warn!("no signer configured, sync instructions are logged only");

    let provider = FileTelemetryProvider::new(config.telemetry_dir.clone());
    let mut interval = time::interval(config.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut keeper = Keeper::new(config, provider, Box::new(DryRunSink))?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut iteration = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                iteration += 1;
                let now = chrono::Utc::now().timestamp();
                let report = keeper.tick(now).await;
                if report.failed > 0 {
                    warn!(iteration, failed = report.failed, "tick finished with failures");
                }
            }
            _ = &mut shutdown => {
                info!(iteration, "shutdown signal received");
                break;
            }
        }
    }

    info!("vigil keeper stopped");
    Ok(())
}
