//! SensorTile data logger.
//!
//! Polls a BLE sensor board and publishes its readings to MQTT or Zenoh.

use anyhow::{Context, Result};
use tracing::info;

use sensorlog_ble::btle::BtleGateway;
use sensorlog_ble::config::SensorLogConfig;
use sensorlog_ble::poller::Poller;
use sensorlog_framework::{BridgeArgs, BridgeConfig, BridgeRunner, RunOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("sensorlog.json5");

    let config = SensorLogConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let runner = BridgeRunner::new_with_args("ble", config, Some(&args))
        .await
        .context("Failed to start bridge")?;
    info!("Loaded configuration from {:?}", args.config);

    let gateway = BtleGateway::new()
        .await
        .context("Failed to open Bluetooth adapter")?;

    let mut poller = Poller::new(gateway, runner.publisher(), runner.config());
    let metadata = runner.config().status_metadata();

    let outcome = runner.run(poller.run(), Some(metadata)).await?;
    poller.shutdown().await;

    match outcome {
        RunOutcome::Completed(Ok(reason)) => {
            info!(reason = ?reason, "{}. Exiting...", reason);
            Ok(())
        }
        RunOutcome::Completed(Err(e)) => Err(e).context("Sensor polling failed"),
        RunOutcome::Interrupted => {
            info!("Exiting...");
            Ok(())
        }
    }
}
