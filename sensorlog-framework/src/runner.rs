//! Bridge runner for lifecycle management.

use std::future::Future;

use tokio::signal;

use sensorlog_common::init_tracing;

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::BrokerPublisher;
use crate::status::StatusPublisher;

/// How a bridge run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    /// The worker finished on its own with this output.
    Completed(T),
    /// The operator pressed Ctrl+C before the worker finished.
    Interrupted,
}

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - Broker connection
/// - Status publishing (optional)
/// - Racing the worker against Ctrl+C
/// - Broker shutdown
///
/// # Example
///
/// ```ignore
/// use sensorlog_framework::{BridgeArgs, BridgeConfig, BridgeRunner, RunOutcome};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
///     let mut worker = MyWorker::new(runner.publisher());
///
///     match runner.run(worker.run(), None).await? {
///         RunOutcome::Completed(result) => result?,
///         RunOutcome::Interrupted => {}
///     }
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging and status.
    name: String,
    /// The loaded configuration.
    config: C,
    /// Publisher for readings.
    publisher: BrokerPublisher,
    /// Status publisher (enabled when the config names a status topic).
    status_publisher: Option<StatusPublisher<BrokerPublisher>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner with CLI args for log level override.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Connect to the broker
    /// 3. Set up status publishing if a status topic is configured
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let level_override = args.and_then(|a| a.log_level.as_deref());
        let log_config = config.logging().with_level_override(level_override);
        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let publisher = BrokerPublisher::connect(config.broker()).await?;

        tracing::info!(transport = config.broker().kind(), "Broker publisher ready");

        let status_publisher = config.status_topic().map(|topic| {
            StatusPublisher::new(publisher.clone(), topic, name.clone(), version.clone())
        });

        Ok(Self {
            name,
            config,
            publisher,
            status_publisher,
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> BrokerPublisher {
        self.publisher.clone()
    }

    /// Run `worker` until it completes or Ctrl+C is received.
    ///
    /// This will:
    /// 1. Publish "running" status (if enabled)
    /// 2. Race the worker against Ctrl+C, dropping the worker on interrupt
    /// 3. Publish "error" status if the worker failed, "offline" otherwise (if enabled)
    /// 4. Close the broker connection
    pub async fn run<F, T, E>(
        self,
        worker: F,
        metadata: Option<serde_json::Value>,
    ) -> Result<RunOutcome<std::result::Result<T, E>>>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        if let Some(ref status_pub) = self.status_publisher {
            if let Err(e) = status_pub.publish_running(metadata).await {
                tracing::warn!(error = %e, "Failed to publish running status");
            }
        }

        tracing::info!(bridge = %self.name, "Bridge running. Press Ctrl+C to stop.");

        let outcome = race_interrupt(worker, async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

        if matches!(outcome, RunOutcome::Interrupted) {
            tracing::info!(bridge = %self.name, "Received shutdown signal");
        }

        if let Some(ref status_pub) = self.status_publisher {
            let published = match &outcome {
                RunOutcome::Completed(Err(e)) => status_pub.publish_error(e.to_string()).await,
                _ => status_pub.publish_offline().await,
            };
            if let Err(e) = published {
                tracing::warn!(error = %e, "Failed to publish final status");
            }
        }

        self.publisher.close().await;

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(outcome)
    }
}

/// Drive `worker` to completion unless `interrupt` resolves first.
async fn race_interrupt<F, I, T>(worker: F, interrupt: I) -> RunOutcome<T>
where
    F: Future<Output = T>,
    I: Future<Output = ()>,
{
    tokio::select! {
        value = worker => RunOutcome::Completed(value),
        _ = interrupt => RunOutcome::Interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_worker_completes_first() {
        let outcome = tokio_test::block_on(race_interrupt(async { 7 }, std::future::pending()));
        assert_eq!(outcome, RunOutcome::Completed(7));
    }

    #[tokio::test]
    async fn test_interrupt_drops_worker() {
        let worker = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            1
        };
        let outcome = race_interrupt(worker, async {}).await;
        assert_eq!(outcome, RunOutcome::Interrupted);
    }
}
