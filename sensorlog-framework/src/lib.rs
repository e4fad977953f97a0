//! SensorLog Bridge Framework
//!
//! Common abstractions for bridges that republish sensor readings to a broker.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] trait with MQTT ([`MqttPublisher`]) and Zenoh ([`ZenohPublisher`]) transports
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use sensorlog_framework::{BridgeArgs, BridgeConfig, BridgeRunner, RunOutcome};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!     let mut worker = MyWorker::new(runner.publisher());
//!
//!     // Run until the worker stops or Ctrl+C
//!     if let RunOutcome::Completed(result) = runner.run(worker.run(), None).await? {
//!         result?;
//!     }
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod mqtt;
mod publisher;
mod runner;
mod status;
mod zenoh_publisher;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, PublishError, Result};
pub use mqtt::{MqttConfig, MqttPublisher};
pub use publisher::{BrokerConfig, BrokerPublisher, Publisher};
pub use runner::{BridgeRunner, RunOutcome};
pub use status::{BridgeStatus, StatusPublisher};
pub use zenoh_publisher::ZenohPublisher;

// Re-export commonly used types from sensorlog-common
pub use sensorlog_common::{Channel, LogFormat, LoggingConfig, Reading, ZenohConfig};
