//! Broker publishing.
//!
//! Readings leave the logger through the [`Publisher`] trait. Two transports
//! are provided: MQTT ([`MqttPublisher`]) and Zenoh ([`ZenohPublisher`]),
//! selected at startup from [`BrokerConfig`] and wrapped in
//! [`BrokerPublisher`].

use std::future::Future;

use serde::{Deserialize, Serialize};

use sensorlog_common::ZenohConfig;

use crate::error::{BridgeError, PublishError, Result};
use crate::mqtt::{MqttConfig, MqttPublisher};
use crate::zenoh_publisher::ZenohPublisher;

/// Best-effort delivery of one message to a broker topic.
///
/// No acknowledgement is surfaced to the caller; an `Err` means the message
/// could not even be handed to the transport.
pub trait Publisher {
    /// Publish `payload` on `topic`.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = std::result::Result<(), PublishError>> + Send;
}

/// Broker transport selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BrokerConfig {
    /// MQTT broker (host/port).
    Mqtt(MqttConfig),
    /// Zenoh network.
    Zenoh(ZenohConfig),
}

impl BrokerConfig {
    /// Short name of the transport, for logs and status.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerConfig::Mqtt(_) => "mqtt",
            BrokerConfig::Zenoh(_) => "zenoh",
        }
    }

    /// Validate transport settings.
    pub fn validate(&self) -> Result<()> {
        match self {
            BrokerConfig::Mqtt(mqtt) => mqtt.validate(),
            BrokerConfig::Zenoh(zenoh) => match zenoh.mode.as_str() {
                "client" | "peer" | "router" => Ok(()),
                other => Err(BridgeError::validation(format!(
                    "broker: invalid Zenoh mode '{}'",
                    other
                ))),
            },
        }
    }
}

/// Publisher for whichever transport was configured.
#[derive(Clone, Debug)]
pub enum BrokerPublisher {
    Mqtt(MqttPublisher),
    Zenoh(ZenohPublisher),
}

impl BrokerPublisher {
    /// Connect to the configured broker.
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        match config {
            BrokerConfig::Mqtt(mqtt) => Ok(Self::Mqtt(MqttPublisher::connect(mqtt)?)),
            BrokerConfig::Zenoh(zenoh) => Ok(Self::Zenoh(ZenohPublisher::connect(zenoh).await?)),
        }
    }

    /// Close the underlying connection. Errors are logged, not returned.
    pub async fn close(&self) {
        match self {
            BrokerPublisher::Mqtt(p) => p.close().await,
            BrokerPublisher::Zenoh(p) => p.close().await,
        }
    }
}

impl Publisher for BrokerPublisher {
    async fn publish(&self, topic: &str, payload: &[u8]) -> std::result::Result<(), PublishError> {
        match self {
            BrokerPublisher::Mqtt(p) => p.publish(topic, payload).await,
            BrokerPublisher::Zenoh(p) => p.publish(topic, payload).await,
        }
    }
}
