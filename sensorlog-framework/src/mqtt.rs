//! MQTT transport built on rumqttc.
//!
//! The client queues messages; a background task drives the rumqttc event
//! loop. The first transport failure seen by that task is latched and
//! reported by every later [`Publisher::publish`] call, so a lost broker
//! surfaces to the caller instead of being retried silently.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, PublishError, Result};
use crate::publisher::Publisher;

/// MQTT broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or IP address.
    pub host: String,

    /// Broker TCP port (default: 1883).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval in seconds (default: 30).
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Number of publishes that may be queued before `publish` waits.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "sensorlog".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_request_capacity() -> usize {
    10
}

impl MqttConfig {
    /// Validate MQTT settings.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(BridgeError::validation("broker: host cannot be empty"));
        }
        if self.port == 0 {
            return Err(BridgeError::validation("broker: port must be 1-65535"));
        }
        if self.client_id.is_empty() || self.client_id.len() > 23 {
            return Err(BridgeError::validation(
                "broker: client_id must be 1-23 characters",
            ));
        }
        if self.keep_alive_secs < 5 {
            return Err(BridgeError::validation(
                "broker: keep_alive_secs must be at least 5",
            ));
        }
        Ok(())
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        options.set_clean_session(true);
        options
    }
}

/// Fire-and-forget MQTT publisher (QoS 0, not retained).
#[derive(Clone, Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
    failure: watch::Receiver<Option<String>>,
    driver: Arc<JoinHandle<()>>,
}

impl MqttPublisher {
    /// Create the client and start driving its event loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: &MqttConfig) -> Result<Self> {
        config.validate()?;

        let (client, event_loop) = AsyncClient::new(config.options(), config.request_capacity);
        let (failure_tx, failure) = watch::channel(None);

        info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            "Connecting to MQTT broker"
        );

        let driver = tokio::spawn(drive_event_loop(event_loop, failure_tx));

        Ok(Self {
            client,
            failure,
            driver: Arc::new(driver),
        })
    }

    /// Disconnect from the broker and stop the event loop task.
    pub async fn close(&self) {
        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "Error disconnecting from MQTT broker");
        }
        // Give the event loop a moment to flush the DISCONNECT packet.
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.driver.abort();
    }

    fn check_transport(&self) -> std::result::Result<(), PublishError> {
        match self.failure.borrow().as_ref() {
            Some(reason) => Err(PublishError::Transport(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &[u8]) -> std::result::Result<(), PublishError> {
        self.check_transport()?;

        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map_err(|e| PublishError::Rejected {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        debug!(topic = %topic, bytes = payload.len(), "Queued MQTT publish");
        Ok(())
    }
}

async fn drive_event_loop(mut event_loop: EventLoop, failure: watch::Sender<Option<String>>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(code = ?ack.code, "MQTT broker accepted connection");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT client disconnected");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "MQTT transport failed");
                let _ = failure.send(Some(e.to_string()));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MqttConfig {
        json5::from_str(r#"{ host: "localhost" }"#).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.port, 1883);
        assert_eq!(config.client_id, "sensorlog");
        assert_eq!(config.keep_alive_secs, 30);
        assert_eq!(config.request_capacity, 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_empty_host() {
        let mut config = config();
        config.host.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_client_id_length() {
        let mut config = config();
        config.client_id = "x".repeat(24);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_latched_failure_rejects_publish() {
        let (client, _event_loop) = AsyncClient::new(config().options(), 10);
        let (failure_tx, failure) = watch::channel(None);
        let publisher = MqttPublisher {
            client,
            failure,
            driver: Arc::new(tokio::spawn(async {})),
        };

        failure_tx
            .send(Some("connection refused".to_string()))
            .unwrap();

        let err = publisher
            .publish("sensor/temperature", b"21.5")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PublishError::Transport("connection refused".to_string())
        );
    }

    #[tokio::test]
    async fn test_publish_queues_while_healthy() {
        let (client, _event_loop) = AsyncClient::new(config().options(), 10);
        let (_failure_tx, failure) = watch::channel(None);
        let publisher = MqttPublisher {
            client,
            failure,
            driver: Arc::new(tokio::spawn(async {})),
        };

        publisher
            .publish("sensor/humidity", b"48.0")
            .await
            .unwrap();
    }
}
