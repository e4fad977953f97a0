//! Zenoh transport.

use std::sync::Arc;

use sensorlog_common::{ZenohConfig, connect};

use crate::error::{BridgeError, PublishError, Result};
use crate::publisher::Publisher;

/// Publisher that puts each message on a Zenoh key expression equal to the topic.
#[derive(Clone, Debug)]
pub struct ZenohPublisher {
    session: Arc<zenoh::Session>,
}

impl ZenohPublisher {
    /// Open a Zenoh session with the given configuration.
    pub async fn connect(config: &ZenohConfig) -> Result<Self> {
        let session = connect(config)
            .await
            .map_err(|e| BridgeError::BrokerConnection(e.to_string()))?;

        Ok(Self::from_session(Arc::new(session)))
    }

    /// Wrap an already open session.
    pub fn from_session(session: Arc<zenoh::Session>) -> Self {
        Self { session }
    }

    /// Close the Zenoh session.
    pub async fn close(&self) {
        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }
    }
}

impl Publisher for ZenohPublisher {
    async fn publish(&self, topic: &str, payload: &[u8]) -> std::result::Result<(), PublishError> {
        self.session
            .put(topic, payload.to_vec())
            .await
            .map_err(|e| PublishError::Rejected {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(key = %topic, bytes = payload.len(), "Published to Zenoh");
        Ok(())
    }
}
