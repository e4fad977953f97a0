//! BlueST gateway on top of btleplug.

use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bluest;
use crate::gateway::{Capability, DiscoveredDevice, GatewayError, SensorGateway};

/// One feature of a BlueST characteristic, exposed as a capability.
#[derive(Debug, Clone)]
struct FeatureSlot {
    characteristic: Characteristic,
    mask: u32,
    bit: u32,
    name: &'static str,
}

struct Connection {
    peripheral: Peripheral,
    features: Vec<FeatureSlot>,
    /// Set once the adapter reports the peripheral gone.
    gone: watch::Receiver<bool>,
    watcher: JoinHandle<()>,
}

/// Gateway for ST SensorTile boards using the first Bluetooth adapter.
pub struct BtleGateway {
    adapter: Adapter,
    discovered: Vec<Peripheral>,
    connection: Option<Connection>,
}

impl BtleGateway {
    /// Open the first Bluetooth adapter of the host.
    pub async fn new() -> Result<Self, GatewayError> {
        let manager = Manager::new()
            .await
            .map_err(|e| GatewayError::Adapter(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| GatewayError::Adapter(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Adapter("no Bluetooth adapter found".to_string()))?;

        match adapter.adapter_info().await {
            Ok(adapter_info) => info!(adapter = %adapter_info, "Using Bluetooth adapter"),
            Err(e) => debug!(error = %e, "Adapter info unavailable"),
        }

        Ok(Self {
            adapter,
            discovered: Vec::new(),
            connection: None,
        })
    }

    fn connection(&self) -> Result<&Connection, GatewayError> {
        self.connection.as_ref().ok_or(GatewayError::NotConnected)
    }
}

/// Every known feature of every BlueST characteristic, in characteristic order.
fn feature_slots(peripheral: &Peripheral) -> Vec<FeatureSlot> {
    let mut slots = Vec::new();
    for characteristic in peripheral.characteristics() {
        if !characteristic.properties.contains(CharPropFlags::NOTIFY) {
            continue;
        }
        let Some(mask) = bluest::feature_mask(&characteristic.uuid) else {
            continue;
        };
        for (bit, feature) in bluest::features(mask) {
            slots.push(FeatureSlot {
                characteristic: characteristic.clone(),
                mask,
                bit,
                name: feature.name(),
            });
        }
    }
    slots
}

/// Flag `gone` when the adapter reports `peripheral` disconnected.
///
/// Dropping `gone` without setting it means the event stream ended, which
/// waiters also treat as a disconnection.
async fn watch_disconnect(adapter: Adapter, peripheral: Peripheral, gone: watch::Sender<bool>) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "Cannot watch adapter events; disconnections are noticed on read");
            // Keep the sender alive so waiters stay pending.
            gone.closed().await;
            return;
        }
    };

    let id = peripheral.id();
    while let Some(event) = events.next().await {
        if let CentralEvent::DeviceDisconnected(gone_id) = event {
            if gone_id == id {
                debug!(device = %peripheral.address(), "Adapter reported disconnection");
                gone.send_replace(true);
                return;
            }
        }
    }
}

impl SensorGateway for BtleGateway {
    async fn discover(&mut self, window: Duration) -> Result<Vec<DiscoveredDevice>, GatewayError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        info!("Discovery started");

        tokio::time::sleep(window).await;

        self.adapter.stop_scan().await?;
        info!("Discovery stopped");

        self.discovered = self.adapter.peripherals().await?;

        let mut devices = Vec::with_capacity(self.discovered.len());
        for peripheral in &self.discovered {
            let name = match peripheral.properties().await {
                Ok(properties) => properties.and_then(|p| p.local_name),
                Err(e) => {
                    debug!(error = %e, "Failed to read peripheral properties");
                    None
                }
            };
            let device = DiscoveredDevice {
                id: peripheral.address().to_string(),
                name,
            };
            info!(device = %device, "New device discovered");
            devices.push(device);
        }

        Ok(devices)
    }

    async fn connect(&mut self, device: &DiscoveredDevice) -> Result<(), GatewayError> {
        let peripheral = self
            .discovered
            .iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(&device.id))
            .cloned()
            .ok_or_else(|| GatewayError::UnknownDevice(device.id.clone()))?;

        peripheral
            .connect()
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        let features = feature_slots(&peripheral);
        info!(device = %device, features = features.len(), "Device connected");

        let (gone_tx, gone) = watch::channel(false);
        let watcher = tokio::spawn(watch_disconnect(
            self.adapter.clone(),
            peripheral.clone(),
            gone_tx,
        ));

        self.connection = Some(Connection {
            peripheral,
            features,
            gone,
            watcher,
        });
        Ok(())
    }

    async fn capabilities(&self) -> Result<Vec<Capability>, GatewayError> {
        let connection = self.connection()?;
        Ok(connection
            .features
            .iter()
            .enumerate()
            .map(|(index, slot)| Capability {
                index,
                name: slot.name.to_string(),
            })
            .collect())
    }

    async fn read_once(
        &mut self,
        capability: &Capability,
        timeout: Duration,
    ) -> Result<Option<String>, GatewayError> {
        let connection = self.connection()?;
        let peripheral = &connection.peripheral;

        let gone = *connection.gone.borrow();
        if gone || !peripheral.is_connected().await? {
            return Err(GatewayError::Disconnected);
        }

        let slot = connection
            .features
            .get(capability.index)
            .ok_or(GatewayError::UnknownCapability(capability.index))?;
        let uuid = slot.characteristic.uuid;

        let mut notifications = peripheral.notifications().await?;
        peripheral.subscribe(&slot.characteristic).await?;

        let received = tokio::time::timeout(timeout, async {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == uuid {
                    return Some(notification.value);
                }
            }
            None
        })
        .await;

        let value = match received {
            Err(_) => None,
            Ok(Some(value)) => Some(value),
            Ok(None) => return Err(GatewayError::Disconnected),
        };

        if let Err(e) = peripheral.unsubscribe(&slot.characteristic).await {
            if !peripheral.is_connected().await.unwrap_or(false) {
                return Err(GatewayError::Disconnected);
            }
            return Err(e.into());
        }

        match value {
            Some(data) => Ok(Some(bluest::decode(slot.mask, slot.bit, &data)?)),
            None => {
                debug!(capability = %capability.name, "No notification before timeout");
                Ok(None)
            }
        }
    }

    async fn disconnected(&self) -> Result<(), GatewayError> {
        let mut gone = self.connection()?.gone.clone();
        if gone.wait_for(|gone| *gone).await.is_err() {
            debug!("Adapter event watcher stopped");
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), GatewayError> {
        if let Some(connection) = self.connection.take() {
            connection.watcher.abort();
            let result = connection.peripheral.disconnect().await;
            match &result {
                Ok(()) => info!(device = %connection.peripheral.address(), "Device disconnected"),
                Err(e) => warn!(error = %e, "Error disconnecting device"),
            }
            result?;
        }
        Ok(())
    }
}
