//! Sensor gateway abstraction.
//!
//! The poll loop talks to the sensor board only through [`SensorGateway`],
//! so discovery, connection and notification handling can be swapped for an
//! in-memory implementation in tests.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::bluest::DecodeError;

/// A device seen during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Stable hardware identifier (the BLE address).
    pub id: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} [{}]", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// One readable capability of the connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// Position in the list reported by the gateway.
    pub index: usize,
    /// Advertised capability name (e.g. "Temperature").
    pub name: String,
}

/// Errors raised by a gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Bluetooth adapter unavailable: {0}")]
    Adapter(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("No device connected")]
    NotConnected,

    #[error("Device disconnected unexpectedly")]
    Disconnected,

    #[error("Unknown capability #{0}")]
    UnknownCapability(usize),

    #[error("Failed to decode notification: {0}")]
    Decode(#[from] DecodeError),

    #[error("Bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),
}

/// Discovery, connection and one-shot reads from a single sensor board.
pub trait SensorGateway {
    /// Scan for `window` and return every device seen.
    fn discover(
        &mut self,
        window: Duration,
    ) -> impl Future<Output = Result<Vec<DiscoveredDevice>, GatewayError>> + Send;

    /// Connect to a device returned by the last discovery.
    fn connect(
        &mut self,
        device: &DiscoveredDevice,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Capabilities of the connected device, in the order the device reports them.
    fn capabilities(&self) -> impl Future<Output = Result<Vec<Capability>, GatewayError>> + Send;

    /// Enable streaming on `capability`, wait up to `timeout` for one sample,
    /// then disable streaming.
    ///
    /// Returns `Ok(None)` when no sample arrived in time and
    /// [`GatewayError::Disconnected`] when the device went away.
    fn read_once(
        &mut self,
        capability: &Capability,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<String>, GatewayError>> + Send;

    /// Resolves once the connected device goes away.
    ///
    /// Pending for as long as the connection holds, so it can be raced
    /// against the wait between poll cycles.
    fn disconnected(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Disconnect from the device.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
