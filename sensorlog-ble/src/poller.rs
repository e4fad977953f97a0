//! Sensor polling loop.
//!
//! The poller discovers and connects to the configured board, binds the
//! temperature, humidity and pressure channels, then reads all three once
//! per cycle and records each reading. Conditions that end the run without
//! being a fault are reported as a [`StopReason`]; everything else is a
//! [`PollerError`].

use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

use tracing::{debug, info, warn};

use sensorlog_common::Reading;
use sensorlog_framework::Publisher;

use crate::binding::{BoundChannel, MissingChannel, bind_channels};
use crate::config::SensorLogConfig;
use crate::gateway::{GatewayError, SensorGateway};
use crate::recorder::{Recorder, RecorderError};

/// Error type for polling operations.
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    #[error(transparent)]
    MissingChannel(#[from] MissingChannel),
}

/// Connection state of the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Discovering,
    Connected,
}

/// Why the poller stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Discovery found no devices at all.
    NoDevices,
    /// The target device was not among the discovered ones.
    DeviceNotFound,
    /// Connecting to the target device failed.
    ConnectionFailed,
    /// The device went away while connected.
    Disconnected,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::NoDevices => "No Bluetooth devices found",
            StopReason::DeviceNotFound => "Device not found",
            StopReason::ConnectionFailed => "Connection failed",
            StopReason::Disconnected => "Device disconnected unexpectedly",
        };
        f.write_str(text)
    }
}

/// Polls one sensor board and records its readings.
pub struct Poller<G, P> {
    gateway: G,
    recorder: Recorder<P>,
    config: SensorLogConfig,
    state: PollerState,
    channels: Vec<BoundChannel>,
}

impl<G: SensorGateway, P: Publisher> Poller<G, P> {
    pub fn new(gateway: G, publisher: P, config: &SensorLogConfig) -> Self {
        Self {
            gateway,
            recorder: Recorder::new(&config.storage, publisher),
            config: config.clone(),
            state: PollerState::Discovering,
            channels: Vec::new(),
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Channels bound on the connected device, in polling order.
    pub fn channels(&self) -> &[BoundChannel] {
        &self.channels
    }

    /// Run until a stop condition or an error.
    ///
    /// There is no retry: the first discovery, connection or disconnection
    /// failure ends the run.
    pub async fn run(&mut self) -> Result<StopReason, PollerError> {
        if let ControlFlow::Break(reason) = self.connect_device().await? {
            return Ok(reason);
        }

        self.bind().await?;

        let interval = self.config.poll_interval();
        info!(
            interval_secs = interval.as_secs(),
            logs = ?self.recorder.paths(),
            "Polling started"
        );

        loop {
            let flow = match self.poll_once().await? {
                ControlFlow::Continue(()) => self.idle(interval).await?,
                stop => stop,
            };
            if let ControlFlow::Break(reason) = flow {
                self.state = PollerState::Discovering;
                return Ok(reason);
            }
        }
    }

    /// Wait out the poll interval, stopping early if the device goes away.
    async fn idle(&self, interval: Duration) -> Result<ControlFlow<StopReason>, PollerError> {
        tokio::select! {
            _ = tokio::time::sleep(interval) => Ok(ControlFlow::Continue(())),
            gone = self.gateway.disconnected() => {
                gone?;
                warn!("Device disconnected unexpectedly");
                Ok(ControlFlow::Break(StopReason::Disconnected))
            }
        }
    }

    /// Disconnect from the device if still connected. Errors are logged.
    pub async fn shutdown(&mut self) {
        if self.state != PollerState::Connected {
            return;
        }
        if let Err(e) = self.gateway.disconnect().await {
            warn!(error = %e, "Failed to disconnect from device");
        }
        self.state = PollerState::Discovering;
    }

    async fn connect_device(&mut self) -> Result<ControlFlow<StopReason>, PollerError> {
        self.state = PollerState::Discovering;
        info!(
            scan_secs = self.config.device.scan_secs,
            "Scanning Bluetooth devices..."
        );

        let devices = self.gateway.discover(self.config.scan_window()).await?;
        if devices.is_empty() {
            warn!("No Bluetooth devices found");
            return Ok(ControlFlow::Break(StopReason::NoDevices));
        }

        let target = &self.config.device.id;
        let Some(device) = devices.iter().find(|d| d.id.eq_ignore_ascii_case(target)) else {
            warn!(device = %target, discovered = devices.len(), "Device not found");
            return Ok(ControlFlow::Break(StopReason::DeviceNotFound));
        };

        info!(device = %device, "Connecting");
        if let Err(e) = self.gateway.connect(device).await {
            warn!(device = %device, error = %e, "Connection failed");
            return Ok(ControlFlow::Break(StopReason::ConnectionFailed));
        }

        self.state = PollerState::Connected;
        info!(device = %device, "Connection done");
        Ok(ControlFlow::Continue(()))
    }

    async fn bind(&mut self) -> Result<(), PollerError> {
        let capabilities = self.gateway.capabilities().await?;

        info!(count = capabilities.len(), "Features:");
        for capability in &capabilities {
            info!("{}) {}", capability.index, capability.name);
        }

        self.channels = bind_channels(&capabilities, &self.config)?;
        for bound in &self.channels {
            info!(
                channel = %bound.channel,
                capability = %bound.capability.name,
                index = bound.capability.index,
                topic = %bound.topic,
                "Channel bound"
            );
        }
        Ok(())
    }

    /// Read every channel, print them, then record them.
    ///
    /// A disconnection stops the cycle before anything is recorded.
    async fn poll_once(&mut self) -> Result<ControlFlow<StopReason>, PollerError> {
        let timeout = self.config.notify_timeout();
        let mut readings = Vec::with_capacity(self.channels.len());

        for bound in &self.channels {
            match self.gateway.read_once(&bound.capability, timeout).await {
                Ok(Some(value)) => readings.push(Reading::new(bound.channel, value)),
                Ok(None) => {
                    warn!(
                        channel = %bound.channel,
                        timeout_secs = timeout.as_secs(),
                        "No data before timeout"
                    );
                    readings.push(Reading::missing(bound.channel));
                }
                Err(GatewayError::Disconnected) => {
                    warn!(channel = %bound.channel, "Device disconnected unexpectedly");
                    return Ok(ControlFlow::Break(StopReason::Disconnected));
                }
                Err(e) => return Err(e.into()),
            }
        }

        if self.config.console {
            let line: Vec<&str> = readings.iter().map(|r| r.value.as_str()).collect();
            println!("{}", line.join(" "));
        }

        for (bound, reading) in self.channels.iter().zip(readings) {
            let entries = self
                .recorder
                .push(reading.channel, &bound.topic, reading.value)
                .await?
                .len();
            debug!(
                channel = %reading.channel,
                topic = %bound.topic,
                captured_at = reading.captured_at,
                entries,
                "Reading recorded"
            );
        }

        Ok(ControlFlow::Continue(()))
    }
}
