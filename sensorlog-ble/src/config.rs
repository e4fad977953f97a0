//! Configuration for the BLE data logger.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sensorlog_common::{Channel, LoggingConfig};
use sensorlog_framework::{BridgeConfig, BridgeError, BrokerConfig, Result};

/// Complete logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorLogConfig {
    /// Target sensor board
    pub device: DeviceConfig,

    /// Bounded log and its file mirror
    pub storage: StorageConfig,

    /// Where readings are published
    pub broker: BrokerConfig,

    /// Topic for bridge status messages (disabled when absent)
    #[serde(default)]
    pub status_topic: Option<String>,

    /// Per-channel capability binding and topic overrides
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Seconds to sleep between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to wait for one notification per channel
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,

    /// Print one line per cycle on stdout
    #[serde(default = "default_console")]
    pub console: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_poll_interval() -> u64 {
    120
}

fn default_notify_timeout() -> u64 {
    3
}

fn default_console() -> bool {
    true
}

/// Sensor board selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Hardware address of the board (e.g. "c0:50:21:32:02:56")
    pub id: String,

    /// Discovery window in seconds
    #[serde(default = "default_scan_secs")]
    pub scan_secs: u64,
}

fn default_scan_secs() -> u64 {
    1
}

/// Bounded log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File the log is mirrored to. With the per-channel layout the channel
    /// name is appended to the file stem.
    pub path: PathBuf,

    /// Maximum number of retained entries per log. Required.
    pub capacity: NonZeroUsize,

    /// How channels map onto logs
    #[serde(default)]
    pub layout: StorageLayout,
}

/// How the three channels map onto bounded logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLayout {
    /// One log and one file per channel.
    #[default]
    PerChannel,
    /// All channels interleaved in a single log and file.
    Shared,
}

impl StorageLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLayout::PerChannel => "per_channel",
            StorageLayout::Shared => "shared",
        }
    }
}

/// Per-channel overrides, one optional section per channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub temperature: Option<ChannelConfig>,
    pub humidity: Option<ChannelConfig>,
    pub pressure: Option<ChannelConfig>,
}

impl ChannelsConfig {
    pub fn get(&self, channel: Channel) -> Option<&ChannelConfig> {
        match channel {
            Channel::Temperature => self.temperature.as_ref(),
            Channel::Humidity => self.humidity.as_ref(),
            Channel::Pressure => self.pressure.as_ref(),
        }
    }
}

/// Overrides for one channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Capability to read this channel from
    #[serde(default)]
    pub capability: Option<ChannelBinding>,

    /// Broker topic (default: "sensor/<channel>")
    #[serde(default)]
    pub topic: Option<String>,
}

/// Selects a device capability, either by advertised name or by its
/// position in the reported capability list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelBinding {
    Position(usize),
    Name(String),
}

impl std::fmt::Display for ChannelBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelBinding::Position(index) => write!(f, "capability #{}", index),
            ChannelBinding::Name(name) => write!(f, "capability '{}'", name),
        }
    }
}

impl SensorLogConfig {
    /// Capability binding for `channel`, falling back to its advertised name.
    pub fn binding(&self, channel: Channel) -> ChannelBinding {
        self.channels
            .get(channel)
            .and_then(|c| c.capability.clone())
            .unwrap_or_else(|| ChannelBinding::Name(channel.capability_name().to_string()))
    }

    /// Broker topic for `channel`.
    pub fn topic(&self, channel: Channel) -> String {
        self.channels
            .get(channel)
            .and_then(|c| c.topic.clone())
            .unwrap_or_else(|| channel.default_topic())
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.device.scan_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    /// Metadata attached to the "running" status message.
    pub fn status_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "device": self.device.id,
            "layout": self.storage.layout.as_str(),
            "capacity": self.storage.capacity.get(),
            "poll_interval_secs": self.poll_interval_secs,
        })
    }
}

impl BridgeConfig for SensorLogConfig {
    fn broker(&self) -> &BrokerConfig {
        &self.broker
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn status_topic(&self) -> Option<&str> {
        self.status_topic.as_deref()
    }

    fn validate(&self) -> Result<()> {
        self.broker.validate()?;

        if self.device.id.trim().is_empty() {
            return Err(BridgeError::validation("device.id cannot be empty"));
        }
        if self.device.scan_secs == 0 {
            return Err(BridgeError::validation("device.scan_secs must be at least 1"));
        }
        if self.storage.path.file_name().is_none() {
            return Err(BridgeError::validation(format!(
                "storage.path '{}' must name a file",
                self.storage.path.display()
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(BridgeError::validation("poll_interval_secs must be at least 1"));
        }
        if self.notify_timeout_secs == 0 {
            return Err(BridgeError::validation(
                "notify_timeout_secs must be at least 1",
            ));
        }
        if matches!(self.status_topic.as_deref(), Some(t) if t.is_empty()) {
            return Err(BridgeError::validation("status_topic cannot be empty"));
        }

        for channel in Channel::ALL {
            if self.topic(channel).is_empty() {
                return Err(BridgeError::validation(format!(
                    "channels.{}.topic cannot be empty",
                    channel
                )));
            }
            if let ChannelBinding::Name(name) = self.binding(channel) {
                if name.is_empty() {
                    return Err(BridgeError::validation(format!(
                        "channels.{}.capability cannot be empty",
                        channel
                    )));
                }
            }
        }

        Ok(())
    }
}
