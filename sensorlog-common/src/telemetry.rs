use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value recorded when a channel produced no sample within the wait window.
pub const NO_DATA_SENTINEL: &str = "0";

/// One of the environmental channels polled from the sensor board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temperature,
    Humidity,
    Pressure,
}

impl Channel {
    /// All channels, in polling order.
    pub const ALL: [Channel; 3] = [Channel::Temperature, Channel::Humidity, Channel::Pressure];

    /// Position of this channel in [`Channel::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Channel::Temperature => 0,
            Channel::Humidity => 1,
            Channel::Pressure => 2,
        }
    }

    /// Get the string representation used in topics, file names and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
        }
    }

    /// Capability name the sensor board advertises for this channel.
    pub fn capability_name(&self) -> &'static str {
        match self {
            Channel::Temperature => "Temperature",
            Channel::Humidity => "Humidity",
            Channel::Pressure => "Pressure",
        }
    }

    /// Default broker topic for this channel.
    pub fn default_topic(&self) -> String {
        format!("sensor/{}", self.as_str())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "temperature" => Ok(Channel::Temperature),
            "humidity" => Ok(Channel::Humidity),
            "pressure" => Ok(Channel::Pressure),
            other => Err(format!("unknown channel '{}'", other)),
        }
    }
}

/// A single sample taken from one channel, captured as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Channel the sample was read from.
    pub channel: Channel,

    /// Serialized value, exactly as produced by the sensor gateway.
    pub value: String,

    /// Unix epoch milliseconds when the sample was captured.
    pub captured_at: i64,
}

impl Reading {
    /// Create a reading stamped with the current time.
    pub fn new(channel: Channel, value: impl Into<String>) -> Self {
        Self {
            channel,
            value: value.into(),
            captured_at: current_timestamp_millis(),
        }
    }

    /// Create the sentinel reading recorded when no sample arrived in time.
    pub fn missing(channel: Channel) -> Self {
        Self::new(channel, NO_DATA_SENTINEL)
    }

    /// Whether this reading is the no-data sentinel.
    pub fn is_missing(&self) -> bool {
        self.value == NO_DATA_SENTINEL
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
