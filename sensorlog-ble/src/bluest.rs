//! BlueST feature protocol.
//!
//! A SensorTile exposes its sensors as BLE characteristics whose UUID is
//! `XXXXXXXX-0001-11e1-ac36-0002a5d5c51b`, where the first 32 bits are a
//! feature mask. One notification on such a characteristic carries a 2-byte
//! little-endian timestamp followed by the payload of every feature in the
//! mask, ordered from the highest mask bit to the lowest.

use thiserror::Error;
use uuid::Uuid;

/// Suffix shared by every BlueST feature characteristic.
pub const FEATURE_UUID_SUFFIX: &str = "-0001-11e1-ac36-0002a5d5c51b";

const TIMESTAMP_LEN: usize = 2;

/// Features this logger knows the layout of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Accelerometer,
    Gyroscope,
    Magnetometer,
    Pressure,
    Humidity,
    Battery,
    Temperature,
}

impl Feature {
    /// Look up the feature for a single mask bit.
    pub fn from_bit(bit: u32) -> Option<Feature> {
        match bit {
            0x0080_0000 => Some(Feature::Accelerometer),
            0x0040_0000 => Some(Feature::Gyroscope),
            0x0020_0000 => Some(Feature::Magnetometer),
            0x0010_0000 => Some(Feature::Pressure),
            0x0008_0000 => Some(Feature::Humidity),
            0x0004_0000 | 0x0001_0000 => Some(Feature::Temperature),
            0x0002_0000 => Some(Feature::Battery),
            _ => None,
        }
    }

    /// Name the board advertises for this feature.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Accelerometer => "Accelerometer",
            Feature::Gyroscope => "Gyroscope",
            Feature::Magnetometer => "Magnetometer",
            Feature::Pressure => "Pressure",
            Feature::Humidity => "Humidity",
            Feature::Battery => "Battery",
            Feature::Temperature => "Temperature",
        }
    }

    /// Bytes this feature occupies in a notification.
    pub fn payload_len(&self) -> usize {
        match self {
            Feature::Accelerometer | Feature::Gyroscope | Feature::Magnetometer => 6,
            Feature::Pressure => 4,
            Feature::Humidity | Feature::Temperature => 2,
            Feature::Battery => 7,
        }
    }

    /// Render one sample as `Name(timestamp): value unit`.
    fn format(&self, timestamp: u16, data: &[u8]) -> Result<String, DecodeError> {
        let value = match self {
            Feature::Pressure => {
                let raw = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                format!("{:.2} mBar", f64::from(raw) / 100.0)
            }
            Feature::Humidity => {
                let raw = u16::from_le_bytes([data[0], data[1]]);
                format!("{:.1} %", f64::from(raw) / 10.0)
            }
            Feature::Temperature => {
                let raw = i16::from_le_bytes([data[0], data[1]]);
                format!("{:.1} °C", f64::from(raw) / 10.0)
            }
            other => return Err(DecodeError::Unsupported(other.name())),
        };
        Ok(format!("{}({}): {}", self.name(), timestamp, value))
    }
}

/// Errors while decoding a notification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{feature} needs {needed} bytes, notification has {len}")]
    Truncated {
        feature: &'static str,
        needed: usize,
        len: usize,
    },
    #[error("unknown payload layout for mask bit {0:#010x}")]
    UnknownLayout(u32),
    #[error("bit {bit:#010x} is not set in mask {mask:#010x}")]
    NotInMask { mask: u32, bit: u32 },
    #[error("{0} values are not decoded")]
    Unsupported(&'static str),
}

/// Extract the feature mask from a characteristic UUID, if it is a BlueST feature.
pub fn feature_mask(uuid: &Uuid) -> Option<u32> {
    if !uuid.to_string().ends_with(FEATURE_UUID_SUFFIX) {
        return None;
    }
    Some((uuid.as_u128() >> 96) as u32)
}

/// Set bits of `mask`, highest first.
pub fn mask_bits(mask: u32) -> impl Iterator<Item = u32> {
    (0..32)
        .rev()
        .map(|shift| 1u32 << shift)
        .filter(move |bit| mask & bit != 0)
}

/// Known features carried by `mask`, in payload order, with their mask bit.
pub fn features(mask: u32) -> Vec<(u32, Feature)> {
    mask_bits(mask)
        .filter_map(|bit| Feature::from_bit(bit).map(|feature| (bit, feature)))
        .collect()
}

/// Decode the feature at `bit` from a notification of a characteristic with `mask`.
pub fn decode(mask: u32, bit: u32, data: &[u8]) -> Result<String, DecodeError> {
    if mask & bit == 0 {
        return Err(DecodeError::NotInMask { mask, bit });
    }

    let feature = Feature::from_bit(bit).ok_or(DecodeError::UnknownLayout(bit))?;
    let mut offset = TIMESTAMP_LEN;
    for preceding in mask_bits(mask).take_while(|b| *b != bit) {
        let len = Feature::from_bit(preceding)
            .ok_or(DecodeError::UnknownLayout(preceding))?
            .payload_len();
        offset += len;
    }

    let needed = offset + feature.payload_len();
    if data.len() < needed {
        return Err(DecodeError::Truncated {
            feature: feature.name(),
            needed,
            len: data.len(),
        });
    }

    let timestamp = u16::from_le_bytes([data[0], data[1]]);
    feature.format(timestamp, &data[offset..needed])
}
