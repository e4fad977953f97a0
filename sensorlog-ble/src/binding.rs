//! Mapping of logger channels onto device capabilities.

use sensorlog_common::Channel;
use thiserror::Error;

use crate::config::{ChannelBinding, SensorLogConfig};
use crate::gateway::Capability;

/// A channel resolved against the connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundChannel {
    pub channel: Channel,
    pub capability: Capability,
    pub topic: String,
}

/// A required channel matched no capability of the device.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("No {binding} on the device for the {channel} channel")]
pub struct MissingChannel {
    pub channel: Channel,
    pub binding: ChannelBinding,
}

/// Find the capability selected by `binding`.
///
/// Names match case-insensitively and the first match wins; positions index
/// the list as reported by the gateway.
pub fn resolve<'a>(capabilities: &'a [Capability], binding: &ChannelBinding) -> Option<&'a Capability> {
    match binding {
        ChannelBinding::Name(name) => capabilities
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name)),
        ChannelBinding::Position(index) => capabilities.get(*index),
    }
}

/// Bind every channel, in polling order.
///
/// Fails on the first channel whose binding matches nothing.
pub fn bind_channels(
    capabilities: &[Capability],
    config: &SensorLogConfig,
) -> Result<Vec<BoundChannel>, MissingChannel> {
    Channel::ALL
        .into_iter()
        .map(|channel| {
            let binding = config.binding(channel);
            match resolve(capabilities, &binding) {
                Some(capability) => Ok(BoundChannel {
                    channel,
                    capability: capability.clone(),
                    topic: config.topic(channel),
                }),
                None => Err(MissingChannel { channel, binding }),
            }
        })
        .collect()
}
