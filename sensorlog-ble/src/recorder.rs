//! Bounded logs mirrored to disk and republished to the broker.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use sensorlog_common::Channel;
use sensorlog_framework::{PublishError, Publisher};

use crate::bounded_log::BoundedLog;
use crate::config::{StorageConfig, StorageLayout};

/// Errors while recording a reading.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Failed to write log file {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// A bounded log and the file it is mirrored to.
#[derive(Debug)]
struct MirroredLog {
    log: BoundedLog,
    path: PathBuf,
}

impl MirroredLog {
    fn new(path: PathBuf, capacity: NonZeroUsize) -> Self {
        Self {
            log: BoundedLog::new(capacity),
            path,
        }
    }

    /// Replace the file contents with the whole log.
    async fn sync(&self) -> Result<(), RecorderError> {
        tokio::fs::write(&self.path, self.log.render())
            .await
            .map_err(|source| RecorderError::Storage {
                path: self.path.clone(),
                source,
            })
    }
}

#[derive(Debug)]
enum Logs {
    Shared(MirroredLog),
    /// Indexed by [`Channel::index`].
    PerChannel([MirroredLog; 3]),
}

impl Logs {
    fn for_channel(&mut self, channel: Channel) -> &mut MirroredLog {
        match self {
            Logs::Shared(log) => log,
            Logs::PerChannel(logs) => &mut logs[channel.index()],
        }
    }
}

/// File used for `channel` under the per-channel layout: the channel name is
/// appended to the file stem (`data.csv` becomes `data_temperature.csv`).
pub fn channel_path(base: &Path, channel: Channel) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{}_{}", stem, channel);
    if let Some(ext) = base.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    base.with_file_name(name)
}

/// Pushes readings into their bounded log, rewrites the log file and
/// publishes the reading.
#[derive(Debug)]
pub struct Recorder<P> {
    logs: Logs,
    publisher: P,
}

impl<P: Publisher> Recorder<P> {
    pub fn new(storage: &StorageConfig, publisher: P) -> Self {
        let logs = match storage.layout {
            StorageLayout::Shared => {
                Logs::Shared(MirroredLog::new(storage.path.clone(), storage.capacity))
            }
            StorageLayout::PerChannel => Logs::PerChannel(Channel::ALL.map(|channel| {
                MirroredLog::new(channel_path(&storage.path, channel), storage.capacity)
            })),
        };
        Self { logs, publisher }
    }

    /// Files the logs are mirrored to.
    pub fn paths(&self) -> Vec<&Path> {
        match &self.logs {
            Logs::Shared(log) => vec![log.path.as_path()],
            Logs::PerChannel(logs) => logs.iter().map(|l| l.path.as_path()).collect(),
        }
    }

    /// Record one entry for `channel` and publish it on `topic`.
    ///
    /// The log file is rewritten before the publish. Returns the contents of
    /// the log the entry went into, oldest first.
    pub async fn push(
        &mut self,
        channel: Channel,
        topic: &str,
        entry: String,
    ) -> Result<&[String], RecorderError> {
        let payload = entry.clone().into_bytes();
        let sink = self.logs.for_channel(channel);

        sink.log.push(entry);
        sink.sync().await?;
        debug!(
            channel = %channel,
            path = %sink.path.display(),
            entries = sink.log.len(),
            "Log file rewritten"
        );

        self.publisher.publish(topic, &payload).await?;

        Ok(sink.log.as_slice())
    }
}
