//! Poll loop tests against an in-memory gateway and publisher.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sensorlog_ble::config::SensorLogConfig;
use sensorlog_ble::gateway::{Capability, DiscoveredDevice, GatewayError, SensorGateway};
use sensorlog_ble::poller::{Poller, PollerError, PollerState, StopReason};
use sensorlog_ble::recorder::RecorderError;
use sensorlog_framework::{BridgeConfig, PublishError, Publisher};

const TILE: &str = "c0:50:21:32:02:56";
const STORAGE: &str = "capacity: 100";

/// What the fake device returns for one `read_once` call.
enum Read {
    Value(&'static str),
    Timeout,
    Disconnect,
}

#[derive(Default)]
struct FakeGateway {
    devices: Vec<DiscoveredDevice>,
    refuse_connect: bool,
    capabilities: Vec<&'static str>,
    script: VecDeque<Read>,
    /// Capability names in the order they were read.
    reads: Arc<Mutex<Vec<String>>>,
    disconnects: Arc<Mutex<usize>>,
    /// Drop the connection as soon as the loop starts waiting between cycles.
    drop_while_idle: bool,
}

impl FakeGateway {
    fn tile(script: Vec<Read>) -> Self {
        Self {
            devices: vec![
                DiscoveredDevice {
                    id: "AA:BB:CC:DD:EE:FF".to_string(),
                    name: None,
                },
                DiscoveredDevice {
                    id: TILE.to_uppercase(),
                    name: Some("AM1V310".to_string()),
                },
            ],
            capabilities: vec!["Pressure", "Humidity", "Temperature", "Temperature"],
            script: script.into(),
            ..Default::default()
        }
    }
}

impl SensorGateway for FakeGateway {
    async fn discover(&mut self, _window: Duration) -> Result<Vec<DiscoveredDevice>, GatewayError> {
        Ok(self.devices.clone())
    }

    async fn connect(&mut self, device: &DiscoveredDevice) -> Result<(), GatewayError> {
        if self.refuse_connect {
            return Err(GatewayError::Connection(format!("{} refused", device.id)));
        }
        Ok(())
    }

    async fn capabilities(&self) -> Result<Vec<Capability>, GatewayError> {
        Ok(self
            .capabilities
            .iter()
            .enumerate()
            .map(|(index, name)| Capability {
                index,
                name: name.to_string(),
            })
            .collect())
    }

    async fn read_once(
        &mut self,
        capability: &Capability,
        _timeout: Duration,
    ) -> Result<Option<String>, GatewayError> {
        self.reads.lock().unwrap().push(capability.name.clone());
        match self.script.pop_front() {
            Some(Read::Value(value)) => Ok(Some(value.to_string())),
            Some(Read::Timeout) => Ok(None),
            Some(Read::Disconnect) | None => Err(GatewayError::Disconnected),
        }
    }

    async fn disconnected(&self) -> Result<(), GatewayError> {
        if !self.drop_while_idle {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), GatewayError> {
        *self.disconnects.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingPublisher {
    messages: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl RecordingPublisher {
    fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Transport("broker unreachable".to_string()));
        }
        self.messages.lock().unwrap().push((
            topic.to_string(),
            String::from_utf8(payload.to_vec()).unwrap(),
        ));
        Ok(())
    }
}

fn config(dir: &Path, storage: &str) -> SensorLogConfig {
    SensorLogConfig::parse(&format!(
        r#"{{
            device: {{ id: "{}" }},
            storage: {{ path: "{}", {} }},
            broker: {{ type: "mqtt", host: "localhost" }},
            poll_interval_secs: 1,
            console: false,
        }}"#,
        TILE,
        dir.join("data.csv").display(),
        storage
    ))
    .unwrap()
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_no_devices() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::default();
    let mut poller = Poller::new(FakeGateway::default(), publisher.clone(), &config(dir.path(), STORAGE));

    let reason = poller.run().await.unwrap();

    assert_eq!(reason, StopReason::NoDevices);
    assert_eq!(poller.state(), PollerState::Discovering);
    assert!(publisher.messages().is_empty());
}

#[tokio::test]
async fn test_device_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut gateway = FakeGateway::tile(vec![]);
    gateway.devices.remove(1);
    let mut poller = Poller::new(gateway, RecordingPublisher::default(), &config(dir.path(), STORAGE));

    assert_eq!(poller.run().await.unwrap(), StopReason::DeviceNotFound);
}

#[tokio::test]
async fn test_connection_failed() {
    let dir = tempfile::tempdir().unwrap();
    let mut gateway = FakeGateway::tile(vec![]);
    gateway.refuse_connect = true;
    let reads = gateway.reads.clone();
    let mut poller = Poller::new(gateway, RecordingPublisher::default(), &config(dir.path(), STORAGE));

    assert_eq!(poller.run().await.unwrap(), StopReason::ConnectionFailed);
    assert!(reads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_full_cycle_then_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FakeGateway::tile(vec![
        Read::Value("Temperature(10): 23.4 °C"),
        Read::Timeout,
        Read::Value("Pressure(10): 1013.25 mBar"),
        Read::Disconnect,
    ]);
    let reads = gateway.reads.clone();
    let publisher = RecordingPublisher::default();
    let mut poller = Poller::new(gateway, publisher.clone(), &config(dir.path(), STORAGE));

    let reason = poller.run().await.unwrap();
    assert_eq!(reason, StopReason::Disconnected);

    // Second cycle stopped on its first read.
    assert_eq!(
        *reads.lock().unwrap(),
        ["Temperature", "Humidity", "Pressure", "Temperature"]
    );

    assert_eq!(
        publisher.messages(),
        [
            ("sensor/temperature".to_string(), "Temperature(10): 23.4 °C".to_string()),
            ("sensor/humidity".to_string(), "0".to_string()),
            ("sensor/pressure".to_string(), "Pressure(10): 1013.25 mBar".to_string()),
        ]
    );

    assert_eq!(
        read_lines(&dir.path().join("data_temperature.csv")),
        ["Temperature(10): 23.4 °C"]
    );
    assert_eq!(read_lines(&dir.path().join("data_humidity.csv")), ["0"]);
    assert_eq!(
        read_lines(&dir.path().join("data_pressure.csv")),
        ["Pressure(10): 1013.25 mBar"]
    );
}

#[tokio::test]
async fn test_disconnect_mid_cycle_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FakeGateway::tile(vec![Read::Value("Temperature(1): 20.0 °C"), Read::Disconnect]);
    let reads = gateway.reads.clone();
    let publisher = RecordingPublisher::default();
    let mut poller = Poller::new(gateway, publisher.clone(), &config(dir.path(), STORAGE));

    assert_eq!(poller.run().await.unwrap(), StopReason::Disconnected);

    // Pressure was never read.
    assert_eq!(*reads.lock().unwrap(), ["Temperature", "Humidity"]);
    assert!(publisher.messages().is_empty());
    assert!(!dir.path().join("data_temperature.csv").exists());
}

#[tokio::test]
async fn test_disconnect_between_cycles_stops_without_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let mut gateway = FakeGateway::tile(vec![
        Read::Value("t1"),
        Read::Value("h1"),
        Read::Value("p1"),
        Read::Value("t2"),
    ]);
    gateway.drop_while_idle = true;
    let reads = gateway.reads.clone();
    let publisher = RecordingPublisher::default();
    let mut config = config(dir.path(), STORAGE);
    config.poll_interval_secs = 3600;
    let mut poller = Poller::new(gateway, publisher.clone(), &config);

    let reason = tokio::time::timeout(Duration::from_secs(5), poller.run())
        .await
        .expect("disconnection during the wait was not noticed")
        .unwrap();

    assert_eq!(reason, StopReason::Disconnected);
    assert_eq!(poller.state(), PollerState::Discovering);
    assert_eq!(reads.lock().unwrap().len(), 3);
    assert_eq!(publisher.messages().len(), 3);
    assert_eq!(read_lines(&dir.path().join("data_pressure.csv")), ["p1"]);
}

#[tokio::test]
async fn test_shared_layout_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FakeGateway::tile(vec![
        Read::Value("t1"),
        Read::Value("h1"),
        Read::Value("p1"),
        Read::Value("t2"),
        Read::Value("h2"),
        Read::Value("p2"),
    ]);
    let publisher = RecordingPublisher::default();
    let mut poller = Poller::new(
        gateway,
        publisher.clone(),
        &config(dir.path(), r#"capacity: 4, layout: "shared""#),
    );

    assert_eq!(poller.run().await.unwrap(), StopReason::Disconnected);

    // Capacity 4 keeps the newest four of six entries.
    assert_eq!(read_lines(&dir.path().join("data.csv")), ["p1", "t2", "h2", "p2"]);
    assert_eq!(publisher.messages().len(), 6);
    assert_eq!(publisher.messages()[5], ("sensor/pressure".to_string(), "p2".to_string()));
}

#[tokio::test]
async fn test_positional_binding_and_topic_override() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FakeGateway::tile(vec![Read::Value("p"), Read::Value("h"), Read::Value("t")]);
    let reads = gateway.reads.clone();
    let publisher = RecordingPublisher::default();
    let mut config = config(dir.path(), STORAGE);
    config.channels = json5::from_str(
        r#"{
            temperature: { capability: 3, topic: "tile/temp" },
            humidity: { capability: "humidity" },
            pressure: { capability: 0 },
        }"#,
    )
    .unwrap();
    let mut poller = Poller::new(gateway, publisher.clone(), &config);

    assert_eq!(poller.run().await.unwrap(), StopReason::Disconnected);

    let indices: Vec<_> = poller.channels().iter().map(|b| b.capability.index).collect();
    assert_eq!(indices, [3, 1, 0]);
    assert_eq!(reads.lock().unwrap()[..3], ["Temperature", "Humidity", "Pressure"]);
    assert_eq!(publisher.messages()[0], ("tile/temp".to_string(), "p".to_string()));
}

#[tokio::test]
async fn test_missing_channel_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut gateway = FakeGateway::tile(vec![]);
    gateway.capabilities = vec!["Temperature", "Humidity", "Accelerometer"];
    let mut poller = Poller::new(gateway, RecordingPublisher::default(), &config(dir.path(), STORAGE));

    let err = poller.run().await.unwrap_err();
    assert!(matches!(err, PollerError::MissingChannel(_)));
}

#[tokio::test]
async fn test_publish_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FakeGateway::tile(vec![Read::Value("t"), Read::Value("h"), Read::Value("p")]);
    let reads = gateway.reads.clone();
    let publisher = RecordingPublisher {
        fail: true,
        ..Default::default()
    };
    let mut poller = Poller::new(gateway, publisher, &config(dir.path(), STORAGE));

    let err = poller.run().await.unwrap_err();

    assert!(matches!(
        err,
        PollerError::Recorder(RecorderError::Publish(PublishError::Transport(_)))
    ));
    assert_eq!(reads.lock().unwrap().len(), 3);
    // The file was written before the publish failed.
    assert_eq!(read_lines(&dir.path().join("data_temperature.csv")), ["t"]);
}

#[tokio::test]
async fn test_shutdown_disconnects_once() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = FakeGateway::tile(vec![]);
    let disconnects = gateway.disconnects.clone();
    let mut poller = Poller::new(gateway, RecordingPublisher::default(), &config(dir.path(), STORAGE));

    // Fails on binding, after the connection was made.
    let mut missing = FakeGateway::tile(vec![]);
    missing.capabilities.clear();
    let missing_disconnects = missing.disconnects.clone();
    let mut failing = Poller::new(missing, RecordingPublisher::default(), &config(dir.path(), STORAGE));
    assert!(failing.run().await.is_err());
    assert_eq!(failing.state(), PollerState::Connected);
    failing.shutdown().await;
    failing.shutdown().await;
    assert_eq!(*missing_disconnects.lock().unwrap(), 1);

    // Stopped by a disconnection: nothing left to disconnect.
    assert_eq!(poller.run().await.unwrap(), StopReason::Disconnected);
    poller.shutdown().await;
    assert_eq!(*disconnects.lock().unwrap(), 0);
}
