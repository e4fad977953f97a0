//! BLE sensor data logger.
//!
//! Polls the temperature, humidity and pressure features of an ST SensorTile
//! over Bluetooth LE, keeps the most recent readings in bounded logs that are
//! mirrored to text files, and republishes every reading to a broker topic.
//!
//! # Topics
//!
//! ```text
//! sensor/temperature
//! sensor/humidity
//! sensor/pressure
//! ```
//!
//! Each topic is overridable per channel in the configuration.

pub mod binding;
pub mod bluest;
pub mod bounded_log;
pub mod btle;
pub mod config;
pub mod gateway;
pub mod poller;
pub mod recorder;
