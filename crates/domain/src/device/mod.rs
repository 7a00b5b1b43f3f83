mod config;

pub use config::{DeviceConfig, TimeoutPolicy};
