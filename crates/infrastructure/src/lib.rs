//! Infrastructure layer - wire protocols, device transports and external integrations

pub mod config;
pub mod drivers;
pub mod messaging;
pub mod protocol;

pub use config::{AgentConfig, MqttConfig};
pub use drivers::{BoxedDriver, DriverFactory};
pub use messaging::composite_publisher::CompositeEventPublisher;
pub use messaging::mqtt_client::MqttClient;
pub use messaging::mqtt_publisher::MqttStatusPublisher;
