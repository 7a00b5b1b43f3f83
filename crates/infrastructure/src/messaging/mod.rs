pub mod composite_publisher;
pub mod mqtt_client;
pub mod mqtt_publisher;

pub use composite_publisher::CompositeEventPublisher;
pub use mqtt_client::{MqttClient, MqttPublisherClient};
pub use mqtt_publisher::MqttStatusPublisher;
