use std::sync::Arc;

use async_trait::async_trait;
use domain::DeviceEvent;
use domain::event::EventPublisher;
use rumqttc::QoS;

use crate::messaging::mqtt_client::MqttPublisherClient;

/// Publishes device events under `<prefix>/<device_id>`.
///
/// Status and connection changes are retained so late subscribers see the
/// current state; traffic events go to `<prefix>/<device_id>/events`.
pub struct MqttStatusPublisher {
    client: Arc<dyn MqttPublisherClient>,
    topic_prefix: String,
}

impl MqttStatusPublisher {
    pub fn new(client: Arc<dyn MqttPublisherClient>, topic_prefix: impl Into<String>) -> Self {
        Self {
            client,
            topic_prefix: topic_prefix.into(),
        }
    }

    fn route(&self, event: &DeviceEvent) -> (String, bool) {
        match event {
            DeviceEvent::StatusChanged { .. } | DeviceEvent::ConnectionChanged { .. } => (
                format!("{}/{}", self.topic_prefix, event.device_id()),
                true,
            ),
            _ => (
                format!("{}/{}/events", self.topic_prefix, event.device_id()),
                false,
            ),
        }
    }
}

#[async_trait]
impl EventPublisher for MqttStatusPublisher {
    async fn publish(
        &self,
        event: DeviceEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (topic, retain) = self.route(&event);
        let payload = serde_json::to_vec(&event)?;

        if let Err(e) = self
            .client
            .publish_bytes(&topic, &payload, QoS::AtLeastOnce, retain)
            .await
        {
            tracing::error!(%topic, error = %e, "Failed to publish device event");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::mqtt_client::MockMqttPublisherClient;
    use domain::{DeviceStatus, StatusCode};
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_status_is_retained_per_device() {
        let mut client = MockMqttPublisherClient::new();
        client
            .expect_publish_bytes()
            .with(
                eq("playout/a1/status/cam1"),
                always(),
                eq(QoS::AtLeastOnce),
                eq(true),
            )
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let publisher = MqttStatusPublisher::new(Arc::new(client), "playout/a1/status");
        let status = DeviceStatus {
            status_code: StatusCode::Good,
            messages: vec![],
            status_details: vec![],
            active: true,
        };
        publisher
            .publish(DeviceEvent::status_changed("cam1", status))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let mut client = MockMqttPublisherClient::new();
        client
            .expect_publish_bytes()
            .with(
                eq("playout/a1/status/osc0/events"),
                always(),
                always(),
                eq(false),
            )
            .returning(|_, _, _, _| Err(anyhow::anyhow!("broker down")));

        let publisher = MqttStatusPublisher::new(Arc::new(client), "playout/a1/status");
        let event = DeviceEvent::command_failed("osc0", "/fader/1", "timeout");
        assert!(publisher.publish(event).await.is_ok());
    }
}
