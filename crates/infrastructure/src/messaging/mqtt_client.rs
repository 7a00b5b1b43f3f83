use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::task;
use tracing::{error, info};

#[cfg(test)]
use mockall::automock;

/// Publishing side of the broker connection
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MqttPublisherClient: Send + Sync {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<()>;
    fn is_connected(&self) -> bool;
}

#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttClient {
    /// Connect in the background; the event loop retries every second
    /// until the broker is reachable.
    pub fn new(host: &str, port: u16, client_id: &str, last_will: Option<LastWill>) -> Self {
        let mut mqttoptions = MqttOptions::new(client_id, host, port);
        mqttoptions.set_keep_alive(Duration::from_secs(20));

        if let Some(will) = last_will {
            mqttoptions.set_last_will(will);
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
        let connected = Arc::new(AtomicBool::new(false));
        let connected_clone = connected.clone();
        let broker = format!("{}:{}", host, port);

        task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(%broker, "MQTT connected");
                        connected_clone.store(true, Ordering::Relaxed);
                    }
                    Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                        connected_clone.store(false, Ordering::Relaxed);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if connected_clone.swap(false, Ordering::Relaxed) {
                            error!(%broker, error = ?e, "MQTT connection lost");
                        }
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client, connected }
    }

    pub async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        self.publish_bytes(topic, payload.as_bytes(), QoS::AtLeastOnce, retain)
            .await
    }
}

#[async_trait]
impl MqttPublisherClient for MqttClient {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<()> {
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| anyhow!("Failed to publish MQTT message: {}", e))?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
