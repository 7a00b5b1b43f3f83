use std::sync::Arc;

use async_trait::async_trait;
use domain::DeviceEvent;
use domain::event::EventPublisher;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// In-process fan-out of device events. Publishing never waits, so a slow
/// consumer cannot stall a device worker; lagging receivers lose events.
#[derive(Clone)]
pub struct ChannelEventPublisher {
    tx: broadcast::Sender<DeviceEvent>,
}

impl ChannelEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }

    /// Relay every event to `sink` from a background task until cancelled
    pub fn forward_to(
        &self,
        sink: Arc<dyn EventPublisher>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => {
                            if let Err(e) = sink.publish(event).await {
                                warn!(error = %e, "Forwarded event not published");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event forwarder lagging, events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("Event forwarder stopped");
        })
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(
        &self,
        event: DeviceEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // No subscribers is not an error
        let _ = self.tx.send(event);
        Ok(())
    }
}
