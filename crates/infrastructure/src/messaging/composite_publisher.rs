use async_trait::async_trait;
use domain::DeviceEvent;
use domain::event::EventPublisher;
use std::sync::Arc;

/// Fans every event out to all publishers; one failing sink does not
/// starve the others.
pub struct CompositeEventPublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl CompositeEventPublisher {
    pub fn new(publishers: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl EventPublisher for CompositeEventPublisher {
    async fn publish(
        &self,
        event: DeviceEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(event.clone()).await {
                tracing::error!(device_id = %event.device_id(), error = %e, "Failed to publish event");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Failing;

    #[async_trait]
    impl EventPublisher for Failing {
        async fn publish(
            &self,
            _event: DeviceEvent,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("sink closed".into())
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    #[async_trait]
    impl EventPublisher for Recording {
        async fn publish(
            &self,
            event: DeviceEvent,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.0.lock().unwrap().push(event.device_id().to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_fanout() {
        let recording = Arc::new(Recording::default());
        let composite = CompositeEventPublisher::new(vec![Arc::new(Failing), recording.clone()]);

        composite
            .publish(DeviceEvent::command_failed("cam1", "home", "x"))
            .await
            .unwrap();
        assert_eq!(*recording.0.lock().unwrap(), vec!["cam1".to_string()]);
    }
}
