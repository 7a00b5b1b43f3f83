use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use domain::driver::{
    CommandToken, DeviceDriver, DriverError, DriverEvent, DriverEventSink, SendOutcome,
};
use domain::integration::websocket::{WebsocketMessage, WebsocketOptions};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Client that writes each command as one text frame
pub struct WebsocketDriver {
    options: WebsocketOptions,
    sink: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
}

impl WebsocketDriver {
    pub fn new(options: WebsocketOptions) -> Self {
        Self {
            options,
            sink: None,
            reader: None,
        }
    }

    fn teardown(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.sink = None;
    }
}

#[async_trait]
impl DeviceDriver<WebsocketMessage> for WebsocketDriver {
    async fn connect(&mut self, events: DriverEventSink) -> Result<(), DriverError> {
        self.teardown();

        let (ws_stream, _response) = connect_async(self.options.uri.as_str())
            .await
            .map_err(|e| DriverError::ConnectionFailed(e.to_string()))?;
        info!(uri = %self.options.uri, "WebSocket connected");

        let (sink, mut stream) = ws_stream.split();
        let uri = self.options.uri.clone();
        self.reader = Some(tokio::spawn(async move {
            let reason = loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        debug!(uri = %uri, len = text.len(), "WebSocket message ignored");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| format!("closed by server: {}", f.reason))
                            .unwrap_or_else(|| "closed by server".into());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(uri = %uri, error = %e, "WebSocket read failed");
                        break e.to_string();
                    }
                    None => break "stream ended".into(),
                }
            };
            events(DriverEvent::ConnectionLost { reason });
        }));
        self.sink = Some(sink);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!(error = %e, "WebSocket close frame not sent");
            }
        }
        self.teardown();
        Ok(())
    }

    async fn send(
        &mut self,
        token: CommandToken,
        command: &WebsocketMessage,
    ) -> Result<SendOutcome, DriverError> {
        let sink = self.sink.as_mut().ok_or(DriverError::NotConnected)?;
        let text = match &command.payload {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| DriverError::SendFailed(e.to_string()))?;
        debug!(token, uri = %self.options.uri, "WebSocket message sent");
        Ok(SendOutcome::Fulfilled)
    }

    fn driver_type(&self) -> &str {
        "WEBSOCKET"
    }
}

impl Drop for WebsocketDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut driver = WebsocketDriver::new(WebsocketOptions {
            uri: format!("ws://127.0.0.1:{}", port),
            reconnect_interval_ms: None,
        });
        let result = driver.connect(Arc::new(|_| {})).await;
        assert!(matches!(result, Err(DriverError::ConnectionFailed(_))));
        assert!(driver.sink.is_none());
    }
}
