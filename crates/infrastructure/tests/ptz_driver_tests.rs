use std::sync::Arc;
use std::time::Duration;

use domain::driver::{DeviceDriver, DriverError, DriverEvent, DriverEventSink, SendOutcome};
use domain::integration::ptz::{PtzCommand, PtzOptions, PtzQuery, PtzTransport};
use infrastructure::drivers::PtzDriver;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn channel_sink() -> (DriverEventSink, mpsc::UnboundedReceiver<DriverEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: DriverEventSink = Arc::new(move |event| {
        let _ = tx.send(event);
    });
    (sink, rx)
}

fn tcp_options(port: u16, address: u8) -> PtzOptions {
    PtzOptions {
        transport: PtzTransport::Tcp {
            host: "127.0.0.1".into(),
            port,
        },
        address,
    }
}

#[tokio::test]
async fn test_packets_written_in_send_order() {
    let mock = tokio_test::io::Builder::new()
        .write(&[0x82, 0x01, 0x00, 0x01, 0xFF])
        .write(&[0x82, 0x01, 0x04, 0x00, 0x02, 0xFF])
        .write(&[0x82, 0x01, 0x04, 0x47, 0x01, 0x00, 0x00, 0x00, 0xFF])
        .build();

    let (events, mut rx) = channel_sink();
    let mut driver = PtzDriver::new(tcp_options(5678, 2));
    driver.attach(Box::new(mock), events).await.unwrap();

    assert_eq!(
        driver.send(1, &PtzCommand::Power { on: true }).await,
        Ok(SendOutcome::AwaitingReply)
    );
    assert_eq!(
        driver
            .send(2, &PtzCommand::ZoomPosition { position: 0x1000 })
            .await,
        Ok(SendOutcome::AwaitingReply)
    );

    // Script exhausted: the mock reports end of stream
    assert!(matches!(
        rx.recv().await,
        Some(DriverEvent::ConnectionLost { .. })
    ));
}

#[tokio::test]
async fn test_tcp_camera_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let camera = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];

        socket.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x81, 0x01, 0x00, 0x01, 0xFF]);
        socket.write_all(&[0x90, 0x50, 0xFF]).await.unwrap();

        socket.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x81, 0x09, 0x04, 0x47, 0xFF]);
        socket
            .write_all(&[0x90, 0x50, 0x02, 0x00, 0x00, 0x00, 0xFF])
            .await
            .unwrap();

        socket.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x81, 0x01, 0x06, 0x04, 0xFF]);
        socket
            .write_all(&[0x90, 0x41, 0xFF, 0x90, 0x51, 0xFF])
            .await
            .unwrap();
        socket
    });

    let (events, mut rx) = channel_sink();
    let mut driver = PtzDriver::new(tcp_options(port, 1));
    driver.connect(events).await.unwrap();

    driver
        .send(
            10,
            &PtzCommand::Inquire {
                query: PtzQuery::ZoomPosition,
            },
        )
        .await
        .unwrap();
    match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        Ok(Some(DriverEvent::Fulfilled { token, reply })) => {
            assert_eq!(token, 10);
            let reply = reply.unwrap();
            assert_eq!(reply["query"], "zoomPosition");
            assert_eq!(reply["value"], 0x2000);
        }
        other => panic!("unexpected {:?}", other),
    }

    driver.send(11, &PtzCommand::Home).await.unwrap();
    assert_eq!(
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap(),
        Some(DriverEvent::Fulfilled {
            token: 11,
            reply: None
        })
    );

    let socket = camera.await.unwrap();
    drop(socket);
    assert!(matches!(
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap(),
        Some(DriverEvent::ConnectionLost { .. })
    ));

    driver.disconnect().await.unwrap();
    assert_eq!(
        driver.send(12, &PtzCommand::Home).await,
        Err(DriverError::NotConnected)
    );
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (events, _rx) = channel_sink();
    let mut driver = PtzDriver::new(tcp_options(port, 1));
    assert!(driver.connect(events).await.is_err());
    assert_eq!(
        driver.send(1, &PtzCommand::Home).await,
        Err(DriverError::NotConnected)
    );
}
