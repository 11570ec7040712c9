use std::time::Duration;

use motor_link::runtime::connect_tcp;
use motor_link::{DeviceRegistry, DeviceVariant, LinkEvent, LinkTiming};
use motor_link_mock::MockServer;

#[tokio::test]
async fn read_and_write_against_mock_server() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::new(DeviceVariant::Ck3864s);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let srv_clone = server.clone();
    tokio::spawn(async move {
        let _ = srv_clone.run_listener_on(listener).await;
    });

    let (link, mut events) = connect_tcp(
        addr,
        DeviceRegistry::new(DeviceVariant::Ck3864s),
        LinkTiming::default().with_transfer_timeout(Duration::from_millis(500)),
    )
    .await?;
    link.connect().await?;

    link.set_parameter(12, 9).await?;
    link.write().await?;
    // the echo must come back before the next exchange is accepted
    let mut read_sent = false;
    for _ in 0..50 {
        if link.read().await.is_ok() {
            read_sent = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(read_sent);

    let ev = tokio::time::timeout(Duration::from_secs(2), events.recv()).await?;
    match ev {
        Some(LinkEvent::ParametersChanged(params)) => assert_eq!(params[12].current, 9),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(server.values().await[12], 9);
    link.shutdown().await?;
    Ok(())
}
