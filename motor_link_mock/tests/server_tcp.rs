use std::time::Duration;

use motor_link::link_define::READ_REQUEST;
use motor_link::link_frame::{encode, validate, FrameKind};
use motor_link::{DeviceRegistry, DeviceVariant};
use motor_link_mock::MockServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn start(server: MockServer) -> Result<TcpStream, Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let srv = server.clone();
    tokio::spawn(async move {
        let _ = srv.run_listener_on(listener).await;
    });
    Ok(TcpStream::connect(addr).await?)
}

async fn read_exact_timeout(
    stream: &mut TcpStream,
    len: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut buf)).await??;
    Ok(buf)
}

#[tokio::test]
async fn read_request_over_tcp() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::new(DeviceVariant::Ck3862s);
    let mut stream = start(server).await?;
    stream.write_all(&READ_REQUEST).await?;
    let frame = read_exact_timeout(&mut stream, 11).await?;
    assert_eq!(validate(&frame)?, FrameKind::Ck3862s);
    assert_eq!(&frame[2..10], &[12, 20, 10, 5, 5, 30, 25, 5]);
    Ok(())
}

#[tokio::test]
async fn write_is_echoed_and_stored() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::new(DeviceVariant::Ck3864s);
    let mut stream = start(server.clone()).await?;
    let mut host = DeviceRegistry::new(DeviceVariant::Ck3864s);
    host.set_value(0, 200)?;
    let frame = encode(DeviceVariant::Ck3864s, host.parameters())?.to_bytes();
    stream.write_all(&frame).await?;
    let echo = read_exact_timeout(&mut stream, frame.len()).await?;
    assert_eq!(echo, frame);
    assert_eq!(server.values().await, host.values());
    let snap = server.snapshot().await;
    assert_eq!(snap.writes, 1);
    let json = serde_json::to_value(&snap)?;
    assert_eq!(json["variant"], "CK3864S");
    Ok(())
}

#[tokio::test]
async fn delayed_responses_still_arrive() -> Result<(), Box<dyn std::error::Error>> {
    let server =
        MockServer::new(DeviceVariant::Ck3864s).with_response_delay(Duration::from_millis(30));
    let mut stream = start(server).await?;
    let started = std::time::Instant::now();
    stream.write_all(&READ_REQUEST).await?;
    let _ = read_exact_timeout(&mut stream, 16).await?;
    assert!(started.elapsed() >= Duration::from_millis(30));
    Ok(())
}

#[tokio::test]
async fn debug_poll_reports_current_status() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::new(DeviceVariant::Ck3862s);
    let mut stream = start(server.clone()).await?;
    server.set_status([0x01, 0x80]).await;
    let host = DeviceRegistry::new(DeviceVariant::Ck3862s);
    let poll = motor_link::link_frame::encode_with_command(
        motor_link::link_define::CMD_DEBUG,
        DeviceVariant::Ck3862s,
        host.parameters(),
    )?
    .to_bytes();
    stream.write_all(&poll).await?;
    let rsp = read_exact_timeout(&mut stream, 5).await?;
    assert_eq!(rsp, vec![0x4B, 0x02, 0x01, 0x80, 0x83]);
    assert_eq!(validate(&rsp)?, FrameKind::DebugResponse);
    Ok(())
}
