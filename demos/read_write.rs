//! Read the parameter set from a controller, bump one value and write it back.
//!
//! Start the simulator first:
//! `cargo run -p motor_link_mock -- --listen 127.0.0.1:5020`
//! then `cargo run --example read_write -- 127.0.0.1:5020`.

use std::time::Duration;

use motor_link::runtime::connect_tcp;
use motor_link::{DeviceRegistry, DeviceVariant, LinkEvent, LinkTiming};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    motor_link::init_logging();
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5020".to_string());
    let variant = std::env::args()
        .nth(2)
        .map(|s| s.parse::<DeviceVariant>())
        .transpose()?
        .unwrap_or_default();

    let registry = DeviceRegistry::new(variant);
    let (link, mut events) = connect_tcp(addr.as_str(), registry, LinkTiming::from_config()).await?;
    link.connect().await?;

    link.read().await?;
    match tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
        Ok(Some(LinkEvent::ParametersChanged(params))) => {
            for p in &params {
                println!("{:<18} {:>3}  [{}..={}] {}", p.name, p.current, p.min, p.max, p.description);
            }
        }
        Ok(other) => println!("unexpected event: {other:?}"),
        Err(_) => println!("no answer from {addr} (read timed out)"),
    }

    let params = link.parameters().await?;
    if let Some(first) = params.first() {
        let next = if first.current < first.max { first.current + 1 } else { first.min };
        link.set_parameter(0, next).await?;
        link.write().await?;
        // give the echo time to come back before the next exchange
        tokio::time::sleep(Duration::from_millis(100)).await;
        println!("{} set to {next}", first.name);
    }

    link.shutdown().await?;
    Ok(())
}
