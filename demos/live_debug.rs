//! Poll a controller in live-debug mode and print each captured sample.
//!
//! Every debug session ends after one response, so the loop restarts it.

use std::time::Duration;

use motor_link::runtime::connect_tcp;
use motor_link::{DeviceRegistry, LinkEvent, LinkTiming, StopReason};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    motor_link::init_logging();
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5020".to_string());
    let samples: usize = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let (link, mut events) =
        connect_tcp(addr.as_str(), DeviceRegistry::default(), LinkTiming::from_config()).await?;
    link.connect().await?;
    link.enter_debug().await?;

    let mut captured = 0;
    while captured < samples {
        let Ok(Some(ev)) = tokio::time::timeout(Duration::from_secs(3), events.recv()).await else {
            println!("link went quiet");
            break;
        };
        match ev {
            LinkEvent::DebugSample(sample) => {
                captured += 1;
                println!("sample {captured}: {sample:02X?}");
            }
            LinkEvent::SessionStopped(StopReason::SampleCaptured) => link.enter_debug().await?,
            LinkEvent::SessionStopped(StopReason::ResponseTimeout) => {
                println!("controller stopped answering");
                break;
            }
            LinkEvent::SessionError(code) => {
                println!("transport error {code}");
                break;
            }
            LinkEvent::ParametersChanged(_) => {}
        }
    }

    link.enter_normal().await.ok();
    link.shutdown().await?;
    Ok(())
}
