use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing::info;

use motor_link::DeviceVariant;
use motor_link_mock::{MockDevice, MockServer};

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulated CK3864S/CK3862S motor controller over TCP")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5020")]
    listen: String,

    /// Controller model (CK3864S or CK3862S); overrides the config file
    #[arg(long, value_parser = parse_variant)]
    variant: Option<DeviceVariant>,

    /// TOML file with initial values, status bytes and response delay
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct MockConfig {
    variant: Option<DeviceVariant>,
    values: Option<Vec<u8>>,
    status: Option<[u8; 2]>,
    response_delay_ms: Option<u64>,
}

fn parse_variant(s: &str) -> Result<DeviceVariant, String> {
    s.parse()
}

fn load_config(path: &Path) -> anyhow::Result<MockConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read mock config {}", path.display()))?;
    let cfg = toml::from_str(&s)
        .map_err(|e| anyhow::anyhow!(motor_link::toml_helpers::describe_toml_error("mock config", &s, &e)))?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => MockConfig::default(),
    };

    let variant = args.variant.or(cfg.variant).unwrap_or_default();
    let mut device = MockDevice::new(variant);
    if let Some(values) = &cfg.values {
        device = device.with_values(values)?;
    }
    if let Some(status) = cfg.status {
        device = device.with_status(status);
    }
    let mut server = MockServer::with_device(device);
    if let Some(ms) = cfg.response_delay_ms {
        server = server.with_response_delay(Duration::from_millis(ms));
    }

    let snapshot = server.snapshot().await;
    info!("initial state: {}", serde_json::to_string(&snapshot)?);

    server.run(&args.listen).await
}
