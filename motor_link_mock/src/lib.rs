//! Simulated motor controller speaking the device side of the motor_link
//! protocol.
//!
//! [`MockDevice`] is the byte-level state machine; [`MockServer`] serves one
//! device over TCP the way a serial-over-TCP bridge would.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use motor_link::link_define::{CMD_DEBUG, CMD_READ_REQUEST, READ_REQUEST};
use motor_link::link_frame::{checksum, encode, validate};
use motor_link::transport::hex_dump;
use motor_link::{DeviceRegistry, DeviceVariant, LinkError, Parameter};

/// Status bytes reported in debug responses until changed.
pub const DEFAULT_STATUS: [u8; 2] = [0x00, 0x00];

/// Device-side protocol handler for a single controller.
#[derive(Debug, Clone)]
pub struct MockDevice {
    registry: DeviceRegistry,
    pending: Vec<u8>,
    status: [u8; 2],
    writes: usize,
    polls: usize,
}

impl MockDevice {
    #[must_use]
    pub fn new(variant: DeviceVariant) -> Self {
        Self {
            registry: DeviceRegistry::new(variant),
            pending: Vec::new(),
            status: DEFAULT_STATUS,
            writes: 0,
            polls: 0,
        }
    }

    /// Replace the stored values; rejected unless every value is in range.
    pub fn with_values(mut self, values: &[u8]) -> Result<Self, LinkError> {
        let variant = self.registry.variant();
        if !self.registry.update_for_variant(variant, values) {
            return Err(LinkError::Protocol(format!(
                "{variant}: {} initial values rejected",
                values.len()
            )));
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_status(mut self, status: [u8; 2]) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub const fn variant(&self) -> DeviceVariant {
        self.registry.variant()
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        self.registry.parameters()
    }

    #[must_use]
    pub fn values(&self) -> Vec<u8> {
        self.registry.values()
    }

    #[must_use]
    pub const fn status(&self) -> [u8; 2] {
        self.status
    }

    pub fn set_status(&mut self, status: [u8; 2]) {
        self.status = status;
    }

    /// Accepted normal writes so far.
    #[must_use]
    pub const fn write_count(&self) -> usize {
        self.writes
    }

    /// Answered debug polls so far.
    #[must_use]
    pub const fn poll_count(&self) -> usize {
        self.polls
    }

    fn debug_response(&self) -> Vec<u8> {
        let mut rsp = vec![CMD_DEBUG, 2, self.status[0], self.status[1]];
        rsp.push(checksum(&rsp, 1, None));
        rsp
    }

    fn current_frame(&self) -> Vec<u8> {
        match encode(self.registry.variant(), self.registry.parameters()) {
            Ok(frame) => frame.to_bytes(),
            Err(e) => {
                warn!("mock: cannot encode current values: {e}");
                Vec::new()
            }
        }
    }

    /// Feed bytes from the host and collect the replies they trigger.
    ///
    /// Unrecognised or corrupt input is skipped one byte at a time until a
    /// known frame start lines up again.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        let mut replies = Vec::new();
        let variant = self.registry.variant();
        while let Some(&command) = self.pending.first() {
            if command == CMD_READ_REQUEST {
                if self.pending.len() < READ_REQUEST.len() {
                    break;
                }
                if self.pending[..READ_REQUEST.len()] == READ_REQUEST {
                    self.pending.drain(..READ_REQUEST.len());
                    debug!("mock: read request");
                    replies.push(self.current_frame());
                } else {
                    self.pending.drain(..1);
                }
            } else if command == CMD_DEBUG {
                // the poll reuses the normal layout of this device's variant
                let need = variant.frame_len();
                if self.pending.len() < need {
                    break;
                }
                let frame = &self.pending[..need];
                let ok = usize::from(frame[1]) == variant.item_count()
                    && checksum(frame, 1, Some(need - 2)) == frame[need - 1];
                if ok {
                    self.pending.drain(..need);
                    self.polls += 1;
                    replies.push(self.debug_response());
                } else {
                    self.pending.drain(..1);
                }
            } else if command == variant.command() {
                let need = variant.frame_len();
                if self.pending.len() < need {
                    break;
                }
                match validate(&self.pending) {
                    Ok(kind) if kind.variant() == Some(variant) => {
                        let frame: Vec<u8> = self.pending.drain(..need).collect();
                        if self.registry.update_for_variant(variant, &frame[2..need - 1]) {
                            self.writes += 1;
                            debug!("mock: stored {}", hex_dump(&frame));
                            replies.push(frame);
                        } else {
                            warn!("mock: write with out-of-range value ignored");
                        }
                    }
                    _ => {
                        self.pending.drain(..1);
                    }
                }
            } else {
                self.pending.drain(..1);
            }
        }
        replies
    }
}

/// Serializable view of the device state, for logs and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub variant: DeviceVariant,
    pub parameters: Vec<Parameter>,
    pub status: [u8; 2],
    pub writes: usize,
    pub polls: usize,
}

/// TCP front end for a shared [`MockDevice`].
#[derive(Clone, Debug)]
pub struct MockServer {
    device: Arc<Mutex<MockDevice>>,
    response_delay: Duration,
}

impl MockServer {
    #[must_use]
    pub fn new(variant: DeviceVariant) -> Self {
        Self::with_device(MockDevice::new(variant))
    }

    #[must_use]
    pub fn with_device(device: MockDevice) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            response_delay: Duration::ZERO,
        }
    }

    /// Wait this long before answering each chunk of input.
    #[must_use]
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub async fn values(&self) -> Vec<u8> {
        self.device.lock().await.values()
    }

    pub async fn set_status(&self, status: [u8; 2]) {
        self.device.lock().await.set_status(status);
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        let dev = self.device.lock().await;
        DeviceSnapshot {
            variant: dev.variant(),
            parameters: dev.parameters().to_vec(),
            status: dev.status(),
            writes: dev.write_count(),
            polls: dev.poll_count(),
        }
    }

    /// Bind `addr` and serve until the listener fails.
    pub async fn run(&self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("mock controller listening on {}", listener.local_addr()?);
        self.run_listener_on(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn run_listener_on(&self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (socket, peer) = listener.accept().await?;
            info!("mock: client connected from {peer}");
            let srv = self.clone();
            tokio::spawn(async move {
                if let Err(e) = srv.handle_conn(socket).await {
                    warn!("mock: connection {peer} ended with error: {e}");
                } else {
                    info!("mock: client {peer} disconnected");
                }
            });
        }
    }

    async fn handle_conn(&self, mut socket: TcpStream) -> anyhow::Result<()> {
        socket.set_nodelay(true)?;
        let mut buf = [0u8; 256];
        loop {
            let n = socket.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            debug!("mock recv: {}", hex_dump(&buf[..n]));
            let replies = self.device.lock().await.feed(&buf[..n]);
            if replies.is_empty() {
                continue;
            }
            if !self.response_delay.is_zero() {
                tokio::time::sleep(self.response_delay).await;
            }
            for reply in replies {
                debug!("mock send: {}", hex_dump(&reply));
                socket.write_all(&reply).await?;
            }
        }
    }
}
