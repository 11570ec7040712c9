//! Async driver for [`MotorLink`].
//!
//! One task owns the link and the read half of the byte stream. Commands from
//! [`LinkHandle`], inbound bytes, writer failures and the clock tick are
//! handled one at a time in a `select!` loop, so the engines still see a
//! strictly sequential event stream.
//!
//! Outbound frames go through a queue to a separate writer task. A peer that
//! stops reading only stalls that task; timeouts and commands keep running.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout as tokio_timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::LinkTiming;
use crate::device_registry::DeviceRegistry;
use crate::error::LinkError;
use crate::link::{LinkMode, MotorLink};
use crate::link_define::TRANSPORT_RESOURCE_ERROR;
use crate::parameter::Parameter;
use crate::session::{SessionObserver, StopReason};
use crate::transport::ChannelTransport;
use crate::variant::DeviceVariant;

const READ_CHUNK: usize = 256;
const COMMAND_QUEUE: usize = 32;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const WRITER_GRACE: Duration = Duration::from_millis(250);

/// Notification emitted by the link task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    ParametersChanged(Vec<Parameter>),
    SessionError(i32),
    DebugSample(Vec<u8>),
    SessionStopped(StopReason),
}

struct EventObserver {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl EventObserver {
    fn emit(&self, ev: LinkEvent) {
        // nobody listening is fine
        let _ = self.tx.send(ev);
    }
}

impl SessionObserver for EventObserver {
    fn on_parameters_changed(&mut self, parameters: &[Parameter]) {
        self.emit(LinkEvent::ParametersChanged(parameters.to_vec()));
    }

    fn on_session_error(&mut self, code: i32) {
        self.emit(LinkEvent::SessionError(code));
    }

    fn on_debug_sample(&mut self, sample: &[u8]) {
        self.emit(LinkEvent::DebugSample(sample.to_vec()));
    }

    fn on_session_stopped(&mut self, reason: StopReason) {
        self.emit(LinkEvent::SessionStopped(reason));
    }
}

type Reply<T> = oneshot::Sender<Result<T, LinkError>>;

enum LinkCommand {
    Connect(Reply<()>),
    Disconnect(Reply<()>),
    Write(Reply<()>),
    Read(Reply<()>),
    EnterDebug(Reply<()>),
    EnterNormal(Reply<()>),
    SelectVariant(DeviceVariant, Reply<()>),
    SetParameter {
        index: usize,
        value: u8,
        reply: Reply<()>,
    },
    Parameters(Reply<Vec<Parameter>>),
    Mode(Reply<LinkMode>),
    Shutdown(Reply<()>),
}

/// Cloneable front end of a running link task.
#[derive(Clone, Debug)]
pub struct LinkHandle {
    tx: mpsc::Sender<LinkCommand>,
}

impl LinkHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> LinkCommand,
    ) -> Result<T, LinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| LinkError::Closed)?;
        rx.await.map_err(|_| LinkError::Closed)?
    }

    pub async fn connect(&self) -> Result<(), LinkError> {
        self.request(LinkCommand::Connect).await
    }

    pub async fn disconnect(&self) -> Result<(), LinkError> {
        self.request(LinkCommand::Disconnect).await
    }

    /// Send the current parameters. Completion (echo) is not awaited.
    pub async fn write(&self) -> Result<(), LinkError> {
        self.request(LinkCommand::Write).await
    }

    /// Send the read request. The result arrives as
    /// [`LinkEvent::ParametersChanged`].
    pub async fn read(&self) -> Result<(), LinkError> {
        self.request(LinkCommand::Read).await
    }

    pub async fn enter_debug(&self) -> Result<(), LinkError> {
        self.request(LinkCommand::EnterDebug).await
    }

    pub async fn enter_normal(&self) -> Result<(), LinkError> {
        self.request(LinkCommand::EnterNormal).await
    }

    pub async fn select_variant(&self, variant: DeviceVariant) -> Result<(), LinkError> {
        self.request(|reply| LinkCommand::SelectVariant(variant, reply))
            .await
    }

    pub async fn set_parameter(&self, index: usize, value: u8) -> Result<(), LinkError> {
        self.request(|reply| LinkCommand::SetParameter {
            index,
            value,
            reply,
        })
        .await
    }

    /// Snapshot of the registry's parameter list.
    pub async fn parameters(&self) -> Result<Vec<Parameter>, LinkError> {
        self.request(LinkCommand::Parameters).await
    }

    pub async fn mode(&self) -> Result<LinkMode, LinkError> {
        self.request(LinkCommand::Mode).await
    }

    /// Stop the task and shut down the write half of the stream.
    pub async fn shutdown(&self) -> Result<(), LinkError> {
        self.request(LinkCommand::Shutdown).await
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Spawn the link task over `stream`.
///
/// The task ends on [`LinkHandle::shutdown`] or when every handle is dropped.
pub fn spawn_link<S>(
    stream: S,
    registry: DeviceRegistry,
    timing: LinkTiming,
) -> (LinkHandle, mpsc::UnboundedReceiver<LinkEvent>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
    let (ev_tx, ev_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let link = MotorLink::new(
        registry,
        ChannelTransport::new(out_tx),
        EventObserver { tx: ev_tx },
        &timing,
    );
    let tick = timing.tick.max(Duration::from_millis(1));
    tokio::spawn(run_link(stream, link, out_rx, cmd_rx, tick));
    (LinkHandle { tx: cmd_tx }, ev_rx)
}

/// Connect to a serial-over-TCP bridge and spawn the link task on it.
pub async fn connect_tcp<A: ToSocketAddrs>(
    addr: A,
    registry: DeviceRegistry,
    timing: LinkTiming,
) -> Result<(LinkHandle, mpsc::UnboundedReceiver<LinkEvent>), LinkError> {
    let stream = match tokio_timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => return Err(LinkError::Io(e)),
        Err(_) => return Err(LinkError::Timeout),
    };
    stream.set_nodelay(true)?;
    if let Ok(peer) = stream.peer_addr() {
        info!("motor link connected to {peer}");
    }
    Ok(spawn_link(stream, registry, timing))
}

/// Drain queued frames into `wr` until the queue closes or a write fails.
async fn write_frames<W>(
    mut wr: W,
    mut out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    failed: oneshot::Sender<std::io::Error>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = out_rx.recv().await {
        if let Err(e) = wr.write_all(&frame).await {
            let _ = failed.send(e);
            return;
        }
    }
    let _ = wr.shutdown().await;
}

type Link = MotorLink<ChannelTransport, EventObserver>;

/// Returns `false` when the task should stop.
fn handle_command(link: &mut Link, cmd: LinkCommand) -> bool {
    let t = now();
    match cmd {
        LinkCommand::Connect(reply) => {
            let _ = reply.send(link.connect(t));
        }
        LinkCommand::Disconnect(reply) => {
            link.disconnect();
            let _ = reply.send(Ok(()));
        }
        LinkCommand::Write(reply) => {
            let _ = reply.send(link.write(t));
        }
        LinkCommand::Read(reply) => {
            let _ = reply.send(link.read(t));
        }
        LinkCommand::EnterDebug(reply) => {
            let _ = reply.send(link.enter_debug(t));
        }
        LinkCommand::EnterNormal(reply) => {
            let _ = reply.send(link.enter_normal(t));
        }
        LinkCommand::SelectVariant(variant, reply) => {
            let _ = reply.send(link.select_variant(variant));
        }
        LinkCommand::SetParameter {
            index,
            value,
            reply,
        } => {
            let _ = reply.send(link.set_parameter(index, value));
        }
        LinkCommand::Parameters(reply) => {
            let _ = reply.send(Ok(link.registry().parameters().to_vec()));
        }
        LinkCommand::Mode(reply) => {
            let _ = reply.send(Ok(link.mode()));
        }
        LinkCommand::Shutdown(reply) => {
            link.disconnect();
            let _ = reply.send(Ok(()));
            return false;
        }
    }
    true
}

async fn run_link<S>(
    stream: S,
    mut link: Link,
    out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    mut cmd_rx: mpsc::Receiver<LinkCommand>,
    tick: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut rd, wr) = tokio::io::split(stream);
    let (failed_tx, mut write_failed) = oneshot::channel();
    let mut writer = tokio::spawn(write_frames(wr, out_rx, failed_tx));
    let mut stream_open = true;
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = [0u8; READ_CHUNK];
    debug!("link task started (tick {} ms)", tick.as_millis());

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("all link handles dropped");
                    break;
                };
                if !handle_command(&mut link, cmd) {
                    break;
                }
            }
            res = &mut write_failed, if stream_open => {
                match res {
                    Ok(e) => warn!("link write failed: {e}"),
                    Err(_) => warn!("link writer stopped"),
                }
                stream_open = false;
                link.transport_mut().close();
                link.on_transport_closed(TRANSPORT_RESOURCE_ERROR);
            }
            res = rd.read(&mut buf), if stream_open => {
                match res {
                    Ok(0) => {
                        info!("link stream closed by peer");
                        stream_open = false;
                        link.transport_mut().close();
                        link.on_transport_closed(TRANSPORT_RESOURCE_ERROR);
                    }
                    Ok(n) => {
                        debug!("link recv {n} bytes");
                        link.on_inbound_data(&buf[..n], now());
                    }
                    Err(e) => {
                        warn!("link read failed: {e}");
                        stream_open = false;
                        link.transport_mut().close();
                        link.on_transport_closed(TRANSPORT_RESOURCE_ERROR);
                    }
                }
            }
            _ = ticker.tick() => {
                link.tick(now());
            }
        }
    }

    drop(cmd_rx);
    debug!("link task finished in mode {}", link.mode().as_str());
    // closing the queue lets the writer flush and shut the stream down
    link.transport_mut().close();
    if tokio_timeout(WRITER_GRACE, &mut writer).await.is_err() {
        warn!("link writer still blocked after {} ms, aborting", WRITER_GRACE.as_millis());
        writer.abort();
    }
}
