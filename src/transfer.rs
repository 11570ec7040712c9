//! Request/response engine: one write-then-verify or one read exchange at a
//! time.
//!
//! ```text
//! Closed --open--> Ready --write--> Writing --echo matches--> Ready
//!                        --read---> Reading --frame valid--> Ready
//! Writing/Reading --timeout--> Ready
//! any --close / transport closed--> Closed
//! ```
//!
//! Nothing is retried here. A timeout drops the pending exchange and the
//! caller decides whether to issue it again.

use std::time::{Duration, Instant};

use crate::config::LinkTiming;
use crate::error::LinkError;
use crate::link_frame::{decode, encode, read_request, validate};
use crate::session::{Interval, SessionContext};
use crate::transport::maybe_log_frame;

/// Observable state of a [`Transfer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferPhase {
    Closed,
    Ready,
    Writing,
    Reading,
}

impl TransferPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::Ready => "Ready",
            Self::Writing => "Writing",
            Self::Reading => "Reading",
        }
    }
}

#[derive(Debug)]
enum State {
    Closed,
    Ready,
    Writing {
        sent: Vec<u8>,
        received: Vec<u8>,
        last_activity: Instant,
    },
    Reading {
        received: Vec<u8>,
        last_activity: Instant,
    },
}

impl State {
    const fn phase(&self) -> TransferPhase {
        match self {
            Self::Closed => TransferPhase::Closed,
            Self::Ready => TransferPhase::Ready,
            Self::Writing { .. } => TransferPhase::Writing,
            Self::Reading { .. } => TransferPhase::Reading,
        }
    }
}

#[derive(Debug)]
pub struct Transfer {
    state: State,
    timer: Option<Interval>,
    timeout: Duration,
}

impl Transfer {
    #[must_use]
    pub fn new(timing: &LinkTiming) -> Self {
        Self {
            state: State::Closed,
            timer: None,
            timeout: timing.transfer_timeout,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> TransferPhase {
        self.state.phase()
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.state, State::Closed)
    }

    /// A request is out and its echo/response is pending.
    #[must_use]
    pub const fn is_in_transition(&self) -> bool {
        matches!(self.state, State::Writing { .. } | State::Reading { .. })
    }

    /// Bytes of the frame awaiting its echo, if writing.
    #[must_use]
    pub fn sent(&self) -> Option<&[u8]> {
        match &self.state {
            State::Writing { sent, .. } => Some(sent),
            _ => None,
        }
    }

    /// Bytes accumulated since the current exchange started.
    #[must_use]
    pub fn received(&self) -> &[u8] {
        match &self.state {
            State::Writing { received, .. } | State::Reading { received, .. } => received,
            State::Closed | State::Ready => &[],
        }
    }

    fn invalid(&self, operation: &'static str) -> LinkError {
        LinkError::InvalidState {
            operation,
            state: self.phase().as_str(),
        }
    }

    /// Closed -> Ready and arm the timeout timer.
    pub fn open(&mut self, now: Instant) -> Result<(), LinkError> {
        if self.is_open() {
            return Err(self.invalid("open"));
        }
        log::debug!("transfer: open");
        self.state = State::Ready;
        self.timer = Some(Interval::new(self.timeout, now));
        Ok(())
    }

    /// Cancel the timer, drop buffers and force Closed from any state.
    pub fn close(&mut self) {
        if self.is_open() {
            log::debug!("transfer: close from {}", self.phase().as_str());
        }
        self.timer = None;
        self.state = State::Closed;
    }

    /// Send the registry's parameters and wait for the device to echo them.
    pub fn write(&mut self, ctx: &mut SessionContext<'_>, now: Instant) -> Result<(), LinkError> {
        if !matches!(self.state, State::Ready) {
            return Err(self.invalid("write"));
        }
        let frame = encode(ctx.registry.variant(), ctx.registry.parameters())?;
        let bytes = frame.to_bytes();
        maybe_log_frame("write", &bytes);
        if let Err(e) = ctx.transport.send(&bytes) {
            log::error!("transfer: write send failed: {e}");
            return Err(e.into());
        }
        log::debug!("transfer: Ready -> Writing ({} bytes)", bytes.len());
        self.state = State::Writing {
            sent: bytes,
            received: Vec::new(),
            last_activity: now,
        };
        Ok(())
    }

    /// Send the fixed read request and wait for a parameter frame.
    pub fn read(&mut self, ctx: &mut SessionContext<'_>, now: Instant) -> Result<(), LinkError> {
        if !matches!(self.state, State::Ready) {
            return Err(self.invalid("read"));
        }
        let request = read_request();
        maybe_log_frame("read request", &request);
        if let Err(e) = ctx.transport.send(&request) {
            log::error!("transfer: read send failed: {e}");
            return Err(e.into());
        }
        log::debug!("transfer: Ready -> Reading");
        self.state = State::Reading {
            received: Vec::new(),
            last_activity: now,
        };
        Ok(())
    }

    /// Accumulate inbound bytes and complete the pending exchange when the
    /// buffer forms the expected echo or a valid frame.
    pub fn on_inbound_data(&mut self, ctx: &mut SessionContext<'_>, data: &[u8], now: Instant) {
        match &mut self.state {
            State::Writing {
                sent,
                received,
                last_activity,
            } => {
                *last_activity = now;
                received.extend_from_slice(data);
                if received == sent {
                    maybe_log_frame("echo", received);
                    log::debug!("transfer: write verified by echo");
                    self.state = State::Ready;
                }
            }
            State::Reading {
                received,
                last_activity,
            } => {
                *last_activity = now;
                received.extend_from_slice(data);
                match validate(received) {
                    Ok(kind) => {
                        maybe_log_frame("read", received);
                        let committed = match (kind.variant(), decode(received)) {
                            (Some(variant), Ok(frame)) => {
                                ctx.registry.update_for_variant(variant, &frame.payload)
                            }
                            _ => false,
                        };
                        log::debug!(
                            "transfer: read {kind:?} ({} bytes), update result={committed}",
                            kind.total_len()
                        );
                        if committed {
                            ctx.observer.on_parameters_changed(ctx.registry.parameters());
                        } else {
                            log::warn!("transfer: read frame not committed to registry");
                        }
                        self.state = State::Ready;
                    }
                    Err(e) if e.is_incomplete() => {}
                    Err(e) => {
                        // stays Reading until the timeout path resets it
                        log::warn!("transfer: {e}");
                    }
                }
            }
            State::Closed | State::Ready => {
                log::debug!(
                    "transfer: {} unsolicited bytes ignored in {}",
                    data.len(),
                    self.state.phase().as_str()
                );
            }
        }
    }

    /// Timeout check. Returns `true` when a pending exchange was dropped.
    pub fn on_timer_tick(&mut self, now: Instant) -> bool {
        let last = match &self.state {
            State::Writing { last_activity, .. } | State::Reading { last_activity, .. } => {
                *last_activity
            }
            State::Closed | State::Ready => return false,
        };
        let elapsed = now.saturating_duration_since(last);
        if elapsed >= self.timeout {
            log::warn!(
                "transfer: timeout in {} after {} ms",
                self.phase().as_str(),
                elapsed.as_millis()
            );
            self.state = State::Ready;
            return true;
        }
        false
    }

    /// Drive the armed timer with the current time.
    pub fn tick(&mut self, now: Instant) -> bool {
        let due = self.timer.as_mut().is_some_and(|t| t.poll(now));
        if due {
            self.on_timer_tick(now)
        } else {
            false
        }
    }

    /// The transport went away: report a non-zero code, then force Closed.
    pub fn on_transport_closed(&mut self, ctx: &mut SessionContext<'_>, code: i32) {
        log::debug!(
            "transfer: transport closed, code={code}, phase={}",
            self.phase().as_str()
        );
        if self.is_in_transition() {
            log::warn!("transfer: exchange dropped by transport close");
        }
        if code != 0 {
            log::error!("transfer: transport error {code}");
            ctx.observer.on_session_error(code);
        }
        self.close();
    }
}
