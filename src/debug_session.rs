//! Live-debug poll loop.
//!
//! While `Debugging`, two timers run side by side: the write timer pushes the
//! registry values under the debug opcode, the read timer checks how long
//! the controller has been silent. The session ends on its own after one
//! validated response or after a silence longer than the applicable bound.

use std::time::{Duration, Instant};

use crate::config::LinkTiming;
use crate::error::LinkError;
use crate::link_define::CMD_DEBUG;
use crate::link_frame::{decode, encode_with_command, validate, FrameKind};
use crate::session::{Interval, SessionContext, StopReason};
use crate::transport::maybe_log_frame;

#[derive(Debug)]
enum State {
    Closed,
    Debugging {
        received: Vec<u8>,
        last_activity: Instant,
        write_timer: Interval,
        read_timer: Interval,
    },
}

#[derive(Debug)]
pub struct DebugSession {
    state: State,
    write_interval: Duration,
    read_poll: Duration,
    first_response: Duration,
    last_sample: Option<Vec<u8>>,
}

impl DebugSession {
    #[must_use]
    pub fn new(timing: &LinkTiming) -> Self {
        Self {
            state: State::Closed,
            write_interval: timing.debug_write_interval,
            read_poll: timing.debug_read_poll,
            first_response: timing.debug_first_response,
            last_sample: None,
        }
    }

    #[must_use]
    pub const fn is_debugging(&self) -> bool {
        matches!(self.state, State::Debugging { .. })
    }

    #[must_use]
    pub const fn state_name(&self) -> &'static str {
        match self.state {
            State::Closed => "Closed",
            State::Debugging { .. } => "Debugging",
        }
    }

    /// Payload of the most recent validated debug response.
    #[must_use]
    pub fn last_sample(&self) -> Option<&[u8]> {
        self.last_sample.as_deref()
    }

    /// Bytes accumulated since the session started.
    #[must_use]
    pub fn received(&self) -> &[u8] {
        match &self.state {
            State::Debugging { received, .. } => received,
            State::Closed => &[],
        }
    }

    /// Closed -> Debugging and arm both timers. The first poll goes out on
    /// the first write-timer expiry.
    pub fn start(&mut self, now: Instant) -> Result<(), LinkError> {
        if self.is_debugging() {
            return Err(LinkError::InvalidState {
                operation: "start",
                state: self.state_name(),
            });
        }
        log::debug!(
            "debug: start (write every {} ms, read poll {} ms)",
            self.write_interval.as_millis(),
            self.read_poll.as_millis()
        );
        self.state = State::Debugging {
            received: Vec::new(),
            last_activity: now,
            write_timer: Interval::new(self.write_interval, now),
            read_timer: Interval::new(self.read_poll, now),
        };
        Ok(())
    }

    /// Cancel both timers, drop buffers and force Closed.
    pub fn stop(&mut self) {
        if self.is_debugging() {
            log::debug!("debug: stop");
        }
        self.state = State::Closed;
    }

    /// Push the current registry values under the debug opcode.
    pub fn on_write_tick(&mut self, ctx: &mut SessionContext<'_>) -> Result<(), LinkError> {
        if !self.is_debugging() {
            return Ok(());
        }
        let frame = encode_with_command(CMD_DEBUG, ctx.registry.variant(), ctx.registry.parameters())?;
        let bytes = frame.to_bytes();
        maybe_log_frame("debug poll", &bytes);
        ctx.transport.send(&bytes).map_err(|e| {
            log::error!("debug: poll send failed: {e}");
            LinkError::from(e)
        })
    }

    /// Silence check. Returns `true` when the session stopped on timeout.
    pub fn on_read_tick(&mut self, ctx: &mut SessionContext<'_>, now: Instant) -> bool {
        let State::Debugging {
            received,
            last_activity,
            ..
        } = &self.state
        else {
            return false;
        };
        let bound = if received.is_empty() {
            self.first_response
        } else {
            self.write_interval
        };
        let elapsed = now.saturating_duration_since(*last_activity);
        if elapsed < bound {
            return false;
        }
        log::warn!(
            "debug: no response for {} ms (bound {} ms, {} bytes buffered), stopping",
            elapsed.as_millis(),
            bound.as_millis(),
            received.len()
        );
        self.stop();
        ctx.observer.on_session_stopped(StopReason::ResponseTimeout);
        true
    }

    /// Drive both timers with the current time.
    pub fn tick(&mut self, ctx: &mut SessionContext<'_>, now: Instant) {
        let (write_due, read_due) = match &mut self.state {
            State::Debugging {
                write_timer,
                read_timer,
                ..
            } => (write_timer.poll(now), read_timer.poll(now)),
            State::Closed => return,
        };
        if write_due {
            // a failed push is left to the read timeout
            let _ = self.on_write_tick(ctx);
        }
        if read_due {
            self.on_read_tick(ctx, now);
        }
    }

    /// Accumulate inbound bytes; one validated debug response ends the
    /// session.
    pub fn on_inbound_data(&mut self, ctx: &mut SessionContext<'_>, data: &[u8], now: Instant) {
        let State::Debugging {
            received,
            last_activity,
            ..
        } = &mut self.state
        else {
            log::debug!("debug: {} unsolicited bytes ignored", data.len());
            return;
        };
        *last_activity = now;
        received.extend_from_slice(data);
        let frame = match validate(received) {
            Ok(FrameKind::DebugResponse) => match decode(received) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("debug: {e}");
                    return;
                }
            },
            Ok(kind) => {
                log::debug!("debug: {kind:?} frame while debugging, still waiting");
                return;
            }
            Err(e) if e.is_incomplete() => return,
            Err(e) => {
                log::warn!("debug: {e}");
                return;
            }
        };
        maybe_log_frame("debug response", &frame.to_bytes());
        ctx.observer.on_debug_sample(&frame.payload);
        let variant = ctx.registry.variant();
        let committed = ctx.registry.update_for_variant(variant, &frame.payload);
        log::debug!(
            "debug: response {} bytes, update result={committed}",
            frame.wire_len()
        );
        if committed {
            ctx.observer.on_parameters_changed(ctx.registry.parameters());
        }
        self.last_sample = Some(frame.payload);
        // one sample per start()
        self.stop();
        ctx.observer.on_session_stopped(StopReason::SampleCaptured);
    }

    /// The transport went away: report a non-zero code, then force Closed.
    pub fn on_transport_closed(&mut self, ctx: &mut SessionContext<'_>, code: i32) {
        log::debug!(
            "debug: transport closed, code={code}, state={}",
            self.state_name()
        );
        if code != 0 {
            log::error!("debug: transport error {code}");
            ctx.observer.on_session_error(code);
        }
        self.stop();
    }
}
