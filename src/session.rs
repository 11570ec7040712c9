//! Pieces shared by the transfer and debug engines: the notification
//! interface, the borrowed collaborators each operation works against, and
//! the explicit interval timer that replaces toolkit timer events.

use std::time::{Duration, Instant};

use crate::device_registry::DeviceRegistry;
use crate::parameter::Parameter;
use crate::transport::Transport;

/// Why a debug session ended on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A complete debug response was received.
    SampleCaptured,
    /// The controller stayed silent past the applicable bound.
    ResponseTimeout,
}

/// Notifications raised by a session towards the application layer.
pub trait SessionObserver {
    /// A verified inbound frame was committed to the registry.
    fn on_parameters_changed(&mut self, parameters: &[Parameter]);

    /// The transport closed with a non-zero error code.
    fn on_session_error(&mut self, code: i32);

    /// Payload of a validated debug response.
    fn on_debug_sample(&mut self, _sample: &[u8]) {}

    /// The debug session stopped without being asked to.
    fn on_session_stopped(&mut self, _reason: StopReason) {}
}

/// Collaborators a session borrows for the duration of one event.
pub struct SessionContext<'a> {
    pub registry: &'a mut DeviceRegistry,
    pub transport: &'a mut dyn Transport,
    pub observer: &'a mut dyn SessionObserver,
}

impl<'a> SessionContext<'a> {
    pub fn new(
        registry: &'a mut DeviceRegistry,
        transport: &'a mut dyn Transport,
        observer: &'a mut dyn SessionObserver,
    ) -> Self {
        Self {
            registry,
            transport,
            observer,
        }
    }
}

/// Periodic timer polled with an external clock.
#[derive(Clone, Copy, Debug)]
pub struct Interval {
    period: Duration,
    next: Instant,
}

impl Interval {
    /// First expiry is one period after `now`.
    #[must_use]
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next: now + period,
        }
    }

    /// `true` once per elapsed period. Missed periods collapse into one
    /// expiry instead of firing in a burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
        true
    }
}
