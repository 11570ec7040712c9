//! `MotorLink` owns the registry, the transport and both session engines, and
//! keeps at most one engine active on the shared transport.

use std::time::Instant;

use crate::config::LinkTiming;
use crate::debug_session::DebugSession;
use crate::device_registry::DeviceRegistry;
use crate::error::LinkError;
use crate::session::{SessionContext, SessionObserver};
use crate::transfer::{Transfer, TransferPhase};
use crate::transport::Transport;
use crate::variant::DeviceVariant;

/// Application-level mode of a [`MotorLink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkMode {
    Disconnected,
    /// Transfer engine open, one-shot write/read allowed.
    Normal,
    /// Debug engine owns the transport.
    Debug,
}

impl LinkMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Normal => "Normal",
            Self::Debug => "Debug",
        }
    }
}

/// Engine currently registered for inbound bytes and close events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Receiver {
    Transfer,
    Debug,
}

pub struct MotorLink<T: Transport, O: SessionObserver> {
    registry: DeviceRegistry,
    transport: T,
    observer: O,
    transfer: Transfer,
    debug: DebugSession,
    mode: LinkMode,
    receiver: Option<Receiver>,
}

impl<T: Transport, O: SessionObserver> MotorLink<T, O> {
    pub fn new(registry: DeviceRegistry, transport: T, observer: O, timing: &LinkTiming) -> Self {
        Self {
            registry,
            transport,
            observer,
            transfer: Transfer::new(timing),
            debug: DebugSession::new(timing),
            mode: LinkMode::Disconnected,
            receiver: None,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> LinkMode {
        self.mode
    }

    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[must_use]
    pub const fn transfer_phase(&self) -> TransferPhase {
        self.transfer.phase()
    }

    #[must_use]
    pub const fn is_debugging(&self) -> bool {
        self.debug.is_debugging()
    }

    #[must_use]
    pub fn last_sample(&self) -> Option<&[u8]> {
        self.debug.last_sample()
    }

    fn invalid(&self, operation: &'static str) -> LinkError {
        LinkError::InvalidState {
            operation,
            state: self.mode.as_str(),
        }
    }

    /// Disconnected -> Normal.
    pub fn connect(&mut self, now: Instant) -> Result<(), LinkError> {
        if self.mode != LinkMode::Disconnected {
            return Err(self.invalid("connect"));
        }
        self.transfer.open(now)?;
        self.receiver = Some(Receiver::Transfer);
        self.mode = LinkMode::Normal;
        log::info!("link: connected ({})", self.registry.device_name());
        Ok(())
    }

    /// Close whichever engine is active. Always succeeds.
    pub fn disconnect(&mut self) {
        self.transfer.close();
        self.debug.stop();
        self.receiver = None;
        if self.mode != LinkMode::Disconnected {
            log::info!("link: disconnected from {}", self.mode.as_str());
        }
        self.mode = LinkMode::Disconnected;
    }

    /// Normal -> Debug. Also restarts polling after the debug engine
    /// stopped itself.
    pub fn enter_debug(&mut self, now: Instant) -> Result<(), LinkError> {
        match self.mode {
            LinkMode::Normal => self.transfer.close(),
            LinkMode::Debug if !self.debug.is_debugging() => {}
            LinkMode::Debug | LinkMode::Disconnected => return Err(self.invalid("enter_debug")),
        }
        self.debug.start(now)?;
        self.receiver = Some(Receiver::Debug);
        self.mode = LinkMode::Debug;
        log::debug!("link: debug mode");
        Ok(())
    }

    /// Debug -> Normal.
    pub fn enter_normal(&mut self, now: Instant) -> Result<(), LinkError> {
        if self.mode != LinkMode::Debug {
            return Err(self.invalid("enter_normal"));
        }
        self.debug.stop();
        self.transfer.open(now)?;
        self.receiver = Some(Receiver::Transfer);
        self.mode = LinkMode::Normal;
        log::debug!("link: normal mode");
        Ok(())
    }

    pub fn write(&mut self, now: Instant) -> Result<(), LinkError> {
        if self.mode != LinkMode::Normal {
            return Err(self.invalid("write"));
        }
        let mut ctx = SessionContext::new(&mut self.registry, &mut self.transport, &mut self.observer);
        self.transfer.write(&mut ctx, now)
    }

    pub fn read(&mut self, now: Instant) -> Result<(), LinkError> {
        if self.mode != LinkMode::Normal {
            return Err(self.invalid("read"));
        }
        let mut ctx = SessionContext::new(&mut self.registry, &mut self.transport, &mut self.observer);
        self.transfer.read(&mut ctx, now)
    }

    /// Route inbound bytes to the registered engine.
    pub fn on_inbound_data(&mut self, data: &[u8], now: Instant) {
        let mut ctx = SessionContext::new(&mut self.registry, &mut self.transport, &mut self.observer);
        match self.receiver {
            Some(Receiver::Transfer) => self.transfer.on_inbound_data(&mut ctx, data, now),
            Some(Receiver::Debug) => self.debug.on_inbound_data(&mut ctx, data, now),
            None => log::debug!("link: {} bytes with no receiver", data.len()),
        }
    }

    /// The transport closed; `code` is 0 for an orderly close.
    pub fn on_transport_closed(&mut self, code: i32) {
        let mut ctx = SessionContext::new(&mut self.registry, &mut self.transport, &mut self.observer);
        match self.receiver.take() {
            Some(Receiver::Transfer) => self.transfer.on_transport_closed(&mut ctx, code),
            Some(Receiver::Debug) => self.debug.on_transport_closed(&mut ctx, code),
            None => log::debug!("link: transport closed (code={code}) with no receiver"),
        }
        self.transfer.close();
        self.debug.stop();
        self.mode = LinkMode::Disconnected;
    }

    /// Drive the timers of both engines; closed engines ignore it.
    pub fn tick(&mut self, now: Instant) {
        self.transfer.tick(now);
        let mut ctx = SessionContext::new(&mut self.registry, &mut self.transport, &mut self.observer);
        self.debug.tick(&mut ctx, now);
    }

    /// Switch the controller model and reload its defaults.
    pub fn select_variant(&mut self, variant: DeviceVariant) -> Result<(), LinkError> {
        if self.transfer.is_in_transition() {
            return Err(LinkError::Busy(format!(
                "transfer {} in progress",
                self.transfer.phase().as_str()
            )));
        }
        if self.debug.is_debugging() {
            return Err(LinkError::Busy("debug session active".into()));
        }
        self.registry.load_defaults(variant);
        Ok(())
    }

    /// Bounds-checked edit of one current value. Allowed while debugging so
    /// the next poll carries the new value.
    pub fn set_parameter(&mut self, index: usize, value: u8) -> Result<(), LinkError> {
        self.registry.set_value(index, value)
    }
}
