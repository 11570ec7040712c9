//! In-memory fakes for driving the session engines without a real channel.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::error::TransportError;
use crate::parameter::Parameter;
use crate::session::{SessionObserver, StopReason};
use crate::transport::Transport;

/// Print a concise test banner so it's easy to see what is running in CI logs.
pub fn announce(name: &str, description: &str) {
    let ts = SystemTime::now().duration_since(UNIX_EPOCH).ok();
    if let Some(d) = ts {
        info!("[TEST START] {name} - {description} (ts={})", d.as_secs());
    } else {
        info!("[TEST START] {name} - {description}");
    }
}

/// Transport that keeps every frame handed to it.
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    pub sent: Vec<Vec<u8>>,
    /// When set, every `send` fails with this error and records nothing.
    pub fail_with: Option<TransportError>,
}

impl RecordingTransport {
    #[must_use]
    pub fn last(&self) -> Option<&[u8]> {
        self.sent.last().map(Vec::as_slice)
    }

    pub fn take(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    /// Current values at the time of the notification.
    Changed(Vec<u8>),
    Error(i32),
    Sample(Vec<u8>),
    Stopped(StopReason),
}

/// Observer that counts and records notifications in arrival order.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub changed: usize,
    pub errors: Vec<i32>,
    pub events: Vec<ObserverEvent>,
}

impl SessionObserver for RecordingObserver {
    fn on_parameters_changed(&mut self, parameters: &[Parameter]) {
        self.changed += 1;
        self.events
            .push(ObserverEvent::Changed(parameters.iter().map(|p| p.current).collect()));
    }

    fn on_session_error(&mut self, code: i32) {
        self.errors.push(code);
        self.events.push(ObserverEvent::Error(code));
    }

    fn on_debug_sample(&mut self, sample: &[u8]) {
        self.events.push(ObserverEvent::Sample(sample.to_vec()));
    }

    fn on_session_stopped(&mut self, reason: StopReason) {
        self.events.push(ObserverEvent::Stopped(reason));
    }
}
