use tokio::sync::mpsc::UnboundedSender;

use crate::config::config as global_config;
use crate::error::TransportError;

/// Outbound half of the byte channel to the controller.
///
/// `send` hands a complete frame over and returns immediately; completion is
/// observed later through inbound data. Inbound bytes and closure are pushed
/// into the active session by whoever owns the physical channel.
pub trait Transport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }
}

/// Transport that queues frames for an async writer task.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    tx: Option<UnboundedSender<Vec<u8>>>,
}

impl ChannelTransport {
    #[must_use]
    pub const fn new(tx: UnboundedSender<Vec<u8>>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Drop the queue. The writer drains what is already queued and every
    /// later `send` fails with `Disconnected`.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Disconnected)?;
        tx.send(frame.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }
}

pub fn hex_dump(b: &[u8]) -> String {
    b.iter()
        .map(|x| format!("{x:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Debug-level hex dump of a frame, when `MOTOR_LINK_LOG_FRAMES=1`.
pub fn maybe_log_frame(label: &str, frame: &[u8]) {
    if global_config().log_frames {
        log::debug!("[LINK {}] {}", label, hex_dump(frame));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_formats_upper_case() {
        assert_eq!(hex_dump(&[0xAA, 0x0D, 0x05]), "AA 0D 05");
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn channel_transport_reports_dropped_receiver() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut t = ChannelTransport::new(tx);
        t.send(&[1, 2, 3]).expect("receiver alive");
        assert_eq!(rx.try_recv().ok(), Some(vec![1, 2, 3]));
        drop(rx);
        assert_eq!(t.send(&[4]), Err(TransportError::Disconnected));
    }

    #[test]
    fn closed_channel_transport_refuses_frames() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut t = ChannelTransport::new(tx);
        t.send(&[1]).expect("open");
        t.close();
        assert_eq!(t.send(&[2]), Err(TransportError::Disconnected));
        // queued frame survives, then the writer sees the end of the queue
        assert_eq!(rx.try_recv().ok(), Some(vec![1]));
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
