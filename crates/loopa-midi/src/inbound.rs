//! Inbound MIDI, on the driver's callback thread
//!
//! [`InboundCallback`] turns raw bytes into [`MidiEvent`]s stamped with the
//! time elapsed since the input opened, and hands each one to a single
//! handler. The handler runs on the driver thread: it must not block, or it
//! should forward the event somewhere else, e.g. through [`inbound_channel`].

use flume::{Receiver, TrySendError};
use midly::live::LiveEvent;
use std::sync::Arc;

use loopa_core::MidiEvent;

/// Handler called once per inbound message
pub type InboundHandler = Arc<dyn Fn(MidiEvent) + Send + Sync>;

pub struct InboundCallback {
    handler: InboundHandler,
    /// Seconds since the first message, sum of every delta
    elapsed: f64,
    /// Driver timestamp of the previous message (µs)
    last_stamp: Option<u64>,
}

impl InboundCallback {
    pub fn new(handler: InboundHandler) -> Self {
        Self {
            handler,
            elapsed: 0.0,
            last_stamp: None,
        }
    }

    /// Handle one message that arrived `delta` seconds after the previous one
    ///
    /// # Panics
    ///
    /// If `bytes` is not 1 to 3 bytes long: the driver never delivers such
    /// messages once SysEx is filtered out.
    pub fn on_message(&mut self, delta: f64, bytes: &[u8]) {
        self.elapsed += delta.max(0.0);

        let event = match MidiEvent::from_bytes(bytes, self.elapsed) {
            Some(event) => event,
            None => panic!(
                "[MIDI IN] unsupported message length {} (expected 1 to 3 bytes)",
                bytes.len()
            ),
        };

        log::trace!(
            "[MIDI IN] {:#010X} t={:.6} {:?}",
            event.raw(),
            self.elapsed,
            LiveEvent::parse(bytes).ok()
        );

        (self.handler)(event);
    }

    /// Entry point for driver callbacks that carry absolute timestamps (µs)
    pub fn on_driver_message(&mut self, stamp: u64, bytes: &[u8]) {
        let delta = match self.last_stamp {
            Some(previous) => stamp.saturating_sub(previous) as f64 / 1_000_000.0,
            None => 0.0,
        };
        self.last_stamp = Some(stamp);
        self.on_message(delta, bytes);
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

/// Handler that forwards events into a bounded channel
///
/// Events are dropped (with a debug log) when the consumer falls behind;
/// the driver thread never waits.
pub fn inbound_channel(capacity: usize) -> (InboundHandler, Receiver<MidiEvent>) {
    let (tx, rx) = flume::bounded(capacity);
    let handler: InboundHandler = Arc::new(move |event| match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            log::debug!("[MIDI IN] channel full, dropping {:#010X}", event.raw());
        }
        Err(TrySendError::Disconnected(_)) => {}
    });
    (handler, rx)
}
