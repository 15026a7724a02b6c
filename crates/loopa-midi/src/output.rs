//! Outbound MIDI: the realtime send path and the device side of it
//!
//! ```text
//! audio / sync thread          output worker            device
//! MidiSender::send ──► EventQueue ──► drain_into ──► OutputPort::write
//! ```

use midir::MidiOutputConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::MidiDeviceError;
use crate::queue::{EventQueue, MidiMessage};
use loopa_core::MidiEvent;

/// Something the output worker can write raw MIDI to
pub trait OutputPort: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<(), MidiDeviceError>;
}

impl OutputPort for MidiOutputConnection {
    fn write(&mut self, bytes: &[u8]) -> Result<(), MidiDeviceError> {
        self.send(bytes)
            .map_err(|e| MidiDeviceError::Send(e.to_string()))
    }
}

/// State shared by every sender and the output worker
pub(crate) struct SendPath {
    pub(crate) queue: EventQueue,
    /// False while no output device is open; sends are refused
    pub(crate) output_open: AtomicBool,
    on_midi_sent: Arc<dyn Fn() + Send + Sync>,
}

impl SendPath {
    pub(crate) fn new(
        capacity: usize,
        max_producers: usize,
        on_midi_sent: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            queue: EventQueue::new(capacity, max_producers),
            output_open: AtomicBool::new(false),
            on_midi_sent,
        }
    }

    fn send(&self, event: &MidiEvent) -> bool {
        if !self.output_open.load(Ordering::Acquire) {
            return false;
        }

        let message = MidiMessage::from(event);
        log::trace!("[MIDI OUT] send {:#010X}", event.raw());

        (self.on_midi_sent)();

        self.queue.try_push(message).is_ok()
    }

    /// Write every queued message to `port`, in queue order
    ///
    /// Write failures are logged and the message is dropped.
    pub(crate) fn drain_into(&self, port: &mut dyn OutputPort) -> usize {
        let mut written = 0;
        while let Some(message) = self.queue.pop() {
            match port.write(message.as_bytes()) {
                Ok(()) => written += 1,
                Err(e) => log::warn!("[MIDI OUT] {}", e),
            }
        }
        written
    }
}

/// Realtime handle for sending MIDI to the output device
///
/// Each sender holds one of the queue's producer slots until dropped.
/// Sending never blocks and never allocates.
pub struct MidiSender {
    path: Arc<SendPath>,
}

impl MidiSender {
    pub(crate) fn new(path: Arc<SendPath>) -> Self {
        path.queue.claim_producer();
        Self { path }
    }

    /// Queue `event` for the output device
    ///
    /// Returns `false` when no output device is open (nothing else happens)
    /// or when the queue is full (the message is dropped). Never retry from
    /// a realtime thread.
    ///
    /// # Panics
    ///
    /// If `event` is not 1 to 3 bytes long.
    pub fn send(&self, event: &MidiEvent) -> bool {
        self.path.send(event)
    }

    pub fn is_output_open(&self) -> bool {
        self.path.output_open.load(Ordering::Acquire)
    }
}

impl Drop for MidiSender {
    fn drop(&mut self) {
        self.path.queue.release_producer();
    }
}
