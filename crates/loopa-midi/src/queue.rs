//! Bounded outbound MIDI queue
//!
//! Realtime producers (the audio callback, the MIDI sync thread) push fixed
//! size [`MidiMessage`]s; the output worker is the only consumer. Storage is
//! allocated once at construction and never grows, so pushing never touches
//! the allocator and never blocks. A full queue rejects the message.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

use loopa_core::MidiEvent;

/// Raw outbound message, 1 to 3 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiMessage {
    bytes: [u8; 3],
    len: u8,
}

impl MidiMessage {
    /// # Panics
    ///
    /// If `data` is empty or longer than 3 bytes.
    pub fn new(data: &[u8]) -> Self {
        assert!(
            (1..=3).contains(&data.len()),
            "[MIDI OUT] messages must be 1 to 3 bytes, got {}",
            data.len()
        );
        let mut bytes = [0u8; 3];
        bytes[..data.len()].copy_from_slice(data);
        Self {
            bytes,
            len: data.len() as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl From<&MidiEvent> for MidiMessage {
    fn from(event: &MidiEvent) -> Self {
        Self::new(event.as_bytes())
    }
}

/// Bounded MPSC queue with a fixed number of producer slots
pub struct EventQueue {
    inner: ArrayQueue<MidiMessage>,
    max_producers: usize,
    producers: AtomicUsize,
}

impl EventQueue {
    pub fn new(capacity: usize, max_producers: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
            max_producers,
            producers: AtomicUsize::new(0),
        }
    }

    /// Non-blocking push; gives the message back when the queue is full
    pub fn try_push(&self, message: MidiMessage) -> Result<(), MidiMessage> {
        self.inner.push(message)
    }

    pub fn pop(&self) -> Option<MidiMessage> {
        self.inner.pop()
    }

    /// Drop everything still queued, returns how many messages were lost
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.inner.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn max_producers(&self) -> usize {
        self.max_producers
    }

    pub fn producers(&self) -> usize {
        self.producers.load(Ordering::Acquire)
    }

    /// Take a producer slot
    ///
    /// # Panics
    ///
    /// When every slot is already taken.
    pub(crate) fn claim_producer(&self) {
        let previous = self.producers.fetch_add(1, Ordering::AcqRel);
        if previous >= self.max_producers {
            self.producers.fetch_sub(1, Ordering::AcqRel);
            panic!(
                "[MIDI OUT] too many producers: the queue supports {}",
                self.max_producers
            );
        }
    }

    pub(crate) fn release_producer(&self) {
        self.producers.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_rejects() {
        let queue = EventQueue::new(8, 2);
        let accepted = (0..10u8)
            .filter(|i| queue.try_push(MidiMessage::new(&[0x90, *i, 100])).is_ok())
            .count();

        assert_eq!(accepted, 8);
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn test_fifo_per_producer() {
        let queue = EventQueue::new(8, 1);
        for note in 60..64u8 {
            queue.try_push(MidiMessage::new(&[0x90, note, 1])).unwrap();
        }
        let drained: Vec<u8> = std::iter::from_fn(|| queue.pop())
            .map(|m| m.as_bytes()[1])
            .collect();
        assert_eq!(drained, vec![60, 61, 62, 63]);
    }

    #[test]
    fn test_clear_reports_dropped() {
        let queue = EventQueue::new(4, 1);
        queue.try_push(MidiMessage::new(&[0xF8])).unwrap();
        queue.try_push(MidiMessage::new(&[0xFA])).unwrap();
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_message_keeps_length() {
        let message = MidiMessage::new(&[0xC0, 5]);
        assert_eq!(message.as_bytes(), &[0xC0, 5]);
    }

    #[test]
    #[should_panic(expected = "1 to 3 bytes")]
    fn test_empty_message_panics() {
        MidiMessage::new(&[]);
    }

    #[test]
    #[should_panic(expected = "too many producers")]
    fn test_producer_slots_are_capped() {
        let queue = EventQueue::new(8, 2);
        queue.claim_producer();
        queue.claim_producer();
        queue.claim_producer();
    }
}
