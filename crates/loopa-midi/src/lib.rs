//! MIDI I/O for the loopa loop machine
//!
//! This crate provides:
//! - Device open/close and port enumeration via midir
//! - A bounded, lock-free outbound queue fed by realtime threads
//! - A polling worker that performs the blocking device writes
//! - The inbound driver callback, with optional bridge into a flume channel
//! - The settings surface gluing the model and the MIDI kernel together
//!
//! # Architecture
//!
//! ```text
//! audio / sync thread → MidiSender::send → EventQueue → output worker → device
//! device → midir callback → InboundCallback → on_midi_received
//! ```
//!
//! Nothing on the realtime side blocks or allocates: a full queue or a
//! closed output simply makes `send` return `false`.

mod config_api;
mod connection;
mod error;
mod inbound;
mod kernel;
mod output;
mod queue;
mod worker;

pub use config_api::{BehaviorsData, ConfigApi, MidiData};
pub use connection::{INPUT_NAME, OUTPUT_NAME};
pub use error::MidiDeviceError;
pub use inbound::{inbound_channel, InboundCallback, InboundHandler};
pub use kernel::{KernelMidi, MidiObservers, MAX_PRODUCERS, OUTPUT_PERIOD, QUEUE_CAPACITY};
pub use output::{MidiSender, OutputPort};
pub use queue::{EventQueue, MidiMessage};
pub use worker::Worker;
