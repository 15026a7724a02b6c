//! MIDI device errors
//!
//! Device failures never cross the public kernel API as errors: they are
//! logged and turned into `false`, and the device stays disabled. This type
//! carries the reason up to that point.

use loopa_core::MidiApi;

#[derive(Debug, thiserror::Error)]
pub enum MidiDeviceError {
    #[error("MIDI API '{}' is not available in this build", .0.name())]
    ApiUnavailable(MidiApi),

    #[error("Failed to initialize MIDI client '{client}': {reason}")]
    Init { client: &'static str, reason: String },

    #[error("MIDI port {0} not found")]
    PortNotFound(usize),

    #[error("Failed to connect to MIDI port {port}: {reason}")]
    Connect { port: usize, reason: String },

    #[error("Failed to send MIDI message: {0}")]
    Send(String),
}
