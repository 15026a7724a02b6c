//! Common types for loopa
//!
//! Identifiers, frame positions, the device/backend enums shared between the
//! persisted configuration and the live model, and the typed MIDI event that
//! travels between the driver callbacks and the rest of the application.

use serde::{Deserialize, Serialize};

/// Unique identifier for channels and shared pool entries (0 = none)
pub type Id = u32;

/// Audio position in frames
pub type Frame = i64;

/// Default sample rate (Hz) used until a device negotiates its own
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default audio buffer size in frames
pub const DEFAULT_BUFFER_SIZE: u32 = 1024;

/// Maximum number of I/O channels handled per device
pub const MAX_IO_CHANS: i32 = 2;

/// Default input recording trigger level (dB)
pub const DEFAULT_REC_TRIGGER_LEVEL: f32 = -10.0;

/// Default tempo for a fresh sequencer
pub const DEFAULT_BPM: f32 = 120.0;

/// Default number of bars for a fresh sequencer
pub const DEFAULT_BARS: u32 = 1;

/// Default number of beats for a fresh sequencer
pub const DEFAULT_BEATS: u32 = 4;

/// Port index meaning "no device selected"
pub const PORT_DISABLED: i32 = -1;

/// Audio backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioApi {
    /// Let the driver layer pick
    #[default]
    Unspecified,
    Alsa,
    Jack,
    Pulse,
    CoreAudio,
    Wasapi,
    Asio,
    Dummy,
}

/// MIDI backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MidiApi {
    /// Platform default backend
    #[default]
    Unspecified,
    Alsa,
    Jack,
    CoreMidi,
    WindowsMm,
    Dummy,
}

impl MidiApi {
    pub fn name(&self) -> &'static str {
        match self {
            MidiApi::Unspecified => "Unspecified",
            MidiApi::Alsa => "ALSA",
            MidiApi::Jack => "JACK",
            MidiApi::CoreMidi => "CoreMIDI",
            MidiApi::WindowsMm => "Microsoft Multimedia MIDI API",
            MidiApi::Dummy => "Dummy",
        }
    }
}

/// MIDI clock synchronization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MidiSyncMode {
    #[default]
    None,
    /// Send MIDI clock to the output port
    Leader,
    /// Follow MIDI clock from the input port
    Follower,
}

/// Sample rate converter quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplerQuality {
    #[default]
    SincBest,
    SincMedium,
    SincFastest,
    ZeroOrderHold,
    Linear,
}

/// How input recording ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRecMode {
    /// Record until stopped by the user
    #[default]
    Free,
    /// Stop at the end of the current loop
    Rigid,
}

/// What starts an input recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecTriggerMode {
    #[default]
    Normal,
    /// Wait for the input signal to cross the trigger level
    Signal,
}

/// Typed MIDI event reconstructed from 1 to 3 raw bytes
///
/// The timestamp is in seconds; inbound events carry the accumulated
/// driver time, outbound ones usually leave it at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEvent {
    bytes: [u8; 3],
    len: u8,
    timestamp: f64,
}

impl MidiEvent {
    /// Longest message this type can hold (no SysEx)
    pub const MAX_BYTES: usize = 3;

    pub fn from_1_byte(b1: u8, timestamp: f64) -> Self {
        Self { bytes: [b1, 0, 0], len: 1, timestamp }
    }

    pub fn from_2_bytes(b1: u8, b2: u8, timestamp: f64) -> Self {
        Self { bytes: [b1, b2, 0], len: 2, timestamp }
    }

    pub fn from_3_bytes(b1: u8, b2: u8, b3: u8, timestamp: f64) -> Self {
        Self { bytes: [b1, b2, b3], len: 3, timestamp }
    }

    /// Build from a raw slice; `None` for empty or over-long messages
    pub fn from_bytes(data: &[u8], timestamp: f64) -> Option<Self> {
        match *data {
            [b1] => Some(Self::from_1_byte(b1, timestamp)),
            [b1, b2] => Some(Self::from_2_bytes(b1, b2, timestamp)),
            [b1, b2, b3] => Some(Self::from_3_bytes(b1, b2, b3, timestamp)),
            _ => None,
        }
    }

    /// Note On on `channel` (0-15)
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::from_3_bytes(0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F, 0.0)
    }

    /// Note Off on `channel` (0-15)
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::from_3_bytes(0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F, 0.0)
    }

    /// Control Change on `channel` (0-15)
    pub fn control_change(channel: u8, cc: u8, value: u8) -> Self {
        Self::from_3_bytes(0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F, 0.0)
    }

    pub fn num_bytes(&self) -> usize {
        self.len as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn byte1(&self) -> u8 {
        self.bytes[0]
    }

    pub fn byte2(&self) -> u8 {
        self.bytes[1]
    }

    pub fn byte3(&self) -> u8 {
        self.bytes[2]
    }

    /// Status byte with the channel nibble stripped (channel messages only)
    pub fn status(&self) -> u8 {
        self.bytes[0] & 0xF0
    }

    /// Channel nibble (meaningless for system messages)
    pub fn channel(&self) -> u8 {
        self.bytes[0] & 0x0F
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Bytes packed big-endian into a u32: `0xB1B2B300`
    ///
    /// This is the form learnt MIDI bindings are stored in.
    pub fn raw(&self) -> u32 {
        u32::from(self.bytes[0]) << 24 | u32::from(self.bytes[1]) << 16 | u32::from(self.bytes[2]) << 8
    }

    /// Same message, different time
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_lengths() {
        assert_eq!(MidiEvent::from_bytes(&[0xF8], 0.0).unwrap().num_bytes(), 1);
        assert_eq!(MidiEvent::from_bytes(&[0xC0, 0x05], 0.0).unwrap().num_bytes(), 2);
        assert_eq!(MidiEvent::from_bytes(&[0x90, 0x3C, 0x7F], 0.0).unwrap().num_bytes(), 3);
        assert!(MidiEvent::from_bytes(&[], 0.0).is_none());
        assert!(MidiEvent::from_bytes(&[0xF0, 0x01, 0x02, 0xF7], 0.0).is_none());
    }

    #[test]
    fn test_raw_packing() {
        let event = MidiEvent::note_on(1, 0x3C, 0x7F);
        assert_eq!(event.raw(), 0x913C7F00);
        assert_eq!(event.channel(), 1);
        assert_eq!(event.status(), 0x90);
    }

    #[test]
    fn test_as_bytes_only_covers_length() {
        let event = MidiEvent::from_2_bytes(0xC3, 0x10, 1.5);
        assert_eq!(event.as_bytes(), &[0xC3, 0x10]);
        assert_eq!(event.timestamp(), 1.5);
    }
}
