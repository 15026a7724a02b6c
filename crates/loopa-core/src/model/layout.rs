//! The versioned application state
//!
//! A [`Layout`] is copied on every publish, so it only holds plain values and
//! cheap handles: `Arc`s to the shared sequencer/mixer counters and
//! `Shared<T>` clones of pool entries.

use basedrop::Shared;
use std::sync::Arc;

use super::pool::{ChannelShared, Plugin, Wave};
use super::shared::{MixerShared, SequencerShared};
use crate::types::{
    AudioApi, Id, InputRecMode, MidiApi, MidiSyncMode, RecTriggerMode, ResamplerQuality,
    DEFAULT_BARS, DEFAULT_BEATS, DEFAULT_BPM, DEFAULT_BUFFER_SIZE, DEFAULT_REC_TRIGGER_LEVEL,
    DEFAULT_SAMPLE_RATE, MAX_IO_CHANS, PORT_DISABLED,
};

/// One side (in or out) of the audio device selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioDevice {
    /// Device index, -1 when disabled
    pub index: i32,
    pub channels_count: i32,
    pub channels_start: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelAudio {
    pub api: AudioApi,
    pub device_out: AudioDevice,
    pub device_in: AudioDevice,
    pub samplerate: u32,
    pub buffersize: u32,
    pub limit_output: bool,
    pub rsmp_quality: ResamplerQuality,
    pub rec_trigger_level: f32,
}

impl Default for KernelAudio {
    fn default() -> Self {
        Self {
            api: AudioApi::default(),
            device_out: AudioDevice {
                index: 0,
                channels_count: MAX_IO_CHANS,
                channels_start: 0,
            },
            device_in: AudioDevice {
                index: PORT_DISABLED,
                channels_count: 1,
                channels_start: 0,
            },
            samplerate: DEFAULT_SAMPLE_RATE,
            buffersize: DEFAULT_BUFFER_SIZE,
            limit_output: false,
            rsmp_quality: ResamplerQuality::default(),
            rec_trigger_level: DEFAULT_REC_TRIGGER_LEVEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelMidi {
    pub api: MidiApi,
    pub port_out: i32,
    pub port_in: i32,
    pub midi_map_path: String,
    pub sync: MidiSyncMode,
}

impl Default for KernelMidi {
    fn default() -> Self {
        Self {
            api: MidiApi::default(),
            port_out: PORT_DISABLED,
            port_in: PORT_DISABLED,
            midi_map_path: String::new(),
            sync: MidiSyncMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerStatus {
    #[default]
    Stopped,
    Waiting,
    Running,
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    /// Counters shared by every snapshot
    pub shared: Arc<SequencerShared>,
    pub status: SequencerStatus,
    pub bpm: f32,
    pub bars: u32,
    pub beats: u32,
    pub quantize: u32,
    pub metronome: bool,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self {
            shared: Arc::default(),
            status: SequencerStatus::default(),
            bpm: DEFAULT_BPM,
            bars: DEFAULT_BARS,
            beats: DEFAULT_BEATS,
            quantize: 0,
            metronome: false,
        }
    }
}

impl Sequencer {
    pub fn is_running(&self) -> bool {
        self.status == SequencerStatus::Running
    }
}

#[derive(Debug, Clone)]
pub struct Mixer {
    /// Readings shared by every snapshot
    pub shared: Arc<MixerShared>,
    pub input_rec_mode: InputRecMode,
    pub rec_trigger_mode: RecTriggerMode,
    pub volume_in: f32,
    pub volume_out: f32,
}

impl Default for Mixer {
    fn default() -> Self {
        Self {
            shared: Arc::default(),
            input_rec_mode: InputRecMode::default(),
            rec_trigger_mode: RecTriggerMode::default(),
            volume_in: 1.0,
            volume_out: 1.0,
        }
    }
}

/// Global MIDI input bindings, stored as [`crate::MidiEvent::raw`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiIn {
    pub enabled: bool,
    /// Listen on this channel only, -1 for all
    pub filter: i32,
    pub rewind: u32,
    pub start_stop: u32,
    pub action_rec: u32,
    pub input_rec: u32,
    pub metronome: u32,
    pub volume_in: u32,
    pub volume_out: u32,
    pub beat_double: u32,
    pub beat_half: u32,
}

impl Default for MidiIn {
    fn default() -> Self {
        Self {
            enabled: false,
            filter: -1,
            rewind: 0,
            start_stop: 0,
            action_rec: 0,
            input_rec: 0,
            metronome: 0,
            volume_in: 0,
            volume_out: 0,
            beat_double: 0,
            beat_half: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Sample,
    Midi,
    Master,
    Preview,
}

/// A channel in the graph
///
/// `shared` is the realtime block in the [`ChannelShared`] pool; `wave` and
/// `plugins` point into their pools too.
#[derive(Clone)]
pub struct Channel {
    pub id: Id,
    pub kind: ChannelType,
    pub column_id: Id,
    pub volume: f32,
    pub pan: f32,
    pub mute: bool,
    pub solo: bool,
    pub armed: bool,
    pub shared: Shared<ChannelShared>,
    pub wave: Option<Shared<Wave>>,
    pub plugins: Vec<Shared<Plugin>>,
}

impl Channel {
    pub fn new(id: Id, kind: ChannelType, shared: Shared<ChannelShared>) -> Self {
        Self {
            id,
            kind,
            column_id: 0,
            volume: 1.0,
            pan: 0.5,
            mute: false,
            solo: false,
            armed: false,
            shared,
            wave: None,
            plugins: Vec::new(),
        }
    }

    pub fn has_wave(&self) -> bool {
        self.wave.is_some()
    }
}

/// Complete versioned state
#[derive(Clone, Default)]
pub struct Layout {
    pub kernel_audio: KernelAudio,
    pub kernel_midi: KernelMidi,
    pub sequencer: Sequencer,
    pub mixer: Mixer,
    pub midi_in: MidiIn,
    pub channels: Vec<Channel>,

    pub chans_stop_on_seq_halt: bool,
    pub treat_recs_as_loops: bool,
    pub input_monitor_default_on: bool,
    pub overdub_protection_default_on: bool,
}

impl Layout {
    pub fn channel(&self, id: Id) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn channel_mut(&mut self, id: Id) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    /// Drop a channel from the graph; its pool entries are untouched
    pub fn remove_channel(&mut self, id: Id) -> Option<Channel> {
        let index = self.channels.iter().position(|c| c.id == id)?;
        Some(self.channels.remove(index))
    }

    pub fn is_any_solo(&self) -> bool {
        self.channels.iter().any(|c| c.solo)
    }
}
