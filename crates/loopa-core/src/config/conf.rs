//! Persisted application settings
//!
//! [`Conf`] is a flat mirror of the device, MIDI input and behaviour sections
//! of the layout. It never takes part in the realtime machinery: it is read
//! once at startup, transcribed into the model with `Model::load`, and
//! filled back with `Model::store` before being written out on quit.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::io::{read_config, save_config};
use super::paths::default_config_path;
use crate::types::{
    AudioApi, InputRecMode, MidiApi, MidiSyncMode, RecTriggerMode, ResamplerQuality,
    DEFAULT_BUFFER_SIZE, DEFAULT_REC_TRIGGER_LEVEL, DEFAULT_SAMPLE_RATE, MAX_IO_CHANS,
    PORT_DISABLED,
};

/// File name of the settings file inside the config directory
pub const CONF_FILENAME: &str = "loopa.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    /// True when the values came from a file that parsed correctly
    #[serde(skip)]
    pub valid: bool,

    // Audio
    pub sound_system: AudioApi,
    pub sound_device_out: i32,
    pub sound_device_in: i32,
    pub channels_out_count: i32,
    pub channels_out_start: i32,
    pub channels_in_count: i32,
    pub channels_in_start: i32,
    pub samplerate: u32,
    pub buffersize: u32,
    pub limit_output: bool,
    pub rsmp_quality: ResamplerQuality,
    pub rec_trigger_mode: RecTriggerMode,
    pub rec_trigger_level: f32,
    pub input_rec_mode: InputRecMode,

    // MIDI
    pub midi_system: MidiApi,
    pub midi_port_out: i32,
    pub midi_port_in: i32,
    pub midi_map_path: String,
    pub midi_sync: MidiSyncMode,
    pub midi_tc_fps: f32,

    // Behaviours
    pub chans_stop_on_seq_halt: bool,
    pub treat_recs_as_loops: bool,
    pub input_monitor_default_on: bool,
    pub overdub_protection_default_on: bool,

    // Browsing
    pub plugin_path: String,
    pub patch_path: String,
    pub sample_path: String,

    // Global MIDI input bindings
    pub midi_in_enabled: bool,
    pub midi_in_filter: i32,
    pub midi_in_rewind: u32,
    pub midi_in_start_stop: u32,
    pub midi_in_action_rec: u32,
    pub midi_in_input_rec: u32,
    pub midi_in_metronome: u32,
    pub midi_in_volume_in: u32,
    pub midi_in_volume_out: u32,
    pub midi_in_beat_double: u32,
    pub midi_in_beat_half: u32,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            valid: false,
            sound_system: AudioApi::default(),
            sound_device_out: 0,
            sound_device_in: PORT_DISABLED,
            channels_out_count: MAX_IO_CHANS,
            channels_out_start: 0,
            channels_in_count: 1,
            channels_in_start: 0,
            samplerate: DEFAULT_SAMPLE_RATE,
            buffersize: DEFAULT_BUFFER_SIZE,
            limit_output: false,
            rsmp_quality: ResamplerQuality::default(),
            rec_trigger_mode: RecTriggerMode::default(),
            rec_trigger_level: DEFAULT_REC_TRIGGER_LEVEL,
            input_rec_mode: InputRecMode::default(),
            midi_system: MidiApi::default(),
            midi_port_out: PORT_DISABLED,
            midi_port_in: PORT_DISABLED,
            midi_map_path: String::new(),
            midi_sync: MidiSyncMode::default(),
            midi_tc_fps: 25.0,
            chans_stop_on_seq_halt: false,
            treat_recs_as_loops: false,
            input_monitor_default_on: false,
            overdub_protection_default_on: false,
            plugin_path: String::new(),
            patch_path: String::new(),
            sample_path: String::new(),
            midi_in_enabled: false,
            midi_in_filter: -1,
            midi_in_rewind: 0,
            midi_in_start_stop: 0,
            midi_in_action_rec: 0,
            midi_in_input_rec: 0,
            midi_in_metronome: 0,
            midi_in_volume_in: 0,
            midi_in_volume_out: 0,
            midi_in_beat_double: 0,
            midi_in_beat_half: 0,
        }
    }
}

/// `~/.config/loopa/loopa.yaml`
pub fn default_conf_path() -> PathBuf {
    default_config_path(CONF_FILENAME)
}

/// Read settings from `path`
///
/// Never fails: a missing file gives defaults, a broken one gives defaults
/// plus a warning. [`Conf::valid`] tells the two cases from a good read.
pub fn load_conf(path: &Path) -> Conf {
    match read_config::<Conf>(path) {
        Ok(Some(mut conf)) => {
            log::info!("[CONFIG] Settings loaded from {:?}", path);
            conf.valid = true;
            conf
        }
        Ok(None) => {
            log::info!("[CONFIG] No settings at {:?}, using defaults", path);
            Conf::default()
        }
        Err(e) => {
            log::warn!("[CONFIG] {:#}, using defaults", e);
            Conf::default()
        }
    }
}

pub fn save_conf(conf: &Conf, path: &Path) -> Result<()> {
    save_config(conf, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let conf = Conf::default();
        assert_eq!(conf.samplerate, 44100);
        assert_eq!(conf.buffersize, 1024);
        assert_eq!(conf.midi_port_out, -1);
        assert_eq!(conf.midi_port_in, -1);
        assert_eq!(conf.rec_trigger_level, -10.0);
        assert!(!conf.valid);
    }

    #[test]
    fn test_file_roundtrip_marks_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONF_FILENAME);

        let conf = Conf {
            samplerate: 48000,
            midi_system: MidiApi::Alsa,
            midi_port_out: 2,
            midi_sync: MidiSyncMode::Leader,
            midi_in_start_stop: 0xB0_40_7F_00,
            sample_path: "/home/someone/samples".to_string(),
            ..Conf::default()
        };
        save_conf(&conf, &path).unwrap();

        let loaded = load_conf(&path);
        assert!(loaded.valid);
        assert_eq!(loaded, Conf { valid: true, ..conf });
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONF_FILENAME);
        std::fs::write(&path, "buffersize: 256\nmidi_sync: follower\n").unwrap();

        let loaded = load_conf(&path);
        assert!(loaded.valid);
        assert_eq!(loaded.buffersize, 256);
        assert_eq!(loaded.midi_sync, MidiSyncMode::Follower);
        assert_eq!(loaded.samplerate, 44100);
    }

    #[test]
    fn test_broken_file_is_not_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONF_FILENAME);
        std::fs::write(&path, "samplerate: {").unwrap();

        let loaded = load_conf(&path);
        assert!(!loaded.valid);
        assert_eq!(loaded, Conf::default());
    }
}
