//! Settings surface over the model and the MIDI kernel
//!
//! What a preferences window needs: read the current device settings, list
//! what is available, apply a new selection. Every setter edits the working
//! layout and publishes through the model.

use loopa_core::model::Model;
use loopa_core::{
    AudioApi, MidiApi, MidiSyncMode, ResamplerQuality, SwapType, PORT_DISABLED,
};

use crate::kernel::KernelMidi;

/// Snapshot of the MIDI settings plus the choices available
#[derive(Debug, Clone, PartialEq)]
pub struct MidiData {
    pub apis: Vec<MidiApi>,
    pub sync_modes: Vec<MidiSyncMode>,
    pub out_ports: Vec<String>,
    pub in_ports: Vec<String>,

    pub api: MidiApi,
    pub sync_mode: MidiSyncMode,
    pub out_port: i32,
    pub in_port: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BehaviorsData {
    pub chans_stop_on_seq_halt: bool,
    pub treat_recs_as_loops: bool,
    pub input_monitor_default_on: bool,
    pub overdub_protection_default_on: bool,
}

pub struct ConfigApi<'a> {
    model: &'a mut Model,
    kernel_midi: &'a mut KernelMidi,
}

impl<'a> ConfigApi<'a> {
    pub fn new(model: &'a mut Model, kernel_midi: &'a mut KernelMidi) -> Self {
        Self { model, kernel_midi }
    }

    // Audio (settings only, streams are opened elsewhere)

    pub fn audio_get_api(&self) -> AudioApi {
        self.model.get().kernel_audio.api
    }

    pub fn audio_set_api(&mut self, api: AudioApi) {
        self.model.get_mut().kernel_audio.api = api;
        self.model.swap(SwapType::None);
    }

    pub fn audio_is_limit_output(&self) -> bool {
        self.model.get().kernel_audio.limit_output
    }

    pub fn audio_get_rec_trigger_level(&self) -> f32 {
        self.model.get().kernel_audio.rec_trigger_level
    }

    pub fn audio_get_resampler_quality(&self) -> ResamplerQuality {
        self.model.get().kernel_audio.rsmp_quality
    }

    pub fn audio_get_sample_rate(&self) -> u32 {
        self.model.get().kernel_audio.samplerate
    }

    pub fn audio_get_buffer_size(&self) -> u32 {
        self.model.get().kernel_audio.buffersize
    }

    pub fn audio_store_data(
        &mut self,
        limit_output: bool,
        rsmp_quality: ResamplerQuality,
        rec_trigger_level: f32,
    ) {
        let audio = &mut self.model.get_mut().kernel_audio;
        audio.limit_output = limit_output;
        audio.rsmp_quality = rsmp_quality;
        audio.rec_trigger_level = rec_trigger_level;
        self.model.swap(SwapType::None);
    }

    // MIDI

    pub fn midi_has_api(&self, api: MidiApi) -> bool {
        KernelMidi::has_api(api)
    }

    pub fn midi_get_api(&self) -> MidiApi {
        self.model.get().kernel_midi.api
    }

    pub fn midi_get_sync_mode(&self) -> MidiSyncMode {
        self.model.get().kernel_midi.sync
    }

    pub fn midi_get_current_out_port(&self) -> i32 {
        self.model.get().kernel_midi.port_out
    }

    pub fn midi_get_current_in_port(&self) -> i32 {
        self.model.get().kernel_midi.port_in
    }

    pub fn midi_get_out_ports(&self) -> Vec<String> {
        self.kernel_midi.list_output_ports()
    }

    pub fn midi_get_in_ports(&self) -> Vec<String> {
        self.kernel_midi.list_input_ports()
    }

    /// Switch backend; both devices are closed and their ports reset
    pub fn midi_set_api(&mut self, api: MidiApi) -> bool {
        if !KernelMidi::has_api(api) {
            log::warn!("[CONFIG] MIDI API '{}' not available", api.name());
            return false;
        }

        self.kernel_midi.close_output_device();
        self.kernel_midi.close_input_device();

        let midi = &mut self.model.get_mut().kernel_midi;
        midi.api = api;
        midi.port_out = PORT_DISABLED;
        midi.port_in = PORT_DISABLED;
        self.model.swap(SwapType::None);
        true
    }

    /// Open the given ports (-1 closes that side) and remember the choice
    ///
    /// `true` when every requested port is either disabled or opened.
    pub fn midi_open_ports(&mut self, out: i32, input: i32) -> bool {
        let api = self.midi_get_api();

        let out_ok = self.kernel_midi.open_output_device(api, out) || out == PORT_DISABLED;
        let in_ok = self.kernel_midi.open_input_device(api, input) || input == PORT_DISABLED;

        let midi = &mut self.model.get_mut().kernel_midi;
        midi.port_out = out;
        midi.port_in = input;
        self.model.swap(SwapType::None);

        out_ok && in_ok
    }

    pub fn midi_store_data(&mut self, sync_mode: MidiSyncMode) {
        self.model.get_mut().kernel_midi.sync = sync_mode;
        self.model.swap(SwapType::None);
    }

    pub fn midi_get_data(&self) -> MidiData {
        let settings = &self.model.get().kernel_midi;
        MidiData {
            apis: KernelMidi::compiled_apis(),
            sync_modes: vec![MidiSyncMode::None, MidiSyncMode::Leader, MidiSyncMode::Follower],
            out_ports: self.midi_get_out_ports(),
            in_ports: self.midi_get_in_ports(),
            api: settings.api,
            sync_mode: settings.sync,
            out_port: settings.port_out,
            in_port: settings.port_in,
        }
    }

    /// Apply a whole [`MidiData`] selection: sync mode, then ports
    pub fn midi_save(&mut self, data: &MidiData) -> bool {
        self.midi_store_data(data.sync_mode);
        self.midi_open_ports(data.out_port, data.in_port)
    }

    // Behaviours

    pub fn behaviors_get_data(&self) -> BehaviorsData {
        let layout = self.model.get();
        BehaviorsData {
            chans_stop_on_seq_halt: layout.chans_stop_on_seq_halt,
            treat_recs_as_loops: layout.treat_recs_as_loops,
            input_monitor_default_on: layout.input_monitor_default_on,
            overdub_protection_default_on: layout.overdub_protection_default_on,
        }
    }

    pub fn behaviors_store_data(&mut self, data: BehaviorsData) {
        let layout = self.model.get_mut();
        layout.chans_stop_on_seq_halt = data.chans_stop_on_seq_halt;
        layout.treat_recs_as_loops = data.treat_recs_as_loops;
        layout.input_monitor_default_on = data.input_monitor_default_on;
        layout.overdub_protection_default_on = data.overdub_protection_default_on;
        self.model.swap(SwapType::None);
    }
}
