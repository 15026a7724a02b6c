//! Application model: versioned layout, shared pools and singletons
//!
//! The control thread is the only writer. It edits the working [`Layout`]
//! and the shared pools, then publishes with [`Model::swap`]. Realtime
//! threads never see the working copy: they pin the last published layout
//! with [`Model::get_rt`] (or through a [`SwapperReader`] sent to them).
//!
//! Compound edits go through a [`DataLock`]. Acquiring it publishes once so
//! every new pin sees a consistent layout, suppresses further publishes while
//! it is held, and publishes + notifies exactly once when dropped.
//!
//! ```ignore
//! let mut model = Model::new();
//! model.init();
//! {
//!     let mut lock = model.lock_data(SwapType::Hard);
//!     lock.add_shared(ChannelShared::new(id));
//!     let shared = lock.back_shared::<ChannelShared>().cloned();
//!     // ...
//! } // published here, observer called with SwapType::Hard
//! ```

mod layout;
mod pool;
mod shared;

pub use layout::{
    AudioDevice, Channel, ChannelType, KernelAudio, KernelMidi, Layout, Mixer, MidiIn, Sequencer,
    SequencerStatus,
};
pub use pool::{
    Action, ActionMap, ChannelShared, Plugin, Pool, PoolKind, SharedKind, Wave,
};
pub use shared::{MixerShared, SequencerShared, SharedData};

use basedrop::{Handle, Shared};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::config::Conf;
use crate::gc::gc_handle;
use crate::ids::IdManager;
use crate::swapper::{self, ScopedSnapshot, Swapper, SwapperReader};
use crate::types::Id;

/// Why a publish happened, passed through to the swap observer untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapType {
    /// Nothing downstream needs to react
    None,
    /// Structural change, rebuild anything derived from the layout
    Hard,
    /// Value change, refresh only
    Soft,
}

/// Threads that take part in published state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thread {
    Main,
    Midi,
    Audio,
    Event,
}

impl Thread {
    pub fn name(&self) -> &'static str {
        match self {
            Thread::Main => "main",
            Thread::Midi => "midi",
            Thread::Audio => "audio",
            Thread::Event => "event",
        }
    }
}

/// Swap observer, called on the control thread after each publish
pub type OnSwap = Box<dyn FnMut(SwapType) + Send>;

pub struct Model {
    swapper: Swapper<Layout>,
    shared: SharedData,
    ids: IdManager,
    handle: Handle,
    on_swap: Option<OnSwap>,
}

impl Model {
    pub fn new() -> Self {
        Self::with_handle(gc_handle())
    }

    /// Model whose shared allocations go to a specific collector
    pub fn with_handle(handle: Handle) -> Self {
        let shared = SharedData::default();
        let mut layout = Layout::default();
        link_singletons(&mut layout, &shared);

        Self {
            swapper: Swapper::with_handle(handle.clone(), layout),
            shared,
            ids: IdManager::new(),
            handle,
            on_swap: None,
        }
    }

    /// Install the observer notified on every publish
    pub fn set_on_swap(&mut self, on_swap: impl FnMut(SwapType) + Send + 'static) {
        self.on_swap = Some(Box::new(on_swap));
    }

    /// Everything back to defaults, then publish
    pub fn init(&mut self) {
        self.shared.reset();
        self.ids.reset();

        let layout = self.swapper.get_mut();
        *layout = Layout::default();
        link_singletons(layout, &self.shared);

        log::info!("[MODEL] Initialized");
        self.swap(SwapType::None);
    }

    /// Fresh session: sequencer, mixer and channels only, devices untouched
    pub fn reset(&mut self) {
        self.shared.reset();

        let layout = self.swapper.get_mut();
        layout.sequencer = Sequencer::default();
        layout.mixer = Mixer::default();
        layout.channels.clear();
        link_singletons(layout, &self.shared);

        log::info!("[MODEL] Session reset");
        self.swap(SwapType::None);
    }

    /// Copy persisted settings into the working layout, then publish
    pub fn load(&mut self, conf: &Conf) {
        let layout = self.swapper.get_mut();

        let audio = &mut layout.kernel_audio;
        audio.api = conf.sound_system;
        audio.device_out = AudioDevice {
            index: conf.sound_device_out,
            channels_count: conf.channels_out_count,
            channels_start: conf.channels_out_start,
        };
        audio.device_in = AudioDevice {
            index: conf.sound_device_in,
            channels_count: conf.channels_in_count,
            channels_start: conf.channels_in_start,
        };
        audio.samplerate = conf.samplerate;
        audio.buffersize = conf.buffersize;
        audio.limit_output = conf.limit_output;
        audio.rsmp_quality = conf.rsmp_quality;
        audio.rec_trigger_level = conf.rec_trigger_level;

        let midi = &mut layout.kernel_midi;
        midi.api = conf.midi_system;
        midi.port_out = conf.midi_port_out;
        midi.port_in = conf.midi_port_in;
        midi.midi_map_path = conf.midi_map_path.clone();
        midi.sync = conf.midi_sync;

        layout.mixer.input_rec_mode = conf.input_rec_mode;
        layout.mixer.rec_trigger_mode = conf.rec_trigger_mode;

        layout.midi_in = MidiIn {
            enabled: conf.midi_in_enabled,
            filter: conf.midi_in_filter,
            rewind: conf.midi_in_rewind,
            start_stop: conf.midi_in_start_stop,
            action_rec: conf.midi_in_action_rec,
            input_rec: conf.midi_in_input_rec,
            metronome: conf.midi_in_metronome,
            volume_in: conf.midi_in_volume_in,
            volume_out: conf.midi_in_volume_out,
            beat_double: conf.midi_in_beat_double,
            beat_half: conf.midi_in_beat_half,
        };

        layout.chans_stop_on_seq_halt = conf.chans_stop_on_seq_halt;
        layout.treat_recs_as_loops = conf.treat_recs_as_loops;
        layout.input_monitor_default_on = conf.input_monitor_default_on;
        layout.overdub_protection_default_on = conf.overdub_protection_default_on;

        self.swap(SwapType::None);
    }

    /// Copy the working layout back into persisted settings
    pub fn store(&self, conf: &mut Conf) {
        let layout = self.swapper.get();

        let audio = &layout.kernel_audio;
        conf.sound_system = audio.api;
        conf.sound_device_out = audio.device_out.index;
        conf.channels_out_count = audio.device_out.channels_count;
        conf.channels_out_start = audio.device_out.channels_start;
        conf.sound_device_in = audio.device_in.index;
        conf.channels_in_count = audio.device_in.channels_count;
        conf.channels_in_start = audio.device_in.channels_start;
        conf.samplerate = audio.samplerate;
        conf.buffersize = audio.buffersize;
        conf.limit_output = audio.limit_output;
        conf.rsmp_quality = audio.rsmp_quality;
        conf.rec_trigger_level = audio.rec_trigger_level;

        let midi = &layout.kernel_midi;
        conf.midi_system = midi.api;
        conf.midi_port_out = midi.port_out;
        conf.midi_port_in = midi.port_in;
        conf.midi_map_path = midi.midi_map_path.clone();
        conf.midi_sync = midi.sync;

        conf.input_rec_mode = layout.mixer.input_rec_mode;
        conf.rec_trigger_mode = layout.mixer.rec_trigger_mode;

        let midi_in = &layout.midi_in;
        conf.midi_in_enabled = midi_in.enabled;
        conf.midi_in_filter = midi_in.filter;
        conf.midi_in_rewind = midi_in.rewind;
        conf.midi_in_start_stop = midi_in.start_stop;
        conf.midi_in_action_rec = midi_in.action_rec;
        conf.midi_in_input_rec = midi_in.input_rec;
        conf.midi_in_metronome = midi_in.metronome;
        conf.midi_in_volume_in = midi_in.volume_in;
        conf.midi_in_volume_out = midi_in.volume_out;
        conf.midi_in_beat_double = midi_in.beat_double;
        conf.midi_in_beat_half = midi_in.beat_half;

        conf.chans_stop_on_seq_halt = layout.chans_stop_on_seq_halt;
        conf.treat_recs_as_loops = layout.treat_recs_as_loops;
        conf.input_monitor_default_on = layout.input_monitor_default_on;
        conf.overdub_protection_default_on = layout.overdub_protection_default_on;
    }

    /// Register the calling thread, see [`swapper::register_thread`]
    pub fn register_thread(&self, thread: Thread, realtime: bool) -> bool {
        swapper::register_thread(thread.name(), realtime)
    }

    /// Working layout (control thread)
    pub fn get(&self) -> &Layout {
        self.swapper.get()
    }

    /// Mutable working layout (control thread); published on the next swap
    pub fn get_mut(&mut self) -> &mut Layout {
        self.swapper.get_mut()
    }

    /// Pin the published layout (realtime threads)
    pub fn get_rt(&self) -> ScopedSnapshot<Layout> {
        self.swapper.get_rt()
    }

    /// Read handle to hand over to realtime threads
    pub fn reader(&self) -> SwapperReader<Layout> {
        self.swapper.reader()
    }

    /// Replace the whole working layout and publish it
    ///
    /// Singleton handles are relinked, whatever `layout` carried.
    pub fn set(&mut self, layout: Layout) {
        let working = self.swapper.get_mut();
        *working = layout;
        link_singletons(working, &self.shared);
        self.swap(SwapType::None);
    }

    /// Publish the working layout and notify the observer with `tag`
    ///
    /// Inside a [`DataLock`] this does nothing: the lock publishes once, on
    /// release, with its own tag.
    pub fn swap(&mut self, tag: SwapType) {
        if self.is_locked() {
            log::trace!("[MODEL] swap({:?}) deferred until the data lock is released", tag);
            return;
        }
        self.swapper.swap();
        self.notify(tag);
    }

    fn notify(&mut self, tag: SwapType) {
        if let Some(on_swap) = self.on_swap.as_mut() {
            on_swap(tag);
        }
    }

    /// Start a compound edit, see [`DataLock`]
    pub fn lock_data(&mut self, tag: SwapType) -> DataLock<'_> {
        DataLock::new(self, tag)
    }

    pub fn is_locked(&self) -> bool {
        self.swapper.is_rt_locked()
    }

    /// Non-versioned singletons and pools
    pub fn shared(&self) -> &SharedData {
        &self.shared
    }

    pub fn ids(&mut self) -> &mut IdManager {
        &mut self.ids
    }

    /// Collector handle used for every shared allocation of this model
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn get_all_shared<T: SharedKind>(&self) -> &T::Collection {
        T::collection(&self.shared)
    }

    pub fn get_all_shared_mut<T: SharedKind>(&mut self) -> &mut T::Collection {
        T::collection_mut(&mut self.shared)
    }

    pub fn find_shared<T: PoolKind>(&self, id: Id) -> Option<&Shared<T>> {
        T::collection(&self.shared).find(id)
    }

    /// Move `value` into its pool; its address is fixed from here on
    pub fn add_shared<T: PoolKind>(&mut self, value: T) {
        self.ids.set(value.id());
        let entry = Shared::new(&self.handle, value);
        T::collection_mut(&mut self.shared).push(entry);
    }

    /// Remove an entry by identity
    ///
    /// # Panics
    ///
    /// Outside of a [`DataLock`]: the entry could vanish under a reader that
    /// pinned a layout published after the last consistent point.
    pub fn remove_shared<T: PoolKind>(&mut self, item: &T) {
        assert!(
            self.is_locked(),
            "[MODEL] remove_shared::<{}> called outside of a DataLock",
            T::NAME
        );
        if !T::collection_mut(&mut self.shared).remove_ref(item) {
            log::warn!("[MODEL] remove_shared::<{}>: entry not in pool", T::NAME);
        }
    }

    /// Most recently added entry
    pub fn back_shared<T: PoolKind>(&self) -> Option<&Shared<T>> {
        T::collection(&self.shared).back()
    }

    pub fn clear_shared<T: SharedKind>(&mut self) {
        *T::collection_mut(&mut self.shared) = Default::default();
    }

    /// Dump pools and published state to the debug log
    pub fn log_status(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }

        log::debug!(
            "[MODEL] generation={} locked={} channels={}",
            self.swapper.generation(),
            self.is_locked(),
            self.get().channels.len()
        );

        log::debug!("[MODEL] {}:", ChannelShared::NAME);
        for (i, c) in self.shared.channels.iter().enumerate() {
            log::debug!("[MODEL]   {}) {:p} - ID={}", i, &**c, c.id);
        }

        log::debug!("[MODEL] {}:", Wave::NAME);
        for (i, w) in self.shared.waves.iter().enumerate() {
            log::debug!("[MODEL]   {}) {:p} - ID={} path={:?}", i, &**w, w.id, w.path);
        }

        log::debug!("[MODEL] {}:", Action::NAME);
        for (frame, actions) in &self.shared.actions {
            for a in actions {
                log::debug!(
                    "[MODEL]   frame={} ID={} channel={} value={:#010X} prev={} next={}",
                    frame,
                    a.id,
                    a.channel_id,
                    a.event.raw(),
                    a.prev_id,
                    a.next_id
                );
            }
        }

        log::debug!("[MODEL] {}:", Plugin::NAME);
        for (i, p) in self.shared.plugins.iter().enumerate() {
            log::debug!("[MODEL]   {}) {:p} - ID={} uid={}", i, &**p, p.id, p.uid);
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

fn link_singletons(layout: &mut Layout, shared: &SharedData) {
    layout.sequencer.shared = Arc::clone(&shared.sequencer);
    layout.mixer.shared = Arc::clone(&shared.mixer);
}

/// Scoped compound edit on a [`Model`]
///
/// Derefs to the model, so the whole model API is available while the lock
/// is held. Only one lock may exist at a time; acquiring a second one through
/// the first panics.
pub struct DataLock<'a> {
    model: &'a mut Model,
    tag: SwapType,
}

impl<'a> DataLock<'a> {
    fn new(model: &'a mut Model, tag: SwapType) -> Self {
        assert!(
            !model.is_locked(),
            "[MODEL] nested DataLock: a compound edit is already in progress"
        );

        // Publish before any edit so pins taken from now on see a
        // consistent layout. No notification for this one.
        model.swapper.set_rt_locked(true);
        model.swapper.swap();
        log::trace!("[MODEL] Data locked ({:?})", tag);

        Self { model, tag }
    }

    pub fn tag(&self) -> SwapType {
        self.tag
    }
}

impl Deref for DataLock<'_> {
    type Target = Model;

    fn deref(&self) -> &Model {
        &*self.model
    }
}

impl DerefMut for DataLock<'_> {
    fn deref_mut(&mut self) -> &mut Model {
        &mut *self.model
    }
}

impl Drop for DataLock<'_> {
    fn drop(&mut self) {
        self.model.swapper.set_rt_locked(false);
        self.model.swap(self.tag);
        log::trace!("[MODEL] Data unlocked ({:?})", self.tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AudioApi, InputRecMode, MidiApi, MidiSyncMode, RecTriggerMode, ResamplerQuality,
    };
    use std::sync::Mutex;

    fn recording_model() -> (Model, Arc<Mutex<Vec<SwapType>>>) {
        swapper::register_thread("test", false);
        let tags = Arc::new(Mutex::new(Vec::new()));
        let mut model = Model::new();
        model.init();

        let sink = Arc::clone(&tags);
        model.set_on_swap(move |tag| sink.lock().unwrap().push(tag));
        (model, tags)
    }

    #[test]
    fn test_init_links_singletons() {
        swapper::register_thread("test", true);
        let mut model = Model::new();
        model.init();

        assert!(Arc::ptr_eq(&model.get().sequencer.shared, model.shared().sequencer()));
        assert!(Arc::ptr_eq(&model.get_rt().mixer.shared, model.shared().mixer()));
    }

    #[test]
    fn test_swap_passes_tag_through() {
        let (mut model, tags) = recording_model();
        model.swap(SwapType::Soft);
        model.swap(SwapType::Hard);
        assert_eq!(*tags.lock().unwrap(), vec![SwapType::Soft, SwapType::Hard]);
    }

    #[test]
    fn test_lock_notifies_once_with_its_tag_after_add_is_visible() {
        swapper::register_thread("test", true);
        let (mut model, tags) = recording_model();

        let reader = model.reader();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_sink = Arc::clone(&seen);
        let tag_sink = Arc::clone(&tags);
        model.set_on_swap(move |tag| {
            tag_sink.lock().unwrap().push(tag);
            seen_sink.lock().unwrap().push(reader.get_rt().channels.len());
        });

        {
            let mut lock = model.lock_data(SwapType::Hard);
            let id = lock.ids().generate(0);
            lock.add_shared(ChannelShared::new(id));
            let shared = lock.back_shared::<ChannelShared>().cloned().unwrap();
            lock.get_mut().channels.push(Channel::new(id, ChannelType::Sample, shared));
            lock.swap(SwapType::Soft);
        }

        assert_eq!(*tags.lock().unwrap(), vec![SwapType::Hard]);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert!(model.find_shared::<ChannelShared>(1).is_some());
        assert!(!model.is_locked());
    }

    #[test]
    fn test_edits_under_lock_invisible_until_release() {
        swapper::register_thread("test", true);
        let mut model = Model::new();
        model.init();

        {
            let mut lock = model.lock_data(SwapType::Soft);
            assert!(lock.is_locked());

            lock.get_mut().sequencer.bpm = 90.0;
            lock.get_mut().sequencer.bars = 8;

            let pinned = lock.get_rt();
            assert_eq!(pinned.sequencer.bpm, 120.0);
            assert_eq!(pinned.sequencer.bars, 1);
        }

        let pinned = model.get_rt();
        assert_eq!(pinned.sequencer.bpm, 90.0);
        assert_eq!(pinned.sequencer.bars, 8);
    }

    #[test]
    fn test_lock_publishes_pending_edits_on_acquire() {
        swapper::register_thread("test", true);
        let (mut model, tags) = recording_model();

        model.get_mut().sequencer.beats = 3;
        let lock = model.lock_data(SwapType::Hard);
        assert_eq!(lock.get_rt().sequencer.beats, 3);
        assert!(tags.lock().unwrap().is_empty());
    }

    #[test]
    #[should_panic(expected = "nested DataLock")]
    fn test_nested_lock_panics() {
        swapper::register_thread("test", false);
        let mut model = Model::new();
        let mut outer = model.lock_data(SwapType::Hard);
        let _inner = outer.lock_data(SwapType::Soft);
    }

    #[test]
    #[should_panic(expected = "outside of a DataLock")]
    fn test_remove_outside_lock_panics() {
        swapper::register_thread("test", false);
        let mut model = Model::new();
        model.add_shared(Plugin::new(1, "uid", "Reverb"));
        let plugin = model.back_shared::<Plugin>().cloned().unwrap();
        model.remove_shared(&*plugin);
    }

    #[test]
    fn test_pinned_layout_keeps_removed_wave_alive() {
        swapper::register_thread("test", true);
        let mut model = Model::new();
        model.init();

        model.add_shared(ChannelShared::new(1));
        model.add_shared(Wave::new(2, "loop.wav", 44100, 1, vec![0.5; 64]));
        let shared = model.back_shared::<ChannelShared>().cloned().unwrap();
        let wave = model.find_shared::<Wave>(2).cloned();
        let mut channel = Channel::new(1, ChannelType::Sample, shared);
        channel.wave = wave;
        model.get_mut().channels.push(channel);
        model.swap(SwapType::Hard);

        let pinned = model.get_rt();
        let address: *const Wave = &**pinned.channels[0].wave.as_ref().unwrap();

        {
            let mut lock = model.lock_data(SwapType::Hard);
            let wave = lock.find_shared::<Wave>(2).cloned().unwrap();
            lock.remove_shared(&*wave);
            lock.get_mut().channel_mut(1).unwrap().wave = None;
        }

        let old = pinned.channels[0].wave.as_ref().unwrap();
        assert!(std::ptr::eq(&**old, address));
        assert_eq!(old.frames(), 64);
        assert_eq!(old.data[63], 0.5);

        assert!(model.get_rt().channels[0].wave.is_none());
        assert!(model.find_shared::<Wave>(2).is_none());
    }

    #[test]
    fn test_conf_roundtrip() {
        swapper::register_thread("test", false);
        let conf = Conf {
            sound_system: AudioApi::Jack,
            sound_device_out: 3,
            sound_device_in: 1,
            channels_out_count: 4,
            channels_out_start: 2,
            channels_in_count: 2,
            channels_in_start: 6,
            samplerate: 96000,
            buffersize: 128,
            limit_output: true,
            rsmp_quality: ResamplerQuality::Linear,
            rec_trigger_mode: RecTriggerMode::Signal,
            rec_trigger_level: -24.0,
            input_rec_mode: InputRecMode::Rigid,
            midi_system: MidiApi::Jack,
            midi_port_out: 1,
            midi_port_in: 0,
            midi_map_path: "nano.json".to_string(),
            midi_sync: MidiSyncMode::Leader,
            chans_stop_on_seq_halt: true,
            treat_recs_as_loops: true,
            input_monitor_default_on: true,
            overdub_protection_default_on: true,
            midi_in_enabled: true,
            midi_in_filter: 5,
            midi_in_rewind: 0x90_3C_7F_00,
            midi_in_start_stop: 0x90_3D_7F_00,
            midi_in_action_rec: 0x90_3E_7F_00,
            midi_in_input_rec: 0x90_3F_7F_00,
            midi_in_metronome: 0x90_40_7F_00,
            midi_in_volume_in: 0xB0_01_00_00,
            midi_in_volume_out: 0xB0_02_00_00,
            midi_in_beat_double: 0xB0_03_00_00,
            midi_in_beat_half: 0xB0_07_00_00,
            ..Conf::default()
        };

        let mut model = Model::new();
        model.init();
        model.load(&conf);

        let mut stored = Conf::default();
        model.store(&mut stored);
        assert_eq!(stored, conf);
    }

    #[test]
    fn test_reset_keeps_device_config() {
        swapper::register_thread("test", false);
        let mut model = Model::new();
        model.init();
        model.get_mut().kernel_midi.port_out = 3;
        model.get_mut().sequencer.bpm = 90.0;
        model.add_shared(Plugin::new(4, "uid", "Delay"));
        model.shared().sequencer().set_current_frame(1000);

        model.reset();

        assert_eq!(model.get().kernel_midi.port_out, 3);
        assert_eq!(model.get().sequencer.bpm, 120.0);
        assert!(model.get_all_shared::<Plugin>().is_empty());
        assert_eq!(model.get().sequencer.shared.current_frame(), 0);
    }

    #[test]
    fn test_set_relinks_singletons() {
        swapper::register_thread("test", false);
        let mut model = Model::new();
        model.init();
        model.set(Layout::default());
        assert!(Arc::ptr_eq(&model.get().sequencer.shared, model.shared().sequencer()));
    }

    #[test]
    fn test_log_status_walks_every_pool() {
        let _ = env_logger::builder().is_test(true).try_init();
        swapper::register_thread("test", false);
        let mut model = Model::new();
        model.init();
        model.add_shared(Plugin::new(1, "uid", "Chorus"));
        model.add_shared(Wave::new(2, "pad.wav", 48000, 2, vec![0.0; 16]));
        model.add_shared(ChannelShared::new(3));
        model.log_status();
        assert_eq!(model.ids().last(), 3);
    }

    #[test]
    fn test_action_map_access() {
        let mut model = Model::new();
        let action = Action {
            id: 1,
            frame: 512,
            channel_id: 2,
            event: crate::types::MidiEvent::note_on(0, 60, 100),
            prev_id: 0,
            next_id: 0,
        };
        model.get_all_shared_mut::<Action>().entry(512).or_default().push(action);
        assert_eq!(model.get_all_shared::<Action>()[&512].len(), 1);

        model.clear_shared::<Action>();
        assert!(model.get_all_shared::<Action>().is_empty());
    }
}
