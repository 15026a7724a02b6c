//! Non-versioned state shared by every layout snapshot
//!
//! The sequencer and mixer counters change on every audio block, so copying
//! them into each published layout would be pointless: every snapshot holds
//! an `Arc` to the same atomics instead. Resetting them happens in place, so
//! handles already held by the audio thread stay valid.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use super::pool::{ActionMap, ChannelShared, Plugin, Pool, Wave};
use crate::types::Frame;

/// Running sequencer position, written by the audio thread
#[derive(Debug, Default)]
pub struct SequencerShared {
    current_frame: AtomicI64,
    current_beat: AtomicU32,
    /// Last frame that fell on a quantizer step
    quantizer_step: AtomicI64,
}

impl SequencerShared {
    pub fn current_frame(&self) -> Frame {
        self.current_frame.load(Ordering::Relaxed)
    }

    pub fn set_current_frame(&self, frame: Frame) {
        self.current_frame.store(frame, Ordering::Relaxed);
    }

    pub fn current_beat(&self) -> u32 {
        self.current_beat.load(Ordering::Relaxed)
    }

    pub fn set_current_beat(&self, beat: u32) {
        self.current_beat.store(beat, Ordering::Relaxed);
    }

    pub fn quantizer_step(&self) -> Frame {
        self.quantizer_step.load(Ordering::Relaxed)
    }

    pub fn set_quantizer_step(&self, frame: Frame) {
        self.quantizer_step.store(frame, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.current_frame.store(0, Ordering::Relaxed);
        self.current_beat.store(0, Ordering::Relaxed);
        self.quantizer_step.store(0, Ordering::Relaxed);
    }
}

/// Live mixer readings, written by the audio thread
#[derive(Debug)]
pub struct MixerShared {
    /// Output peaks as `f32::to_bits`, left/right
    peak_out: [AtomicU32; 2],
    peak_in: [AtomicU32; 2],
    /// True while the audio callback is inside a block
    pub processing: AtomicBool,
    /// Frames recorded so far by the current input recording
    pub input_tracker: AtomicI64,
}

impl MixerShared {
    pub fn peak_out(&self) -> [f32; 2] {
        [load_f32(&self.peak_out[0]), load_f32(&self.peak_out[1])]
    }

    pub fn set_peak_out(&self, peak: [f32; 2]) {
        store_f32(&self.peak_out[0], peak[0]);
        store_f32(&self.peak_out[1], peak[1]);
    }

    pub fn peak_in(&self) -> [f32; 2] {
        [load_f32(&self.peak_in[0]), load_f32(&self.peak_in[1])]
    }

    pub fn set_peak_in(&self, peak: [f32; 2]) {
        store_f32(&self.peak_in[0], peak[0]);
        store_f32(&self.peak_in[1], peak[1]);
    }

    pub fn reset(&self) {
        self.set_peak_out([0.0, 0.0]);
        self.set_peak_in([0.0, 0.0]);
        self.processing.store(false, Ordering::Relaxed);
        self.input_tracker.store(0, Ordering::Relaxed);
    }
}

impl Default for MixerShared {
    fn default() -> Self {
        let zero = 0.0f32.to_bits();
        Self {
            peak_out: [AtomicU32::new(zero), AtomicU32::new(zero)],
            peak_in: [AtomicU32::new(zero), AtomicU32::new(zero)],
            processing: AtomicBool::new(false),
            input_tracker: AtomicI64::new(0),
        }
    }
}

fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

/// Everything the model owns outside the double buffer
#[derive(Default)]
pub struct SharedData {
    pub(crate) sequencer: Arc<SequencerShared>,
    pub(crate) mixer: Arc<MixerShared>,
    pub(crate) plugins: Pool<Plugin>,
    pub(crate) waves: Pool<Wave>,
    pub(crate) channels: Pool<ChannelShared>,
    pub(crate) actions: ActionMap,
}

impl SharedData {
    /// Back to a fresh session: counters zeroed in place, pools emptied
    pub(crate) fn reset(&mut self) {
        self.sequencer.reset();
        self.mixer.reset();
        self.plugins.clear();
        self.waves.clear();
        self.channels.clear();
        self.actions.clear();
    }

    pub fn sequencer(&self) -> &Arc<SequencerShared> {
        &self.sequencer
    }

    pub fn mixer(&self) -> &Arc<MixerShared> {
        &self.mixer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_handles() {
        let shared = SharedData::default();
        let held = Arc::clone(&shared.sequencer);
        held.set_current_frame(4410);

        let mut shared = shared;
        shared.reset();

        assert!(Arc::ptr_eq(&held, &shared.sequencer));
        assert_eq!(held.current_frame(), 0);
    }

    #[test]
    fn test_mixer_peaks() {
        let mixer = MixerShared::default();
        mixer.set_peak_out([0.25, 0.75]);
        assert_eq!(mixer.peak_out(), [0.25, 0.75]);
        mixer.reset();
        assert_eq!(mixer.peak_out(), [0.0, 0.0]);
    }
}
