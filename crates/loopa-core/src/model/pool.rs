//! Shared pools: long-lived objects referenced from the layout
//!
//! Samples, plugin instances and per-channel realtime blocks are heavy and
//! must not be copied on every publish. Each lives once in its pool as a
//! `Shared<T>`; layout snapshots hold clones of that handle. An entry removed
//! from its pool therefore stays valid for every reader still pinning a
//! snapshot that references it, and is freed on the GC thread once the last
//! snapshot goes away.
//!
//! Pools are addressed by element type through the sealed [`SharedKind`]
//! trait, so asking for a pool that does not exist is a compile error rather
//! than a runtime check.

use basedrop::Shared;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use super::shared::SharedData;
use crate::types::{Frame, Id, MidiEvent};

/// Ordered collection of address-stable shared entries
pub struct Pool<T: Send + Sync + 'static> {
    items: Vec<Shared<T>>,
}

impl<T: Send + Sync + 'static> Pool<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shared<T>> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Shared<T>] {
        &self.items
    }

    pub fn back(&self) -> Option<&Shared<T>> {
        self.items.last()
    }

    pub(crate) fn push(&mut self, item: Shared<T>) {
        self.items.push(item);
    }

    /// Remove the entry whose payload lives at the same address as `item`
    pub(crate) fn remove_ref(&mut self, item: &T) -> bool {
        let before = self.items.len();
        self.items.retain(|entry| !std::ptr::eq(&**entry, item));
        self.items.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: PoolKind> Pool<T> {
    pub fn find(&self, id: Id) -> Option<&Shared<T>> {
        self.items.iter().find(|entry| entry.id() == id)
    }
}

impl<T: Send + Sync + 'static> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Plugin {}
    impl Sealed for super::Wave {}
    impl Sealed for super::ChannelShared {}
    impl Sealed for super::Action {}
}

/// Typed key selecting one of the model's shared collections
pub trait SharedKind: sealed::Sealed + Sized + 'static {
    /// Collection type holding this kind
    type Collection: Default;

    /// Human-readable kind name for logs
    const NAME: &'static str;

    fn collection(shared: &SharedData) -> &Self::Collection;

    fn collection_mut(shared: &mut SharedData) -> &mut Self::Collection;
}

/// Shared kinds stored as a [`Pool`] of individually owned entries
pub trait PoolKind: SharedKind<Collection = Pool<Self>> + Send + Sync {
    fn id(&self) -> Id;
}

/// A plugin instance hosted on a channel or on the master bus
pub struct Plugin {
    pub id: Id,
    /// Identifier of the plugin binary (e.g. a CLAP id or file path)
    pub uid: String,
    pub name: String,
    bypass: AtomicBool,
}

impl Plugin {
    pub fn new(id: Id, uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            uid: uid.into(),
            name: name.into(),
            bypass: AtomicBool::new(false),
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass.load(Ordering::Relaxed)
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.bypass.store(bypass, Ordering::Relaxed);
    }
}

/// A loaded sample, interleaved
pub struct Wave {
    pub id: Id,
    pub path: PathBuf,
    pub rate: u32,
    pub channels: usize,
    pub data: Box<[f32]>,
    /// Recorded in-app rather than loaded from disk
    pub logical: bool,
}

impl Wave {
    pub fn new(id: Id, path: impl Into<PathBuf>, rate: u32, channels: usize, data: Vec<f32>) -> Self {
        Self {
            id,
            path: path.into(),
            rate,
            channels,
            data: data.into_boxed_slice(),
            logical: false,
        }
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.data.len() / self.channels
        }
    }
}

/// Per-channel state written continuously by the audio thread
pub struct ChannelShared {
    pub id: Id,
    /// Playhead position in frames
    pub tracker: AtomicI64,
    /// Frame offset applied at the next quantized start
    pub offset: AtomicI64,
    pub playing: AtomicBool,
    pub armed: AtomicBool,
    /// Last output peak, as `f32::to_bits`
    peak: AtomicU32,
}

impl ChannelShared {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            tracker: AtomicI64::new(0),
            offset: AtomicI64::new(0),
            playing: AtomicBool::new(false),
            armed: AtomicBool::new(false),
            peak: AtomicU32::new(0.0f32.to_bits()),
        }
    }

    pub fn peak(&self) -> f32 {
        f32::from_bits(self.peak.load(Ordering::Relaxed))
    }

    pub fn set_peak(&self, value: f32) {
        self.peak.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// A recorded MIDI action, scheduled at a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: Id,
    pub frame: Frame,
    pub channel_id: Id,
    pub event: MidiEvent,
    /// Paired action (e.g. the Note Off of a Note On), 0 if none
    pub prev_id: Id,
    pub next_id: Id,
}

/// Actions indexed by the frame they fire on
pub type ActionMap = BTreeMap<Frame, Vec<Action>>;

impl SharedKind for Plugin {
    type Collection = Pool<Plugin>;
    const NAME: &'static str = "plugins";

    fn collection(shared: &SharedData) -> &Pool<Plugin> {
        &shared.plugins
    }

    fn collection_mut(shared: &mut SharedData) -> &mut Pool<Plugin> {
        &mut shared.plugins
    }
}

impl PoolKind for Plugin {
    fn id(&self) -> Id {
        self.id
    }
}

impl SharedKind for Wave {
    type Collection = Pool<Wave>;
    const NAME: &'static str = "waves";

    fn collection(shared: &SharedData) -> &Pool<Wave> {
        &shared.waves
    }

    fn collection_mut(shared: &mut SharedData) -> &mut Pool<Wave> {
        &mut shared.waves
    }
}

impl PoolKind for Wave {
    fn id(&self) -> Id {
        self.id
    }
}

impl SharedKind for ChannelShared {
    type Collection = Pool<ChannelShared>;
    const NAME: &'static str = "channels_shared";

    fn collection(shared: &SharedData) -> &Pool<ChannelShared> {
        &shared.channels
    }

    fn collection_mut(shared: &mut SharedData) -> &mut Pool<ChannelShared> {
        &mut shared.channels
    }
}

impl PoolKind for ChannelShared {
    fn id(&self) -> Id {
        self.id
    }
}

impl SharedKind for Action {
    type Collection = ActionMap;
    const NAME: &'static str = "actions";

    fn collection(shared: &SharedData) -> &ActionMap {
        &shared.actions
    }

    fn collection_mut(shared: &mut SharedData) -> &mut ActionMap {
        &mut shared.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::gc_handle;

    #[test]
    fn test_remove_by_identity_not_by_value() {
        let handle = gc_handle();
        let mut pool = Pool::new();
        pool.push(Shared::new(&handle, Plugin::new(1, "a", "A")));
        pool.push(Shared::new(&handle, Plugin::new(1, "a", "A")));

        let second = pool.as_slice()[1].clone();
        assert!(pool.remove_ref(&second));
        assert_eq!(pool.len(), 1);
        assert!(!std::ptr::eq(&*pool.as_slice()[0], &*second));
        assert!(!pool.remove_ref(&second));
    }

    #[test]
    fn test_find_by_id() {
        let handle = gc_handle();
        let mut pool = Pool::new();
        pool.push(Shared::new(&handle, Wave::new(3, "kick.wav", 44100, 2, vec![0.0; 8])));
        pool.push(Shared::new(&handle, Wave::new(4, "snare.wav", 44100, 1, vec![0.0; 8])));

        assert_eq!(pool.find(4).map(|w| w.frames()), Some(8));
        assert_eq!(pool.find(3).map(|w| w.frames()), Some(4));
        assert!(pool.find(5).is_none());
        assert_eq!(pool.back().map(|w| w.id), Some(4));
    }

    #[test]
    fn test_channel_peak_roundtrip() {
        let shared = ChannelShared::new(1);
        shared.set_peak(0.5);
        assert_eq!(shared.peak(), 0.5);
    }
}
