//! Publish/pin double buffer for state read by real-time threads
//!
//! The control thread owns the *working* copy and edits it freely. `swap()`
//! publishes a copy of it; real-time threads call `get_rt()` to pin whatever
//! was published last and read it for as long as the returned
//! [`ScopedSnapshot`] lives.
//!
//! ```text
//!  control thread                          audio / sync threads
//!  ─────────────                           ────────────────────
//!  get_mut() ──► working: T
//!  swap()    ──► Shared<T> ──► SharedCell ◄── get_rt() ─► ScopedSnapshot<T>
//! ```
//!
//! Guarantees:
//! - Readers never see a partially written value: they only ever get a
//!   `Shared<T>` that was fully built before being published.
//! - Everything done to the working copy before `swap()` returns is visible to
//!   every `get_rt()` that starts afterwards.
//! - Pinning never blocks, allocates or frees. Publishing spins only while a
//!   reader is inside the few instructions of `get_rt()` itself, never while
//!   a reader *holds* a snapshot.
//! - A replaced snapshot stays alive until its last pin is dropped; the memory
//!   is then reclaimed on the GC thread (see [`crate::gc`]).
//!
//! Every thread touching a swapper must first declare itself with
//! [`register_thread`]. Only threads registered as real-time may pin; the
//! writer methods check registration in debug builds.

use basedrop::{Handle, Shared, SharedCell};
use std::cell::Cell;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::gc::gc_handle;

thread_local! {
    /// `Some(is_realtime)` once the current thread has registered
    static THREAD_CLASS: Cell<Option<bool>> = const { Cell::new(None) };
}

/// Declare how the current thread participates in published state
///
/// Returns `false` (and logs an error) if the thread already registered;
/// the first registration stays in effect.
pub fn register_thread(name: &str, realtime: bool) -> bool {
    THREAD_CLASS.with(|class| {
        if let Some(previous) = class.get() {
            log::error!(
                "[SWAPPER] Thread '{}' registered twice (already realtime={})",
                name,
                previous
            );
            return false;
        }
        class.set(Some(realtime));
        log::debug!("[SWAPPER] Registered thread '{}' (realtime={})", name, realtime);
        true
    })
}

/// Whether the current thread registered as real-time
pub fn is_realtime_thread() -> bool {
    THREAD_CLASS.with(|class| class.get() == Some(true))
}

/// Whether the current thread registered at all
pub fn is_registered_thread() -> bool {
    THREAD_CLASS.with(|class| class.get().is_some())
}

fn debug_assert_registered_thread() {
    debug_assert!(
        is_registered_thread(),
        "[SWAPPER] writer used from unregistered thread {:?}",
        std::thread::current().name()
    );
}

fn assert_realtime_thread() {
    match THREAD_CLASS.with(|class| class.get()) {
        Some(true) => {}
        Some(false) => panic!(
            "[SWAPPER] get_rt() called from non-realtime thread {:?}",
            std::thread::current().name()
        ),
        None => panic!(
            "[SWAPPER] get_rt() called from unregistered thread {:?}",
            std::thread::current().name()
        ),
    }
}

/// State shared between the writer and all readers
struct Published<T: Send + 'static> {
    current: SharedCell<T>,
    /// Set while a compound edit is in progress on the writer side
    rt_locked: AtomicBool,
    /// Number of publishes so far
    generation: AtomicU64,
}

/// Writer half: owns the working copy
///
/// Lives on the control thread. `&mut self` on every mutating method makes
/// the single-writer rule a compile-time property.
pub struct Swapper<T: Clone + Send + Sync + 'static> {
    working: T,
    published: Arc<Published<T>>,
    handle: Handle,
}

impl<T: Clone + Send + Sync + 'static> Swapper<T> {
    /// Create a swapper whose first published value equals `value`
    pub fn new(value: T) -> Self {
        Self::with_handle(gc_handle(), value)
    }

    /// Same as [`Swapper::new`] with an explicit collector handle
    pub fn with_handle(handle: Handle, value: T) -> Self {
        let first = Shared::new(&handle, value.clone());
        Self {
            working: value,
            published: Arc::new(Published {
                current: SharedCell::new(first),
                rt_locked: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
            handle,
        }
    }

    /// Working copy (control thread)
    pub fn get(&self) -> &T {
        debug_assert_registered_thread();
        &self.working
    }

    /// Mutable working copy (control thread); invisible to readers until `swap()`
    pub fn get_mut(&mut self) -> &mut T {
        debug_assert_registered_thread();
        &mut self.working
    }

    /// Publish the working copy
    ///
    /// The previous snapshot is released here; if a reader still pins it,
    /// its memory outlives this call and is reclaimed by the GC thread.
    pub fn swap(&mut self) {
        debug_assert_registered_thread();
        let snapshot = Shared::new(&self.handle, self.working.clone());
        self.published.current.set(snapshot);
        self.published.generation.fetch_add(1, Ordering::Release);
    }

    /// Pin the last published value (see [`SwapperReader::get_rt`])
    pub fn get_rt(&self) -> ScopedSnapshot<T> {
        assert_realtime_thread();
        ScopedSnapshot {
            inner: self.published.current.get(),
        }
    }

    /// Cloneable read-only handle for real-time threads
    pub fn reader(&self) -> SwapperReader<T> {
        SwapperReader {
            published: Arc::clone(&self.published),
        }
    }

    pub fn is_rt_locked(&self) -> bool {
        self.published.rt_locked.load(Ordering::Acquire)
    }

    pub(crate) fn set_rt_locked(&self, locked: bool) {
        self.published.rt_locked.store(locked, Ordering::Release);
    }

    /// Number of publishes since construction
    pub fn generation(&self) -> u64 {
        self.published.generation.load(Ordering::Acquire)
    }
}

/// Reader half: pins published snapshots from real-time threads
pub struct SwapperReader<T: Send + 'static> {
    published: Arc<Published<T>>,
}

impl<T: Send + Sync + 'static> SwapperReader<T> {
    /// Pin the last published value
    ///
    /// Wait-free and allocation-free. The pin lasts until the returned handle
    /// is dropped; never keep it across anything of unbounded duration.
    ///
    /// # Panics
    ///
    /// If the calling thread did not register as real-time.
    pub fn get_rt(&self) -> ScopedSnapshot<T> {
        assert_realtime_thread();
        ScopedSnapshot {
            inner: self.published.current.get(),
        }
    }

    /// True while the writer is inside a compound edit
    pub fn is_rt_locked(&self) -> bool {
        self.published.rt_locked.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.published.generation.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> Clone for SwapperReader<T> {
    fn clone(&self) -> Self {
        Self {
            published: Arc::clone(&self.published),
        }
    }
}

/// A pinned, immutable view of one published value
pub struct ScopedSnapshot<T: Send + 'static> {
    inner: Shared<T>,
}

impl<T: Send + 'static> Deref for ScopedSnapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[derive(Clone, Default)]
    struct Pair {
        a: u64,
        b: u64,
    }

    #[test]
    fn test_register_twice_is_reported() {
        assert!(register_thread("test", true));
        assert!(!register_thread("test", true));
        assert!(is_realtime_thread());
    }

    #[test]
    #[should_panic(expected = "unregistered")]
    fn test_get_rt_requires_registration() {
        let swapper = Swapper::new(Pair::default());
        let _ = swapper.get_rt();
    }

    #[test]
    #[should_panic(expected = "non-realtime")]
    fn test_get_rt_rejects_non_realtime_thread() {
        register_thread("control", false);
        let swapper = Swapper::new(Pair::default());
        let _ = swapper.get_rt();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "writer used from unregistered thread")]
    fn test_writer_requires_registration() {
        let mut swapper = Swapper::new(Pair::default());
        swapper.swap();
    }

    #[test]
    fn test_edits_invisible_until_swap() {
        register_thread("test", true);
        let mut swapper = Swapper::new(Pair::default());

        swapper.get_mut().a = 7;
        assert_eq!(swapper.get_rt().a, 0);

        swapper.swap();
        assert_eq!(swapper.get_rt().a, 7);
        assert_eq!(swapper.generation(), 1);
    }

    #[test]
    fn test_pinned_snapshot_survives_later_publish() {
        register_thread("test", true);
        let mut swapper = Swapper::new(Pair::default());
        swapper.get_mut().a = 1;
        swapper.swap();

        let pinned = swapper.get_rt();
        swapper.get_mut().a = 2;
        swapper.swap();

        assert_eq!(pinned.a, 1);
        assert_eq!(swapper.get_rt().a, 2);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_pairs() {
        register_thread("writer", false);
        let mut swapper = Swapper::new(Pair::default());
        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..2)
            .map(|i| {
                let reader = swapper.reader();
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    register_thread(&format!("reader-{}", i), true);
                    let mut last = 0;
                    while !stop.load(Ordering::Relaxed) {
                        let snapshot = reader.get_rt();
                        assert_eq!(snapshot.a, snapshot.b, "torn snapshot");
                        assert!(snapshot.a >= last, "published values went backwards");
                        last = snapshot.a;
                    }
                })
            })
            .collect();

        for i in 1..=2000 {
            let pair = swapper.get_mut();
            pair.a = i;
            pair.b = i;
            swapper.swap();
        }

        stop.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
