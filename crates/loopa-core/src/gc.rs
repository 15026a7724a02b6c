//! Deferred deallocation for state shared with real-time threads
//!
//! Published layout snapshots and shared pool entries are wrapped in
//! `basedrop::Shared<T>`. Whichever thread drops the last reference (often
//! the audio thread, when it releases a pinned snapshot that the control
//! thread has already replaced) only pushes the node onto the collector's
//! queue. The memory is freed later on the `loopa-gc` thread, so neither the
//! audio callback nor the MIDI driver callback ever calls into the allocator.
//!
//! ```ignore
//! use basedrop::Shared;
//! use loopa_core::gc::gc_handle;
//!
//! let wave = Shared::new(&gc_handle(), wave);
//! let for_layout = wave.clone(); // refcount bump, no allocation
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the collector thread reclaims dropped nodes
const COLLECT_PERIOD: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("loopa-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, it has to live on the thread that collects
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }

            log::info!("[GC] Collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_PERIOD);
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        // Without a collector nothing shared with the audio thread can be
        // allocated safely; there is no sensible degraded mode.
        None => panic!("[GC] Failed to start the collector thread"),
    }
}

/// Handle for allocating `Shared<T>` values reclaimed on the GC thread
///
/// Starts the collector on first use. Cloning the handle is cheap.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
