//! Loopa Core - realtime-safe application model for the loopa loop machine

pub mod config;
pub mod gc;
pub mod ids;
pub mod model;
pub mod swapper;
pub mod types;

pub use model::{DataLock, Layout, Model, SwapType, Thread};
pub use swapper::{register_thread, ScopedSnapshot, Swapper, SwapperReader};
pub use types::*;
