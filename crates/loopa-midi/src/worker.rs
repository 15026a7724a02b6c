//! Periodic background thread
//!
//! Runs a job every `period` until stopped. Used for the MIDI output pump:
//! the job drains the outbound queue and performs the (possibly blocking)
//! device writes, away from the realtime threads.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Worker thread handle
///
/// Owns the join handle and the shutdown flag. Dropping the worker stops the
/// thread and waits for it.
pub struct Worker {
    name: String,
    period: Duration,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Spawn the thread and call `job` once per period
    ///
    /// A worker that is already running is stopped first.
    pub fn start<F>(&mut self, mut job: F) -> io::Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let period = self.period;
        let name = self.name.clone();

        let handle = thread::Builder::new().name(self.name.clone()).spawn(move || {
            log::debug!("[WORKER {}] started, period {:?}", name, period);
            while flag.load(Ordering::Acquire) {
                job();
                thread::sleep(period);
            }
            log::debug!("[WORKER {}] stopped", name);
        })?;

        self.running = running;
        self.handle = Some(handle);
        Ok(())
    }

    /// Signal the thread and join it; no-op when not running
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[WORKER {}] job panicked", self.name);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::Acquire)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn test_runs_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let mut worker = Worker::new("test-worker", Duration::from_millis(1));
        worker
            .start(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert!(worker.is_running());

        let deadline = Instant::now() + Duration::from_secs(2);
        while ticks.load(Ordering::Relaxed) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        worker.stop();
        assert!(!worker.is_running());

        let after_stop = ticks.load(Ordering::Relaxed);
        assert!(after_stop >= 3);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(ticks.load(Ordering::Relaxed), after_stop);
    }

    #[test]
    fn test_restart_replaces_job() {
        let mut worker = Worker::new("test-worker", Duration::from_millis(1));
        worker.start(|| {}).unwrap();
        worker.start(|| {}).unwrap();
        assert!(worker.is_running());
    }
}
