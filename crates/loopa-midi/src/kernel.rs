//! MIDI kernel: device lifetime and the outbound worker
//!
//! One output and one input device at most. The output side is split in two
//! halves: realtime threads push through a [`MidiSender`] into the bounded
//! queue, and a [`Worker`] drains it every [`OUTPUT_PERIOD`] into the device.
//! The input side runs an [`InboundCallback`] on the driver thread.

use midir::MidiInputConnection;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::connection::{self, INPUT_NAME, OUTPUT_NAME};
use crate::inbound::{InboundCallback, InboundHandler};
use crate::output::{MidiSender, OutputPort, SendPath};
use crate::worker::Worker;
use loopa_core::model::KernelMidi as KernelMidiSettings;
use loopa_core::{MidiApi, MidiEvent, PORT_DISABLED};

/// Outbound queue capacity
pub const QUEUE_CAPACITY: usize = 8;

/// Producers allowed on the outbound queue: audio thread and MIDI sync thread
pub const MAX_PRODUCERS: usize = 2;

/// Output worker polling period
pub const OUTPUT_PERIOD: Duration = Duration::from_millis(3);

/// Callbacks into the rest of the application
///
/// `on_midi_received` runs on the driver's input thread, `on_midi_sent` on
/// whichever realtime thread called [`MidiSender::send`].
#[derive(Clone)]
pub struct MidiObservers {
    pub on_midi_received: InboundHandler,
    pub on_midi_sent: Arc<dyn Fn() + Send + Sync>,
}

impl Default for MidiObservers {
    fn default() -> Self {
        Self {
            on_midi_received: Arc::new(|_: MidiEvent| {}),
            on_midi_sent: Arc::new(|| {}),
        }
    }
}

type SharedPort = Arc<Mutex<Box<dyn OutputPort>>>;

pub struct KernelMidi {
    observers: MidiObservers,
    path: Arc<SendPath>,
    output: Option<SharedPort>,
    input: Option<MidiInputConnection<InboundCallback>>,
    worker: Worker,
    started: bool,
}

impl KernelMidi {
    pub fn new(observers: MidiObservers) -> Self {
        let path = SendPath::new(
            QUEUE_CAPACITY,
            MAX_PRODUCERS,
            Arc::clone(&observers.on_midi_sent),
        );
        Self {
            observers,
            path: Arc::new(path),
            output: None,
            input: None,
            worker: Worker::new("loopa-midi-out", OUTPUT_PERIOD),
            started: false,
        }
    }

    /// Open the devices selected in `settings`
    ///
    /// A port that fails to open is logged and left disabled; the kernel
    /// itself is always usable afterwards. Returns `false` if a selected
    /// port failed to open, a disabled port (-1) counts as success.
    pub fn init(&mut self, settings: &KernelMidiSettings) -> bool {
        let out_ok = self.open_output_device(settings.api, settings.port_out)
            || settings.port_out == PORT_DISABLED;
        let in_ok = self.open_input_device(settings.api, settings.port_in)
            || settings.port_in == PORT_DISABLED;
        out_ok && in_ok
    }

    /// Start pumping the outbound queue; opening an output later starts it too
    pub fn start(&mut self) {
        self.started = true;
        if self.output.is_some() {
            self.start_worker();
        }
    }

    /// Stop the output worker; devices stay open
    pub fn stop(&mut self) {
        self.started = false;
        self.worker.stop();
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    fn start_worker(&mut self) {
        let Some(port) = self.output.clone() else {
            return;
        };
        let path = Arc::clone(&self.path);

        let spawned = self.worker.start(move || {
            // Only this worker and the control thread (on close) touch the port
            let mut port = match port.lock() {
                Ok(port) => port,
                Err(poisoned) => poisoned.into_inner(),
            };
            path.drain_into(&mut **port);
        });

        if let Err(e) = spawned {
            log::error!("[MIDI OUT] Failed to spawn output worker: {}", e);
        }
    }

    /// Open output port `port`; -1 closes the output and returns `false`
    pub fn open_output_device(&mut self, api: MidiApi, port: i32) -> bool {
        self.close_output_device();

        let Ok(index) = usize::try_from(port) else {
            log::info!("[MIDI OUT] Output disabled");
            return false;
        };

        match connection::connect_output(api, index) {
            Ok(conn) => {
                self.attach_output(conn);
                true
            }
            Err(e) => {
                log::error!("[MIDI OUT] {}", e);
                false
            }
        }
    }

    /// Use `port` as the output device, replacing any open one
    pub fn attach_output(&mut self, port: impl OutputPort + 'static) {
        self.close_output_device();

        // A producer that raced the last close may still have pushed
        let stale = self.path.queue.clear();
        if stale > 0 {
            log::debug!("[MIDI OUT] Discarded {} stale message(s)", stale);
        }

        let port: Box<dyn OutputPort> = Box::new(port);
        self.output = Some(Arc::new(Mutex::new(port)));
        self.path.output_open.store(true, Ordering::Release);

        if self.started {
            self.start_worker();
        }
    }

    /// Stop the worker and release the output; queued messages are discarded
    pub fn close_output_device(&mut self) {
        if self.output.is_none() {
            return;
        }

        self.path.output_open.store(false, Ordering::Release);
        self.worker.stop();

        let dropped = self.path.queue.clear();
        if dropped > 0 {
            log::debug!("[MIDI OUT] Discarded {} queued message(s)", dropped);
        }

        self.output = None;
        log::info!("[MIDI OUT] Output closed");
    }

    /// Open input port `port`; -1 closes the input and returns `false`
    pub fn open_input_device(&mut self, api: MidiApi, port: i32) -> bool {
        self.close_input_device();

        let Ok(index) = usize::try_from(port) else {
            log::info!("[MIDI IN] Input disabled");
            return false;
        };

        let callback = InboundCallback::new(Arc::clone(&self.observers.on_midi_received));
        match connection::connect_input(api, index, callback) {
            Ok(conn) => {
                self.input = Some(conn);
                true
            }
            Err(e) => {
                log::error!("[MIDI IN] {}", e);
                false
            }
        }
    }

    pub fn close_input_device(&mut self) {
        if let Some(conn) = self.input.take() {
            conn.close();
            log::info!("[MIDI IN] Input closed");
        }
    }

    pub fn is_output_open(&self) -> bool {
        self.output.is_some()
    }

    pub fn is_input_open(&self) -> bool {
        self.input.is_some()
    }

    /// Sender for a realtime thread
    ///
    /// # Panics
    ///
    /// When [`MAX_PRODUCERS`] senders are already alive.
    pub fn sender(&self) -> MidiSender {
        MidiSender::new(Arc::clone(&self.path))
    }

    /// Messages waiting for the worker
    pub fn queued(&self) -> usize {
        self.path.queue.len()
    }

    pub fn count_output_ports(&self) -> usize {
        connection::output_port_count().unwrap_or_else(|e| {
            log::warn!("[MIDI OUT] {}", e);
            0
        })
    }

    pub fn count_input_ports(&self) -> usize {
        connection::input_port_count().unwrap_or_else(|e| {
            log::warn!("[MIDI IN] {}", e);
            0
        })
    }

    pub fn list_output_ports(&self) -> Vec<String> {
        connection::output_port_names().unwrap_or_else(|e| {
            log::warn!("[MIDI OUT] {}", e);
            Vec::new()
        })
    }

    pub fn list_input_ports(&self) -> Vec<String> {
        connection::input_port_names().unwrap_or_else(|e| {
            log::warn!("[MIDI IN] {}", e);
            Vec::new()
        })
    }

    pub fn has_api(api: MidiApi) -> bool {
        connection::has_api(api)
    }

    pub fn compiled_apis() -> Vec<MidiApi> {
        connection::compiled_apis()
    }

    pub fn log_ports(&self) {
        let outputs = self.list_output_ports();
        log::info!("[MIDI] Device '{}': {} MIDI ports found", OUTPUT_NAME, outputs.len());
        for (i, name) in outputs.iter().enumerate() {
            log::info!("[MIDI]   {}) {}", i, name);
        }

        let inputs = self.list_input_ports();
        log::info!("[MIDI] Device '{}': {} MIDI ports found", INPUT_NAME, inputs.len());
        for (i, name) in inputs.iter().enumerate() {
            log::info!("[MIDI]   {}) {}", i, name);
        }
    }

    pub fn log_compiled_apis() {
        let apis = Self::compiled_apis();
        log::info!("[MIDI] Compiled MIDI APIs: {}", apis.len());
        for api in apis {
            log::info!("[MIDI]   {}", api.name());
        }
    }
}

impl Drop for KernelMidi {
    fn drop(&mut self) {
        self.stop();
        self.close_output_device();
        self.close_input_device();
    }
}
