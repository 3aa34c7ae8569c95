use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Flags {
    stop: AtomicBool,
    paused: AtomicBool,
    clear: AtomicBool,
}

/// Cooperative operator flags shared between the control loop and whoever
/// drives it (signal handler, UI). The loop samples them once per iteration.
#[derive(Clone, Default)]
pub struct ControlHandle {
    flags: Arc<Flags>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an orderly shutdown.
    pub fn stop(&self) {
        self.flags.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    /// Keep capturing frames but perform no actuation.
    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Flush whatever is in view out straight and rebuild the background.
    pub fn request_clear(&self) {
        self.flags.clear.store(true, Ordering::SeqCst);
    }

    /// Consume a pending clear request.
    pub(crate) fn take_clear(&self) -> bool {
        self.flags.clear.swap(false, Ordering::SeqCst)
    }
}
