use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// A cooperative cancellation handle. Every suspension point in a launch
/// attempt checks `is_cancelled()` before and after awaiting.
#[derive(Clone)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide singleton tracking which recipe (if any) is currently being
/// launched, and the cancel handle for each in-flight attempt. At most one
/// `launching` id is set at any time.
#[derive(Default)]
pub struct LaunchState {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    launching: Option<String>,
    cancel_handles: HashMap<String, AbortSignal>,
}

impl LaunchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.inner.lock().unwrap().launching.clone()
    }

    /// Mark `id` as the currently-launching recipe and register its cancel
    /// handle.
    pub fn begin(&self, id: String, abort: AbortSignal) {
        let mut inner = self.inner.lock().unwrap();
        inner.launching = Some(id.clone());
        inner.cancel_handles.insert(id, abort);
    }

    pub fn cancel_handle(&self, id: &str) -> Option<AbortSignal> {
        self.inner.lock().unwrap().cancel_handles.get(id).cloned()
    }

    /// Abort `id`'s in-flight attempt if one is registered. Returns whether a
    /// handle was found.
    pub fn abort(&self, id: &str) -> bool {
        if let Some(handle) = self.cancel_handle(id) {
            handle.cancel();
            true
        } else {
            false
        }
    }

    /// Terminal cleanup: remove the cancel handle, and clear `launching` only
    /// if `id` is still the holder (a preemptor may already have cleared it).
    pub fn finish(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.cancel_handles.remove(id);
        if inner.launching.as_deref() == Some(id) {
            inner.launching = None;
        }
    }

    /// Used by a preemptor to forcibly evict another attempt's bookkeeping
    /// once it has aborted and been dealt with.
    pub fn clear_if_holder(&self, id: &str) {
        self.finish(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_sets_current_and_registers_handle() {
        let state = LaunchState::new();
        let abort = AbortSignal::new();
        state.begin("a".to_string(), abort);
        assert_eq!(state.current(), Some("a".to_string()));
        assert!(state.cancel_handle("a").is_some());
    }

    #[test]
    fn finish_only_clears_current_if_still_holder() {
        let state = LaunchState::new();
        state.begin("a".to_string(), AbortSignal::new());
        state.begin("b".to_string(), AbortSignal::new());
        // "b" overwrote "a" as current, but both handles are registered.
        state.finish("a");
        assert_eq!(state.current(), Some("b".to_string()));
        state.finish("b");
        assert_eq!(state.current(), None);
    }

    #[test]
    fn abort_trips_the_registered_signal() {
        let state = LaunchState::new();
        let abort = AbortSignal::new();
        state.begin("a".to_string(), abort.clone());
        assert!(state.abort("a"));
        assert!(abort.is_cancelled());
    }

    #[test]
    fn abort_of_unknown_id_returns_false() {
        let state = LaunchState::new();
        assert!(!state.abort("nope"));
    }
}
