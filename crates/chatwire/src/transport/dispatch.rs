//! Message-type dispatch.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{error, trace};

/// Callback invoked with the payload of each matching frame.
///
/// Handlers are identified by their `Arc`: keep a clone to unsubscribe.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_handler(a: &Handler, b: &Handler) -> bool {
    // Compare data pointers only; vtable pointers are not unique.
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

/// Mapping from message type to a set of handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `message_type`. Registering the same handler
    /// twice keeps a single registration.
    pub fn subscribe(&self, message_type: &str, handler: Handler) {
        let mut handlers = self.handlers.write();
        let set = handlers.entry(message_type.to_string()).or_default();
        if !set.iter().any(|h| same_handler(h, &handler)) {
            set.push(handler);
        }
    }

    /// Remove `handler` from `message_type`. Unknown handlers are ignored.
    pub fn unsubscribe(&self, message_type: &str, handler: &Handler) {
        let mut handlers = self.handlers.write();
        if let Some(set) = handlers.get_mut(message_type) {
            set.retain(|h| !same_handler(h, handler));
            if set.is_empty() {
                handlers.remove(message_type);
            }
        }
    }

    /// Number of handlers registered for `message_type`.
    #[must_use]
    pub fn handler_count(&self, message_type: &str) -> usize {
        self.handlers.read().get(message_type).map_or(0, Vec::len)
    }

    /// Invoke every handler registered for `message_type`.
    ///
    /// Works on a snapshot taken before the first call, so handlers may
    /// subscribe or unsubscribe freely. A panicking handler is logged and
    /// does not stop the others. Returns how many handlers completed.
    pub fn dispatch(&self, message_type: &str, payload: &Value) -> usize {
        let snapshot: Vec<Handler> = match self.handlers.read().get(message_type) {
            Some(set) => set.clone(),
            None => {
                trace!(message_type, "no handlers registered");
                return 0;
            }
        };

        let mut completed = 0;
        for h in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| h(payload))) {
                Ok(()) => completed += 1,
                Err(_) => error!(message_type, "message handler panicked"),
            }
        }
        completed
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        let mut map = f.debug_map();
        for (message_type, set) in handlers.iter() {
            map.entry(message_type, &set.len());
        }
        map.finish()
    }
}
