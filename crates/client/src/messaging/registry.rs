//! Listener registry for frames received from room sessions.
//!
//! Listeners are registered under an event key: the literal `message`, the
//! literal `event` (catch-all for every event frame), or a specific event name
//! such as `typing`. The registry holds a strong reference to each listener,
//! so it stays registered until explicitly removed with [`ListenerRegistry::off`].

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayy_shared::{Action, Message, CATCH_ALL_EVENT_KEY, MESSAGE_KEY};

/// A registered callback.
///
/// Identity is the `Arc` allocation: clone the `Listener` you registered and
/// pass it to `off` to remove it again.
pub type Listener = Arc<dyn Fn(&Message) + Send + Sync + 'static>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&Message) + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Ordered listener lists keyed by event key.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<Mutex<HashMap<String, Vec<Listener>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        // Listeners never run under the lock, so poisoning cannot leave a half-applied edit.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `listener` to the list for `key`.
    ///
    /// Registering the same listener twice makes it fire twice per dispatch.
    pub fn listen(&self, key: impl Into<String>, listener: Listener) {
        self.entries().entry(key.into()).or_default().push(listener);
    }

    /// Remove every registration of `listener` under `key`.
    pub fn off(&self, key: &str, listener: &Listener) {
        let mut entries = self.entries();
        if let Some(list) = entries.get_mut(key) {
            list.retain(|registered| !Arc::ptr_eq(registered, listener));
            if list.is_empty() {
                entries.remove(key);
            }
        }
    }

    /// Invoke every listener registered under `key`, in registration order.
    ///
    /// The list is snapshotted before the first call: listeners added or removed
    /// by a callback take effect from the next dispatch. A panicking listener is
    /// logged and does not stop the remaining ones.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, key: &str, message: &Message) -> usize {
        let snapshot: Vec<Listener> = match self.entries().get(key) {
            Some(list) => list.clone(),
            None => return 0,
        };

        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                tracing::error!(key = %key, room = %message.room, "Listener panicked during dispatch");
            }
        }

        snapshot.len()
    }

    /// Route a validated frame to its listeners.
    ///
    /// Chat messages go to the `message` key. Event frames go to the key named
    /// by their `event` field and then to the `event` catch-all key.
    pub fn route(&self, message: &Message) -> usize {
        match message.action {
            Action::Message => self.dispatch(MESSAGE_KEY, message),
            Action::Event => match message.event_name() {
                Some(name) => {
                    self.dispatch(name, message) + self.dispatch(CATCH_ALL_EVENT_KEY, message)
                }
                None => {
                    tracing::debug!(room = %message.room, "Dropping event frame without a name");
                    0
                }
            },
        }
    }

    /// Number of registrations under `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.entries().get(key).map_or(0, Vec::len)
    }

    /// Remove all listeners.
    pub fn clear(&self) {
        self.entries().clear();
    }
}
