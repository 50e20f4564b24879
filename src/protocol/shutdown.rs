//! Shutdown listeners fired once when a connection closes.

use crate::connection::Connection;
use crate::protocol::handler::callback_addr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Callback run when the owning connection closes
pub type ShutdownListener = Arc<dyn Fn(&Connection) + Send + Sync + 'static>;

/// Wrap a closure as a [`ShutdownListener`]
pub fn shutdown_listener<F>(f: F) -> ShutdownListener
where
    F: Fn(&Connection) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ordered listener list. `None` is the only representation of "no
/// listeners", so removing the last one restores the initial state.
#[derive(Default, Clone)]
pub(crate) struct ShutdownNotifier {
    listeners: Option<Vec<ShutdownListener>>,
}

impl ShutdownNotifier {
    pub(crate) fn add(&mut self, listener: ShutdownListener) {
        self.listeners.get_or_insert_with(Vec::new).push(listener);
    }

    /// Remove the most recently added occurrence of `listener`
    pub(crate) fn remove(&mut self, listener: &ShutdownListener) -> bool {
        let Some(listeners) = self.listeners.as_mut() else {
            return false;
        };
        let target = callback_addr(listener);
        let Some(pos) = listeners.iter().rposition(|l| callback_addr(l) == target) else {
            return false;
        };
        listeners.remove(pos);
        if listeners.is_empty() {
            self.listeners = None;
        }
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_none()
    }

    pub(crate) fn snapshot(&self) -> Vec<ShutdownListener> {
        self.listeners.clone().unwrap_or_default()
    }
}

/// Run every listener, isolating panics. Returns the number that panicked.
pub(crate) fn notify_all(listeners: &[ShutdownListener], connection: &Connection) -> usize {
    let mut failures = 0;
    for (index, listener) in listeners.iter().enumerate() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(connection))) {
            failures += 1;
            error!(
                connection_id = connection.id(),
                listener = index,
                panic = panic_message(&*panic),
                "Shutdown listener panicked"
            );
        }
    }
    failures
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
