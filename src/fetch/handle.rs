use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Shared cancellation state between a [`FetchHandle`] and the task it owns.
///
/// Every callback the task wants to fire goes through [`DeliveryGate::deliver`],
/// which holds the gate lock for the duration of the call. `cancel()` takes
/// the same lock, so once it returns no further callback can start. Callbacks
/// must not cancel their own handle.
#[derive(Clone, Default)]
pub struct DeliveryGate {
    cancelled: Arc<Mutex<bool>>,
}

impl DeliveryGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `deliver` unless the gate has been cancelled.
    ///
    /// Returns whether the callback ran.
    pub fn deliver<F: FnOnce()>(&self, deliver: F) -> bool {
        let guard = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        if *guard {
            return false;
        }
        deliver();
        drop(guard);
        true
    }

    /// Close the gate. Returns false if it was already closed.
    fn cancel(&self) -> bool {
        let mut guard = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        let was_open = !*guard;
        *guard = true;
        was_open
    }
}

/// Token for one in-flight page fetch.
///
/// Cancelling closes the delivery gate (no callback fires afterwards) and
/// aborts the backing task. The underlying transport may still finish its
/// current I/O before the abort is observed.
pub struct FetchHandle {
    gate: DeliveryGate,
    task: Option<JoinHandle<()>>,
}

impl FetchHandle {
    pub fn new(gate: DeliveryGate, task: JoinHandle<()>) -> Self {
        Self {
            gate,
            task: Some(task),
        }
    }

    /// Handle with no backing task, for use cases that resolve synchronously.
    pub fn detached(gate: DeliveryGate) -> Self {
        Self { gate, task: None }
    }

    pub fn cancel(&self) {
        if self.gate.cancel() {
            tracing::debug!("Fetch handle cancelled");
        }
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }

    /// True once the backing task has run to completion or been aborted.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl std::fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle")
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}
