use tokio::sync::watch;

/// A value that notifies subscribers when it changes.
///
/// Backed by a `watch` channel. Setting an equal value is a no-op, so
/// subscribers only wake on real changes.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Inspect the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }
}

impl<T: Clone> Observable<T> {
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T: PartialEq> Observable<T> {
    /// Replace the value. Returns `true` if subscribers were notified.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}
