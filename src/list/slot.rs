use crate::fetch::FetchHandle;

/// Holder for the single operation the list controller owns.
///
/// Every operation gets a fresh generation number. Starting one cancels the
/// previous handle first; events carrying any other generation, or arriving
/// after the live one settled, are stale.
#[derive(Debug)]
pub struct LoadSlot {
    generation: u64,
    handle: Option<FetchHandle>,
    settled: bool,
}

impl Default for LoadSlot {
    fn default() -> Self {
        Self {
            generation: 0,
            handle: None,
            settled: true,
        }
    }
}

impl LoadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is in flight and open a new generation.
    pub fn begin(&mut self) -> u64 {
        self.cancel_handle();
        self.generation += 1;
        self.settled = false;
        self.generation
    }

    /// Store the handle for `generation`.
    ///
    /// A handle for a generation that is no longer current is cancelled on
    /// the spot.
    pub fn attach(&mut self, generation: u64, handle: FetchHandle) {
        if generation == self.generation && !self.settled {
            self.handle = Some(handle);
        } else {
            handle.cancel();
        }
    }

    pub fn is_live(&self, generation: u64) -> bool {
        generation == self.generation && !self.settled
    }

    /// Mark `generation` as settled. Returns `false` if it was stale.
    pub fn finish(&mut self, generation: u64) -> bool {
        if !self.is_live(generation) {
            return false;
        }
        self.settled = true;
        self.handle = None;
        true
    }

    /// Cancel the live operation and make all of its events stale.
    pub fn invalidate(&mut self) {
        self.cancel_handle();
        self.generation += 1;
        self.settled = true;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an operation is started and not yet settled.
    pub fn in_flight(&self) -> bool {
        !self.settled
    }

    fn cancel_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                tracing::debug!(generation = self.generation, "Cancelling superseded load");
            }
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::DeliveryGate;

    fn detached() -> (DeliveryGate, FetchHandle) {
        let gate = DeliveryGate::new();
        (gate.clone(), FetchHandle::detached(gate))
    }

    #[test]
    fn test_begin_cancels_previous() {
        let mut slot = LoadSlot::new();
        let first = slot.begin();
        let (gate, handle) = detached();
        slot.attach(first, handle);

        let second = slot.begin();
        assert!(gate.is_cancelled());
        assert!(second > first);
        assert!(!slot.is_live(first));
        assert!(slot.is_live(second));
    }

    #[test]
    fn test_finish_settles_once() {
        let mut slot = LoadSlot::new();
        assert!(!slot.in_flight());
        let g = slot.begin();
        assert!(slot.in_flight());
        assert!(slot.finish(g));
        assert!(!slot.finish(g));
        assert!(!slot.is_live(g));
        assert!(!slot.in_flight());
    }

    #[test]
    fn test_stale_attach_is_cancelled() {
        let mut slot = LoadSlot::new();
        let old = slot.begin();
        slot.begin();
        let (gate, handle) = detached();
        slot.attach(old, handle);
        assert!(gate.is_cancelled());
    }

    #[test]
    fn test_invalidate() {
        let mut slot = LoadSlot::new();
        let g = slot.begin();
        let (gate, handle) = detached();
        slot.attach(g, handle);

        slot.invalidate();
        assert!(gate.is_cancelled());
        assert!(!slot.is_live(g));
        assert!(!slot.in_flight());
    }
}
