//! Single-slot request mailbox.
//!
//! Interactive contexts `submit` into one pending slot and raise the wake
//! signal; the document worker drains the slot with `take_if_any`. A newer
//! submit overwrites an unconsumed request (last write wins).

use std::sync::Arc;

use equip_doc::{ExternalEvent, RaiseOutcome};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::model::EquipmentRequest;

/// Something that schedules one run on the single writer context.
pub trait WakeSignal: Send + Sync {
    fn raise(&self) -> RaiseOutcome;
}

impl WakeSignal for ExternalEvent {
    fn raise(&self) -> RaiseOutcome {
        ExternalEvent::raise(self)
    }
}

/// The pending request slot, shared by the channel and the executor.
#[derive(Debug, Clone, Default)]
pub struct PendingSlot {
    inner: Arc<Mutex<Option<EquipmentRequest>>>,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a request, returning the unconsumed one it replaced.
    pub fn put(&self, request: EquipmentRequest) -> Option<EquipmentRequest> {
        self.inner.lock().replace(request)
    }

    /// Return and clear the pending request in one step.
    pub fn take_if_any(&self) -> Option<EquipmentRequest> {
        self.inner.lock().take()
    }

    pub fn is_occupied(&self) -> bool {
        self.inner.lock().is_some()
    }
}

/// Hands requests from interactive contexts to the document worker.
pub struct RequestChannel {
    slot: PendingSlot,
    wake: Box<dyn WakeSignal>,
}

impl RequestChannel {
    pub fn new(slot: PendingSlot, wake: Box<dyn WakeSignal>) -> Self {
        Self { slot, wake }
    }

    /// Store `request` and wake the worker. Never blocks on the worker.
    pub fn submit(&self, request: EquipmentRequest) -> RaiseOutcome {
        debug!(
            "Submitting {:?} request for {:?}",
            request.equipment_type, request.name
        );
        if let Some(discarded) = self.slot.put(request) {
            debug!("Discarded unconsumed request for {:?}", discarded.name);
        }

        let outcome = self.wake.raise();
        if outcome == RaiseOutcome::Disposed {
            warn!("Document worker is gone; request will not run");
        }
        outcome
    }

    /// Return and clear the pending request, if any.
    pub fn take_if_any(&self) -> Option<EquipmentRequest> {
        self.slot.take_if_any()
    }

    /// Whether a request is waiting to be taken.
    pub fn is_pending(&self) -> bool {
        self.slot.is_occupied()
    }

    pub fn slot(&self) -> &PendingSlot {
        &self.slot
    }
}

impl std::fmt::Debug for RequestChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestChannel")
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EquipmentType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingWake {
        raises: Arc<AtomicUsize>,
    }

    impl WakeSignal for CountingWake {
        fn raise(&self) -> RaiseOutcome {
            self.raises.fetch_add(1, Ordering::SeqCst);
            RaiseOutcome::Accepted
        }
    }

    #[test]
    fn test_last_write_wins() {
        let raises = Arc::new(AtomicUsize::new(0));
        let channel = RequestChannel::new(
            PendingSlot::new(),
            Box::new(CountingWake {
                raises: raises.clone(),
            }),
        );

        channel.submit(EquipmentRequest::new(EquipmentType::Ups, "A"));
        channel.submit(EquipmentRequest::new(EquipmentType::Generator, "B"));
        assert!(channel.is_pending());
        assert_eq!(raises.load(Ordering::SeqCst), 2);

        let taken = channel.take_if_any().unwrap();
        assert_eq!(taken, EquipmentRequest::new(EquipmentType::Generator, "B"));
        assert!(channel.take_if_any().is_none());
        assert!(!channel.is_pending());
    }

    #[test]
    fn test_slot_is_shared() {
        let slot = PendingSlot::new();
        let channel = RequestChannel::new(slot.clone(), Box::new(CountingWake::default()));
        let request = EquipmentRequest::with_default_name(EquipmentType::Transformer);
        channel.submit(request);

        let taken = slot.take_if_any().unwrap();
        assert_eq!(taken.name, "Transformer");
        assert!(!channel.is_pending());
    }

    #[test]
    fn test_concurrent_submits_leave_one_request() {
        let slot = PendingSlot::new();
        let channel = Arc::new(RequestChannel::new(
            slot.clone(),
            Box::new(CountingWake::default()),
        ));

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let channel = channel.clone();
                std::thread::spawn(move || {
                    channel.submit(EquipmentRequest::new(EquipmentType::Ups, format!("U-{i}")));
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert!(slot.take_if_any().is_some());
        assert!(slot.take_if_any().is_none());
    }
}
