//! Front-end creation state: selected type, status line and busy gate.

use std::sync::{Arc, Weak};

use equip_doc::RaiseOutcome;
use parking_lot::Mutex;
use tracing::debug;

use crate::bridge::EquipmentBridge;
use crate::broadcast::Subscription;
use crate::model::{EquipmentRequest, EquipmentResult, EquipmentType};

pub const STATUS_READY: &str = "Ready to create equipment";
pub const STATUS_CREATING: &str = "Creating equipment...";

#[derive(Debug)]
struct SessionState {
    selected: EquipmentType,
    status: String,
    is_creating: bool,
}

/// One front end's view of the bridge.
///
/// At most one request is outstanding per session; `request` is refused
/// until the matching result has arrived. Broadcast results are only
/// applied while this session is waiting on one, so an idle session keeps
/// its status when another front end on the same bridge creates something.
///
/// Results carry no request tag: two sessions waiting at the same time
/// share the pending slot, and both settle on whichever result arrives.
#[derive(Debug)]
pub struct CreationSession {
    bridge: Arc<EquipmentBridge>,
    state: Mutex<SessionState>,
    _subscription: Subscription,
}

impl CreationSession {
    pub fn new(bridge: Arc<EquipmentBridge>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<CreationSession>| {
            let weak = weak.clone();
            let subscription = bridge.subscribe(move |result| {
                if let Some(session) = weak.upgrade() {
                    session.on_broadcast(result);
                }
            });

            Self {
                bridge,
                state: Mutex::new(SessionState {
                    selected: EquipmentType::ElectricalPanel,
                    status: STATUS_READY.to_string(),
                    is_creating: false,
                }),
                _subscription: subscription,
            }
        })
    }

    pub fn select(&self, ty: EquipmentType) {
        self.state.lock().selected = ty;
    }

    pub fn selected(&self) -> EquipmentType {
        self.state.lock().selected
    }

    pub fn status(&self) -> String {
        self.state.lock().status.clone()
    }

    pub fn is_creating(&self) -> bool {
        self.state.lock().is_creating
    }

    /// Submit the selected type under its default name.
    ///
    /// Returns `None` without submitting while a creation is outstanding.
    pub fn request(&self) -> Option<RaiseOutcome> {
        let request = {
            let mut state = self.state.lock();
            if state.is_creating {
                debug!("Creation already in progress, ignoring request");
                return None;
            }
            state.is_creating = true;
            state.status = STATUS_CREATING.to_string();
            EquipmentRequest::with_default_name(state.selected)
        };

        // Lock released: the result may arrive on the worker before submit returns
        let outcome = self.bridge.submit(request);
        if outcome == RaiseOutcome::Disposed {
            self.on_result(&EquipmentResult::failed("document is closed"));
        }
        Some(outcome)
    }

    /// Clear the gate and format the status line for a result.
    pub fn on_result(&self, result: &EquipmentResult) {
        Self::settle(&mut self.state.lock(), result);
    }

    fn on_broadcast(&self, result: &EquipmentResult) {
        let mut state = self.state.lock();
        if !state.is_creating {
            debug!("Ignoring result while idle: {}", result.message);
            return;
        }
        Self::settle(&mut state, result);
    }

    fn settle(state: &mut SessionState, result: &EquipmentResult) {
        state.is_creating = false;
        state.status = match (result.success, result.element_id) {
            (true, Some(id)) => format!("{} (ID: {})", result.message, id),
            (true, None) => result.message.clone(),
            (false, _) => format!("Failed: {}", result.message),
        };
    }
}
