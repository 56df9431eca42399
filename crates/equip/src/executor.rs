//! Transactional equipment creation on the document worker.
//!
//! The executor is registered as an external event handler. Each run drains
//! the pending slot and, if a request was waiting, creates one element inside
//! a single transaction: every fatal step rolls the transaction back, while
//! attribute writes fail softly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use equip_doc::{
    Category, DocumentError, ElementId, ExternalEventHandler, ModelDocument, ParameterValue,
    StorageType, TransactionId, Xyz,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::broadcast::ResultBroadcaster;
use crate::channel::PendingSlot;
use crate::factory::{Attribute, EntityFactory, FactoryError};
use crate::model::{EquipmentRequest, EquipmentResult};

/// Transaction name used when none is configured.
pub const DEFAULT_TRANSACTION_NAME: &str = "Create Equipment";

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Executor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExecutorState {
    /// Waiting for a request
    Idle = 0,
    /// A transaction is open
    Executing = 1,
    /// The last transaction committed
    Committed = 2,
    /// The last transaction was rolled back
    RolledBack = 3,
}

impl ExecutorState {
    /// Convert from u8
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Executing,
            2 => Self::Committed,
            3 => Self::RolledBack,
            _ => Self::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == ExecutorState::Idle
    }
}

impl std::fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorState::Idle => write!(f, "idle"),
            ExecutorState::Executing => write!(f, "executing"),
            ExecutorState::Committed => write!(f, "committed"),
            ExecutorState::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// Lock-free view of the executor state, shared with front ends.
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn get(&self) -> ExecutorState {
        ExecutorState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ExecutorState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Fatal creation failure. The transaction is rolled back.
#[derive(Debug, Error)]
pub enum CreationError {
    #[error(transparent)]
    Construction(#[from] FactoryError),

    #[error("{0}")]
    EntityCreation(#[source] DocumentError),

    #[error("Transaction did not commit: {0}")]
    Commit(#[source] DocumentError),
}

/// An attribute could not be written. Logged and skipped.
#[derive(Debug, Error, PartialEq)]
pub enum AttributeError {
    #[error("Element has no {0} parameter")]
    Missing(&'static str),

    #[error("Parameter {0} is read-only")]
    ReadOnly(&'static str),

    #[error("Parameter {name} stores {expected}, attribute is {actual}")]
    StorageMismatch {
        name: &'static str,
        expected: StorageType,
        actual: StorageType,
    },

    #[error("Document rejected {name}: {source}")]
    Rejected {
        name: &'static str,
        #[source]
        source: DocumentError,
    },
}

/// Write one attribute with the setter matching its value kind.
pub fn assign_attribute(
    doc: &mut dyn ModelDocument,
    id: ElementId,
    attribute: &Attribute,
) -> Result<(), AttributeError> {
    let slot = doc
        .parameter(id, attribute.name)
        .ok_or(AttributeError::Missing(attribute.name))?;
    if slot.read_only {
        return Err(AttributeError::ReadOnly(attribute.name));
    }

    let value = ParameterValue::from(&attribute.value);
    let actual = StorageType::of(&value);
    if slot.storage != actual {
        return Err(AttributeError::StorageMismatch {
            name: attribute.name,
            expected: slot.storage,
            actual,
        });
    }

    doc.set_parameter(id, attribute.name, value)
        .map_err(|source| AttributeError::Rejected {
            name: attribute.name,
            source,
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Placement
// ─────────────────────────────────────────────────────────────────────────────

/// Random planar offset, uniform on X and Y within `[-bound, +bound]`.
#[derive(Debug)]
pub struct PlacementSampler {
    rng: StdRng,
    bound: f64,
}

impl PlacementSampler {
    /// A bound whose span `2 * bound` is not finite falls back to 0.
    pub fn new(bound: f64, seed: Option<u64>) -> Self {
        let bound = if bound >= 0.0 && (2.0 * bound).is_finite() {
            bound
        } else {
            warn!("Ignoring invalid placement bound {}, using 0", bound);
            0.0
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, bound }
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn sample(&mut self) -> Xyz {
        if self.bound == 0.0 {
            return Xyz::ZERO;
        }
        let x = self.rng.gen_range(-self.bound..=self.bound);
        let y = self.rng.gen_range(-self.bound..=self.bound);
        Xyz::new(x, y, 0.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor
// ─────────────────────────────────────────────────────────────────────────────

/// Runs pending creation requests on the document worker.
pub struct MutationExecutor {
    slot: PendingSlot,
    factory: EntityFactory,
    broadcaster: Arc<ResultBroadcaster>,
    sampler: PlacementSampler,
    transaction_name: String,
    state: StateCell,
}

impl MutationExecutor {
    pub fn new(
        slot: PendingSlot,
        factory: EntityFactory,
        broadcaster: Arc<ResultBroadcaster>,
        sampler: PlacementSampler,
    ) -> Self {
        Self {
            slot,
            factory,
            broadcaster,
            sampler,
            transaction_name: DEFAULT_TRANSACTION_NAME.to_string(),
            state: StateCell::default(),
        }
    }

    pub fn with_transaction_name(mut self, name: impl Into<String>) -> Self {
        self.transaction_name = name.into();
        self
    }

    /// Shared handle on this executor's state.
    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    pub fn state(&self) -> ExecutorState {
        self.state.get()
    }

    /// Drain the slot and run the request, if any. Returns the emitted result.
    pub fn run_pending(&mut self, doc: &mut dyn ModelDocument) -> Option<EquipmentResult> {
        let Some(request) = self.slot.take_if_any() else {
            debug!("Wake with empty slot, nothing to do");
            return None;
        };

        self.state.set(ExecutorState::Executing);
        let result = match self.create(doc, &request) {
            Ok(id) => {
                self.state.set(ExecutorState::Committed);
                info!("Created {} as element {}", request.name, id);
                EquipmentResult::succeeded(
                    format!("Created {} with electrical parameters", request.name),
                    id.0,
                )
            }
            Err(e) => {
                self.state.set(ExecutorState::RolledBack);
                error!("Rolled back creation of {}: {}", request.name, e);
                EquipmentResult::failed(format!("Unable to create equipment: {e}"))
            }
        };
        self.state.set(ExecutorState::Idle);

        self.broadcaster.emit(&result);
        Some(result)
    }

    fn create(
        &mut self,
        doc: &mut dyn ModelDocument,
        request: &EquipmentRequest,
    ) -> Result<ElementId, CreationError> {
        let txn = doc
            .begin_transaction(&self.transaction_name)
            .map_err(CreationError::EntityCreation)?;

        let id = match self.populate(doc, request) {
            Ok(id) => id,
            Err(e) => {
                Self::abort(doc, txn);
                return Err(e);
            }
        };

        if let Err(e) = doc.commit(txn) {
            Self::abort(doc, txn);
            return Err(CreationError::Commit(e));
        }
        Ok(id)
    }

    fn populate(
        &mut self,
        doc: &mut dyn ModelDocument,
        request: &EquipmentRequest,
    ) -> Result<ElementId, CreationError> {
        let blueprint = self.factory.build(request)?;

        let id = doc
            .create_element(Category::ElectricalEquipment)
            .map_err(CreationError::EntityCreation)?;
        doc.set_shape(id, blueprint.solid)
            .map_err(CreationError::EntityCreation)?;
        doc.set_name(id, &blueprint.display_name)
            .map_err(CreationError::EntityCreation)?;

        let mut assigned = 0;
        for attribute in &blueprint.attributes {
            match assign_attribute(doc, id, attribute) {
                Ok(()) => assigned += 1,
                Err(e) => warn!("Skipping attribute on element {}: {}", id, e),
            }
        }
        debug!(
            "Assigned {}/{} attributes on element {}",
            assigned,
            blueprint.attributes.len(),
            id
        );

        let offset = self.sampler.sample();
        doc.move_element(id, offset)
            .map_err(CreationError::EntityCreation)?;
        debug!("Placed element {} at offset {}", id, offset);

        Ok(id)
    }

    fn abort(doc: &mut dyn ModelDocument, txn: TransactionId) {
        // The host may already have discarded the transaction
        if let Err(e) = doc.rollback(txn) {
            debug!("Rollback of {:?} skipped: {}", txn, e);
        }
    }
}

impl ExternalEventHandler for MutationExecutor {
    fn execute(&mut self, doc: &mut dyn ModelDocument) {
        self.run_pending(doc);
    }

    fn name(&self) -> String {
        "Equipment Creation".to_string()
    }
}

impl std::fmt::Debug for MutationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationExecutor")
            .field("transaction_name", &self.transaction_name)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}
