//! The host document contract.
//!
//! Everything the equipment bridge needs from the host goes through
//! [`ModelDocument`]. The in-memory [`Document`](crate::Document) implements
//! it; tests wrap it to inject failures.

use serde::{Deserialize, Serialize};

use crate::document::{DocumentError, Element, Parameter};
use crate::geometry::{Solid, Xyz};

/// Unique identifier for an element in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub i64);

impl From<i64> for ElementId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to an open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

/// Element categories known to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ElectricalEquipment,
    GenericModel,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::ElectricalEquipment => write!(f, "Electrical Equipment"),
            Category::GenericModel => write!(f, "Generic Model"),
        }
    }
}

/// A typed value stored in a parameter slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Double(f64),
    Integer(i32),
    Text(String),
}

/// Operations the host exposes on its shared model state.
///
/// Every mutating call must happen between `begin_transaction` and
/// `commit`/`rollback`; nothing done inside a rolled back transaction
/// survives it.
pub trait ModelDocument {
    // === Transactions ===

    /// Open a transaction. Only one may be open at a time.
    fn begin_transaction(&mut self, name: &str) -> Result<TransactionId, DocumentError>;

    /// Make every change since `begin_transaction` visible.
    fn commit(&mut self, txn: TransactionId) -> Result<(), DocumentError>;

    /// Revert every change since `begin_transaction`.
    fn rollback(&mut self, txn: TransactionId) -> Result<(), DocumentError>;

    // === Elements ===

    /// Create an empty placeholder element.
    fn create_element(&mut self, category: Category) -> Result<ElementId, DocumentError>;

    fn set_shape(&mut self, id: ElementId, shape: Solid) -> Result<(), DocumentError>;

    fn set_name(&mut self, id: ElementId, name: &str) -> Result<(), DocumentError>;

    /// Rigidly translate an element.
    fn move_element(&mut self, id: ElementId, by: Xyz) -> Result<(), DocumentError>;

    // === Parameters ===

    /// Look up a parameter slot by name, `None` if the element has no such slot.
    fn parameter(&self, id: ElementId, name: &str) -> Option<Parameter>;

    /// Store a value into a writable slot of matching storage type.
    fn set_parameter(
        &mut self,
        id: ElementId,
        name: &str,
        value: ParameterValue,
    ) -> Result<(), DocumentError>;

    // === Reads ===

    fn element(&self, id: ElementId) -> Option<Element>;

    fn find_by_name(&self, name: &str) -> Vec<ElementId>;

    fn element_count(&self) -> usize;
}
