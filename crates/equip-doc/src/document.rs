//! In-memory element document with snapshot transactions.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, trace};

use crate::bindings::{ParameterBindings, StorageType};
use crate::geometry::{BoundingBox, Solid, Xyz};
use crate::host::{Category, ElementId, ModelDocument, ParameterValue, TransactionId};

/// Characters the document refuses in element names.
const PROHIBITED_NAME_CHARS: &[char] = &[
    '\\', ':', '{', '}', '[', ']', '|', ';', '<', '>', '?', '`', '~',
];

/// Errors returned by document operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DocumentError {
    #[error("Modification outside of a transaction")]
    NoActiveTransaction,

    #[error("Transaction already open: {0}")]
    TransactionAlreadyOpen(String),

    #[error("Transaction {0:?} is not the open transaction")]
    UnknownTransaction(TransactionId),

    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("Parameter not found on element {id}: {name}")]
    ParameterNotFound { id: ElementId, name: String },

    #[error("Parameter is read-only: {0}")]
    ReadOnlyParameter(String),

    #[error("Parameter {name} stores {expected}, got {actual}")]
    StorageMismatch {
        name: String,
        expected: StorageType,
        actual: StorageType,
    },

    #[error("Invalid element name: {0:?}")]
    InvalidName(String),

    #[error("Invalid translation {0}")]
    InvalidTranslation(Xyz),

    #[error("Commit failed: {0}")]
    CommitFailed(String),
}

/// A parameter slot on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub storage: StorageType,
    pub value: Option<ParameterValue>,
    pub read_only: bool,
    pub unit: Option<String>,
}

impl Parameter {
    pub fn as_double(&self) -> Option<f64> {
        match self.value {
            Some(ParameterValue::Double(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self.value {
            Some(ParameterValue::Integer(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Some(ParameterValue::Text(v)) => Some(v),
            _ => None,
        }
    }
}

/// An element stored in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub category: Category,
    pub name: String,
    /// Shape in element-local coordinates
    pub shape: Option<Solid>,
    /// Accumulated translation applied by `move_element`
    pub offset: Xyz,
    pub parameters: Vec<Parameter>,
}

impl Element {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// World-space bounds of the shape, if the element has one.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.shape
            .as_ref()
            .map(|s| s.translated(self.offset).bounding_box())
    }
}

#[derive(Debug)]
struct OpenTransaction {
    id: TransactionId,
    name: String,
    snapshot: BTreeMap<ElementId, Element>,
}

/// The in-memory model document.
///
/// Transactions snapshot the element table on `begin_transaction` and
/// restore it on `rollback`. Element ids are never reused, even when the
/// transaction that allocated them is rolled back.
#[derive(Debug)]
pub struct Document {
    elements: BTreeMap<ElementId, Element>,
    bindings: ParameterBindings,
    next_element_id: i64,
    next_transaction_id: u64,
    active: Option<OpenTransaction>,
}

impl Document {
    /// Create an empty document with no parameter bindings.
    pub fn new() -> Self {
        Self::with_bindings(ParameterBindings::new())
    }

    /// Create an empty document with the given bindings.
    pub fn with_bindings(bindings: ParameterBindings) -> Self {
        Self {
            elements: BTreeMap::new(),
            bindings,
            next_element_id: 1,
            next_transaction_id: 1,
            active: None,
        }
    }

    pub fn bindings(&self) -> &ParameterBindings {
        &self.bindings
    }

    /// Name of the open transaction, if any.
    pub fn active_transaction(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.name.as_str())
    }

    fn ensure_transaction(&self) -> Result<(), DocumentError> {
        if self.active.is_none() {
            return Err(DocumentError::NoActiveTransaction);
        }
        Ok(())
    }

    fn ensure_current(&self, txn: TransactionId) -> Result<(), DocumentError> {
        match &self.active {
            Some(open) if open.id == txn => Ok(()),
            Some(_) => Err(DocumentError::UnknownTransaction(txn)),
            None => Err(DocumentError::NoActiveTransaction),
        }
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut Element, DocumentError> {
        self.ensure_transaction()?;
        self.elements
            .get_mut(&id)
            .ok_or(DocumentError::ElementNotFound(id))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelDocument for Document {
    fn begin_transaction(&mut self, name: &str) -> Result<TransactionId, DocumentError> {
        if let Some(open) = &self.active {
            return Err(DocumentError::TransactionAlreadyOpen(open.name.clone()));
        }
        let id = TransactionId(self.next_transaction_id);
        self.next_transaction_id += 1;
        self.active = Some(OpenTransaction {
            id,
            name: name.to_string(),
            snapshot: self.elements.clone(),
        });
        trace!("Began transaction {:?} ({})", id, name);
        Ok(id)
    }

    fn commit(&mut self, txn: TransactionId) -> Result<(), DocumentError> {
        self.ensure_current(txn)?;
        if let Some(open) = self.active.take() {
            debug!("Committed transaction {:?} ({})", open.id, open.name);
        }
        Ok(())
    }

    fn rollback(&mut self, txn: TransactionId) -> Result<(), DocumentError> {
        self.ensure_current(txn)?;
        if let Some(open) = self.active.take() {
            self.elements = open.snapshot;
            debug!("Rolled back transaction {:?} ({})", open.id, open.name);
        }
        Ok(())
    }

    fn create_element(&mut self, category: Category) -> Result<ElementId, DocumentError> {
        self.ensure_transaction()?;
        let id = ElementId(self.next_element_id);
        self.next_element_id += 1;

        let parameters = self
            .bindings
            .definitions(category)
            .iter()
            .map(|def| Parameter {
                name: def.name.clone(),
                storage: def.storage,
                value: None,
                read_only: def.read_only,
                unit: def.unit.clone(),
            })
            .collect();

        self.elements.insert(
            id,
            Element {
                id,
                category,
                name: String::new(),
                shape: None,
                offset: Xyz::ZERO,
                parameters,
            },
        );
        trace!("Created element {} in {}", id, category);
        Ok(id)
    }

    fn set_shape(&mut self, id: ElementId, shape: Solid) -> Result<(), DocumentError> {
        self.element_mut(id)?.shape = Some(shape);
        Ok(())
    }

    fn set_name(&mut self, id: ElementId, name: &str) -> Result<(), DocumentError> {
        if name.trim().is_empty() || name.contains(PROHIBITED_NAME_CHARS) {
            return Err(DocumentError::InvalidName(name.to_string()));
        }
        self.element_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn move_element(&mut self, id: ElementId, by: Xyz) -> Result<(), DocumentError> {
        if !by.is_finite() {
            return Err(DocumentError::InvalidTranslation(by));
        }
        let element = self.element_mut(id)?;
        element.offset = element.offset + by;
        Ok(())
    }

    fn parameter(&self, id: ElementId, name: &str) -> Option<Parameter> {
        self.elements.get(&id)?.parameter(name).cloned()
    }

    fn set_parameter(
        &mut self,
        id: ElementId,
        name: &str,
        value: ParameterValue,
    ) -> Result<(), DocumentError> {
        let element = self.element_mut(id)?;
        let param = element
            .parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| DocumentError::ParameterNotFound {
                id,
                name: name.to_string(),
            })?;

        if param.read_only {
            return Err(DocumentError::ReadOnlyParameter(name.to_string()));
        }
        let actual = StorageType::of(&value);
        if actual != param.storage {
            return Err(DocumentError::StorageMismatch {
                name: name.to_string(),
                expected: param.storage,
                actual,
            });
        }
        param.value = Some(value);
        Ok(())
    }

    fn element(&self, id: ElementId) -> Option<Element> {
        self.elements.get(&id).cloned()
    }

    fn find_by_name(&self, name: &str) -> Vec<ElementId> {
        self.elements
            .values()
            .filter(|e| e.name == name)
            .map(|e| e.id)
            .collect()
    }

    fn element_count(&self) -> usize {
        self.elements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::ParameterDef;

    #[test]
    fn test_mutation_requires_transaction() {
        let mut doc = Document::new();
        assert_eq!(
            doc.create_element(Category::GenericModel).unwrap_err(),
            DocumentError::NoActiveTransaction
        );
    }

    #[test]
    fn test_single_open_transaction() {
        let mut doc = Document::new();
        let txn = doc.begin_transaction("First").unwrap();
        assert_eq!(
            doc.begin_transaction("Second").unwrap_err(),
            DocumentError::TransactionAlreadyOpen("First".to_string())
        );
        assert_eq!(
            doc.commit(TransactionId(txn.0 + 1)).unwrap_err(),
            DocumentError::UnknownTransaction(TransactionId(txn.0 + 1))
        );
        doc.commit(txn).unwrap();
        assert_eq!(
            doc.commit(txn).unwrap_err(),
            DocumentError::NoActiveTransaction
        );
    }

    #[test]
    fn test_rollback_restores_state() {
        let mut doc = Document::with_bindings(ParameterBindings::electrical());

        let txn = doc.begin_transaction("Keep").unwrap();
        let kept = doc.create_element(Category::ElectricalEquipment).unwrap();
        doc.set_name(kept, "Panel-A").unwrap();
        doc.commit(txn).unwrap();

        let txn = doc.begin_transaction("Discard").unwrap();
        let dropped = doc.create_element(Category::ElectricalEquipment).unwrap();
        doc.set_name(dropped, "Panel-B").unwrap();
        doc.set_name(kept, "Renamed").unwrap();
        doc.move_element(kept, Xyz::new(1.0, 0.0, 0.0)).unwrap();
        doc.rollback(txn).unwrap();

        assert_eq!(doc.element_count(), 1);
        assert!(doc.find_by_name("Panel-B").is_empty());
        let kept_el = doc.element(kept).unwrap();
        assert_eq!(kept_el.name, "Panel-A");
        assert_eq!(kept_el.offset, Xyz::ZERO);

        // Ids are not reused after a rollback
        let txn = doc.begin_transaction("Again").unwrap();
        let next = doc.create_element(Category::GenericModel).unwrap();
        doc.commit(txn).unwrap();
        assert!(next > dropped);
    }

    #[test]
    fn test_parameter_storage_rules() {
        let mut bindings = ParameterBindings::electrical();
        bindings
            .bind(
                Category::ElectricalEquipment,
                ParameterDef::new("Asset_Tag", StorageType::Text).read_only(),
            )
            .unwrap();
        let mut doc = Document::with_bindings(bindings);

        let txn = doc.begin_transaction("Params").unwrap();
        let id = doc.create_element(Category::ElectricalEquipment).unwrap();

        doc.set_parameter(id, "Electrical_Voltage", ParameterValue::Double(480.0))
            .unwrap();
        assert_eq!(
            doc.parameter(id, "Electrical_Voltage").unwrap().as_double(),
            Some(480.0)
        );

        let err = doc
            .set_parameter(id, "Electrical_Phases", ParameterValue::Double(3.0))
            .unwrap_err();
        assert!(matches!(err, DocumentError::StorageMismatch { .. }));

        let err = doc
            .set_parameter(id, "Asset_Tag", ParameterValue::Text("X".into()))
            .unwrap_err();
        assert_eq!(
            err,
            DocumentError::ReadOnlyParameter("Asset_Tag".to_string())
        );

        let err = doc
            .set_parameter(id, "Missing", ParameterValue::Integer(1))
            .unwrap_err();
        assert!(matches!(err, DocumentError::ParameterNotFound { .. }));
        assert!(doc.parameter(id, "Missing").is_none());
        doc.commit(txn).unwrap();
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut doc = Document::new();
        let txn = doc.begin_transaction("Names").unwrap();
        let id = doc.create_element(Category::GenericModel).unwrap();
        assert!(doc.set_name(id, "   ").is_err());
        assert!(doc.set_name(id, "Panel{1}").is_err());
        doc.set_name(id, "Tủ điện").unwrap();
        doc.commit(txn).unwrap();
        assert_eq!(doc.find_by_name("Tủ điện"), vec![id]);
    }
}
