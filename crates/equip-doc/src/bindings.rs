//! Parameter bindings for element categories.
//!
//! A binding decides which parameter slots an element gets when it is
//! created. Bindings can be built in code or parsed from TOML files.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::{Category, ParameterValue};

/// Errors that can occur while binding parameters.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("Parameter already bound to {category}: {name}")]
    AlreadyBound { category: Category, name: String },

    #[error("Invalid storage type: {0}")]
    InvalidStorageType(String),

    #[error("Failed to parse bindings: {0}")]
    ParseError(String),
}

/// Storage types a parameter slot can hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Double,
    Integer,
    Text,
}

impl StorageType {
    /// Storage type that accepts `value`.
    pub fn of(value: &ParameterValue) -> Self {
        match value {
            ParameterValue::Double(_) => StorageType::Double,
            ParameterValue::Integer(_) => StorageType::Integer,
            ParameterValue::Text(_) => StorageType::Text,
        }
    }
}

impl FromStr for StorageType {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "double" | "f64" | "number" | "real" => Ok(Self::Double),
            "integer" | "int" | "i32" => Ok(Self::Integer),
            "text" | "string" | "str" => Ok(Self::Text),
            _ => Err(BindingError::InvalidStorageType(s.to_string())),
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Double => write!(f, "double"),
            StorageType::Integer => write!(f, "integer"),
            StorageType::Text => write!(f, "text"),
        }
    }
}

/// Definition of a single parameter slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    pub storage: StorageType,
    #[serde(default)]
    pub read_only: bool,
    /// Optional unit label (e.g., "Volts")
    #[serde(default)]
    pub unit: Option<String>,
}

impl ParameterDef {
    pub fn new(name: impl Into<String>, storage: StorageType) -> Self {
        Self {
            name: name.into(),
            storage,
            read_only: false,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Parameter definitions bound to each category.
#[derive(Debug, Clone, Default)]
pub struct ParameterBindings {
    by_category: HashMap<Category, Vec<ParameterDef>>,
}

impl ParameterBindings {
    /// Create an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The electrical attribute set bound to electrical equipment.
    pub fn electrical() -> Self {
        let mut bindings = Self::new();
        let defs = [
            ParameterDef::new("Electrical_Voltage", StorageType::Double).with_unit("Volts"),
            ParameterDef::new("Electrical_Current", StorageType::Double).with_unit("Amperes"),
            ParameterDef::new("Electrical_Power", StorageType::Double).with_unit("Watts"),
            ParameterDef::new("Electrical_Phases", StorageType::Integer),
            ParameterDef::new("Equipment_Rating", StorageType::Text).with_unit("kVA"),
        ];
        for def in defs {
            bindings
                .by_category
                .entry(Category::ElectricalEquipment)
                .or_default()
                .push(def);
        }
        bindings
    }

    /// Bind a parameter to a category.
    pub fn bind(&mut self, category: Category, def: ParameterDef) -> Result<(), BindingError> {
        let defs = self.by_category.entry(category).or_default();
        if defs.iter().any(|d| d.name == def.name) {
            return Err(BindingError::AlreadyBound {
                category,
                name: def.name,
            });
        }
        defs.push(def);
        Ok(())
    }

    /// Definitions bound to `category`, in binding order.
    pub fn definitions(&self, category: Category) -> &[ParameterDef] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check if a parameter is bound to a category.
    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.definitions(category).iter().any(|d| d.name == name)
    }

    /// Parse bindings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, BindingError> {
        // The TOML format is:
        // [[parameter]]
        // name = "..."
        // storage = "double"
        // categories = ["electrical_equipment"]

        #[derive(Deserialize)]
        struct TomlBindings {
            #[serde(default, rename = "parameter")]
            parameters: Vec<TomlParameter>,
        }

        #[derive(Deserialize)]
        struct TomlParameter {
            name: String,
            storage: String,
            categories: Vec<Category>,
            #[serde(default)]
            read_only: bool,
            #[serde(default)]
            unit: Option<String>,
        }

        let parsed: TomlBindings =
            toml::from_str(content).map_err(|e| BindingError::ParseError(e.to_string()))?;

        let mut bindings = Self::new();
        for param in parsed.parameters {
            let def = ParameterDef {
                name: param.name,
                storage: param.storage.parse()?,
                read_only: param.read_only,
                unit: param.unit,
            };
            for category in param.categories {
                bindings.bind(category, def.clone())?;
            }
        }
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bindings_from_toml() {
        let toml = r#"
[[parameter]]
name = "Electrical_Voltage"
storage = "double"
unit = "Volts"
categories = ["electrical_equipment", "generic_model"]

[[parameter]]
name = "Asset_Tag"
storage = "string"
read_only = true
categories = ["electrical_equipment"]
"#;

        let bindings = ParameterBindings::from_toml(toml).unwrap();
        assert_eq!(bindings.definitions(Category::ElectricalEquipment).len(), 2);
        let generic = Category::GenericModel;
        assert!(bindings.contains(generic, "Electrical_Voltage"));

        let tag = &bindings.definitions(Category::ElectricalEquipment)[1];
        assert_eq!(tag.storage, StorageType::Text);
        assert!(tag.read_only);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut bindings = ParameterBindings::electrical();
        let err = bindings
            .bind(
                Category::ElectricalEquipment,
                ParameterDef::new("Electrical_Voltage", StorageType::Double),
            )
            .unwrap_err();
        assert!(matches!(err, BindingError::AlreadyBound { .. }));
    }

    #[test]
    fn test_storage_type_parsing() {
        assert_eq!(
            "double".parse::<StorageType>().unwrap(),
            StorageType::Double
        );
        assert_eq!("int".parse::<StorageType>().unwrap(), StorageType::Integer);
        assert_eq!("String".parse::<StorageType>().unwrap(), StorageType::Text);
        assert!("blob".parse::<StorageType>().is_err());
    }

    #[test]
    fn test_electrical_bindings() {
        let bindings = ParameterBindings::electrical();
        let names: Vec<_> = bindings
            .definitions(Category::ElectricalEquipment)
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "Electrical_Voltage",
                "Electrical_Current",
                "Electrical_Power",
                "Electrical_Phases",
                "Equipment_Rating"
            ]
        );
        assert!(bindings.definitions(Category::GenericModel).is_empty());
    }
}
