//! Equipment request and result types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing an equipment type tag.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unknown equipment type: {0}")]
pub struct ParseTypeError(pub String);

/// Equipment type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    ElectricalPanel,
    Transformer,
    Generator,
    Ups,
    SwitchGear,
    MotorControlCenter,
    /// Any tag without a profile entry; resolves to the fallback profiles
    #[serde(other)]
    Unclassified,
}

impl EquipmentType {
    /// Every type with a built-in profile.
    pub const ALL: [EquipmentType; 6] = [
        EquipmentType::ElectricalPanel,
        EquipmentType::Transformer,
        EquipmentType::Generator,
        EquipmentType::Ups,
        EquipmentType::SwitchGear,
        EquipmentType::MotorControlCenter,
    ];

    /// Name given to new equipment when the front end supplies none.
    pub fn default_name(&self) -> &'static str {
        match self {
            EquipmentType::ElectricalPanel => "Electrical Panel",
            EquipmentType::Transformer => "Transformer",
            EquipmentType::Generator => "Generator",
            EquipmentType::Ups => "UPS",
            EquipmentType::SwitchGear => "Switchgear",
            EquipmentType::MotorControlCenter => "Motor Control Center",
            EquipmentType::Unclassified => "Electrical Equipment",
        }
    }

    /// Config key for this type (matches the serde name).
    pub fn key(&self) -> &'static str {
        match self {
            EquipmentType::ElectricalPanel => "electrical_panel",
            EquipmentType::Transformer => "transformer",
            EquipmentType::Generator => "generator",
            EquipmentType::Ups => "ups",
            EquipmentType::SwitchGear => "switch_gear",
            EquipmentType::MotorControlCenter => "motor_control_center",
            EquipmentType::Unclassified => "unclassified",
        }
    }
}

impl FromStr for EquipmentType {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "electrical_panel" | "panel" => Ok(Self::ElectricalPanel),
            "transformer" | "xfmr" => Ok(Self::Transformer),
            "generator" | "gen" => Ok(Self::Generator),
            "ups" => Ok(Self::Ups),
            "switch_gear" | "switchgear" => Ok(Self::SwitchGear),
            "motor_control_center" | "mcc" => Ok(Self::MotorControlCenter),
            "unclassified" => Ok(Self::Unclassified),
            _ => Err(ParseTypeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.default_name())
    }
}

/// A request to create one piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRequest {
    pub equipment_type: EquipmentType,
    pub name: String,
}

impl EquipmentRequest {
    pub fn new(equipment_type: EquipmentType, name: impl Into<String>) -> Self {
        Self {
            equipment_type,
            name: name.into(),
        }
    }

    /// Request named after the type's default name.
    pub fn with_default_name(equipment_type: EquipmentType) -> Self {
        Self::new(equipment_type, equipment_type.default_name())
    }
}

/// Terminal outcome of an executed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentResult {
    pub success: bool,
    pub message: String,
    pub element_id: Option<i64>,
}

impl EquipmentResult {
    pub fn succeeded(message: impl Into<String>, element_id: i64) -> Self {
        Self {
            success: true,
            message: message.into(),
            element_id: Some(element_id),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            element_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parsing() {
        assert_eq!(
            "transformer".parse::<EquipmentType>().unwrap(),
            EquipmentType::Transformer
        );
        assert_eq!(
            "MCC".parse::<EquipmentType>().unwrap(),
            EquipmentType::MotorControlCenter
        );
        assert_eq!(
            "electrical-panel".parse::<EquipmentType>().unwrap(),
            EquipmentType::ElectricalPanel
        );
        assert_eq!(
            "Switch Gear".parse::<EquipmentType>().unwrap(),
            EquipmentType::SwitchGear
        );
        assert!("reactor".parse::<EquipmentType>().is_err());
    }

    #[test]
    fn test_unknown_tag_deserializes_as_unclassified() {
        let request: EquipmentRequest =
            serde_json::from_str(r#"{"equipment_type": "capacitor_bank", "name": "C-1"}"#).unwrap();
        assert_eq!(request.equipment_type, EquipmentType::Unclassified);

        let request: EquipmentRequest =
            serde_json::from_str(r#"{"equipment_type": "ups", "name": "U-1"}"#).unwrap();
        assert_eq!(request.equipment_type, EquipmentType::Ups);
    }

    #[test]
    fn test_keys_round_trip_through_parse() {
        for ty in EquipmentType::ALL {
            assert_eq!(ty.key().parse::<EquipmentType>().unwrap(), ty);
        }
    }
}
