//! Equipment geometry and attribute derivation.

use std::sync::Arc;

use equip_doc::{CurveLoop, GeometryError, Line, ParameterValue, Solid, Xyz};
use thiserror::Error;

use crate::catalog::{ElectricalProfile, GeometryProfile, ProfileCatalog};
use crate::model::{EquipmentRequest, EquipmentType};

pub const VOLTAGE: &str = "Electrical_Voltage";
pub const CURRENT: &str = "Electrical_Current";
pub const POWER: &str = "Electrical_Power";
pub const PHASES: &str = "Electrical_Phases";
pub const RATING: &str = "Equipment_Rating";

/// Geometry could not be built for a request.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Failed to build {ty} geometry: {source}")]
pub struct FactoryError {
    pub ty: EquipmentType,
    #[source]
    pub source: GeometryError,
}

/// Value of a derived attribute. Each kind maps to one parameter setter.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Real(f64),
    Integer(i32),
    Text(String),
}

impl From<&AttributeValue> for ParameterValue {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Real(v) => ParameterValue::Double(*v),
            AttributeValue::Integer(v) => ParameterValue::Integer(*v),
            AttributeValue::Text(v) => ParameterValue::Text(v.clone()),
        }
    }
}

/// A named attribute to write onto the created element.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: &'static str,
    pub value: AttributeValue,
    pub unit: Option<&'static str>,
}

/// Everything needed to materialise one piece of equipment.
#[derive(Debug, Clone)]
pub struct EquipmentBlueprint {
    pub solid: Solid,
    pub display_name: String,
    pub attributes: Vec<Attribute>,
}

impl EquipmentBlueprint {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Builds solids and attribute sets from the profile catalog.
#[derive(Debug, Clone)]
pub struct EntityFactory {
    catalog: Arc<ProfileCatalog>,
}

impl EntityFactory {
    pub fn new(catalog: Arc<ProfileCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    /// Derive the solid and attributes for a request.
    pub fn build(&self, request: &EquipmentRequest) -> Result<EquipmentBlueprint, FactoryError> {
        let ty = request.equipment_type;
        let solid = Self::build_solid(self.catalog.geometry_for(ty))
            .map_err(|source| FactoryError { ty, source })?;

        Ok(EquipmentBlueprint {
            solid,
            display_name: request.name.clone(),
            attributes: Self::attributes(self.catalog.electrical_for(ty)),
        })
    }

    /// Box centred on the origin in plan, sitting on z = 0, extruded up by `height`.
    pub fn build_solid(profile: &GeometryProfile) -> Result<Solid, GeometryError> {
        let half_width = profile.width / 2.0;
        let half_depth = profile.depth / 2.0;

        let p1 = Xyz::new(-half_width, -half_depth, 0.0);
        let p2 = Xyz::new(half_width, -half_depth, 0.0);
        let p3 = Xyz::new(half_width, half_depth, 0.0);
        let p4 = Xyz::new(-half_width, half_depth, 0.0);

        let edges = vec![
            Line::bound(p1, p2)?,
            Line::bound(p2, p3)?,
            Line::bound(p3, p4)?,
            Line::bound(p4, p1)?,
        ];
        let profile_loop = CurveLoop::new(edges)?;

        Solid::extrude(&profile_loop, Xyz::BASIS_Z, profile.height)
    }

    /// Attribute set for an electrical profile, in assignment order.
    pub fn attributes(profile: &ElectricalProfile) -> Vec<Attribute> {
        vec![
            Attribute {
                name: VOLTAGE,
                value: AttributeValue::Real(profile.voltage),
                unit: Some("Volts"),
            },
            Attribute {
                name: CURRENT,
                value: AttributeValue::Real(profile.current),
                unit: Some("Amperes"),
            },
            Attribute {
                name: POWER,
                value: AttributeValue::Real(profile.power),
                unit: Some("Watts"),
            },
            Attribute {
                name: PHASES,
                value: AttributeValue::Integer(profile.phases),
                unit: None,
            },
            Attribute {
                name: RATING,
                value: AttributeValue::Text(profile.rating.to_string()),
                unit: Some("kVA"),
            },
        ]
    }
}

impl Default for EntityFactory {
    fn default() -> Self {
        Self::new(Arc::new(ProfileCatalog::builtin()))
    }
}
