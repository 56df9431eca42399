//! Equipment profile tables.
//!
//! Maps each equipment type to its box dimensions and electrical ratings.
//! Both lookups are total: a type without an entry gets the fallback
//! profile (a unit cube on a small single-phase circuit).

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::EquipmentType;

/// Errors building a catalog from overrides.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("{ty:?}: {field} must be a positive finite number, got {value}")]
    InvalidValue {
        ty: EquipmentType,
        field: &'static str,
        value: f64,
    },

    #[error("{ty:?}: phases must be 1 or 3, got {phases}")]
    InvalidPhases { ty: EquipmentType, phases: i32 },

    #[error("{0:?}: rating cannot be empty")]
    EmptyRating(EquipmentType),
}

/// Box dimensions in document length units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryProfile {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl GeometryProfile {
    pub const fn new(width: f64, height: f64, depth: f64) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// Electrical ratings attached to created equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricalProfile {
    /// Volts
    pub voltage: f64,
    /// Amperes
    pub current: f64,
    /// Watts
    pub power: f64,
    pub phases: i32,
    pub rating: Cow<'static, str>,
}

pub const FALLBACK_GEOMETRY: GeometryProfile = GeometryProfile::new(1.0, 1.0, 1.0);

pub const FALLBACK_ELECTRICAL: ElectricalProfile = ElectricalProfile {
    voltage: 120.0,
    current: 20.0,
    power: 2_000.0,
    phases: 1,
    rating: Cow::Borrowed("5kVA"),
};

const GEOMETRY_TABLE: &[(EquipmentType, GeometryProfile)] = &[
    // Thin and tall
    (
        EquipmentType::ElectricalPanel,
        GeometryProfile::new(2.0, 4.0, 0.5),
    ),
    // Large and roughly cubic
    (
        EquipmentType::Transformer,
        GeometryProfile::new(4.0, 5.0, 3.0),
    ),
    // Long and low
    (
        EquipmentType::Generator,
        GeometryProfile::new(6.0, 3.0, 2.5),
    ),
    (EquipmentType::Ups, GeometryProfile::new(2.5, 3.0, 1.5)),
    (
        EquipmentType::SwitchGear,
        GeometryProfile::new(3.0, 6.0, 1.0),
    ),
    // Tallest
    (
        EquipmentType::MotorControlCenter,
        GeometryProfile::new(5.0, 7.0, 2.0),
    ),
];

const fn three_phase_480(current: f64, power: f64, rating: &'static str) -> ElectricalProfile {
    ElectricalProfile {
        voltage: 480.0,
        current,
        power,
        phases: 3,
        rating: Cow::Borrowed(rating),
    }
}

const ELECTRICAL_TABLE: &[(EquipmentType, ElectricalProfile)] = &[
    (
        EquipmentType::ElectricalPanel,
        three_phase_480(400.0, 150_000.0, "200kVA"),
    ),
    (
        EquipmentType::Transformer,
        ElectricalProfile {
            voltage: 13_800.0,
            current: 100.0,
            power: 1_000_000.0,
            phases: 3,
            rating: Cow::Borrowed("1000kVA"),
        },
    ),
    (
        EquipmentType::Generator,
        three_phase_480(600.0, 250_000.0, "300kVA"),
    ),
    (
        EquipmentType::Ups,
        three_phase_480(200.0, 75_000.0, "100kVA"),
    ),
    (
        EquipmentType::SwitchGear,
        three_phase_480(800.0, 300_000.0, "400kVA"),
    ),
    (
        EquipmentType::MotorControlCenter,
        three_phase_480(1_200.0, 500_000.0, "600kVA"),
    ),
];

/// Partial profile replacing fields of a built-in (or fallback) entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverride {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub depth: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub phases: Option<i32>,
    pub rating: Option<String>,
}

/// Immutable type → profile lookup tables.
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    geometry: HashMap<EquipmentType, GeometryProfile>,
    electrical: HashMap<EquipmentType, ElectricalProfile>,
    fallback_geometry: GeometryProfile,
    fallback_electrical: ElectricalProfile,
}

impl ProfileCatalog {
    /// Catalog holding the built-in tables.
    pub fn builtin() -> Self {
        Self {
            geometry: GEOMETRY_TABLE.iter().cloned().collect(),
            electrical: ELECTRICAL_TABLE.iter().cloned().collect(),
            fallback_geometry: FALLBACK_GEOMETRY,
            fallback_electrical: FALLBACK_ELECTRICAL,
        }
    }

    /// Built-in tables with per-type overrides applied and validated.
    pub fn with_overrides(
        overrides: &HashMap<EquipmentType, ProfileOverride>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::builtin();

        for (&ty, patch) in overrides {
            let mut geometry = *catalog.geometry_for(ty);
            let mut electrical = catalog.electrical_for(ty).clone();

            geometry.width = patch.width.unwrap_or(geometry.width);
            geometry.height = patch.height.unwrap_or(geometry.height);
            geometry.depth = patch.depth.unwrap_or(geometry.depth);
            electrical.voltage = patch.voltage.unwrap_or(electrical.voltage);
            electrical.current = patch.current.unwrap_or(electrical.current);
            electrical.power = patch.power.unwrap_or(electrical.power);
            electrical.phases = patch.phases.unwrap_or(electrical.phases);
            if let Some(rating) = &patch.rating {
                electrical.rating = Cow::Owned(rating.clone());
            }

            validate(ty, &geometry, &electrical)?;

            // Unclassified keeps resolving to the fallback pair
            if ty == EquipmentType::Unclassified {
                catalog.fallback_geometry = geometry;
                catalog.fallback_electrical = electrical;
            } else {
                catalog.geometry.insert(ty, geometry);
                catalog.electrical.insert(ty, electrical);
            }
        }

        Ok(catalog)
    }

    /// Dimensions for `ty`, or the fallback.
    pub fn geometry_for(&self, ty: EquipmentType) -> &GeometryProfile {
        self.geometry.get(&ty).unwrap_or(&self.fallback_geometry)
    }

    /// Electrical ratings for `ty`, or the fallback.
    pub fn electrical_for(&self, ty: EquipmentType) -> &ElectricalProfile {
        self.electrical
            .get(&ty)
            .unwrap_or(&self.fallback_electrical)
    }
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn validate(
    ty: EquipmentType,
    geometry: &GeometryProfile,
    electrical: &ElectricalProfile,
) -> Result<(), CatalogError> {
    let positive = [
        ("width", geometry.width),
        ("height", geometry.height),
        ("depth", geometry.depth),
        ("voltage", electrical.voltage),
        ("current", electrical.current),
        ("power", electrical.power),
    ];
    for (field, value) in positive {
        if !value.is_finite() || value <= 0.0 {
            return Err(CatalogError::InvalidValue { ty, field, value });
        }
    }
    if !matches!(electrical.phases, 1 | 3) {
        return Err(CatalogError::InvalidPhases {
            ty,
            phases: electrical.phases,
        });
    }
    if electrical.rating.trim().is_empty() {
        return Err(CatalogError::EmptyRating(ty));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables() {
        let catalog = ProfileCatalog::builtin();
        let expected = [
            (
                EquipmentType::ElectricalPanel,
                (2.0, 4.0, 0.5),
                (480.0, 400.0, 150_000.0, 3, "200kVA"),
            ),
            (
                EquipmentType::Transformer,
                (4.0, 5.0, 3.0),
                (13_800.0, 100.0, 1_000_000.0, 3, "1000kVA"),
            ),
            (
                EquipmentType::Generator,
                (6.0, 3.0, 2.5),
                (480.0, 600.0, 250_000.0, 3, "300kVA"),
            ),
            (
                EquipmentType::Ups,
                (2.5, 3.0, 1.5),
                (480.0, 200.0, 75_000.0, 3, "100kVA"),
            ),
            (
                EquipmentType::SwitchGear,
                (3.0, 6.0, 1.0),
                (480.0, 800.0, 300_000.0, 3, "400kVA"),
            ),
            (
                EquipmentType::MotorControlCenter,
                (5.0, 7.0, 2.0),
                (480.0, 1_200.0, 500_000.0, 3, "600kVA"),
            ),
        ];

        for (ty, (w, h, d), (v, a, p, phases, rating)) in expected {
            let geometry = GeometryProfile::new(w, h, d);
            assert_eq!(*catalog.geometry_for(ty), geometry, "{ty:?}");
            let e = catalog.electrical_for(ty);
            assert_eq!(
                (e.voltage, e.current, e.power, e.phases, &*e.rating),
                (v, a, p, phases, rating),
                "{ty:?}"
            );
        }
    }

    #[test]
    fn test_unknown_type_uses_fallback() {
        let catalog = ProfileCatalog::builtin();
        let ty = EquipmentType::Unclassified;
        assert_eq!(*catalog.geometry_for(ty), FALLBACK_GEOMETRY);
        assert_eq!(*catalog.electrical_for(ty), FALLBACK_ELECTRICAL);
        assert_eq!(FALLBACK_ELECTRICAL.phases, 1);
    }

    #[test]
    fn test_profiles_reflect_scale() {
        let catalog = ProfileCatalog::builtin();
        let panel = catalog.geometry_for(EquipmentType::ElectricalPanel);
        assert!(panel.depth < panel.width && panel.height > panel.width);

        let tallest = EquipmentType::ALL
            .iter()
            .max_by(|a, b| {
                catalog
                    .geometry_for(**a)
                    .height
                    .total_cmp(&catalog.geometry_for(**b).height)
            })
            .unwrap();
        assert_eq!(*tallest, EquipmentType::MotorControlCenter);
    }

    #[test]
    fn test_overrides_merge_onto_builtin() {
        let mut overrides = HashMap::new();
        overrides.insert(
            EquipmentType::Ups,
            ProfileOverride {
                height: Some(3.5),
                rating: Some("120kVA".to_string()),
                ..Default::default()
            },
        );
        overrides.insert(
            EquipmentType::Unclassified,
            ProfileOverride {
                voltage: Some(208.0),
                ..Default::default()
            },
        );

        let catalog = ProfileCatalog::with_overrides(&overrides).unwrap();
        assert_eq!(
            *catalog.geometry_for(EquipmentType::Ups),
            GeometryProfile::new(2.5, 3.5, 1.5)
        );
        assert_eq!(catalog.electrical_for(EquipmentType::Ups).rating, "120kVA");
        assert_eq!(catalog.electrical_for(EquipmentType::Ups).current, 200.0);
        let fallback = catalog.electrical_for(EquipmentType::Unclassified);
        assert_eq!(fallback.voltage, 208.0);
        // Untouched entries keep their built-in values
        assert_eq!(
            *catalog.geometry_for(EquipmentType::Transformer),
            GeometryProfile::new(4.0, 5.0, 3.0)
        );
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert(
            EquipmentType::Generator,
            ProfileOverride {
                depth: Some(0.0),
                ..Default::default()
            },
        );
        assert!(matches!(
            ProfileCatalog::with_overrides(&overrides).unwrap_err(),
            CatalogError::InvalidValue { field: "depth", .. }
        ));

        overrides.insert(
            EquipmentType::Generator,
            ProfileOverride {
                phases: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(
            ProfileCatalog::with_overrides(&overrides).unwrap_err(),
            CatalogError::InvalidPhases {
                ty: EquipmentType::Generator,
                phases: 2
            }
        );
    }
}
