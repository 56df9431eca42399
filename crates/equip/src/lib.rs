//! Equip - electrical equipment creation bridge
//!
//! This crate moves equipment creation requests from interactive contexts
//! into the single writer context of the host document, including:
//! - Type tag to geometry and electrical profile tables
//! - Solid and attribute derivation for each equipment type
//! - A last-write-wins request slot with a wake signal
//! - The transactional create-or-abort executor
//! - Fan-out of results to subscribers

// Request and result types
pub mod model;

// Profile tables
pub mod catalog;

// Geometry and attribute derivation
pub mod factory;

// Interactive -> single writer handoff
pub mod channel;

// Transactional creation on the document worker
pub mod executor;

// Result fan-out
pub mod broadcast;

// Wiring
pub mod bridge;

// Front-end state
pub mod session;

// Configuration
pub mod config;

pub use bridge::{BridgeError, EquipmentBridge};
pub use broadcast::{ResultBroadcaster, Subscription};
pub use catalog::{ElectricalProfile, GeometryProfile, ProfileCatalog};
pub use channel::RequestChannel;
pub use config::{ConfigError, EquipConfig};
pub use executor::{CreationError, ExecutorState, MutationExecutor};
pub use factory::{Attribute, AttributeValue, EntityFactory, EquipmentBlueprint};
pub use model::{EquipmentRequest, EquipmentResult, EquipmentType};
pub use session::CreationSession;
