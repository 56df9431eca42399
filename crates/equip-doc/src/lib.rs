//! Equip Doc - in-memory host document for equipment authoring
//!
//! Provides the host side of the equipment bridge: geometry primitives, an
//! element document with transactions and parameter slots, and the worker
//! thread that is the only context allowed to mutate that document.
//!
//! ## Architecture
//!
//! The document runs in a dedicated worker thread and is never shared.
//! Everything else talks to it through a command channel.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Interactive contexts                       │
//! │   CLI / UI tasks   │   RequestChannel::submit   │   tests    │
//! └────────┬───────────┴─────────────┬──────────────┴─────┬─────┘
//!          │ queries                 │ ExternalEvent::raise│
//!          ▼                         ▼                     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Document Command Channel                   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Document Worker Thread                     │
//! │  - Owns the ModelDocument                                    │
//! │  - Runs registered event handlers on wake                    │
//! │  - Answers read queries                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bindings;
pub mod document;
pub mod geometry;
pub mod host;
pub mod world;

pub use bindings::{BindingError, ParameterBindings, ParameterDef, StorageType};
pub use document::{Document, DocumentError, Element, Parameter};
pub use geometry::{BoundingBox, CurveLoop, GeometryError, Line, Solid, Xyz};
pub use host::{Category, ElementId, ModelDocument, ParameterValue, TransactionId};
pub use world::{
    DocHandle, DocumentWorld, ExternalEvent, ExternalEventHandler, RaiseOutcome, WorldError,
};
