//! Profile data model
//!
//! This crate provides:
//! - Decoding of FHIR StructureDefinition snapshots
//! - Typed element definitions with a closed `ElementType` set
//! - Indexed, immutable profile snapshots
//! - The profile registry and its directory loader
//! - Element-id helpers (parents, slices, attribute keys)
//! - ModelInfo primary code paths

pub mod element;
pub mod element_id;
pub mod model_info;
pub mod registry;
pub mod snapshot;
pub mod structure_definition;
pub mod term_code;

pub use element::*;
pub use model_info::{ModelInfo, TypeInfo, primary_code_path};
pub use registry::*;
pub use snapshot::*;
pub use term_code::*;
